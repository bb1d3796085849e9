//! Metrics facade for the ingestion pipeline.
//!
//! Thin wrapper over the `metrics` crate using Prometheus naming
//! conventions, so call sites never carry magic strings.

use std::fmt;

/// All metric names emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Crawler
    CrawlerFetchSuccess,
    CrawlerFetchError,
    CrawlerFetchDuration,
    CrawlerPayloadBytes,
    CrawlerDuplicateContent,

    // Snapshot storage
    SnapshotsStored,
    SnapshotsDeduplicated,
    SnapshotCompressedBytes,

    // Normalizer
    ListingsNormalized,

    // Resolver
    ResolutionAutoMerge,
    ResolutionReviewQueue,
    ResolutionNewCandidate,
    ResolutionConfidence,
    EntitiesCreated,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::CrawlerFetchSuccess => "cellar_crawler_fetch_success_total",
            MetricName::CrawlerFetchError => "cellar_crawler_fetch_error_total",
            MetricName::CrawlerFetchDuration => "cellar_crawler_fetch_duration_seconds",
            MetricName::CrawlerPayloadBytes => "cellar_crawler_payload_bytes",
            MetricName::CrawlerDuplicateContent => "cellar_crawler_duplicate_content_total",

            MetricName::SnapshotsStored => "cellar_snapshots_stored_total",
            MetricName::SnapshotsDeduplicated => "cellar_snapshots_deduplicated_total",
            MetricName::SnapshotCompressedBytes => "cellar_snapshot_compressed_bytes",

            MetricName::ListingsNormalized => "cellar_listings_normalized_total",

            MetricName::ResolutionAutoMerge => "cellar_resolution_auto_merge_total",
            MetricName::ResolutionReviewQueue => "cellar_resolution_review_queue_total",
            MetricName::ResolutionNewCandidate => "cellar_resolution_new_candidate_total",
            MetricName::ResolutionConfidence => "cellar_resolution_confidence",
            MetricName::EntitiesCreated => "cellar_entities_created_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Increment a counter metric.
pub fn emit_counter(name: MetricName, value: u64) {
    metrics::counter!(name.as_str()).increment(value);
}

/// Record an observation in a histogram metric.
pub fn emit_histogram(name: MetricName, value: f64) {
    metrics::histogram!(name.as_str()).record(value);
}
