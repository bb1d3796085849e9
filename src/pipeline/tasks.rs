//! Ingest run orchestration.
//!
//! Wires the full pipeline for one source: discover URLs, fetch under
//! politeness constraints, snapshot raw content, extract, normalize,
//! resolve, and materialize entities. Per-URL failures are recorded and
//! never abort the run.

use crate::catalog::CatalogStore;
use crate::error::Result;
use crate::pipeline::ingestion::crawler::{Crawler, FetchResult};
use crate::pipeline::ingestion::registry::SourceRegistry;
use crate::pipeline::ingestion::snapshot::SnapshotStore;
use crate::pipeline::processing::adapter::AdapterRegistry;
use crate::pipeline::processing::normalize::Normalizer;
use crate::pipeline::processing::resolver::{
    create_entities_from_listing, EntityResolver, MatchAction,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Terminal state of an ingest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Auditable summary of one ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestRunReport {
    pub run_id: Uuid,
    pub source_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub urls_discovered: usize,
    pub urls_fetched: usize,
    pub snapshots_stored: usize,
    pub listings_processed: usize,
    pub entities_created: usize,
    pub entities_matched: usize,
    pub review_queue_count: usize,
    pub errors: Vec<String>,
}

impl IngestRunReport {
    fn new(source_name: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source_name: source_name.to_string(),
            status: RunStatus::Failed,
            started_at: Utc::now(),
            finished_at: None,
            urls_discovered: 0,
            urls_fetched: 0,
            snapshots_stored: 0,
            listings_processed: 0,
            entities_created: 0,
            entities_matched: 0,
            review_queue_count: 0,
            errors: Vec::new(),
        }
    }

    fn fail(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Run the full ingestion pipeline for one source.
#[allow(clippy::too_many_arguments)]
pub async fn ingest_source(
    registry: &SourceRegistry,
    adapters: &AdapterRegistry,
    crawler: &Crawler,
    snapshots: &dyn SnapshotStore,
    catalog: Arc<dyn CatalogStore>,
    source_name: &str,
    max_urls: Option<usize>,
    fetch_concurrency: usize,
) -> Result<IngestRunReport> {
    let mut report = IngestRunReport::new(source_name);

    let Some(source) = registry.get_source(source_name) else {
        return Ok(report.fail(format!("Source '{}' not found", source_name)));
    };
    if !source.enabled {
        return Ok(report.fail(format!("Source '{}' is disabled", source_name)));
    }
    let Some(adapter) = adapters.get(&source.adapter, Some(&source.custom)) else {
        return Ok(report.fail(format!("Adapter '{}' not found", source.adapter)));
    };

    info!("Discovering URLs for source '{}'", source_name);
    let mut urls = adapter.discover_urls(&source.seed_urls).await?;
    report.urls_discovered = urls.len();
    if let Some(max) = max_urls {
        urls.truncate(max);
    }
    info!("Processing {} URLs", urls.len());

    // Fetch everything the adapter cannot serve inline, bounded by the
    // concurrency cap; the rate limiter separately paces request starts.
    let mut payloads: HashMap<String, (Vec<u8>, String, String)> = HashMap::new();
    let mut remote_urls = Vec::new();
    for url in &urls {
        match adapter.inline_payload(url) {
            Some((bytes, mime_type)) => {
                let hash = Crawler::compute_hash(&bytes);
                payloads.insert(url.clone(), (bytes, mime_type, hash));
            }
            None => remote_urls.push(url.clone()),
        }
    }

    let fetched: Vec<FetchResult> = if remote_urls.is_empty() {
        Vec::new()
    } else {
        crawler.fetch_batch(&remote_urls, source, fetch_concurrency).await
    };
    for result in fetched {
        if result.success() {
            payloads.insert(
                result.url.clone(),
                (result.content, result.mime_type, result.content_hash),
            );
        } else {
            report.errors.push(format!(
                "Failed to fetch {}: {}",
                result.url,
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    let normalizer = Normalizer::new();
    let resolver = EntityResolver::new(catalog.clone(), registry.resolution_config());

    for url in &urls {
        let Some((content, mime_type, content_hash)) = payloads.get(url) else {
            continue;
        };
        report.urls_fetched += 1;

        match snapshots.save_snapshot(content, &source.name, url, content_hash, mime_type) {
            Ok(_) => report.snapshots_stored += 1,
            Err(e) => {
                report.errors.push(format!("Failed to snapshot {}: {}", url, e));
                continue;
            }
        }

        let Some(extracted) = adapter.extract_listing(content, url, mime_type) else {
            report.errors.push(format!("Failed to extract listing from {}", url));
            continue;
        };

        let validation_errors = adapter.validate_listing(&extracted);
        if !validation_errors.is_empty() {
            report
                .errors
                .extend(validation_errors.into_iter().map(|e| format!("{}: {}", url, e)));
        }

        let normalized = normalizer.normalize_listing(&extracted);

        let resolution = match resolver.resolve(&normalized, None).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Resolution failed for {}: {}", url, e);
                report.errors.push(format!("{}: {}", url, e));
                continue;
            }
        };

        if let Err(e) =
            create_entities_from_listing(catalog.as_ref(), &normalized, &resolution).await
        {
            report.errors.push(format!("{}: {}", url, e));
            continue;
        }

        match resolution.action {
            MatchAction::AutoMerge => report.entities_matched += 1,
            MatchAction::ReviewQueue => report.review_queue_count += 1,
            MatchAction::NewCandidate => {}
        }
        for flag in [
            resolution.create_producer,
            resolution.create_wine,
            resolution.create_vintage,
        ] {
            if flag {
                report.entities_created += 1;
            }
        }
        report.listings_processed += 1;
    }

    report.status = RunStatus::Completed;
    report.finished_at = Some(Utc::now());
    info!(
        "Ingest run {} for '{}' completed: {} listings, {} entities created, {} errors",
        report.run_id,
        source_name,
        report.listings_processed,
        report.entities_created,
        report.errors.len()
    );
    Ok(report)
}
