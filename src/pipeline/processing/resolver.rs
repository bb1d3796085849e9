//! Entity resolution: match normalized listings against the canonical
//! catalog and decide whether to auto-link, queue for review, or propose
//! new entities.

use crate::catalog::CatalogStore;
use crate::domain::{Producer, Vintage, Wine};
use crate::error::Result;
use crate::observability::{emit_counter, emit_histogram, MetricName};
use crate::pipeline::ingestion::registry::ResolutionConfig;
use crate::pipeline::processing::normalize::NormalizedListing;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Minimum similarity below which no match is reported at all.
const MATCH_FLOOR: f64 = 0.5;

/// Extra confidence granted to a wine whose producer agrees with the
/// resolved producer.
const PRODUCER_CONSISTENCY_BOOST: f64 = 0.1;

/// Action to take based on match confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchAction {
    /// High confidence: link to the existing entities
    AutoMerge,
    /// Medium confidence: needs manual review
    ReviewQueue,
    /// Low confidence: propose new entities
    NewCandidate,
}

/// Entity kinds the resolver matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Producer,
    Wine,
    Vintage,
}

/// A potential match for an entity.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub entity_id: Uuid,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub confidence: f64,
    /// The listing value that was matched against
    pub matched_value: String,
}

/// Result of resolving a listing to canonical entities.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub listing_id: Uuid,

    pub producer_match: Option<MatchCandidate>,
    pub wine_match: Option<MatchCandidate>,
    pub vintage_match: Option<MatchCandidate>,

    pub action: MatchAction,

    pub create_producer: bool,
    pub create_wine: bool,
    pub create_vintage: bool,

    pub notes: Vec<String>,
}

/// Case-insensitive, whitespace-trimmed string similarity in [0.0, 1.0].
///
/// Defined as `1 - levenshtein / max(len)`; identical strings score 1.0,
/// an empty side scores 0.0.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Pick the action for the given attempted-match confidences.
///
/// Uses the minimum across attempted matches, so one ambiguous component
/// vetoes a confident parent; no attempts at all means a new candidate.
pub fn determine_action(confidences: &[f64], config: &ResolutionConfig) -> MatchAction {
    let Some(min_confidence) = confidences.iter().copied().reduce(f64::min) else {
        return MatchAction::NewCandidate;
    };

    if min_confidence >= config.auto_merge_threshold {
        MatchAction::AutoMerge
    } else if min_confidence >= config.review_queue_threshold {
        MatchAction::ReviewQueue
    } else {
        MatchAction::NewCandidate
    }
}

/// Resolves normalized listings to canonical entities.
pub struct EntityResolver {
    catalog: Arc<dyn CatalogStore>,
    config: ResolutionConfig,
}

impl EntityResolver {
    pub fn new(catalog: Arc<dyn CatalogStore>, config: ResolutionConfig) -> Self {
        Self { catalog, config }
    }

    /// Resolve a listing: best producer, then best wine scoped to it, then
    /// an exact vintage year, plus the action and creation flags.
    pub async fn resolve(
        &self,
        listing: &NormalizedListing,
        listing_id: Option<Uuid>,
    ) -> Result<ResolutionResult> {
        let listing_id = listing_id.unwrap_or_else(Uuid::new_v4);

        let producer_match = match &listing.producer_name {
            Some(name) => self.match_producer(name).await?,
            None => None,
        };

        let wine_match = match &listing.wine_name {
            Some(name) => {
                let producer_id = producer_match.as_ref().map(|m| m.entity_id);
                self.match_wine(name, producer_id).await?
            }
            None => None,
        };

        let vintage_match = match listing.vintage_year {
            Some(year) => {
                let wine_id = wine_match.as_ref().map(|m| m.entity_id);
                self.match_vintage(year, wine_id).await?
            }
            None => None,
        };

        let confidences: Vec<f64> = [&producer_match, &wine_match, &vintage_match]
            .into_iter()
            .flatten()
            .map(|m| m.confidence)
            .collect();
        let action = determine_action(&confidences, &self.config);
        for confidence in &confidences {
            emit_histogram(MetricName::ResolutionConfidence, *confidence);
        }
        match action {
            MatchAction::AutoMerge => emit_counter(MetricName::ResolutionAutoMerge, 1),
            MatchAction::ReviewQueue => emit_counter(MetricName::ResolutionReviewQueue, 1),
            MatchAction::NewCandidate => emit_counter(MetricName::ResolutionNewCandidate, 1),
        }

        let mut result = ResolutionResult {
            listing_id,
            producer_match,
            wine_match,
            vintage_match,
            action,
            create_producer: false,
            create_wine: false,
            create_vintage: false,
            notes: Vec::new(),
        };
        result.create_producer = self.should_create_producer(&result);
        result.create_wine = self.should_create_wine(&result);
        result.create_vintage = self.should_create_vintage(&result, listing);
        self.add_resolution_notes(&mut result, listing);

        Ok(result)
    }

    async fn match_producer(&self, producer_name: &str) -> Result<Option<MatchCandidate>> {
        let producers = self.catalog.list_producers().await?;

        let mut best: Option<MatchCandidate> = None;
        for producer in producers {
            let Some(entity_id) = producer.id else {
                continue;
            };

            let mut confidence = string_similarity(producer_name, &producer.canonical_name);
            for alias in &producer.aliases {
                confidence = confidence.max(string_similarity(producer_name, alias));
            }

            if confidence < MATCH_FLOOR {
                continue;
            }
            if best.as_ref().map(|b| confidence > b.confidence).unwrap_or(true) {
                best = Some(MatchCandidate {
                    entity_id,
                    entity_type: EntityType::Producer,
                    entity_name: producer.canonical_name.clone(),
                    confidence,
                    matched_value: producer_name.to_string(),
                });
            }
        }
        Ok(best)
    }

    async fn match_wine(
        &self,
        wine_name: &str,
        producer_id: Option<Uuid>,
    ) -> Result<Option<MatchCandidate>> {
        let wines = self.catalog.list_wines(producer_id).await?;

        let mut best: Option<MatchCandidate> = None;
        for wine in wines {
            let Some(entity_id) = wine.id else {
                continue;
            };

            let mut confidence = string_similarity(wine_name, &wine.canonical_name);
            // Producer-consistent evidence earns a flat boost, capped at 1.0
            if let (Some(pid), Some(wine_pid)) = (producer_id, wine.producer_id) {
                if pid == wine_pid {
                    confidence = (confidence + PRODUCER_CONSISTENCY_BOOST).min(1.0);
                }
            }

            if confidence < MATCH_FLOOR {
                continue;
            }
            if best.as_ref().map(|b| confidence > b.confidence).unwrap_or(true) {
                best = Some(MatchCandidate {
                    entity_id,
                    entity_type: EntityType::Wine,
                    entity_name: wine.canonical_name.clone(),
                    confidence,
                    matched_value: wine_name.to_string(),
                });
            }
        }
        Ok(best)
    }

    async fn match_vintage(
        &self,
        vintage_year: i32,
        wine_id: Option<Uuid>,
    ) -> Result<Option<MatchCandidate>> {
        let vintage = self.catalog.find_vintage(vintage_year, wine_id).await?;
        Ok(vintage.and_then(|v| {
            v.id.map(|entity_id| MatchCandidate {
                entity_id,
                entity_type: EntityType::Vintage,
                entity_name: vintage_year.to_string(),
                // Vintage identity is exact, not fuzzy
                confidence: 1.0,
                matched_value: vintage_year.to_string(),
            })
        }))
    }

    fn should_create_producer(&self, result: &ResolutionResult) -> bool {
        match &result.producer_match {
            None => true,
            Some(m) => m.confidence < self.config.review_queue_threshold,
        }
    }

    fn should_create_wine(&self, result: &ResolutionResult) -> bool {
        match &result.wine_match {
            None => true,
            Some(m) => m.confidence < self.config.review_queue_threshold,
        }
    }

    fn should_create_vintage(&self, result: &ResolutionResult, listing: &NormalizedListing) -> bool {
        // Non-vintage wines never trigger vintage creation
        if listing.vintage_year.is_none() {
            return false;
        }
        result.vintage_match.is_none()
    }

    fn add_resolution_notes(&self, result: &mut ResolutionResult, listing: &NormalizedListing) {
        match (&result.producer_match, &listing.producer_name) {
            (Some(m), _) => result.notes.push(format!(
                "Producer '{}' matched to '{}' ({:.0}% confidence)",
                m.matched_value,
                m.entity_name,
                m.confidence * 100.0
            )),
            (None, Some(name)) => result
                .notes
                .push(format!("No match found for producer '{}'", name)),
            (None, None) => {}
        }

        match (&result.wine_match, &listing.wine_name) {
            (Some(m), _) => result.notes.push(format!(
                "Wine '{}' matched to '{}' ({:.0}% confidence)",
                m.matched_value,
                m.entity_name,
                m.confidence * 100.0
            )),
            (None, Some(name)) => result
                .notes
                .push(format!("No match found for wine '{}'", name)),
            (None, None) => {}
        }

        match (&result.vintage_match, listing.vintage_year) {
            (Some(_), Some(year)) => result
                .notes
                .push(format!("Vintage {} matched to existing record", year)),
            (None, Some(year)) => result
                .notes
                .push(format!("No existing vintage record for {}", year)),
            _ => {}
        }

        let action = match result.action {
            MatchAction::AutoMerge => "auto_merge",
            MatchAction::ReviewQueue => "review_queue",
            MatchAction::NewCandidate => "new_candidate",
        };
        result.notes.push(format!("Recommended action: {}", action));
    }
}

/// Entity ids a listing-match record should reference after
/// materialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityIds {
    pub producer: Option<Uuid>,
    pub wine: Option<Uuid>,
    pub vintage: Option<Uuid>,
}

/// Create canonical entities flagged by a resolution, linking newly
/// created children to created-or-matched parents.
///
/// Mutates the catalog store. Callers must guarantee at-most-once
/// invocation per listing; no internal locking is provided.
pub async fn create_entities_from_listing(
    catalog: &dyn CatalogStore,
    listing: &NormalizedListing,
    result: &ResolutionResult,
) -> Result<EntityIds> {
    let mut entities = EntityIds::default();

    if result.create_producer && listing.producer_name.is_some() {
        let mut producer = Producer {
            id: None,
            canonical_name: listing.producer_name.clone().unwrap_or_default(),
            aliases: Vec::new(),
            country: listing.country.clone(),
            region: listing.region.clone(),
            created_at: Utc::now(),
        };
        catalog.create_producer(&mut producer).await?;
        entities.producer = producer.id;
        emit_counter(MetricName::EntitiesCreated, 1);
        info!("Created new producer: {}", producer.canonical_name);
    } else if let Some(m) = &result.producer_match {
        entities.producer = Some(m.entity_id);
    }

    if result.create_wine && listing.wine_name.is_some() {
        let mut wine = Wine {
            id: None,
            canonical_name: listing.wine_name.clone().unwrap_or_default(),
            producer_id: entities.producer,
            color: listing.color.clone(),
            style: listing.style.clone(),
            created_at: Utc::now(),
        };
        catalog.create_wine(&mut wine).await?;
        entities.wine = wine.id;
        emit_counter(MetricName::EntitiesCreated, 1);
        info!("Created new wine: {}", wine.canonical_name);
    } else if let Some(m) = &result.wine_match {
        entities.wine = Some(m.entity_id);
    }

    if result.create_vintage {
        if let Some(year) = listing.vintage_year {
            let mut vintage = Vintage {
                id: None,
                wine_id: entities.wine,
                year,
                abv: listing.abv,
                bottle_size_ml: listing.bottle_size_ml,
                created_at: Utc::now(),
            };
            catalog.create_vintage(&mut vintage).await?;
            entities.vintage = vintage.id;
            emit_counter(MetricName::EntitiesCreated, 1);
            info!("Created new vintage: {}", year);
        }
    } else if let Some(m) = &result.vintage_match {
        entities.vintage = Some(m.entity_id);
    }

    Ok(entities)
}
