use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use cellar_scraper::catalog::{CatalogStore, InMemoryCatalog};
use cellar_scraper::pipeline::ingestion::crawler::Crawler;
use cellar_scraper::pipeline::ingestion::registry::SourceRegistry;
use cellar_scraper::pipeline::ingestion::snapshot::{LocalSnapshotStore, SnapshotStore};
use cellar_scraper::pipeline::processing::adapter::AdapterRegistry;
use cellar_scraper::pipeline::tasks::{ingest_source, RunStatus};
use tempfile::tempdir;

fn fixture_registry() -> SourceRegistry {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"
[[sources]]
name = "fixture-cellar"
domain = "fixtures.cellar.local"
adapter = "fixture"

[sources.rate_limit]
requests_per_second = 100.0
burst_limit = 10
"#,
    )
    .unwrap();
    SourceRegistry::load(file.path()).unwrap()
}

fn crawler() -> Crawler {
    Crawler::new("CellarScraper/test", Duration::from_secs(5), 1, false)
}

#[tokio::test]
async fn test_fixture_source_populates_empty_catalog() -> Result<()> {
    let registry = fixture_registry();
    let adapters = AdapterRegistry::with_builtins();
    let storage_dir = tempdir()?;
    let snapshots = LocalSnapshotStore::open(storage_dir.path())?;
    let catalog = Arc::new(InMemoryCatalog::new());

    let report = ingest_source(
        &registry,
        &adapters,
        &crawler(),
        &snapshots,
        catalog.clone(),
        "fixture-cellar",
        None,
        4,
    )
    .await?;

    assert_eq!(report.status, RunStatus::Completed);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
    assert_eq!(report.urls_discovered, 6);
    assert_eq!(report.urls_fetched, 6);
    assert_eq!(report.snapshots_stored, 6);
    assert_eq!(report.listings_processed, 6);

    // Empty catalog: every listing proposes new entities
    assert_eq!(report.entities_matched, 0);
    assert_eq!(report.review_queue_count, 0);
    // 6 producers + 6 wines + 5 vintages (one fixture is non-vintage)
    assert_eq!(report.entities_created, 17);

    assert_eq!(catalog.list_producers().await.unwrap().len(), 6);
    assert_eq!(catalog.list_wines(None).await.unwrap().len(), 6);

    // Normalization went through the alias tables
    let producers = catalog.list_producers().await?;
    let drc = producers
        .iter()
        .find(|p| p.canonical_name == "Domaine de la Romanée-Conti")
        .unwrap();
    assert_eq!(drc.region.as_deref(), Some("Bourgogne"));
    Ok(())
}

#[tokio::test]
async fn test_second_run_auto_merges_against_populated_catalog() {
    let registry = fixture_registry();
    let adapters = AdapterRegistry::with_builtins();
    let storage_dir = tempdir().unwrap();
    let snapshots = LocalSnapshotStore::open(storage_dir.path()).unwrap();
    let catalog = Arc::new(InMemoryCatalog::new());

    let first = ingest_source(
        &registry,
        &adapters,
        &crawler(),
        &snapshots,
        catalog.clone(),
        "fixture-cellar",
        None,
        4,
    )
    .await
    .unwrap();
    assert_eq!(first.entities_created, 17);

    let second = ingest_source(
        &registry,
        &adapters,
        &crawler(),
        &snapshots,
        catalog.clone(),
        "fixture-cellar",
        None,
        4,
    )
    .await
    .unwrap();

    // Everything resolves exactly now
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.entities_matched, 6);
    assert_eq!(second.entities_created, 0);
    assert_eq!(second.review_queue_count, 0);

    // No duplicate entities were materialized
    assert_eq!(catalog.list_producers().await.unwrap().len(), 6);
    assert_eq!(catalog.list_wines(None).await.unwrap().len(), 6);

    // Storage-level dedup: identical payloads map to the same snapshots
    assert_eq!(snapshots.storage_stats().unwrap().total_snapshots, 6);
    assert_eq!(snapshots.list_snapshots(Some("fixture-cellar"), 100, 0).unwrap().len(), 6);
}

#[tokio::test]
async fn test_unknown_source_fails_without_panicking() {
    let registry = fixture_registry();
    let adapters = AdapterRegistry::with_builtins();
    let storage_dir = tempdir().unwrap();
    let snapshots = LocalSnapshotStore::open(storage_dir.path()).unwrap();
    let catalog: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog::new());

    let report = ingest_source(
        &registry,
        &adapters,
        &crawler(),
        &snapshots,
        catalog,
        "no-such-source",
        None,
        4,
    )
    .await
    .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.errors[0].contains("not found"));
}

#[tokio::test]
async fn test_max_urls_caps_processing() {
    let registry = fixture_registry();
    let adapters = AdapterRegistry::with_builtins();
    let storage_dir = tempdir().unwrap();
    let snapshots = LocalSnapshotStore::open(storage_dir.path()).unwrap();
    let catalog: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog::new());

    let report = ingest_source(
        &registry,
        &adapters,
        &crawler(),
        &snapshots,
        catalog,
        "fixture-cellar",
        Some(2),
        4,
    )
    .await
    .unwrap();

    assert_eq!(report.urls_discovered, 6);
    assert_eq!(report.urls_fetched, 2);
    assert_eq!(report.listings_processed, 2);
}
