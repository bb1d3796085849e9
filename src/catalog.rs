use crate::domain::{GrapeVariety, Producer, Region, Vintage, Wine};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Read/write contract against the canonical catalog store.
///
/// The store itself is external to this pipeline; the resolver only looks
/// entities up and requests creations. Implementations assign entity ids
/// on creation.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Lookups by id
    async fn get_producer(&self, id: Uuid) -> Result<Option<Producer>>;
    async fn get_wine(&self, id: Uuid) -> Result<Option<Wine>>;
    async fn get_vintage(&self, id: Uuid) -> Result<Option<Vintage>>;

    // Scans used by the resolver's fuzzy matching
    async fn list_producers(&self) -> Result<Vec<Producer>>;
    async fn list_wines(&self, producer_id: Option<Uuid>) -> Result<Vec<Wine>>;
    async fn find_vintage(&self, year: i32, wine_id: Option<Uuid>) -> Result<Option<Vintage>>;

    // Creation requests issued by entity materialization
    async fn create_producer(&self, producer: &mut Producer) -> Result<()>;
    async fn create_wine(&self, wine: &mut Wine) -> Result<()>;
    async fn create_vintage(&self, vintage: &mut Vintage) -> Result<()>;

    // Reference vocabularies (read-only for this pipeline)
    async fn list_regions(&self) -> Result<Vec<Region>>;
    async fn list_grape_varieties(&self) -> Result<Vec<GrapeVariety>>;
}

/// In-memory catalog implementation for development/testing
pub struct InMemoryCatalog {
    producers: Arc<Mutex<HashMap<Uuid, Producer>>>,
    wines: Arc<Mutex<HashMap<Uuid, Wine>>>,
    vintages: Arc<Mutex<HashMap<Uuid, Vintage>>>,
    regions: Arc<Mutex<HashMap<Uuid, Region>>>,
    grape_varieties: Arc<Mutex<HashMap<Uuid, GrapeVariety>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            producers: Arc::new(Mutex::new(HashMap::new())),
            wines: Arc::new(Mutex::new(HashMap::new())),
            vintages: Arc::new(Mutex::new(HashMap::new())),
            regions: Arc::new(Mutex::new(HashMap::new())),
            grape_varieties: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seed a reference region (the external store owns these in production).
    pub fn add_region(&self, region: &mut Region) {
        let id = Uuid::new_v4();
        region.id = Some(id);
        self.regions.lock().unwrap().insert(id, region.clone());
    }

    /// Seed a reference grape variety.
    pub fn add_grape_variety(&self, variety: &mut GrapeVariety) {
        let id = Uuid::new_v4();
        variety.id = Some(id);
        self.grape_varieties.lock().unwrap().insert(id, variety.clone());
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get_producer(&self, id: Uuid) -> Result<Option<Producer>> {
        Ok(self.producers.lock().unwrap().get(&id).cloned())
    }

    async fn get_wine(&self, id: Uuid) -> Result<Option<Wine>> {
        Ok(self.wines.lock().unwrap().get(&id).cloned())
    }

    async fn get_vintage(&self, id: Uuid) -> Result<Option<Vintage>> {
        Ok(self.vintages.lock().unwrap().get(&id).cloned())
    }

    async fn list_producers(&self) -> Result<Vec<Producer>> {
        Ok(self.producers.lock().unwrap().values().cloned().collect())
    }

    async fn list_wines(&self, producer_id: Option<Uuid>) -> Result<Vec<Wine>> {
        let wines = self.wines.lock().unwrap();
        let selected = wines
            .values()
            .filter(|w| match producer_id {
                Some(pid) => w.producer_id == Some(pid),
                None => true,
            })
            .cloned()
            .collect();
        Ok(selected)
    }

    async fn find_vintage(&self, year: i32, wine_id: Option<Uuid>) -> Result<Option<Vintage>> {
        let vintages = self.vintages.lock().unwrap();
        let found = vintages
            .values()
            .find(|v| {
                v.year == year
                    && match wine_id {
                        Some(wid) => v.wine_id == Some(wid),
                        None => true,
                    }
            })
            .cloned();
        Ok(found)
    }

    async fn create_producer(&self, producer: &mut Producer) -> Result<()> {
        let id = Uuid::new_v4();
        producer.id = Some(id);

        let mut producers = self.producers.lock().unwrap();
        producers.insert(id, producer.clone());

        debug!("Created producer: {} with id {}", producer.canonical_name, id);
        Ok(())
    }

    async fn create_wine(&self, wine: &mut Wine) -> Result<()> {
        let id = Uuid::new_v4();
        wine.id = Some(id);

        let mut wines = self.wines.lock().unwrap();
        wines.insert(id, wine.clone());

        debug!("Created wine: {} with id {}", wine.canonical_name, id);
        Ok(())
    }

    async fn create_vintage(&self, vintage: &mut Vintage) -> Result<()> {
        let id = Uuid::new_v4();
        vintage.id = Some(id);

        let mut vintages = self.vintages.lock().unwrap();
        vintages.insert(id, vintage.clone());

        debug!("Created vintage: {} with id {}", vintage.year, id);
        Ok(())
    }

    async fn list_regions(&self) -> Result<Vec<Region>> {
        Ok(self.regions.lock().unwrap().values().cloned().collect())
    }

    async fn list_grape_varieties(&self) -> Result<Vec<GrapeVariety>> {
        Ok(self.grape_varieties.lock().unwrap().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn producer(name: &str) -> Producer {
        Producer {
            id: None,
            canonical_name: name.to_string(),
            aliases: Vec::new(),
            country: None,
            region: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_lookup_roundtrips() {
        let catalog = InMemoryCatalog::new();

        let mut ridge = producer("Ridge Vineyards");
        catalog.create_producer(&mut ridge).await.unwrap();
        let id = ridge.id.expect("id assigned on create");

        let found = catalog.get_producer(id).await.unwrap().unwrap();
        assert_eq!(found.canonical_name, "Ridge Vineyards");
        assert_eq!(catalog.list_producers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_wines_scoped_to_producer() {
        let catalog = InMemoryCatalog::new();

        let mut ridge = producer("Ridge Vineyards");
        catalog.create_producer(&mut ridge).await.unwrap();

        let mut monte_bello = Wine {
            id: None,
            canonical_name: "Monte Bello".to_string(),
            producer_id: ridge.id,
            color: Some("red".to_string()),
            style: Some("still".to_string()),
            created_at: Utc::now(),
        };
        catalog.create_wine(&mut monte_bello).await.unwrap();

        let mut stray = Wine {
            id: None,
            canonical_name: "Stray Wine".to_string(),
            producer_id: None,
            color: None,
            style: None,
            created_at: Utc::now(),
        };
        catalog.create_wine(&mut stray).await.unwrap();

        let scoped = catalog.list_wines(ridge.id).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].canonical_name, "Monte Bello");

        let all = catalog.list_wines(None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_find_vintage_exact_year_scoped() {
        let catalog = InMemoryCatalog::new();

        let mut wine = Wine {
            id: None,
            canonical_name: "Monte Bello".to_string(),
            producer_id: None,
            color: None,
            style: None,
            created_at: Utc::now(),
        };
        catalog.create_wine(&mut wine).await.unwrap();

        let mut vintage = Vintage {
            id: None,
            wine_id: wine.id,
            year: 2018,
            abv: Some(13.5),
            bottle_size_ml: 750,
            created_at: Utc::now(),
        };
        catalog.create_vintage(&mut vintage).await.unwrap();

        assert!(catalog.find_vintage(2018, wine.id).await.unwrap().is_some());
        assert!(catalog.find_vintage(2019, wine.id).await.unwrap().is_none());
        assert!(catalog.find_vintage(2018, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reference_vocabularies() {
        let catalog = InMemoryCatalog::new();

        let mut region = Region {
            id: None,
            canonical_name: "Bourgogne".to_string(),
            country: Some("France".to_string()),
            created_at: Utc::now(),
        };
        catalog.add_region(&mut region);

        let mut variety = GrapeVariety {
            id: None,
            canonical_name: "Pinot Noir".to_string(),
            color: Some("red".to_string()),
            created_at: Utc::now(),
        };
        catalog.add_grape_variety(&mut variety);

        assert_eq!(catalog.list_regions().await.unwrap().len(), 1);
        assert_eq!(catalog.list_grape_varieties().await.unwrap().len(), 1);
    }
}
