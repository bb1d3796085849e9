//! Canonical catalog entities.
//!
//! These records are owned and mutated exclusively by the catalog store;
//! the resolver reads them and issues creation requests through
//! [`crate::catalog::CatalogStore`], never mutating them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A wine producer (estate, domaine, château, winery).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    /// Assigned by the catalog store on creation
    pub id: Option<Uuid>,
    pub canonical_name: String,
    /// Alternate spellings and trade names used for matching
    pub aliases: Vec<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A wine (cuvée/label) belonging to a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wine {
    pub id: Option<Uuid>,
    pub canonical_name: String,
    pub producer_id: Option<Uuid>,
    pub color: Option<String>,
    pub style: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A specific vintage year of a wine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vintage {
    pub id: Option<Uuid>,
    pub wine_id: Option<Uuid>,
    pub year: i32,
    pub abv: Option<f64>,
    pub bottle_size_ml: u32,
    pub created_at: DateTime<Utc>,
}

/// A wine-growing region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: Option<Uuid>,
    pub canonical_name: String,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A grape variety.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrapeVariety {
    pub id: Option<Uuid>,
    pub canonical_name: String,
    /// red or white
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}
