//! Deterministic synthetic adapter.
//!
//! Serves a fixed set of wine listings without touching the network,
//! which makes it usable for end-to-end pipeline validation and demos.

use crate::error::Result;
use crate::pipeline::processing::adapter::{ExtractedField, ExtractedListing, ListingAdapter};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

const BASE_URL: &str = "https://fixtures.cellar.local/wines";

static FIXTURE_WINES: Lazy<Vec<Value>> = Lazy::new(|| {
    vec![
        json!({
            "producer": "Domaine de la Romanée-Conti",
            "wine": "La Tâche Grand Cru",
            "vintage": 2019,
            "region": "Burgundy",
            "sub_region": "Côte de Nuits",
            "appellation": "La Tâche",
            "country": "France",
            "grapes": ["Pinot Noir"],
            "color": "red",
            "style": "still",
            "abv": 13.5,
            "bottle_size_ml": 750,
            "price": 4500.00,
            "currency": "USD",
            "in_stock": true,
        }),
        json!({
            "producer": "Château Margaux",
            "wine": "Château Margaux",
            "vintage": 2018,
            "region": "Bordeaux",
            "sub_region": "Médoc",
            "appellation": "Margaux",
            "country": "France",
            "grapes": ["Cabernet Sauvignon", "Merlot", "Petit Verdot", "Cabernet Franc"],
            "color": "red",
            "style": "still",
            "abv": 13.0,
            "bottle_size_ml": 750,
            "price": 750.00,
            "currency": "USD",
            "in_stock": true,
        }),
        json!({
            // Non-vintage: exercises the NV path through the pipeline
            "producer": "Krug",
            "wine": "Grande Cuvée",
            "vintage": null,
            "region": "Champagne",
            "appellation": "Champagne",
            "country": "France",
            "grapes": ["Chardonnay", "Pinot Noir", "Pinot Meunier"],
            "color": "white",
            "style": "sparkling",
            "abv": 12.0,
            "bottle_size_ml": 750,
            "price": 250.00,
            "currency": "USD",
            "in_stock": true,
        }),
        json!({
            "producer": "Penfolds",
            "wine": "Grange",
            "vintage": 2018,
            "region": "South Australia",
            "sub_region": "Barossa Valley",
            "country": "Australia",
            "grapes": ["Shiraz"],
            "color": "red",
            "style": "still",
            "abv": 14.5,
            "bottle_size_ml": 750,
            "price": 850.00,
            "currency": "USD",
            "in_stock": true,
        }),
        json!({
            // Half bottle
            "producer": "Château d'Yquem",
            "wine": "Château d'Yquem",
            "vintage": 2017,
            "region": "Bordeaux",
            "sub_region": "Sauternes",
            "appellation": "Sauternes",
            "country": "France",
            "grapes": ["Sémillon", "Sauvignon Blanc"],
            "color": "white",
            "style": "still",
            "abv": 14.0,
            "bottle_size_ml": 375,
            "price": 300.00,
            "currency": "USD",
            "in_stock": true,
        }),
        json!({
            "producer": "Cloudy Bay",
            "wine": "Sauvignon Blanc",
            "vintage": 2023,
            "region": "Marlborough",
            "appellation": "Marlborough",
            "country": "New Zealand",
            "grapes": ["Sauvignon Blanc"],
            "color": "white",
            "style": "still",
            "abv": 13.0,
            "bottle_size_ml": 750,
            "price": 28.00,
            "currency": "USD",
            "in_stock": true,
        }),
    ]
});

/// Adapter returning synthetic wine data.
pub struct FixtureAdapter {
    wines: Vec<Value>,
}

impl FixtureAdapter {
    /// Custom fixtures can be supplied through the source's `custom.wines`
    /// table entry (a TOML array of listing tables).
    pub fn new(config: Option<&toml::Table>) -> Self {
        let wines = config
            .and_then(|c| c.get("wines"))
            .and_then(|wines| serde_json::to_value(wines).ok())
            .and_then(|v| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_else(|| FIXTURE_WINES.clone());
        Self { wines }
    }

    fn wine_for_url(&self, url: &str) -> Option<&Value> {
        let index: usize = url.rsplit('/').next()?.parse().ok()?;
        self.wines.get(index)
    }

    fn field(wine: &Value, key: &str) -> Option<ExtractedField> {
        match wine.get(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(ExtractedField::manual(value.clone())),
        }
    }
}

#[async_trait]
impl ListingAdapter for FixtureAdapter {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn discover_urls(&self, _seed_urls: &[String]) -> Result<Vec<String>> {
        Ok((0..self.wines.len())
            .map(|i| format!("{}/{}", BASE_URL, i))
            .collect())
    }

    fn extract_listing(&self, content: &[u8], url: &str, _mime_type: &str)
        -> Option<ExtractedListing> {
        // Content carries the wine index; fall back to the URL tail
        let wine = serde_json::from_slice::<Value>(content)
            .ok()
            .and_then(|v| v.get("index").and_then(Value::as_u64))
            .and_then(|i| self.wines.get(i as usize))
            .or_else(|| self.wine_for_url(url))?;

        let producer = wine.get("producer").and_then(Value::as_str).unwrap_or("");
        let name = wine.get("wine").and_then(Value::as_str).unwrap_or("");
        let vintage_label = wine
            .get("vintage")
            .and_then(Value::as_i64)
            .map(|y| y.to_string())
            .unwrap_or_else(|| "NV".to_string());

        let mut listing = ExtractedListing::new(url, "fixture");
        listing.title = Some(format!("{} {} {}", producer, name, vintage_label));
        listing.producer_name = Self::field(wine, "producer");
        listing.wine_name = Self::field(wine, "wine");
        listing.vintage_year = Self::field(wine, "vintage");
        listing.region = Self::field(wine, "region");
        listing.sub_region = Self::field(wine, "sub_region");
        listing.appellation = Self::field(wine, "appellation");
        listing.country = Self::field(wine, "country");
        listing.grapes = Self::field(wine, "grapes");
        listing.color = Self::field(wine, "color");
        listing.style = Self::field(wine, "style");
        listing.abv = Self::field(wine, "abv");
        listing.bottle_size_ml = Self::field(wine, "bottle_size_ml");
        listing.price = Self::field(wine, "price");
        listing.currency = Self::field(wine, "currency");
        listing.in_stock = Self::field(wine, "in_stock");

        Some(listing)
    }

    fn inline_payload(&self, url: &str) -> Option<(Vec<u8>, String)> {
        let index: usize = url.rsplit('/').next()?.parse().ok()?;
        if index >= self.wines.len() {
            return None;
        }
        let payload = json!({ "index": index }).to_string().into_bytes();
        Some((payload, "application/json".to_string()))
    }
}
