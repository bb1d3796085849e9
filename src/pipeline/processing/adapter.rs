//! Per-source adapter contract.
//!
//! Adapters discover URLs for a source and extract structured listing
//! fields from fetched content. They are resolved by name through an
//! explicitly constructed [`AdapterRegistry`].

use crate::error::{IngestError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How a field value was pulled out of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Manual,
    CssSelector,
    Regex,
    MetaTag,
    StructuredData,
}

/// A field extracted from source content with confidence metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: Value,
    /// Extraction certainty in [0.0, 1.0]
    pub confidence: f64,
    pub method: ExtractionMethod,
}

impl ExtractedField {
    /// Build a field, rejecting out-of-range confidence values.
    pub fn new(value: impl Into<Value>, confidence: f64, method: ExtractionMethod) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(IngestError::InvalidConfidence(confidence));
        }
        Ok(Self {
            value: value.into(),
            confidence,
            method,
        })
    }

    /// A hand-authored field with full confidence.
    pub fn manual(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            confidence: 1.0,
            method: ExtractionMethod::Manual,
        }
    }
}

/// Structured wine listing extracted from a source page.
///
/// Raw, pre-normalization shape; lives only for the duration of a
/// pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedListing {
    pub url: String,
    pub source_name: String,
    pub title: Option<String>,

    // Wine identity
    pub producer_name: Option<ExtractedField>,
    pub wine_name: Option<ExtractedField>,
    pub vintage_year: Option<ExtractedField>,

    // Location
    pub region: Option<ExtractedField>,
    pub sub_region: Option<ExtractedField>,
    pub appellation: Option<ExtractedField>,
    pub country: Option<ExtractedField>,

    // Characteristics
    pub grapes: Option<ExtractedField>,
    pub color: Option<ExtractedField>,
    pub style: Option<ExtractedField>,
    pub abv: Option<ExtractedField>,
    pub bottle_size_ml: Option<ExtractedField>,

    // Offer
    pub price: Option<ExtractedField>,
    pub currency: Option<ExtractedField>,
    pub in_stock: Option<ExtractedField>,

    // Identifiers
    pub sku: Option<ExtractedField>,

    pub extraction_errors: Vec<String>,
}

impl ExtractedListing {
    pub fn new(url: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source_name: source_name.into(),
            ..Default::default()
        }
    }
}

fn field_value(field: &Option<ExtractedField>) -> Option<&Value> {
    field.as_ref().map(|f| &f.value)
}

/// Default listing validation shared by all adapters.
///
/// Returns human-readable problems; an empty list means the listing is
/// usable.
pub fn default_validation(listing: &ExtractedListing) -> Vec<String> {
    let mut errors = Vec::new();

    let has_wine_name = field_value(&listing.wine_name)
        .and_then(|v| v.as_str())
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false);
    if listing.title.as_deref().map(str::trim).unwrap_or("").is_empty() && !has_wine_name {
        errors.push("Missing title or wine name".to_string());
    }

    if let Some(vintage) = field_value(&listing.vintage_year) {
        let year = match vintage {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match year {
            Some(year) if (1800..=2100).contains(&year) => {}
            Some(year) => errors.push(format!("Invalid vintage year: {}", year)),
            None => errors.push(format!("Invalid vintage year format: {}", vintage)),
        }
    }

    if let Some(abv) = field_value(&listing.abv) {
        let value = match abv {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match value {
            Some(v) if (0.0..=25.0).contains(&v) => {}
            Some(v) => errors.push(format!("Suspicious ABV value: {}", v)),
            None => errors.push(format!("Invalid ABV format: {}", abv)),
        }
    }

    if let Some(price) = field_value(&listing.price) {
        let value = match price {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match value {
            Some(v) if v > 0.0 => {}
            _ => errors.push(format!("Invalid price: {}", price)),
        }
    }

    errors
}

/// Capability interface implemented per source.
#[async_trait]
pub trait ListingAdapter: Send + Sync {
    /// Registry name of this adapter
    fn name(&self) -> &'static str;

    /// Discover product page URLs, optionally starting from seed URLs.
    async fn discover_urls(&self, seed_urls: &[String]) -> Result<Vec<String>>;

    /// Extract a listing from fetched content; `None` when the page holds
    /// no usable listing.
    fn extract_listing(&self, content: &[u8], url: &str, mime_type: &str)
        -> Option<ExtractedListing>;

    /// Validate an extracted listing; override for source-specific checks.
    fn validate_listing(&self, listing: &ExtractedListing) -> Vec<String> {
        default_validation(listing)
    }

    /// Content for adapters backed by synthetic or pre-fetched payloads.
    ///
    /// When this returns `Some((bytes, mime_type))` the pipeline skips the
    /// crawler for that URL.
    fn inline_payload(&self, _url: &str) -> Option<(Vec<u8>, String)> {
        None
    }
}

type AdapterFactory = fn(Option<&toml::Table>) -> Box<dyn ListingAdapter>;

/// Explicit name → constructor map for adapters.
///
/// Constructed and passed by reference; there is no process-global
/// default registry.
pub struct AdapterRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry pre-populated with the built-in adapters.
    pub fn with_builtins() -> Self {
        use crate::pipeline::processing::adapters::fixture::FixtureAdapter;
        use crate::pipeline::processing::adapters::html_product::HtmlProductAdapter;

        let mut registry = Self::new();
        registry.register("fixture", |config| Box::new(FixtureAdapter::new(config)));
        registry.register("html_product", |_| Box::new(HtmlProductAdapter::new()));
        registry
    }

    pub fn register(&mut self, name: &str, factory: AdapterFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    /// Instantiate an adapter by name with optional source-specific config.
    pub fn get(&self, name: &str, config: Option<&toml::Table>) -> Option<Box<dyn ListingAdapter>> {
        self.factories.get(name).map(|factory| factory(config))
    }

    pub fn list(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confidence_validated_at_construction() {
        assert!(ExtractedField::new("x", 0.0, ExtractionMethod::Regex).is_ok());
        assert!(ExtractedField::new("x", 1.0, ExtractionMethod::Regex).is_ok());
        assert!(matches!(
            ExtractedField::new("x", 1.2, ExtractionMethod::Regex),
            Err(IngestError::InvalidConfidence(_))
        ));
        assert!(ExtractedField::new("x", -0.1, ExtractionMethod::Regex).is_err());
    }

    #[test]
    fn test_default_validation_requires_title_or_wine_name() {
        let listing = ExtractedListing::new("https://example.com/1", "test");
        let errors = default_validation(&listing);
        assert!(errors.iter().any(|e| e.contains("title or wine name")));

        let mut named = ExtractedListing::new("https://example.com/1", "test");
        named.wine_name = Some(ExtractedField::manual("Monte Bello"));
        assert!(default_validation(&named).is_empty());
    }

    #[test]
    fn test_default_validation_ranges() {
        let mut listing = ExtractedListing::new("https://example.com/1", "test");
        listing.title = Some("Some wine".to_string());
        listing.vintage_year = Some(ExtractedField::manual(1322));
        listing.abv = Some(ExtractedField::manual(44.0));
        listing.price = Some(ExtractedField::manual(json!(-3.0)));

        let errors = default_validation(&listing);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("vintage year")));
        assert!(errors.iter().any(|e| e.contains("ABV")));
        assert!(errors.iter().any(|e| e.contains("price")));
    }

    #[test]
    fn test_registry_resolves_builtins() {
        let registry = AdapterRegistry::with_builtins();
        assert_eq!(registry.list(), vec!["fixture", "html_product"]);

        let adapter = registry.get("fixture", None).unwrap();
        assert_eq!(adapter.name(), "fixture");
        assert!(registry.get("missing", None).is_none());
    }
}
