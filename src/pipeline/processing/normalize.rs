//! Canonicalization of extracted listings.
//!
//! Every function here is total: malformed input degrades to a safe
//! default (absent, cleaned passthrough, or the 750 ml standard bottle)
//! rather than erroring.

use crate::observability::{emit_counter, MetricName};
use crate::pipeline::processing::adapter::{ExtractedField, ExtractedListing};
use crate::pipeline::processing::aliases::{
    ABV_PATTERNS, BOTTLE_SIZE_RULES, COLOR_ALIASES, GRAPE_ALIASES, GRAPE_SPLIT, REGION_ALIASES,
    STYLE_ALIASES, YEAR_TOKEN,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Cleaned and standardized wine listing, ready for entity resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedListing {
    // Wine identity
    pub producer_name: Option<String>,
    pub wine_name: Option<String>,
    /// Absent for non-vintage wines
    pub vintage_year: Option<i32>,

    // Location
    pub country: Option<String>,
    pub region: Option<String>,
    pub sub_region: Option<String>,
    pub appellation: Option<String>,

    // Characteristics
    pub grapes: Vec<String>,
    pub color: Option<String>,
    pub style: Option<String>,
    pub bottle_size_ml: u32,
    pub abv: Option<f64>,

    // Offer
    pub price: Option<f64>,
    pub currency: Option<String>,

    // Traceability
    pub url: String,
    pub source_name: String,
    pub original_title: Option<String>,
}

impl Default for NormalizedListing {
    fn default() -> Self {
        Self {
            producer_name: None,
            wine_name: None,
            vintage_year: None,
            country: None,
            region: None,
            sub_region: None,
            appellation: None,
            grapes: Vec::new(),
            color: None,
            style: None,
            bottle_size_ml: 750,
            abv: None,
            price: None,
            currency: None,
            url: String::new(),
            source_name: String::new(),
            original_title: None,
        }
    }
}

/// Normalizes extracted wine data into canonical forms.
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Collapse whitespace and trim; empty input becomes `None`.
    fn clean_string(&self, value: &str) -> Option<String> {
        let cleaned = value.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    fn clean_value(&self, value: Option<&Value>) -> Option<String> {
        match value? {
            Value::String(s) => self.clean_string(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Canonicalize a region name; unknown regions pass through cleaned.
    pub fn normalize_region(&self, region: &str) -> Option<String> {
        let cleaned = self.clean_string(region)?;
        match REGION_ALIASES.get(cleaned.to_lowercase().as_str()) {
            Some(canonical) => Some((*canonical).to_string()),
            None => Some(cleaned),
        }
    }

    /// Canonicalize grape names from a list or a delimited string.
    ///
    /// Output preserves input order and drops duplicates.
    pub fn normalize_grapes(&self, grapes: &Value) -> Vec<String> {
        let tokens: Vec<String> = match grapes {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            Value::String(s) => GRAPE_SPLIT.split(s).map(String::from).collect(),
            _ => Vec::new(),
        };

        let mut seen = HashSet::new();
        let mut normalized = Vec::new();
        for token in tokens {
            let Some(cleaned) = self.clean_string(&token) else {
                continue;
            };
            let canonical = match GRAPE_ALIASES.get(cleaned.to_lowercase().as_str()) {
                Some(name) => (*name).to_string(),
                None => cleaned,
            };
            if seen.insert(canonical.to_lowercase()) {
                normalized.push(canonical);
            }
        }
        normalized
    }

    /// Parse ABV from a number or free-form string; only (0, 25] is accepted.
    pub fn parse_abv(&self, value: &Value) -> Option<f64> {
        fn in_range(abv: f64) -> Option<f64> {
            if abv > 0.0 && abv <= 25.0 {
                Some(abv)
            } else {
                None
            }
        }

        if let Some(n) = value.as_f64() {
            return in_range(n);
        }

        let text = value.as_str()?;
        for pattern in ABV_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(text) {
                if let Ok(abv) = captures[1].parse::<f64>() {
                    if let Some(abv) = in_range(abv) {
                        return Some(abv);
                    }
                }
            }
        }
        None
    }

    /// Parse a vintage year; "NV" and friends mean non-vintage (absent).
    pub fn parse_vintage(&self, value: &Value) -> Option<i32> {
        fn in_range(year: i64) -> Option<i32> {
            if (1800..=2100).contains(&year) {
                Some(year as i32)
            } else {
                None
            }
        }

        if let Some(text) = value.as_str() {
            let upper = text.trim().to_uppercase();
            if matches!(upper.as_str(), "NV" | "N/V" | "NON-VINTAGE" | "NONVINTAGE") {
                return None;
            }
            if let Ok(year) = upper.parse::<i64>() {
                return in_range(year);
            }
            // Fall back to a 4-digit year token anywhere in the string
            return YEAR_TOKEN
                .find(text)
                .and_then(|m| m.as_str().parse::<i64>().ok())
                .and_then(in_range);
        }

        value.as_i64().and_then(in_range)
    }

    /// Parse a bottle size in milliliters; defaults to the standard 750.
    pub fn parse_bottle_size(&self, text: &str) -> u32 {
        for (pattern, ml) in BOTTLE_SIZE_RULES.iter() {
            if pattern.is_match(text) {
                return *ml;
            }
        }
        750
    }

    /// Normalize one extracted listing into canonical form.
    pub fn normalize_listing(&self, extracted: &ExtractedListing) -> NormalizedListing {
        let mut normalized = NormalizedListing {
            url: extracted.url.clone(),
            source_name: extracted.source_name.clone(),
            original_title: extracted.title.clone(),
            ..Default::default()
        };

        normalized.producer_name = self.clean_value(value_of(&extracted.producer_name));
        normalized.wine_name = self.clean_value(value_of(&extracted.wine_name));

        normalized.vintage_year = value_of(&extracted.vintage_year)
            .and_then(|v| self.parse_vintage(v));

        normalized.country = self.clean_value(value_of(&extracted.country));
        normalized.region = value_of(&extracted.region)
            .and_then(|v| v.as_str())
            .and_then(|s| self.normalize_region(s));
        normalized.sub_region = value_of(&extracted.sub_region)
            .and_then(|v| v.as_str())
            .and_then(|s| self.normalize_region(s));
        normalized.appellation = self.clean_value(value_of(&extracted.appellation));

        if let Some(grapes) = value_of(&extracted.grapes) {
            normalized.grapes = self.normalize_grapes(grapes);
        }

        if let Some(color) = value_of(&extracted.color).and_then(|v| v.as_str()) {
            let lowered = color.trim().to_lowercase();
            normalized.color = Some(
                COLOR_ALIASES
                    .get(lowered.as_str())
                    .map(|c| (*c).to_string())
                    .unwrap_or(lowered),
            );
        }
        if let Some(style) = value_of(&extracted.style).and_then(|v| v.as_str()) {
            let lowered = style.trim().to_lowercase();
            normalized.style = Some(
                STYLE_ALIASES
                    .get(lowered.as_str())
                    .map(|s| (*s).to_string())
                    .unwrap_or(lowered),
            );
        }

        if let Some(size) = value_of(&extracted.bottle_size_ml) {
            normalized.bottle_size_ml = match size {
                Value::Number(n) => n
                    .as_u64()
                    .map(|ml| ml as u32)
                    .unwrap_or_else(|| self.parse_bottle_size(&size.to_string())),
                Value::String(s) => self.parse_bottle_size(s),
                _ => 750,
            };
        }

        normalized.abv = value_of(&extracted.abv).and_then(|v| self.parse_abv(v));

        if let Some(price) = value_of(&extracted.price) {
            normalized.price = match price {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
        }
        if let Some(currency) = value_of(&extracted.currency).and_then(|v| v.as_str()) {
            let upper = currency.trim().to_uppercase();
            if !upper.is_empty() {
                normalized.currency = Some(upper);
            }
        }

        emit_counter(MetricName::ListingsNormalized, 1);
        normalized
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn value_of(field: &Option<ExtractedField>) -> Option<&Value> {
    field.as_ref().map(|f| &f.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_region_alias_and_passthrough() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.normalize_region("burgundy").unwrap(), "Bourgogne");
        assert_eq!(normalizer.normalize_region("BURGUNDY").unwrap(), "Bourgogne");
        assert_eq!(normalizer.normalize_region("  Jura  ").unwrap(), "Jura");
        assert!(normalizer.normalize_region("   ").is_none());
    }

    #[test]
    fn test_normalize_region_is_idempotent() {
        let normalizer = Normalizer::new();
        for input in ["burgundy", "Napa", "Unknown Region", "rhone valley"] {
            let once = normalizer.normalize_region(input).unwrap();
            let twice = normalizer.normalize_region(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_normalize_grapes_from_string() {
        let normalizer = Normalizer::new();
        let grapes = normalizer.normalize_grapes(&json!("cab, merlot, shiraz"));
        assert_eq!(grapes, vec!["Cabernet Sauvignon", "Merlot", "Shiraz"]);
    }

    #[test]
    fn test_normalize_grapes_splits_on_and_and_dedupes() {
        let normalizer = Normalizer::new();

        let grapes = normalizer.normalize_grapes(&json!("grenache and syrah / mourvedre"));
        assert_eq!(grapes, vec!["Grenache", "Syrah", "Mourvèdre"]);

        let deduped = normalizer.normalize_grapes(&json!(["cab", "Cabernet Sauvignon", "Merlot"]));
        assert_eq!(deduped, vec!["Cabernet Sauvignon", "Merlot"]);

        assert!(normalizer.normalize_grapes(&Value::Null).is_empty());
    }

    #[test]
    fn test_parse_abv_patterns() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.parse_abv(&json!("13.5% abv")), Some(13.5));
        assert_eq!(normalizer.parse_abv(&json!("abv: 14%")), Some(14.0));
        assert_eq!(normalizer.parse_abv(&json!("12 degrees")), Some(12.0));
        assert_eq!(normalizer.parse_abv(&json!(13.5)), Some(13.5));
        assert_eq!(normalizer.parse_abv(&json!(50)), None);
        assert_eq!(normalizer.parse_abv(&json!("not an abv")), None);
        assert_eq!(normalizer.parse_abv(&json!(0)), None);
    }

    #[test]
    fn test_parse_vintage() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.parse_vintage(&json!("NV")), None);
        assert_eq!(normalizer.parse_vintage(&json!("n/v")), None);
        assert_eq!(normalizer.parse_vintage(&json!("Non-Vintage")), None);
        assert_eq!(normalizer.parse_vintage(&json!(2019)), Some(2019));
        assert_eq!(normalizer.parse_vintage(&json!("2019")), Some(2019));
        assert_eq!(normalizer.parse_vintage(&json!("Vintage 2020")), Some(2020));
        assert_eq!(normalizer.parse_vintage(&json!(1650)), None);
        assert_eq!(normalizer.parse_vintage(&json!("3019")), None);
        assert_eq!(normalizer.parse_vintage(&json!("no year here")), None);
    }

    #[test]
    fn test_parse_bottle_size() {
        let normalizer = Normalizer::new();

        assert_eq!(normalizer.parse_bottle_size("Magnum"), 1500);
        assert_eq!(normalizer.parse_bottle_size("375ml"), 375);
        assert_eq!(normalizer.parse_bottle_size("1.5L"), 1500);
        assert_eq!(normalizer.parse_bottle_size("half bottle"), 375);
        assert_eq!(normalizer.parse_bottle_size("unknown"), 750);
    }

    #[test]
    fn test_normalize_listing_end_to_end() {
        use crate::pipeline::processing::adapter::ExtractedField;

        let normalizer = Normalizer::new();
        let mut extracted = crate::pipeline::processing::adapter::ExtractedListing::new(
            "https://example.com/wine/1",
            "test-source",
        );
        extracted.title = Some("Ridge  Monte Bello 2018".to_string());
        extracted.producer_name = Some(ExtractedField::manual("  Ridge   Vineyards "));
        extracted.wine_name = Some(ExtractedField::manual("Monte Bello"));
        extracted.vintage_year = Some(ExtractedField::manual("2018"));
        extracted.region = Some(ExtractedField::manual("napa"));
        extracted.grapes = Some(ExtractedField::manual("cab, merlot"));
        extracted.color = Some(ExtractedField::manual("Rouge"));
        extracted.style = Some(ExtractedField::manual("Still"));
        extracted.abv = Some(ExtractedField::manual("13.5% abv"));
        extracted.bottle_size_ml = Some(ExtractedField::manual("magnum"));
        extracted.price = Some(ExtractedField::manual(json!("225.50")));
        extracted.currency = Some(ExtractedField::manual("usd"));

        let normalized = normalizer.normalize_listing(&extracted);

        assert_eq!(normalized.producer_name.as_deref(), Some("Ridge Vineyards"));
        assert_eq!(normalized.wine_name.as_deref(), Some("Monte Bello"));
        assert_eq!(normalized.vintage_year, Some(2018));
        assert_eq!(normalized.region.as_deref(), Some("Napa Valley"));
        assert_eq!(normalized.grapes, vec!["Cabernet Sauvignon", "Merlot"]);
        assert_eq!(normalized.color.as_deref(), Some("red"));
        assert_eq!(normalized.style.as_deref(), Some("still"));
        assert_eq!(normalized.abv, Some(13.5));
        assert_eq!(normalized.bottle_size_ml, 1500);
        assert_eq!(normalized.price, Some(225.5));
        assert_eq!(normalized.currency.as_deref(), Some("USD"));
        assert_eq!(normalized.url, "https://example.com/wine/1");
        assert_eq!(normalized.original_title.as_deref(), Some("Ridge  Monte Bello 2018"));
    }

    #[test]
    fn test_normalize_listing_defaults_on_missing_fields() {
        let normalizer = Normalizer::new();
        let extracted = crate::pipeline::processing::adapter::ExtractedListing::new(
            "https://example.com/wine/2",
            "test-source",
        );

        let normalized = normalizer.normalize_listing(&extracted);
        assert!(normalized.producer_name.is_none());
        assert!(normalized.vintage_year.is_none());
        assert!(normalized.grapes.is_empty());
        assert_eq!(normalized.bottle_size_ml, 750);
    }
}
