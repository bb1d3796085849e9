//! Generic HTML product-page adapter.
//!
//! Extracts listing fields from JSON-LD `Product` blocks, Open Graph and
//! product meta tags, falling back to regex scans of the page title.
//! Works for retailers without a dedicated adapter.

use crate::error::Result;
use crate::pipeline::processing::adapter::{
    ExtractedField, ExtractedListing, ExtractionMethod, ListingAdapter,
};
use crate::pipeline::processing::aliases::{ABV_PATTERNS, YEAR_TOKEN};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;

pub struct HtmlProductAdapter;

impl HtmlProductAdapter {
    pub fn new() -> Self {
        Self
    }

    /// First JSON-LD object on the page whose @type is Product.
    fn find_product_jsonld(document: &Html) -> Option<Value> {
        let selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();
        for script in document.select(&selector) {
            let text = script.text().collect::<String>();
            let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            let candidates: Vec<&Value> = match &parsed {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for candidate in candidates {
                if candidate.get("@type").and_then(Value::as_str) == Some("Product") {
                    return Some(candidate.clone());
                }
            }
        }
        None
    }

    fn meta_content(document: &Html, property: &str) -> Option<String> {
        let selector = Selector::parse(&format!(r#"meta[property="{}"]"#, property)).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn page_title(document: &Html) -> Option<String> {
        let selector = Selector::parse("title").unwrap();
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn structured(value: impl Into<Value>) -> Option<ExtractedField> {
        ExtractedField::new(value, 0.9, ExtractionMethod::StructuredData).ok()
    }

    fn meta(value: impl Into<Value>) -> Option<ExtractedField> {
        ExtractedField::new(value, 0.7, ExtractionMethod::MetaTag).ok()
    }

    fn regex(value: impl Into<Value>) -> Option<ExtractedField> {
        ExtractedField::new(value, 0.5, ExtractionMethod::Regex).ok()
    }
}

impl Default for HtmlProductAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListingAdapter for HtmlProductAdapter {
    fn name(&self) -> &'static str {
        "html_product"
    }

    /// Product pages come straight from the source's seed URLs.
    async fn discover_urls(&self, seed_urls: &[String]) -> Result<Vec<String>> {
        Ok(seed_urls.to_vec())
    }

    fn extract_listing(&self, content: &[u8], url: &str, mime_type: &str)
        -> Option<ExtractedListing> {
        if !mime_type.is_empty() && mime_type != "text/html" {
            return None;
        }

        let html = String::from_utf8_lossy(content);
        let document = Html::parse_document(&html);
        let mut listing = ExtractedListing::new(url, "html_product");

        if let Some(product) = Self::find_product_jsonld(&document) {
            if let Some(name) = product.get("name").and_then(Value::as_str) {
                listing.title = Some(name.to_string());
                listing.wine_name = Self::structured(name);
            }
            if let Some(brand) = product
                .get("brand")
                .and_then(|b| b.get("name").or(Some(b)))
                .and_then(Value::as_str)
            {
                listing.producer_name = Self::structured(brand);
            }
            if let Some(offers) = product.get("offers") {
                let offer = match offers {
                    Value::Array(items) => items.first(),
                    other => Some(other),
                };
                if let Some(offer) = offer {
                    if let Some(price) = offer.get("price") {
                        listing.price = Self::structured(price.clone());
                    }
                    if let Some(currency) = offer.get("priceCurrency").and_then(Value::as_str) {
                        listing.currency = Self::structured(currency);
                    }
                }
            }
            if let Some(sku) = product.get("sku").and_then(Value::as_str) {
                listing.sku = Self::structured(sku);
            }
        }

        // Meta tags fill in whatever JSON-LD left open
        if listing.title.is_none() {
            if let Some(title) = Self::meta_content(&document, "og:title") {
                listing.title = Some(title);
            }
        }
        if listing.price.is_none() {
            if let Some(amount) = Self::meta_content(&document, "product:price:amount") {
                listing.price = Self::meta(amount);
            }
        }
        if listing.currency.is_none() {
            if let Some(currency) = Self::meta_content(&document, "product:price:currency") {
                listing.currency = Self::meta(currency);
            }
        }
        if listing.title.is_none() {
            listing.title = Self::page_title(&document);
        }

        // Regex fallbacks over the title text
        if let Some(title) = listing.title.clone() {
            if listing.wine_name.is_none() {
                listing.wine_name = Self::regex(title.clone());
            }
            if listing.vintage_year.is_none() {
                if let Some(year) = YEAR_TOKEN.find(&title) {
                    listing.vintage_year = Self::regex(year.as_str());
                }
            }
            if listing.abv.is_none() {
                for pattern in ABV_PATTERNS.iter() {
                    if let Some(captures) = pattern.captures(&title) {
                        listing.abv = Self::regex(captures[1].to_string());
                        break;
                    }
                }
            }
        }

        if listing.title.is_none() && listing.wine_name.is_none() {
            return None;
        }
        Some(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r#"
<!DOCTYPE html>
<html>
<head>
  <title>Ridge Monte Bello 2018 - 13.5% - Fine Wine Shop</title>
  <meta property="og:title" content="Ridge Monte Bello 2018" />
  <meta property="product:price:amount" content="225.00" />
  <meta property="product:price:currency" content="USD" />
  <script type="application/ld+json">
  {
    "@context": "https://schema.org",
    "@type": "Product",
    "name": "Monte Bello 2018",
    "sku": "RMB-2018",
    "brand": {"@type": "Brand", "name": "Ridge Vineyards"},
    "offers": {"@type": "Offer", "price": "225.00", "priceCurrency": "USD"}
  }
  </script>
</head>
<body><h1>Monte Bello</h1></body>
</html>
"#;

    #[test]
    fn test_extracts_jsonld_product() {
        let adapter = HtmlProductAdapter::new();
        let listing = adapter
            .extract_listing(PRODUCT_PAGE.as_bytes(), "https://shop.example.com/1", "text/html")
            .unwrap();

        let producer = listing.producer_name.as_ref().unwrap();
        assert_eq!(producer.value.as_str().unwrap(), "Ridge Vineyards");
        assert_eq!(producer.method, ExtractionMethod::StructuredData);
        assert_eq!(producer.confidence, 0.9);

        assert_eq!(listing.title.as_deref(), Some("Monte Bello 2018"));
        assert_eq!(
            listing.currency.as_ref().unwrap().value.as_str().unwrap(),
            "USD"
        );
        assert_eq!(listing.sku.as_ref().unwrap().value.as_str().unwrap(), "RMB-2018");
    }

    #[test]
    fn test_regex_fallbacks_fill_vintage() {
        let adapter = HtmlProductAdapter::new();
        let listing = adapter
            .extract_listing(PRODUCT_PAGE.as_bytes(), "https://shop.example.com/1", "text/html")
            .unwrap();

        let vintage = listing.vintage_year.as_ref().unwrap();
        assert_eq!(vintage.value.as_str().unwrap(), "2018");
        assert_eq!(vintage.method, ExtractionMethod::Regex);
    }

    #[test]
    fn test_meta_tags_without_jsonld() {
        let page = r#"
<html><head>
  <meta property="og:title" content="Penfolds Grange 2016" />
  <meta property="product:price:amount" content="850.00" />
</head><body></body></html>
"#;
        let adapter = HtmlProductAdapter::new();
        let listing = adapter
            .extract_listing(page.as_bytes(), "https://shop.example.com/2", "text/html")
            .unwrap();

        assert_eq!(listing.title.as_deref(), Some("Penfolds Grange 2016"));
        let price = listing.price.as_ref().unwrap();
        assert_eq!(price.method, ExtractionMethod::MetaTag);
        assert_eq!(price.value.as_str().unwrap(), "850.00");
    }

    #[test]
    fn test_rejects_non_html_and_empty_pages() {
        let adapter = HtmlProductAdapter::new();

        assert!(adapter
            .extract_listing(b"{}", "https://shop.example.com/3", "application/json")
            .is_none());
        assert!(adapter
            .extract_listing(b"<html><body></body></html>", "https://shop.example.com/4", "text/html")
            .is_none());
    }

    #[tokio::test]
    async fn test_discover_urls_passes_seeds_through() {
        let adapter = HtmlProductAdapter::new();
        let seeds = vec!["https://shop.example.com/wine/1".to_string()];
        assert_eq!(adapter.discover_urls(&seeds).await.unwrap(), seeds);
    }
}
