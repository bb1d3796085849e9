//! Source registry: per-source crawl configuration loaded from TOML.
//!
//! The registry is an explicitly constructed value with a `load`/`reset`
//! lifecycle; nothing in this crate holds a process-global default.

use crate::error::{IngestError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Rate limiting configuration for a source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1.0,
            burst_limit: 5,
        }
    }
}

/// Configuration for a single ingestion source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub domain: String,
    /// Adapter name resolved through the adapter registry
    pub adapter: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    rate_limit: Option<RateLimitConfig>,
    /// URL regexes matched from the start of the URL; deny wins over allow
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub denylist: Vec<String>,
    #[serde(default)]
    pub seed_urls: Vec<String>,
    /// Adapter-specific settings passed through verbatim
    #[serde(default)]
    pub custom: toml::Table,

    #[serde(skip)]
    effective_rate_limit: RateLimitConfig,
    #[serde(skip)]
    allow_patterns: Vec<Regex>,
    #[serde(skip)]
    deny_patterns: Vec<Regex>,
}

fn default_enabled() -> bool {
    true
}

impl SourceConfig {
    /// Compile URL patterns and resolve the effective rate limit.
    fn finalize(&mut self, default_rate_limit: &RateLimitConfig) -> Result<()> {
        self.effective_rate_limit = self
            .rate_limit
            .clone()
            .unwrap_or_else(|| default_rate_limit.clone());
        self.allow_patterns = compile_patterns(&self.name, &self.allowlist)?;
        self.deny_patterns = compile_patterns(&self.name, &self.denylist)?;
        Ok(())
    }

    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.effective_rate_limit
    }

    /// Check whether a URL passes this source's allow/deny policy.
    ///
    /// Denylist is consulted first; an empty allowlist admits everything
    /// not denied, otherwise the URL must match at least one allow pattern.
    pub fn is_url_allowed(&self, url: &str) -> bool {
        if self.deny_patterns.iter().any(|p| p.is_match(url)) {
            return false;
        }
        if self.allow_patterns.is_empty() {
            return true;
        }
        self.allow_patterns.iter().any(|p| p.is_match(url))
    }
}

fn compile_patterns(source: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            // Anchor at the start of the URL, mirroring prefix-match policy rules
            Regex::new(&format!(r"\A(?:{})", p)).map_err(|e| {
                IngestError::Config(format!("Invalid URL pattern '{}' for source '{}': {}", p, source, e))
            })
        })
        .collect()
}

/// Global crawl settings shared by every source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub default_rate_limit: RateLimitConfig,
    pub user_agent: String,
    pub snapshot_storage_path: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_rate_limit: RateLimitConfig::default(),
            user_agent: "CellarScraper/0.1".to_string(),
            snapshot_storage_path: "data/snapshots".to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Confidence thresholds for entity resolution actions.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub auto_merge_threshold: f64,
    pub review_queue_threshold: f64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            auto_merge_threshold: 0.90,
            review_queue_threshold: 0.70,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    global: GlobalConfig,
    #[serde(default)]
    entity_resolution: ResolutionConfig,
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

/// Registry of ingestion source configurations.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceConfig>,
    global: GlobalConfig,
    resolution: ResolutionConfig,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a TOML sources file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read sources file '{}': {}", path.display(), e))
        })?;
        let file: SourcesFile = toml::from_str(&raw)?;

        let mut registry = Self {
            sources: BTreeMap::new(),
            global: file.global,
            resolution: file.entity_resolution,
        };
        for mut source in file.sources {
            source.finalize(&registry.global.default_rate_limit)?;
            registry.sources.insert(source.name.clone(), source);
        }
        info!("Loaded {} sources from {}", registry.sources.len(), path.display());
        Ok(registry)
    }

    /// Drop all loaded sources and restore default settings.
    pub fn reset(&mut self) {
        self.sources.clear();
        self.global = GlobalConfig::default();
        self.resolution = ResolutionConfig::default();
    }

    pub fn global_config(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn resolution_config(&self) -> ResolutionConfig {
        self.resolution
    }

    pub fn get_source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.get(name)
    }

    pub fn list_sources(&self) -> Vec<&SourceConfig> {
        self.sources.values().collect()
    }

    pub fn list_enabled_sources(&self) -> Vec<&SourceConfig> {
        self.sources.values().filter(|s| s.enabled).collect()
    }

    pub fn enable_source(&mut self, name: &str) -> bool {
        match self.sources.get_mut(name) {
            Some(source) => {
                source.enabled = true;
                true
            }
            None => false,
        }
    }

    pub fn disable_source(&mut self, name: &str) -> bool {
        match self.sources.get_mut(name) {
            Some(source) => {
                source.enabled = false;
                true
            }
            None => false,
        }
    }

    pub fn get_source_by_domain(&self, domain: &str) -> Option<&SourceConfig> {
        self.sources.values().find(|s| s.domain == domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_sources(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn test_source(allowlist: Vec<&str>, denylist: Vec<&str>) -> SourceConfig {
        let mut source = SourceConfig {
            name: "test".to_string(),
            domain: "example.com".to_string(),
            adapter: "fixture".to_string(),
            enabled: true,
            description: String::new(),
            rate_limit: None,
            allowlist: allowlist.into_iter().map(String::from).collect(),
            denylist: denylist.into_iter().map(String::from).collect(),
            seed_urls: Vec::new(),
            custom: toml::Table::new(),
            effective_rate_limit: RateLimitConfig::default(),
            allow_patterns: Vec::new(),
            deny_patterns: Vec::new(),
        };
        source.finalize(&RateLimitConfig::default()).unwrap();
        source
    }

    #[test]
    fn test_empty_allowlist_allows_everything_not_denied() {
        let source = test_source(vec![], vec![r"https://example\.com/private/.*"]);

        assert!(source.is_url_allowed("https://example.com/wines/1"));
        assert!(!source.is_url_allowed("https://example.com/private/1"));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let source = test_source(
            vec![r"https://example\.com/wines/.*"],
            vec![r"https://example\.com/wines/hidden.*"],
        );

        assert!(source.is_url_allowed("https://example.com/wines/1"));
        assert!(!source.is_url_allowed("https://example.com/wines/hidden/2"));
        assert!(!source.is_url_allowed("https://other.com/wines/1"));
    }

    #[test]
    fn test_load_resolves_default_rate_limit() {
        let file = write_sources(
            r#"
[global]
user_agent = "CellarScraper/test"

[global.default_rate_limit]
requests_per_second = 3.0
burst_limit = 9

[entity_resolution]
auto_merge_threshold = 0.85

[[sources]]
name = "alpha"
domain = "alpha.example.com"
adapter = "fixture"

[[sources]]
name = "beta"
domain = "beta.example.com"
adapter = "fixture"
enabled = false

[sources.rate_limit]
requests_per_second = 0.5
burst_limit = 1
"#,
        );

        let registry = SourceRegistry::load(file.path()).unwrap();
        assert_eq!(registry.global_config().user_agent, "CellarScraper/test");
        assert_eq!(registry.resolution_config().auto_merge_threshold, 0.85);
        assert_eq!(registry.resolution_config().review_queue_threshold, 0.70);

        let alpha = registry.get_source("alpha").unwrap();
        assert_eq!(alpha.rate_limit().requests_per_second, 3.0);
        assert_eq!(alpha.rate_limit().burst_limit, 9);

        let beta = registry.get_source("beta").unwrap();
        assert!(!beta.enabled);
        assert_eq!(beta.rate_limit().requests_per_second, 0.5);

        assert_eq!(registry.list_sources().len(), 2);
        assert_eq!(registry.list_enabled_sources().len(), 1);
        assert_eq!(
            registry.get_source_by_domain("beta.example.com").unwrap().name,
            "beta"
        );
    }

    #[test]
    fn test_enable_disable_and_reset() {
        let file = write_sources(
            r#"
[[sources]]
name = "alpha"
domain = "alpha.example.com"
adapter = "fixture"
"#,
        );
        let mut registry = SourceRegistry::load(file.path()).unwrap();

        assert!(registry.disable_source("alpha"));
        assert!(registry.list_enabled_sources().is_empty());
        assert!(registry.enable_source("alpha"));
        assert_eq!(registry.list_enabled_sources().len(), 1);
        assert!(!registry.enable_source("missing"));

        registry.reset();
        assert!(registry.list_sources().is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_a_config_error() {
        let file = write_sources(
            r#"
[[sources]]
name = "broken"
domain = "broken.example.com"
adapter = "fixture"
denylist = ["("]
"#,
        );
        assert!(SourceRegistry::load(file.path()).is_err());
    }
}
