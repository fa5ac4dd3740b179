// ⚙️ Extraction Config - explicit settings threaded into every component
//
// Every field has a default, so an empty TOML file (or none at all) gives
// the stock behavior: KOR only, purchases from 2010, fail fast.

use crate::loader::{SourceProfile, SourceRegistry};
use crate::outcome::FailurePolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PRICE_FILE: &str = "product_price_tag.csv";
pub const DEFAULT_LOCATION: &str = "KOR";
pub const DEFAULT_MIN_YEAR: i64 = 2010;

// ============================================================================
// LOCATION FILTER
// ============================================================================

/// Whitelist of region codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationFilter(Vec<String>);

impl LocationFilter {
    pub fn new<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LocationFilter(locations.into_iter().map(Into::into).collect())
    }

    /// Exact membership; a missing region never matches
    pub fn contains(&self, region: Option<&str>) -> bool {
        region.is_some_and(|r| self.0.iter().any(|l| l == r))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for LocationFilter {
    fn default() -> Self {
        LocationFilter::new([DEFAULT_LOCATION])
    }
}

// ============================================================================
// EXTRACT CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Price reference CSV
    pub price_file: PathBuf,

    /// Regions to keep
    pub locations: LocationFilter,

    /// First purchase year (inclusive) for the purchase listing
    pub min_year: i64,

    pub failure_policy: FailurePolicy,

    /// Sources that structurally lack some categories
    pub sources: Vec<SourceProfile>,

    /// Where exported CSV files go
    pub output_dir: PathBuf,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        ExtractConfig {
            price_file: PathBuf::from(DEFAULT_PRICE_FILE),
            locations: LocationFilter::default(),
            min_year: DEFAULT_MIN_YEAR,
            failure_policy: FailurePolicy::default(),
            sources: SourceRegistry::new().profiles().to_vec(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl ExtractConfig {
    /// Load from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    pub fn registry(&self) -> SourceRegistry {
        SourceRegistry::from_profiles(self.sources.clone())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SourceName;
    use crate::record::Category;

    #[test]
    fn test_location_filter() {
        let filter = LocationFilter::new(["KOR", "US"]);
        assert!(filter.contains(Some("KOR")));
        assert!(filter.contains(Some("US")));
        assert!(!filter.contains(Some("JP")));
        assert!(!filter.contains(Some("kor")));
        assert!(!filter.contains(None));
        assert!(!filter.is_empty());

        let nothing = ExtractConfig::from_toml("locations = []").unwrap().locations;
        assert!(nothing.is_empty());
        assert!(!nothing.contains(Some("KOR")));
    }

    #[test]
    fn test_defaults() {
        let config = ExtractConfig::default();
        assert_eq!(config.price_file, PathBuf::from("product_price_tag.csv"));
        assert_eq!(config.locations.as_slice(), &["KOR".to_string()]);
        assert_eq!(config.min_year, 2010);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);

        let nielsen = config
            .registry()
            .resolve(&SourceName::from_file_name("nielsen_2023.json"));
        assert!(!nielsen.has(Category::Pet));
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ExtractConfig::from_toml("").unwrap();
        assert_eq!(config, ExtractConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = ExtractConfig::from_toml(
            r#"
            price_file = "prices/2024.csv"
            locations = ["KOR", "US"]
            min_year = 2015
            failure_policy = "isolate"

            [[sources]]
            name = "kantar"
            lacks = ["pet", "vehicle"]
            "#,
        )
        .unwrap();

        assert_eq!(config.price_file, PathBuf::from("prices/2024.csv"));
        assert!(config.locations.contains(Some("US")));
        assert_eq!(config.min_year, 2015);
        assert_eq!(config.failure_policy, FailurePolicy::Isolate);

        let registry = config.registry();
        let kantar = registry.resolve(&SourceName::from_file_name("kantar_2024.json"));
        assert!(!kantar.has(Category::Vehicle));
        // Listing sources replaces the built-in registry
        let nielsen = registry.resolve(&SourceName::from_file_name("nielsen_2024.json"));
        assert!(nielsen.has(Category::Pet));
    }
}
