//! Engine-wide configuration, relevance weights and per-call options.

use std::time::Duration;

use crate::error::LocusError;

pub const DEFAULT_COUNTRY: &str = "DE";
pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const DEFAULT_MIN_QUERY_LENGTH: usize = 2;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Fixed relevance assigned by each matcher tier.
///
/// Changing these reorders results for every caller; treat it as a product
/// decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceWeights {
    /// Place name equals the query.
    pub exact: f64,
    /// Place name starts with the query.
    pub prefix: f64,
    /// Place name contains the query (fuzzy searches only).
    pub contains: f64,
    /// Only the region or district name contains the query.
    pub admin_area: f64,
    pub postal_code: f64,
    pub geo: f64,
    pub full_text: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            exact: 1.0,
            prefix: 0.9,
            contains: 0.7,
            admin_area: 0.5,
            postal_code: 1.0,
            geo: 0.8,
            full_text: 0.6,
        }
    }
}

impl RelevanceWeights {
    /// Every weight must lie in `[0, 1]`.
    pub fn validate(&self) -> Result<(), LocusError> {
        let named = [
            ("exact", self.exact),
            ("prefix", self.prefix),
            ("contains", self.contains),
            ("admin_area", self.admin_area),
            ("postal_code", self.postal_code),
            ("geo", self.geo),
            ("full_text", self.full_text),
        ];
        for (name, weight) in named {
            if !(0.0..=1.0).contains(&weight) {
                return Err(LocusError::ConfigError(format!(
                    "Relevance weight '{name}' must be within [0, 1], got {weight}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Maximum live entries. `0` disables caching.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub const fn is_enabled(&self) -> bool {
        self.capacity > 0 && !self.ttl.is_zero()
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub default_country: String,
    pub default_max_results: usize,
    /// Queries shorter than this (in characters, after trimming) return
    /// nothing.
    pub min_query_length: usize,
    pub weights: RelevanceWeights,
    pub cache: CacheConfig,
    /// Run the full-text index after the place-name matcher to fill the
    /// remaining capacity.
    pub full_text: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_country: DEFAULT_COUNTRY.to_owned(),
            default_max_results: DEFAULT_MAX_RESULTS,
            min_query_length: DEFAULT_MIN_QUERY_LENGTH,
            weights: RelevanceWeights::default(),
            cache: CacheConfig::default(),
            full_text: false,
        }
    }
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::new()
    }

    /// Per-call options seeded from this configuration.
    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            country: Some(self.default_country.clone()),
            max_results: Some(self.default_max_results),
            ..SearchOptions::default()
        }
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Tuned for search-as-you-type: small result sets, short-lived cache
    /// entries, many distinct keys.
    pub fn autocomplete() -> Self {
        let mut builder = Self::new();
        builder.config.default_max_results = 5;
        builder.config.cache.ttl = Duration::from_secs(60);
        builder.config.cache.capacity = 5000;
        builder
    }

    /// Larger result sets with the full-text index filling gaps.
    pub fn exhaustive() -> Self {
        let mut builder = Self::new();
        builder.config.default_max_results = 50;
        builder.config.full_text = true;
        builder
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.config.default_country = crate::normalize::normalize_country(&country.into());
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.config.default_max_results = max_results;
        self
    }

    /// Clamped to at least 1.
    pub fn min_query_length(mut self, len: usize) -> Self {
        self.config.min_query_length = len.max(1);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.ttl = ttl;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache.capacity = capacity;
        self
    }

    pub fn disable_cache(self) -> Self {
        self.cache_capacity(0)
    }

    pub fn full_text(mut self, enabled: bool) -> Self {
        self.config.full_text = enabled;
        self
    }

    /// Replace the relevance weights. Each must lie in `[0, 1]`.
    pub fn weights(mut self, weights: RelevanceWeights) -> Result<Self, LocusError> {
        weights.validate()?;
        self.config.weights = weights;
        Ok(self)
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

/// Options for a single `search_locations` call.
///
/// Country and result limit left unset fall back to the searcher's
/// [`SearchConfig`] defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub country: Option<String>,
    pub max_results: Option<usize>,
    /// When false, results carry no coordinates.
    pub include_coordinates: bool,
    /// Enables the place-name "contains" tier.
    pub fuzzy_search: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            country: None,
            max_results: None,
            include_coordinates: true,
            fuzzy_search: true,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn include_coordinates(mut self, include: bool) -> Self {
        self.include_coordinates = include;
        self
    }

    pub fn fuzzy_search(mut self, fuzzy: bool) -> Self {
        self.fuzzy_search = fuzzy;
        self
    }
}
