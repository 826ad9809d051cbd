//! The public search surface.
//!
//! [`LocationSearcher`] owns the store handle, the optional full-text index
//! and the result cache. Its operations never return errors: failures are
//! logged and surface as empty results, so a broken backend looks like "no
//! match" to the caller.
//!
//! ```no_run
//! use locus::{LocationSearcher, SearchOptions};
//!
//! let searcher = LocationSearcher::new()?;
//! let results = searcher.search_locations("Berl", &SearchOptions::default().max_results(5));
//! for result in &results {
//!     println!("{} ({})", result.display_name, result.postal_code);
//! }
//! # Ok::<(), locus::error::LocusError>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use locus_data::{ParquetPlaceStore, PlaceStore};
use rayon::prelude::*;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    cache::{CacheStats, ResultCache},
    config::{SearchConfig, SearchOptions},
    error::LocusError,
    geo::Coordinate,
    index::{PlaceTextIndex, TextIndex},
    normalize::{NormalizedQuery, normalize_country},
    search::{
        GeoRadiusParams, SearchResult, geo_radius_search_inner,
        merge::{MergeRequest, merge_search},
        postal_code_search_inner,
    },
};

pub type SearchResults = Vec<SearchResult>;
pub type SearchResultsBatch = Vec<Vec<SearchResult>>;

/// Identity of a cached `search_locations` answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    country: String,
    query: String,
    max_results: usize,
    fuzzy: bool,
}

/// Where the builder puts a full-text index it has to build itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IndexLocation {
    InMemory,
    /// `<data_dir>/tantivy_indexes/places`
    #[default]
    DataDir,
    Path(PathBuf),
}

/// Location search over postal code / place records.
///
/// Cheap to clone; clones share the store, index and cache.
#[derive(Clone)]
pub struct LocationSearcher {
    store: Arc<dyn PlaceStore>,
    text_index: Option<Arc<dyn TextIndex>>,
    cache: Arc<ResultCache<CacheKey, SearchResults>>,
    config: SearchConfig,
}

impl std::fmt::Debug for LocationSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationSearcher")
            .field("config", &self.config)
            .field("full_text", &self.text_index.is_some())
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

pub struct LocationSearcherBuilder {
    store: Option<Arc<dyn PlaceStore>>,
    text_index: Option<Arc<dyn TextIndex>>,
    index_location: IndexLocation,
    overwrite_index: bool,
    config: SearchConfig,
}

impl Default for LocationSearcherBuilder {
    fn default() -> Self {
        Self {
            store: None,
            text_index: None,
            index_location: IndexLocation::default(),
            overwrite_index: false,
            config: SearchConfig::default(),
        }
    }
}

impl LocationSearcherBuilder {
    /// Defaults to the Parquet store in the data directory.
    pub fn store(mut self, store: impl PlaceStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn PlaceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this index for the full-text pass and enable it.
    pub fn text_index(mut self, index: Arc<dyn TextIndex>) -> Self {
        self.text_index = Some(index);
        self.config.full_text = true;
        self
    }

    pub fn index_location(mut self, location: IndexLocation) -> Self {
        self.index_location = location;
        self
    }

    /// Rebuild an on-disk index even when it looks up to date.
    pub fn overwrite_index(mut self, overwrite: bool) -> Self {
        self.overwrite_index = overwrite;
        self
    }

    #[instrument(name = "Build LocationSearcher", level = "info", skip(self))]
    pub fn build(self) -> Result<LocationSearcher, LocusError> {
        let t_init = std::time::Instant::now();
        self.config.weights.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(ParquetPlaceStore::new()));

        let text_index = match (self.text_index, self.config.full_text) {
            (Some(index), _) => Some(index),
            (None, true) => {
                let data = store.places()?;
                let index: Arc<dyn TextIndex> = Arc::new(match &self.index_location {
                    IndexLocation::InMemory => PlaceTextIndex::in_memory(data)?,
                    IndexLocation::DataDir => {
                        PlaceTextIndex::open_or_build(data, self.overwrite_index)?
                    }
                    IndexLocation::Path(path) => {
                        PlaceTextIndex::open_or_build_in(path, data, self.overwrite_index)?
                    }
                });
                Some(index)
            }
            (None, false) => None,
        };

        info!(
            elapsed_seconds = ?t_init.elapsed(),
            full_text = text_index.is_some(),
            cache_capacity = self.config.cache.capacity,
            "LocationSearcher initialization complete"
        );

        Ok(LocationSearcher {
            store,
            text_index,
            cache: Arc::new(ResultCache::new(self.config.cache)),
            config: self.config,
        })
    }
}

impl LocationSearcher {
    pub fn builder() -> LocationSearcherBuilder {
        LocationSearcherBuilder::default()
    }

    /// Searcher over the Parquet store in the data directory with default
    /// configuration.
    pub fn new() -> Result<Self, LocusError> {
        Self::builder().build()
    }

    pub fn with_store(store: impl PlaceStore + 'static) -> Result<Self, LocusError> {
        Self::builder().store(store).build()
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Options seeded from this searcher's configuration.
    pub fn default_options(&self) -> SearchOptions {
        self.config.options()
    }

    /// Ranked candidates for a free-text query.
    ///
    /// Queries shorter than the configured minimum return nothing without
    /// touching the store or the cache. Identical calls within the cache TTL
    /// are answered from the cache. Unset country and limit come from the
    /// searcher's [`SearchConfig`].
    #[instrument(
        name = "Search Locations",
        level = "info",
        skip(self, options),
        fields(country = ?options.country, max_results = ?options.max_results, fuzzy = options.fuzzy_search)
    )]
    pub fn search_locations(&self, query: &str, options: &SearchOptions) -> SearchResults {
        let Some(query) = NormalizedQuery::parse(query, self.config.min_query_length) else {
            debug!("Query too short");
            return Vec::new();
        };
        let max_results = options
            .max_results
            .unwrap_or(self.config.default_max_results);
        if max_results == 0 {
            return Vec::new();
        }
        let country = normalize_country(
            options
                .country
                .as_deref()
                .unwrap_or(&self.config.default_country),
        );

        let key = CacheKey {
            country,
            query: query.as_str().to_owned(),
            max_results,
            fuzzy: options.fuzzy_search,
        };

        let results = if let Some(cached) = self.cache.get(&key) {
            debug!(hits = cached.len(), "Cache hit");
            cached
        } else {
            let t_search = std::time::Instant::now();
            let outcome = merge_search(
                self.store.as_ref(),
                &MergeRequest {
                    query: &query,
                    country: &key.country,
                    max_results: key.max_results,
                    fuzzy: key.fuzzy,
                    weights: &self.config.weights,
                    text_index: self.text_index.as_deref(),
                },
            );
            debug!(
                hits = outcome.results.len(),
                elapsed = ?t_search.elapsed(),
                degraded = outcome.degraded,
                "Search complete"
            );
            if outcome.degraded {
                warn!(country = %key.country, "Not caching results of a degraded search");
            } else {
                self.cache.insert(key, outcome.results.clone());
            }
            outcome.results
        };

        if options.include_coordinates {
            results
        } else {
            results
                .into_iter()
                .map(SearchResult::without_coordinates)
                .collect()
        }
    }

    /// Runs independent searches in parallel. Output order matches input
    /// order; the cache is shared.
    #[instrument(name = "Bulk Search Locations", level = "info", skip_all, fields(num_queries = queries.len()))]
    pub fn search_locations_bulk<Q>(&self, queries: &[Q], options: &SearchOptions) -> SearchResultsBatch
    where
        Q: AsRef<str> + Sync,
    {
        queries
            .par_iter()
            .map(|query| self.search_locations(query.as_ref(), options))
            .collect()
    }

    /// First place (by name) with this postal code, if any. Not cached.
    #[instrument(name = "Get By Postal Code", level = "info", skip(self))]
    pub fn get_by_postal_code(&self, postal_code: &str, country: &str) -> Option<SearchResult> {
        let country = normalize_country(country);
        match postal_code_search_inner(
            self.store.as_ref(),
            postal_code,
            &country,
            1,
            self.config.weights.postal_code,
        ) {
            Ok(results) => results.into_iter().next(),
            Err(e) => {
                error!(error = %e, country, "Postal code lookup failed");
                None
            }
        }
    }

    /// Places within `radius_km` of a point, nearest first. Not cached.
    #[instrument(name = "Get Nearby Locations", level = "info", skip(self))]
    pub fn get_nearby_locations(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        country: &str,
        limit: usize,
    ) -> SearchResults {
        let country = normalize_country(country);
        let params = GeoRadiusParams {
            center: Coordinate::new(latitude, longitude),
            radius_km,
            limit,
        };
        match geo_radius_search_inner(
            self.store.as_ref(),
            &params,
            &country,
            self.config.weights.geo,
        ) {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, country, "Nearby search failed");
                Vec::new()
            }
        }
    }

    /// Empties the result cache, makes the store reread its data and brings
    /// the full-text index up to date. Call after the reference data is
    /// replaced.
    #[instrument(name = "Clear Cache", level = "info", skip(self))]
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.store.reload();
        info!("Search cache cleared");

        let Some(text_index) = &self.text_index else {
            return;
        };
        match self.store.places() {
            Ok(data) => {
                if let Err(e) = text_index.refresh(data) {
                    error!(error = %e, "Failed to refresh full-text index");
                }
            }
            Err(e) => error!(error = %e, "Failed to read store for index refresh"),
        }
    }

    /// Drops expired cache entries now rather than on their next read.
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
