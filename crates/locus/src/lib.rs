//! Locus - Postal Code and Place Search
//!
//! Locus answers search-as-you-type queries over a GeoNames-style table of
//! postal code / place records. A single call accepts a free-text query (a
//! postal code prefix or part of a place name), runs the postal code,
//! place-name and optional full-text matchers, merges their output and
//! returns ranked, de-duplicated results.
//!
//! # Quick Start
//!
//! ```rust
//! use locus::{LocationSearcher, SearchOptions};
//! use locus::data::{FramePlaceStore, sample::sample_places};
//!
//! let searcher = LocationSearcher::with_store(FramePlaceStore::new(sample_places()?))?;
//!
//! // Place names, best match first
//! let results = searcher.search_locations("berl", &SearchOptions::default());
//! assert_eq!(results[0].name, "Berlin");
//!
//! // Postal code lookup
//! let hit = searcher.get_by_postal_code("20095", "DE");
//! assert_eq!(hit.map(|r| r.name), Some("Hamburg".to_string()));
//!
//! // Map lookup around Berlin Mitte
//! let nearby = searcher.get_nearby_locations(52.52, 13.405, 5.0, "DE", 10);
//! assert!(nearby.iter().all(|r| r.distance_km.unwrap_or(f64::MAX) <= 5.0));
//! # Ok::<(), locus::error::LocusError>(())
//! ```
//!
//! # Behaviour
//!
//! - Searches are scoped to one country at a time (`DE` by default).
//! - Results carry a relevance score in `[0, 1]`; weights are configurable
//!   through [`RelevanceWeights`].
//! - Identical searches within the cache TTL are served from an in-process
//!   LRU cache.
//! - Store or index failures never surface as errors from search calls; they
//!   are logged and the affected matcher contributes nothing.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod cache;
mod config;
mod core;
pub mod error;
mod geo;
mod index;
mod normalize;
mod search;

pub use cache::CacheStats;
pub use config::{
    CacheConfig, RelevanceWeights, SearchConfig, SearchConfigBuilder, SearchOptions,
};
pub use core::{IndexLocation, LocationSearcher, LocationSearcherBuilder};
pub use geo::{Coordinate, EARTH_RADIUS_KM, haversine_distance};
pub use index::{IndexError, PlaceTextIndex, TextIndex};
pub use locus_data as data;
pub use normalize::{NormalizedQuery, QueryKind};
pub use polars;
pub use search::{SearchError, SearchResult};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Locus library.
///
/// `RUST_LOG` takes precedence over `level` when set. Safe to call more than
/// once; only the first call installs the subscriber.
///
/// ```rust
/// use locus::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), locus::error::LocusError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::LocusError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}
