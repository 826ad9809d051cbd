use locus_data::PlaceStore;
use locus_data::schema::{PLACE_NAME, POSTAL_CODE};
use polars::prelude::*;
use tracing::{debug, instrument};

use super::error::Result;
use super::{
    RELEVANCE, SearchResult, country_filter, frame_to_results, idx_limit, required_present,
};

/// All places with exactly this postal code in `country`, ordered by place
/// name. Comparison ignores case and surrounding whitespace.
#[instrument(name = "Postal Code Search", level = "debug", skip(store, weight))]
pub fn postal_code_search_inner<S: PlaceStore + ?Sized>(
    store: &S,
    postal_code: &str,
    country: &str,
    limit: usize,
    weight: f64,
) -> Result<Vec<SearchResult>> {
    let code = postal_code.trim().to_lowercase();
    if code.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let df = store
        .places()?
        .filter(
            country_filter(country)
                .and(col(POSTAL_CODE).str().to_lowercase().eq(lit(code)))
                .and(required_present()),
        )
        .sort([PLACE_NAME], SortMultipleOptions::default())
        .limit(idx_limit(limit))
        .with_column(lit(weight).alias(RELEVANCE))
        .collect()?;

    let results = frame_to_results(&df)?;
    debug!(hits = results.len(), "Postal code search complete");
    Ok(results)
}
