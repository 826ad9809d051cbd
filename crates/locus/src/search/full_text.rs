use locus_data::PlaceStore;
use locus_data::schema::ID;
use polars::prelude::*;
use tracing::{debug, instrument, warn};

use super::error::Result;
use super::{
    PlaceNameQuery, RELEVANCE, SearchResult, country_filter, frame_to_results,
    place_name_search_inner, required_present,
};
use crate::config::RelevanceWeights;
use crate::index::TextIndex;

const HIT_RANK: &str = "hit_rank";

/// Index-backed search in `country`. Every hit scores `weights.full_text`;
/// order follows the index ranking.
///
/// If the index fails for any reason the strict place-name matcher answers
/// instead. Only a failure of that substitute reaches the caller.
#[instrument(name = "Full Text Search", level = "debug", skip(index, store, weights))]
pub fn full_text_search_inner<S: PlaceStore + ?Sized>(
    index: &dyn TextIndex,
    store: &S,
    query: &str,
    country: &str,
    limit: usize,
    fuzzy: bool,
    weights: &RelevanceWeights,
) -> Result<Vec<SearchResult>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    match index_hits(index, store, query, country, limit, fuzzy, weights.full_text) {
        Ok(results) => Ok(results),
        Err(error) => {
            warn!(%error, country, "Full-text search failed, using place name matcher");
            place_name_search_inner(store, query, country, limit, PlaceNameQuery::Strict, weights)
        }
    }
}

fn index_hits<S: PlaceStore + ?Sized>(
    index: &dyn TextIndex,
    store: &S,
    query: &str,
    country: &str,
    limit: usize,
    fuzzy: bool,
    weight: f64,
) -> Result<Vec<SearchResult>> {
    let hits = index.search(query, country, limit, fuzzy)?;
    if hits.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<u64> = hits.iter().map(|(id, _)| *id).collect();
    let ranks: Vec<u32> = (0..).take(ids.len()).collect();

    let df = df!(
        ID => ids,
        HIT_RANK => ranks,
    )?
    .lazy()
    .join(
        store
            .places()?
            .filter(country_filter(country).and(required_present())),
        [col(ID)],
        [col(ID)],
        JoinArgs::new(JoinType::Inner),
    )
    .sort([HIT_RANK], SortMultipleOptions::default())
    .with_column(lit(weight).alias(RELEVANCE))
    .collect()?;

    let results = frame_to_results(&df)?;
    debug!(hits = results.len(), "Full-text search complete");
    Ok(results)
}
