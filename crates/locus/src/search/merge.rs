//! Combines matcher output into one ranked list.

use ahash::AHashSet;
use locus_data::PlaceStore;
use tracing::{error, instrument, trace};

use super::{
    PlaceNameQuery, SearchResult, full_text_search_inner, place_name_search_inner,
    postal_code_search_inner,
};
use crate::config::RelevanceWeights;
use crate::index::TextIndex;
use crate::normalize::NormalizedQuery;

/// Everything the merger needs for one `search_locations` call.
pub(crate) struct MergeRequest<'a> {
    pub query: &'a NormalizedQuery,
    pub country: &'a str,
    pub max_results: usize,
    pub fuzzy: bool,
    pub weights: &'a RelevanceWeights,
    pub text_index: Option<&'a dyn TextIndex>,
}

#[derive(Debug, Default)]
pub(crate) struct MergeOutcome {
    pub results: Vec<SearchResult>,
    /// A sub-search failed and contributed nothing.
    pub degraded: bool,
}

/// Accumulates candidates, keeping the first occurrence of each id.
struct Candidates {
    seen: AHashSet<u64>,
    results: Vec<SearchResult>,
}

impl Candidates {
    fn new(capacity: usize) -> Self {
        Self {
            seen: AHashSet::with_capacity(capacity),
            results: Vec::with_capacity(capacity),
        }
    }

    fn extend(&mut self, results: Vec<SearchResult>) {
        for result in results {
            if self.seen.insert(result.id) {
                self.results.push(result);
            }
        }
    }

    fn len(&self) -> usize {
        self.results.len()
    }

    /// Stable sort by relevance, best first, then truncate.
    fn into_ranked(mut self, max_results: usize) -> Vec<SearchResult> {
        self.results
            .sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        self.results.truncate(max_results);
        self.results
    }
}

/// Runs the matchers in order, merges and ranks.
///
/// Postal-like queries try the postal code matcher first and stop there when
/// it already fills `max_results`. The place-name matcher (and the full-text
/// index, when present) only asks for the remaining capacity. A failing
/// matcher is logged and contributes nothing; the others still count.
#[instrument(
    name = "Merge Search",
    level = "debug",
    skip_all,
    fields(query = request.query.as_str(), country = request.country, max = request.max_results)
)]
pub(crate) fn merge_search<S: PlaceStore + ?Sized>(
    store: &S,
    request: &MergeRequest<'_>,
) -> MergeOutcome {
    let max = request.max_results;
    if max == 0 {
        return MergeOutcome::default();
    }
    let mut candidates = Candidates::new(max);
    let mut degraded = false;

    if request.query.is_postal_like() {
        match postal_code_search_inner(
            store,
            request.query.as_str(),
            request.country,
            max,
            request.weights.postal_code,
        ) {
            Ok(results) => candidates.extend(results),
            Err(e) => {
                error!(error = %e, country = request.country, "Postal code search failed");
                degraded = true;
            }
        }
        if candidates.len() >= max {
            trace!("Postal code matches fill the request, skipping place names");
            return MergeOutcome {
                results: candidates.into_ranked(max),
                degraded,
            };
        }
    }

    let remaining = max - candidates.len();
    match place_name_search_inner(
        store,
        request.query.as_str(),
        request.country,
        remaining,
        PlaceNameQuery::from_fuzzy(request.fuzzy),
        request.weights,
    ) {
        Ok(results) => candidates.extend(results),
        Err(e) => {
            error!(error = %e, country = request.country, "Place name search failed");
            degraded = true;
        }
    }

    if let Some(index) = request.text_index
        && candidates.len() < max
    {
        // Hits already present are dropped, so ask for a full page.
        match full_text_search_inner(
            index,
            store,
            request.query.as_str(),
            request.country,
            max,
            request.fuzzy,
            request.weights,
        ) {
            Ok(results) => candidates.extend(results),
            Err(e) => {
                error!(error = %e, country = request.country, "Full-text search failed");
                degraded = true;
            }
        }
    }

    MergeOutcome {
        results: candidates.into_ranked(max),
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PlaceTextIndex;
    use locus_data::sample::sample_places;
    use locus_data::schema::{
        ADMIN_NAME1, ADMIN_NAME2, COUNTRY_CODE, ID, LATITUDE, LONGITUDE, PLACE_NAME, POSTAL_CODE,
    };
    use locus_data::{DataError, FramePlaceStore};
    use polars::prelude::{DataFrame, LazyFrame, df};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingStore;

    /// Counts every matcher's read of the place table.
    struct CountingStore {
        inner: FramePlaceStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn new(data: DataFrame) -> Self {
            Self {
                inner: FramePlaceStore::new(data),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PlaceStore for CountingStore {
        fn places(&self) -> locus_data::Result<LazyFrame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.places()
        }
    }

    impl PlaceStore for FailingStore {
        fn places(&self) -> locus_data::Result<LazyFrame> {
            Err(DataError::PlacesFileNotFound("missing.parquet".into()))
        }
    }

    fn store() -> FramePlaceStore {
        FramePlaceStore::new(sample_places().unwrap())
    }

    fn run<S: PlaceStore>(
        store: &S,
        raw: &str,
        max_results: usize,
        fuzzy: bool,
        text_index: Option<&dyn TextIndex>,
    ) -> MergeOutcome {
        run_weighted(store, raw, max_results, fuzzy, text_index, &RelevanceWeights::default())
    }

    fn run_weighted<S: PlaceStore>(
        store: &S,
        raw: &str,
        max_results: usize,
        fuzzy: bool,
        text_index: Option<&dyn TextIndex>,
        weights: &RelevanceWeights,
    ) -> MergeOutcome {
        let query = NormalizedQuery::parse(raw, 2).unwrap();
        merge_search(
            store,
            &MergeRequest {
                query: &query,
                country: "DE",
                max_results,
                fuzzy,
                weights,
                text_index,
            },
        )
    }

    #[test]
    fn test_postal_matches_short_circuit() {
        let outcome = run(&store(), "10117", 2, true, None);
        assert!(!outcome.degraded);
        let names: Vec<_> = outcome.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Berlin", "Mitte"]);
    }

    #[test]
    fn test_filled_postal_request_reads_store_once() {
        let store = CountingStore::new(sample_places().unwrap());
        let outcome = run(&store, "10117", 2, true, None);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(store.calls(), 1);

        let store = CountingStore::new(sample_places().unwrap());
        run(&store, "10117", 5, true, None);
        assert_eq!(store.calls(), 2);
    }

    #[test]
    fn test_place_names_only_fill_remaining_capacity() {
        let none = vec![None::<&str>; 7];
        let data = df!(
            ID => [1u64, 2, 3, 4, 5, 6, 7],
            COUNTRY_CODE => ["DE"; 7],
            POSTAL_CODE => ["10117", "10117", "20000", "20000", "20000", "20000", "20000"],
            PLACE_NAME => [
                "Mitte", "Tiergarten", "10117 Nord", "10117 Ost", "10117 Süd", "10117 West",
                "10117 Zentrum",
            ],
            ADMIN_NAME1 => none.clone(),
            ADMIN_NAME2 => none,
            LATITUDE => [52.5; 7],
            LONGITUDE => [13.4; 7],
        )
        .unwrap();
        let weights = RelevanceWeights {
            postal_code: 0.5,
            ..RelevanceWeights::default()
        };

        let store = CountingStore::new(data);
        let outcome = run_weighted(&store, "10117", 5, true, None, &weights);

        assert_eq!(store.calls(), 2);
        let ids: Vec<u64> = outcome.results.iter().map(|r| r.id).collect();
        assert_eq!(ids, [3, 4, 5, 1, 2]);
        let scores: Vec<f64> = outcome.results.iter().map(|r| r.relevance_score).collect();
        assert_eq!(scores, [0.9, 0.9, 0.9, 0.5, 0.5]);
    }

    #[test]
    fn test_postal_like_query_falls_through_to_place_names() {
        let outcome = run(&store(), "10115", 5, true, None);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].postal_code, "10115");
        assert_eq!(outcome.results[0].relevance_score, 1.0);
    }

    #[test]
    fn test_results_are_deduplicated_and_ranked() {
        let outcome = run(&store(), "berl", 20, true, None);
        let ids: AHashSet<u64> = outcome.results.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), outcome.results.len());
        let scores: Vec<f64> = outcome.results.iter().map(|r| r.relevance_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_full_text_fills_remaining_capacity() {
        let store = store();
        let index = PlaceTextIndex::in_memory(store.places().unwrap()).unwrap();
        let without = run(&store, "main", 5, false, None);
        assert!(without.results.is_empty());

        let with = run(&store, "main", 5, false, Some(&index));
        assert_eq!(with.results.len(), 1);
        assert_eq!(with.results[0].name, "Frankfurt am Main");
        assert_eq!(with.results[0].relevance_score, 0.6);
    }

    #[test]
    fn test_full_text_never_duplicates_place_name_hits() {
        let store = store();
        let index = PlaceTextIndex::in_memory(store.places().unwrap()).unwrap();
        let outcome = run(&store, "hamburg", 5, true, Some(&index));
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].relevance_score, 1.0);
    }

    #[test]
    fn test_store_failure_degrades_to_empty() {
        let outcome = run(&FailingStore, "10115", 5, true, None);
        assert!(outcome.results.is_empty());
        assert!(outcome.degraded);

        let outcome = run(&FailingStore, "berlin", 5, true, None);
        assert!(outcome.results.is_empty());
        assert!(outcome.degraded);
    }
}
