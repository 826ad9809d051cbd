use locus_data::PlaceStore;
use locus_data::schema::{ADMIN_NAME1, ADMIN_NAME2, PLACE_NAME};
use polars::prelude::*;
use tracing::{debug, instrument};

use super::error::Result;
use super::{
    RELEVANCE, SearchResult, country_filter, frame_to_results, idx_limit, required_present,
};
use crate::config::RelevanceWeights;

/// Shape of the tiered place-name query.
///
/// Both variants score exact, prefix and admin-area matches. Only `Fuzzy`
/// includes places whose name merely contains the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceNameQuery {
    Strict,
    Fuzzy,
}

impl PlaceNameQuery {
    pub const fn from_fuzzy(fuzzy: bool) -> Self {
        if fuzzy { Self::Fuzzy } else { Self::Strict }
    }

    /// Relevance per row, null when the row does not match at all.
    fn relevance_expr(self, query: &str, weights: &RelevanceWeights) -> Expr {
        let name = col(PLACE_NAME).str().to_lowercase();
        let admin_contains = |column: &str| {
            col(column)
                .str()
                .to_lowercase()
                .str()
                .contains_literal(lit(query.to_owned()))
                .fill_null(lit(false))
        };

        let exact = name.clone().eq(lit(query.to_owned()));
        let prefix = name.clone().str().starts_with(lit(query.to_owned()));
        let admin_area = admin_contains(ADMIN_NAME1).or(admin_contains(ADMIN_NAME2));

        let tiers = when(exact)
            .then(lit(weights.exact))
            .when(prefix)
            .then(lit(weights.prefix));

        let tiers = match self {
            Self::Strict => tiers,
            Self::Fuzzy => tiers
                .when(name.str().contains_literal(lit(query.to_owned())))
                .then(lit(weights.contains)),
        };

        tiers
            .when(admin_area)
            .then(lit(weights.admin_area))
            .otherwise(lit(NULL).cast(DataType::Float64))
    }
}

/// Single tiered query over place and admin names in `country`, ordered by
/// relevance then place name.
#[instrument(name = "Place Name Search", level = "debug", skip(store, weights))]
pub fn place_name_search_inner<S: PlaceStore + ?Sized>(
    store: &S,
    query: &str,
    country: &str,
    limit: usize,
    variant: PlaceNameQuery,
    weights: &RelevanceWeights,
) -> Result<Vec<SearchResult>> {
    if query.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let df = store
        .places()?
        .filter(country_filter(country).and(required_present()))
        .with_column(variant.relevance_expr(query, weights).alias(RELEVANCE))
        .filter(col(RELEVANCE).is_not_null())
        .sort_by_exprs(
            [col(RELEVANCE), col(PLACE_NAME)],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false])
                .with_maintain_order(true),
        )
        .limit(idx_limit(limit))
        .collect()?;

    let results = frame_to_results(&df)?;
    debug!(hits = results.len(), "Place name search complete");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_data::FramePlaceStore;
    use locus_data::sample::sample_places;

    fn store() -> FramePlaceStore {
        FramePlaceStore::new(sample_places().unwrap())
    }

    fn search(query: &str, limit: usize, variant: PlaceNameQuery) -> Vec<SearchResult> {
        place_name_search_inner(
            &store(),
            query,
            "DE",
            limit,
            variant,
            &RelevanceWeights::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_tiers_are_ordered() {
        let results = search("berlin", 50, PlaceNameQuery::Fuzzy);
        let scores: Vec<f64> = results.iter().map(|r| r.relevance_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");

        let score_of = |name: &str| {
            results
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.relevance_score)
                .unwrap()
        };
        assert_eq!(score_of("Berlin"), 1.0);
        assert_eq!(score_of("Berlingerode"), 0.9);
        assert_eq!(score_of("Bernau bei Berlin"), 0.7);
        assert_eq!(score_of("Mitte"), 0.5);
    }

    #[test]
    fn test_strict_variant_skips_contains_tier() {
        let results = search("berlin", 50, PlaceNameQuery::Strict);
        assert!(results.iter().all(|r| r.name != "Bernau bei Berlin"));
        // admin-area tier is always present
        assert!(results.iter().any(|r| r.name == "Mitte"));
    }

    #[test]
    fn test_ties_are_broken_by_name() {
        let results = search("berlin", 50, PlaceNameQuery::Fuzzy);
        let admin_only: Vec<&str> = results
            .iter()
            .filter(|r| r.relevance_score == 0.5)
            .map(|r| r.name.as_str())
            .collect();
        let mut sorted = admin_only.clone();
        sorted.sort_unstable();
        assert_eq!(admin_only, sorted);
    }

    #[test]
    fn test_query_is_scoped_to_country() {
        let results = search("bern", 50, PlaceNameQuery::Fuzzy);
        assert!(results.iter().all(|r| r.country == "DE"));
        assert!(results.iter().all(|r| r.name != "Bernhardsthal"));
    }

    #[test]
    fn test_limit_applies_after_ranking() {
        let results = search("berlin", 2, PlaceNameQuery::Fuzzy);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.relevance_score == 1.0));
    }

    #[test]
    fn test_matching_ignores_case_of_stored_names() {
        let results = search("münchen", 5, PlaceNameQuery::Strict);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "München");
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(search("xyzzy", 5, PlaceNameQuery::Fuzzy).is_empty());
    }
}
