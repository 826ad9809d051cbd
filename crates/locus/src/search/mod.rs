//! Matchers over the reference store.
//!
//! Each matcher binds its parameters into the store's lazy plan and collects
//! it once. Results carry a fixed relevance per tier; ranking across
//! matchers happens in [`merge`].

pub use error::SearchError;
use error::Result;

mod full_text;
mod geo_radius;
pub(crate) mod merge;
mod place_name;
mod postal;
mod result;

pub use full_text::full_text_search_inner;
pub use geo_radius::{GeoRadiusParams, geo_radius_search_inner};
pub use place_name::{PlaceNameQuery, place_name_search_inner};
pub use postal::postal_code_search_inner;
pub use result::SearchResult;

use locus_data::frame_to_records;
use locus_data::schema::{COUNTRY_CODE, ID, LATITUDE, LONGITUDE, PLACE_NAME, POSTAL_CODE};
use polars::prelude::*;

/// Relevance column added by the text matchers.
pub(crate) const RELEVANCE: &str = "relevance";

fn country_filter(country: &str) -> Expr {
    col(COUNTRY_CODE).eq(lit(country.to_owned()))
}

/// Rows missing any required value cannot be turned into a result.
fn required_present() -> Expr {
    [COUNTRY_CODE, POSTAL_CODE, PLACE_NAME, LATITUDE, LONGITUDE]
        .into_iter()
        .fold(col(ID).is_not_null(), |acc, name| {
            acc.and(col(name).is_not_null())
        })
}

fn idx_limit(limit: usize) -> IdxSize {
    IdxSize::try_from(limit).unwrap_or(IdxSize::MAX)
}

/// Converts a collected frame with a [`RELEVANCE`] column into results, in
/// frame order.
fn frame_to_results(df: &DataFrame) -> Result<Vec<SearchResult>> {
    let scores = df.column(RELEVANCE)?.cast(&DataType::Float64)?;
    let scores = scores.f64()?;
    let records = frame_to_records(df)?;
    if records.len() != scores.len() {
        return Err(anyhow::anyhow!(
            "Relevance column has {} rows but {} records were read",
            scores.len(),
            records.len()
        )
        .into());
    }
    Ok(records
        .iter()
        .zip(scores)
        .map(|(record, score)| SearchResult::from_record(record, score.unwrap_or(0.0)))
        .collect())
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
        #[error("Store error: {0}")]
        Store(#[from] locus_data::DataError),
        #[error("Index error: {0}")]
        IndexError(#[from] crate::index::IndexError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, SearchError>;
}
