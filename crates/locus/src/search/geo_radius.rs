use locus_data::{PlaceStore, frame_to_records};
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use super::error::Result;
use super::{SearchResult, country_filter, required_present};
use crate::geo::{Coordinate, haversine_distance};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRadiusParams {
    pub center: Coordinate,
    pub radius_km: f64,
    pub limit: usize,
}

/// Places in `country` within `radius_km` of the centre, nearest first.
///
/// Distance is computed for every row of the country partition before
/// filtering; there is no spatial pre-filter.
#[instrument(name = "Geo Radius Search", level = "debug", skip(store, weight))]
pub fn geo_radius_search_inner<S: PlaceStore + ?Sized>(
    store: &S,
    params: &GeoRadiusParams,
    country: &str,
    weight: f64,
) -> Result<Vec<SearchResult>> {
    if !params.center.is_valid() || !params.radius_km.is_finite() || params.radius_km <= 0.0 {
        warn!(?params, "Invalid radius search parameters");
        return Ok(Vec::new());
    }
    if params.limit == 0 {
        return Ok(Vec::new());
    }

    let df = store
        .places()?
        .filter(country_filter(country).and(required_present()))
        .collect()?;
    let records = frame_to_records(&df)?;
    let scanned = records.len();

    let mut within: Vec<(f64, &locus_data::PlaceRecord)> = records
        .par_iter()
        .filter_map(|record| {
            let point = Coordinate::new(record.latitude, record.longitude);
            let distance = haversine_distance(&params.center, &point);
            (distance <= params.radius_km).then_some((distance, record))
        })
        .collect();

    within.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
    within.truncate(params.limit);

    debug!(scanned, hits = within.len(), "Geo radius search complete");

    Ok(within
        .into_iter()
        .map(|(distance, record)| SearchResult::from_record(record, weight).with_distance(distance))
        .collect())
}
