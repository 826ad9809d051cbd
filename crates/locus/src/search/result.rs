use itertools::Itertools;
use locus_data::PlaceRecord;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// A ranked candidate returned to callers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct SearchResult {
    pub id: u64,
    pub name: String,
    /// "place, district, region" with absent parts skipped.
    pub display_name: String,
    pub postal_code: String,
    pub country: String,
    pub region: Option<String>,
    pub district: Option<String>,
    pub municipality: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub coordinates: Option<Coordinate>,
    pub relevance_score: f64,
    /// Set on results of a radius search.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub distance_km: Option<f64>,
}

impl SearchResult {
    pub fn from_record(record: &PlaceRecord, relevance_score: f64) -> Self {
        let display_name = [
            Some(record.place_name.as_str()),
            record.admin_name2.as_deref(),
            record.admin_name1.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .join(", ");

        Self {
            id: record.id,
            name: record.place_name.clone(),
            display_name,
            postal_code: record.postal_code.clone(),
            country: record.country_code.clone(),
            region: record.admin_name1.clone(),
            district: record.admin_name2.clone(),
            municipality: record.admin_name3.clone(),
            coordinates: Some(Coordinate::new(record.latitude, record.longitude)),
            relevance_score,
            distance_km: None,
        }
    }

    pub(crate) fn with_distance(mut self, distance_km: f64) -> Self {
        self.distance_km = Some(distance_km);
        self
    }

    pub(crate) fn without_coordinates(mut self) -> Self {
        self.coordinates = None;
        self
    }
}
