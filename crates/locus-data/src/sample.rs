//! Small deterministic place dataset for tests, examples and demos.
//!
//! Coordinates are rounded GeoNames postal centroids. The Berlin district rows
//! deliberately carry "Berlin" only in their admin hierarchy, so they match a
//! "berlin" query through the region name alone.
use polars::prelude::*;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::Result;
use crate::schema::*;

const IMPORTED_AT_MS: i64 = 1_700_000_000_000;

type SampleRow = (
    u64,
    &'static str,
    &'static str,
    &'static str,
    Option<&'static str>,
    Option<&'static str>,
    Option<&'static str>,
    Option<&'static str>,
    f64,
    f64,
    i32,
);

const BERLIN: Option<&str> = Some("Berlin");
const BERLIN_CODE: Option<&str> = Some("BE");
const BERLIN_CITY: Option<&str> = Some("Berlin, Stadt");
const BERLIN_CITY_CODE: Option<&str> = Some("00");

#[rustfmt::skip]
const ROWS: &[SampleRow] = &[
    // id, country, postal, place, admin1, code1, admin2, code2, lat, lon, accuracy
    (1, "DE", "10115", "Berlin", BERLIN, BERLIN_CODE, BERLIN_CITY, BERLIN_CITY_CODE, 52.5323, 13.3846, 6),
    (2, "DE", "10117", "Berlin", BERLIN, BERLIN_CODE, BERLIN_CITY, BERLIN_CITY_CODE, 52.5170, 13.3889, 6),
    (3, "DE", "10117", "Mitte", BERLIN, BERLIN_CODE, BERLIN_CITY, BERLIN_CITY_CODE, 52.5170, 13.3889, 4),
    (4, "DE", "10119", "Berlin", BERLIN, BERLIN_CODE, BERLIN_CITY, BERLIN_CITY_CODE, 52.5305, 13.4053, 6),
    (5, "DE", "10585", "Charlottenburg", BERLIN, BERLIN_CODE, BERLIN_CITY, BERLIN_CITY_CODE, 52.5166, 13.3041, 4),
    (6, "DE", "12555", "Köpenick", BERLIN, BERLIN_CODE, BERLIN_CITY, BERLIN_CITY_CODE, 52.4455, 13.5745, 4),
    (7, "DE", "13187", "Pankow", BERLIN, BERLIN_CODE, BERLIN_CITY, BERLIN_CITY_CODE, 52.5693, 13.4015, 4),
    (8, "DE", "13581", "Spandau", BERLIN, BERLIN_CODE, BERLIN_CITY, BERLIN_CITY_CODE, 52.5323, 13.1995, 4),
    (9, "DE", "16321", "Bernau bei Berlin", Some("Brandenburg"), Some("BB"), Some("Barnim"), Some("12060"), 52.6795, 13.5874, 4),
    (10, "DE", "16321", "Schönow", Some("Brandenburg"), Some("BB"), Some("Barnim"), Some("12060"), 52.6667, 13.5333, 4),
    (11, "DE", "37339", "Berlingerode", Some("Thüringen"), Some("TH"), Some("Eichsfeld"), Some("16061"), 51.4603, 10.2378, 4),
    (12, "DE", "20095", "Hamburg", Some("Hamburg"), Some("HH"), Some("Hamburg, Freie und Hansestadt"), Some("02"), 53.5511, 9.9937, 4),
    (13, "DE", "80331", "München", Some("Bayern"), Some("BY"), Some("Oberbayern"), Some("091"), 48.1374, 11.5755, 4),
    (14, "DE", "50667", "Köln", Some("Nordrhein-Westfalen"), Some("NW"), Some("Regierungsbezirk Köln"), Some("053"), 50.9375, 6.9603, 4),
    (15, "DE", "60311", "Frankfurt am Main", Some("Hessen"), Some("HE"), Some("Regierungsbezirk Darmstadt"), Some("064"), 50.1109, 8.6821, 4),
    (16, "AT", "1010", "Wien", Some("Wien"), Some("09"), Some("Wien Stadt"), Some("900"), 48.2085, 16.3721, 4),
    (17, "AT", "8010", "Graz", Some("Steiermark"), Some("06"), Some("Graz"), Some("601"), 47.0707, 15.4395, 4),
    (18, "AT", "2275", "Bernhardsthal", Some("Niederösterreich"), Some("03"), Some("Mistelbach"), Some("316"), 48.6903, 16.8708, 4),
];

/// Which part of the sample to materialise.
#[derive(Debug, Clone, Default)]
pub struct SampleConfig {
    /// Restrict to these country codes. Empty keeps every row.
    pub countries: Vec<String>,
}

impl SampleConfig {
    /// German rows only.
    pub fn germany() -> Self {
        Self {
            countries: vec!["DE".to_owned()],
        }
    }

    fn keeps(&self, country: &str) -> bool {
        self.countries.is_empty() || self.countries.iter().any(|c| c == country)
    }
}

/// The full sample as a frame with the place table layout.
pub fn sample_places() -> Result<DataFrame> {
    sample_places_with(&SampleConfig::default())
}

pub fn sample_places_with(config: &SampleConfig) -> Result<DataFrame> {
    let rows: Vec<&SampleRow> = ROWS.iter().filter(|row| config.keeps(row.1)).collect();
    let n = rows.len();

    let df = df!(
        ID => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        COUNTRY_CODE => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
        POSTAL_CODE => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
        PLACE_NAME => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
        ADMIN_NAME1 => rows.iter().map(|r| r.4).collect::<Vec<_>>(),
        ADMIN_CODE1 => rows.iter().map(|r| r.5).collect::<Vec<_>>(),
        ADMIN_NAME2 => rows.iter().map(|r| r.6).collect::<Vec<_>>(),
        ADMIN_CODE2 => rows.iter().map(|r| r.7).collect::<Vec<_>>(),
        ADMIN_NAME3 => vec![None::<&str>; n],
        ADMIN_CODE3 => vec![None::<&str>; n],
        LATITUDE => rows.iter().map(|r| r.8).collect::<Vec<_>>(),
        LONGITUDE => rows.iter().map(|r| r.9).collect::<Vec<_>>(),
        ACCURACY => rows.iter().map(|r| r.10).collect::<Vec<_>>(),
        CREATED_AT => vec![IMPORTED_AT_MS; n],
        UPDATED_AT => vec![IMPORTED_AT_MS; n],
    )?;

    info!(rows = df.height(), "Built sample place data");
    Ok(df)
}

/// Writes the sample to a temporary Parquet file. The file lives as long as
/// the returned handle.
pub fn sample_parquet(config: &SampleConfig) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("locus-places-")
        .suffix(".parquet")
        .tempfile()?;
    let df = sample_places_with(config)?;
    crate::store::write_places_parquet(&df, file.path())?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_utils::*;
    use crate::{ParquetPlaceStore, PlaceStore};

    #[test]
    fn test_sample_has_place_layout() {
        let df = sample_places().unwrap();
        assert_eq!(df.height(), ROWS.len());
        assert_has_columns(&df, &PLACE_COLUMNS);
        assert_column_type(&df, ID, &DataType::UInt64);
        assert_column_type(&df, ACCURACY, &DataType::Int32);
        assert_column_type(&df, CREATED_AT, &DataType::Int64);
        assert_no_nulls_in_column(&df, PLACE_NAME);
    }

    #[test]
    fn test_sample_ids_are_unique() {
        let df = sample_places().unwrap();
        let unique = df.column(ID).unwrap().n_unique().unwrap();
        assert_eq!(unique, df.height());
    }

    #[test]
    fn test_country_filter() {
        let df = sample_places_with(&SampleConfig::germany()).unwrap();
        let countries = df.column(COUNTRY_CODE).unwrap().str().unwrap().clone();
        assert!(countries.into_no_null_iter().all(|c| c == "DE"));
        assert!(df.height() < ROWS.len());
    }

    #[test]
    fn test_sample_parquet_is_readable() {
        let file = sample_parquet(&SampleConfig::default()).unwrap();
        let df = ParquetPlaceStore::from_path(file.path())
            .places()
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(df.height(), ROWS.len());
    }
}
