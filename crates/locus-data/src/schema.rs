//! Column layout of the place table and typed row extraction.

use chrono::{DateTime, Utc};
use itertools::izip;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DataError, Result};

pub const ID: &str = "id";
pub const COUNTRY_CODE: &str = "country_code";
pub const POSTAL_CODE: &str = "postal_code";
pub const PLACE_NAME: &str = "place_name";
pub const ADMIN_NAME1: &str = "admin_name1";
pub const ADMIN_CODE1: &str = "admin_code1";
pub const ADMIN_NAME2: &str = "admin_name2";
pub const ADMIN_CODE2: &str = "admin_code2";
pub const ADMIN_NAME3: &str = "admin_name3";
pub const ADMIN_CODE3: &str = "admin_code3";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ACCURACY: &str = "accuracy";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// All columns of the place table, in storage order.
pub const PLACE_COLUMNS: [&str; 15] = [
    ID,
    COUNTRY_CODE,
    POSTAL_CODE,
    PLACE_NAME,
    ADMIN_NAME1,
    ADMIN_CODE1,
    ADMIN_NAME2,
    ADMIN_CODE2,
    ADMIN_NAME3,
    ADMIN_CODE3,
    LATITUDE,
    LONGITUDE,
    ACCURACY,
    CREATED_AT,
    UPDATED_AT,
];

/// One row of the reference table.
///
/// Country, postal code, place name and coordinates are always present for
/// rows written by the import pipeline; the administrative hierarchy is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub id: u64,
    pub country_code: String,
    pub postal_code: String,
    pub place_name: String,
    /// Region (state, Bundesland).
    pub admin_name1: Option<String>,
    pub admin_code1: Option<String>,
    /// District (county, Kreis).
    pub admin_name2: Option<String>,
    pub admin_code2: Option<String>,
    /// Municipality.
    pub admin_name3: Option<String>,
    pub admin_code3: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn required(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Column> {
    let column = df
        .column(name)
        .map_err(|_| DataError::MissingColumn(name.to_owned()))?;
    Ok(column.cast(dtype)?)
}

fn optional(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Column> {
    match df.column(name) {
        Ok(column) => Ok(column.cast(dtype)?),
        Err(_) => Ok(Column::full_null(name.into(), df.height(), dtype)),
    }
}

fn opt_string(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_owned)
}

/// Converts a collected place frame into typed records.
///
/// Rows missing a required value are skipped with a warning rather than
/// failing the whole frame.
pub fn frame_to_records(df: &DataFrame) -> Result<Vec<PlaceRecord>> {
    let ids = required(df, ID, &DataType::UInt64)?;
    let countries = required(df, COUNTRY_CODE, &DataType::String)?;
    let postal_codes = required(df, POSTAL_CODE, &DataType::String)?;
    let place_names = required(df, PLACE_NAME, &DataType::String)?;
    let latitudes = required(df, LATITUDE, &DataType::Float64)?;
    let longitudes = required(df, LONGITUDE, &DataType::Float64)?;

    let admin_name1 = optional(df, ADMIN_NAME1, &DataType::String)?;
    let admin_code1 = optional(df, ADMIN_CODE1, &DataType::String)?;
    let admin_name2 = optional(df, ADMIN_NAME2, &DataType::String)?;
    let admin_code2 = optional(df, ADMIN_CODE2, &DataType::String)?;
    let admin_name3 = optional(df, ADMIN_NAME3, &DataType::String)?;
    let admin_code3 = optional(df, ADMIN_CODE3, &DataType::String)?;
    let accuracy = optional(df, ACCURACY, &DataType::Int32)?;
    let created_at = optional(df, CREATED_AT, &DataType::Int64)?;
    let updated_at = optional(df, UPDATED_AT, &DataType::Int64)?;

    let mut records = Vec::with_capacity(df.height());
    let mut skipped = 0usize;

    for (
        id,
        country,
        postal_code,
        place_name,
        lat,
        lon,
        (a_name1, a_code1, a_name2, a_code2, a_name3, a_code3),
        (acc, created, updated),
    ) in izip!(
        ids.u64()?,
        countries.str()?,
        postal_codes.str()?,
        place_names.str()?,
        latitudes.f64()?,
        longitudes.f64()?,
        izip!(
            admin_name1.str()?,
            admin_code1.str()?,
            admin_name2.str()?,
            admin_code2.str()?,
            admin_name3.str()?,
            admin_code3.str()?,
        ),
        izip!(accuracy.i32()?, created_at.i64()?, updated_at.i64()?),
    ) {
        let (Some(id), Some(country), Some(postal_code), Some(place_name), Some(lat), Some(lon)) =
            (id, country, postal_code, place_name, lat, lon)
        else {
            skipped += 1;
            continue;
        };

        records.push(PlaceRecord {
            id,
            country_code: country.to_owned(),
            postal_code: postal_code.to_owned(),
            place_name: place_name.to_owned(),
            admin_name1: opt_string(a_name1),
            admin_code1: opt_string(a_code1),
            admin_name2: opt_string(a_name2),
            admin_code2: opt_string(a_code2),
            admin_name3: opt_string(a_name3),
            admin_code3: opt_string(a_code3),
            latitude: lat,
            longitude: lon,
            accuracy: acc,
            created_at: created.and_then(DateTime::from_timestamp_millis),
            updated_at: updated.and_then(DateTime::from_timestamp_millis),
        });
    }

    if skipped > 0 {
        warn!(skipped, "Skipped place rows with missing required values");
    }

    Ok(records)
}
