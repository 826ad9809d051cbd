//! Reference store access for Locus.
//!
//! The reference dataset is a single table of postal code / place records
//! (GeoNames postal code export layout). It is produced by an external import
//! pipeline and only ever read here. This crate owns:
//!
//! - the record schema ([`schema`]) and typed row extraction,
//! - the [`PlaceStore`] seam used by the search engine, with a Parquet-backed
//!   and an in-memory implementation ([`store`]),
//! - data directory resolution,
//! - a small deterministic dataset for tests and examples ([`sample`]).
use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::debug;

pub mod sample;
pub mod schema;
pub mod store;

pub const DATA_DIR_DEFAULT: &str = "./locus_data";
pub const DATA_DIR_ENV: &str = "LOCUS_DATA_DIR";

/// Global data directory path.
///
/// Resolution order: the `LOCUS_DATA_DIR` environment variable, the platform
/// data directory (with the `system-dirs` feature), then `./locus_data`.
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        debug!(dir, "Using data directory from environment");
        return PathBuf::from(dir);
    }

    #[cfg(feature = "system-dirs")]
    {
        if let Some(dirs) = directories::ProjectDirs::from("", "", "locus") {
            return dirs.data_dir().to_path_buf();
        }
    }

    PathBuf::from(DATA_DIR_DEFAULT)
});

/// Directory holding processed data and persisted indexes.
pub fn get_data_dir() -> PathBuf {
    DATA_DIR.clone()
}

mod error {
    use polars::prelude::PolarsError;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum DataError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Polars error: {0}")]
        Polars(#[from] PolarsError),
        #[error("Place data file not found: {0}")]
        PlacesFileNotFound(std::path::PathBuf),
        #[error("Missing column in place data: {0}")]
        MissingColumn(String),
    }

    pub type Result<T> = std::result::Result<T, DataError>;
}

pub use error::{DataError, Result};

pub use schema::{PlaceRecord, frame_to_records};
pub use store::{FramePlaceStore, ParquetPlaceStore, PlaceStore, write_places_parquet};
