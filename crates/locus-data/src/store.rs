use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use polars::prelude::*;
use tracing::{debug, info, instrument};

use crate::error::{DataError, Result};
use crate::schema::ID;

const PLACES_PARQUET: &str = "places.parquet";

/// Read access to the reference table of place records.
///
/// Each call to [`PlaceStore::places`] is one store round trip. Callers bind
/// their parameters into the returned plan and collect it; the store never
/// sees query text.
pub trait PlaceStore: Send + Sync {
    fn places(&self) -> Result<LazyFrame>;

    /// Forget anything held from earlier reads so the next call sees the
    /// current data. Called after the reference data was reimported.
    fn reload(&self) {}
}

impl<S: PlaceStore + ?Sized> PlaceStore for Arc<S> {
    fn places(&self) -> Result<LazyFrame> {
        (**self).places()
    }

    fn reload(&self) {
        (**self).reload();
    }
}

impl<S: PlaceStore + ?Sized> PlaceStore for &S {
    fn places(&self) -> Result<LazyFrame> {
        (**self).places()
    }

    fn reload(&self) {
        (**self).reload();
    }
}

/// Size and modification time of the file a frame was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> Result<Self> {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::PlacesFileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

struct Loaded {
    stamp: FileStamp,
    frame: LazyFrame,
}

/// Parquet-backed store.
///
/// The file is collected into memory on first use and kept until the file
/// changes on disk or [`PlaceStore::reload`] is called.
pub struct ParquetPlaceStore {
    path: PathBuf,
    loaded: RwLock<Option<Loaded>>,
}

impl ParquetPlaceStore {
    /// Store at `<data_dir>/processed/places.parquet`.
    pub fn new() -> Self {
        Self::from_path(crate::get_data_dir().join("processed").join(PLACES_PARQUET))
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<LazyFrame> {
        info!(
            path = ?path.file_stem(),
            "Loading and collecting into memory..."
        );
        let t_load = std::time::Instant::now();
        let lf = LazyFrame::scan_parquet(path, ScanArgsParquet::default())?
            .collect()
            .map(DataFrame::lazy)?;
        info!(
            path = ?path.file_stem(),
            load_time = ?t_load.elapsed(),
            "Loaded place data"
        );
        Ok(lf)
    }
}

impl Default for ParquetPlaceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaceStore for ParquetPlaceStore {
    fn places(&self) -> Result<LazyFrame> {
        let stamp = FileStamp::of(&self.path)?;
        {
            let loaded = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(loaded) = loaded.as_ref()
                && loaded.stamp == stamp
            {
                return Ok(loaded.frame.clone());
            }
        }

        let frame = Self::load(&self.path)?;
        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = Some(Loaded {
            stamp,
            frame: frame.clone(),
        });
        Ok(frame)
    }

    fn reload(&self) {
        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        if loaded.take().is_some() {
            debug!(path = ?self.path.file_stem(), "Dropped in-memory place data");
        }
    }
}

/// In-memory store over an already collected frame.
#[derive(Debug, Clone)]
pub struct FramePlaceStore {
    frame: DataFrame,
}

impl FramePlaceStore {
    pub const fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

impl PlaceStore for FramePlaceStore {
    fn places(&self) -> Result<LazyFrame> {
        Ok(self.frame.clone().lazy())
    }
}

/// Writes `df` to `path` as Parquet, sorted by id.
#[instrument(skip(df), fields(rows = df.height()))]
pub fn write_places_parquet(df: &DataFrame, path: &Path) -> Result<()> {
    let sink_time = std::time::Instant::now();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut df = df
        .clone()
        .lazy()
        .drop_nulls(Some(vec![ID.into()]))
        .sort([ID], SortMultipleOptions::default())
        .collect()?;
    let mut file = std::fs::File::create(path)?;
    ParquetWriter::new(&mut file).finish(&mut df)?;

    info!(
        path = ?path.file_stem(),
        sink_time = ?sink_time.elapsed(),
        "Saved to parquet file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{SampleConfig, sample_places, sample_places_with};
    use crate::schema::{COUNTRY_CODE, LATITUDE, LONGITUDE, PLACE_COLUMNS, POSTAL_CODE};
    use crate::tests_utils::*;

    #[test]
    fn test_missing_parquet_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetPlaceStore::from_path(dir.path().join("nope.parquet"));
        let Err(err) = store.places() else {
            panic!("missing file should not load");
        };
        assert!(matches!(err, DataError::PlacesFileNotFound(_)));
    }

    #[test]
    fn test_rewritten_file_is_read_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PLACES_PARQUET);
        write_places_parquet(&sample_places().unwrap(), &path).unwrap();

        let store = ParquetPlaceStore::from_path(&path);
        let first = store.places().unwrap().collect().unwrap();
        assert_eq!(first.height(), 18);

        let germany = sample_places_with(&SampleConfig::germany()).unwrap();
        write_places_parquet(&germany, &path).unwrap();
        let second = store.places().unwrap().collect().unwrap();
        assert_eq!(second.height(), germany.height());
    }

    #[test]
    fn test_reload_drops_held_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PLACES_PARQUET);
        write_places_parquet(&sample_places().unwrap(), &path).unwrap();

        let store = ParquetPlaceStore::from_path(&path);
        store.places().unwrap();
        store.reload();
        assert!(store.loaded.read().unwrap().is_none());

        std::fs::remove_file(&path).unwrap();
        let Err(err) = store.places() else {
            panic!("deleted file should not load");
        };
        assert!(matches!(err, DataError::PlacesFileNotFound(_)));
    }

    #[test]
    fn test_parquet_round_trip_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join(PLACES_PARQUET);
        let df = sample_places().unwrap();
        write_places_parquet(&df, &path).unwrap();

        let store = ParquetPlaceStore::from_path(&path);
        let loaded = store.places().unwrap().collect().unwrap();

        assert_eq!(loaded.height(), df.height());
        assert_has_columns(&loaded, &PLACE_COLUMNS);
        assert_column_type(&loaded, ID, &DataType::UInt64);
        assert_column_type(&loaded, LATITUDE, &DataType::Float64);
        assert_no_nulls_in_column(&loaded, POSTAL_CODE);
        assert_no_nulls_in_column(&loaded, COUNTRY_CODE);
        assert_column_range(&loaded, LATITUDE, -90.0, 90.0);
        assert_column_range(&loaded, LONGITUDE, -180.0, 180.0);
    }

    #[test]
    fn test_parquet_output_is_sorted_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PLACES_PARQUET);
        let df = sample_places()
            .unwrap()
            .lazy()
            .sort(
                [ID],
                SortMultipleOptions::default().with_order_descending(true),
            )
            .collect()
            .unwrap();
        write_places_parquet(&df, &path).unwrap();

        let loaded = ParquetPlaceStore::from_path(&path)
            .places()
            .unwrap()
            .collect()
            .unwrap();
        let ids: Vec<u64> = loaded
            .column(ID)
            .unwrap()
            .u64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_frame_store_is_shared_through_arc() {
        let store = Arc::new(FramePlaceStore::new(sample_places().unwrap()));
        let shared: Arc<dyn PlaceStore> = store.clone();
        let df = shared.places().unwrap().collect().unwrap();
        assert_eq!(df.height(), store.height());
    }
}
