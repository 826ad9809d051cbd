//! Full-text index over place and admin names.
//!
//! Built with Tantivy from the reference store. The index can live in RAM
//! (tests, short-lived processes) or on disk under the data directory, where
//! it is reused as long as its document count and content fingerprint match
//! the store.

use std::hash::{BuildHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use error::IndexError;
use error::Result;

use ahash::RandomState;
use itertools::izip;
use locus_data::schema::{ADMIN_NAME1, ADMIN_NAME2, ADMIN_NAME3, COUNTRY_CODE, ID, PLACE_NAME};
use polars::prelude::{Column, DataFrame, DataType, LazyFrame, col};
use tantivy::schema::Field;
use tantivy::{
    Index, IndexWriter, TantivyDocument, Term,
    collector::TopDocs,
    query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, QueryParser, TermQuery},
    schema::{
        FAST, INDEXED, IndexRecordOption, STORED, Schema, SchemaBuilder, TextFieldIndexing,
        TextOptions, Value,
    },
};
use tracing::{debug, info, instrument, trace, warn};

const INDEX_NAME: &str = "places";
const WRITER_MEMORY_BYTES: usize = 50_000_000;
const FINGERPRINT_FILE: &str = "locus_fingerprint";
const FINGERPRINT_STATE: RandomState = RandomState::with_seeds(
    0x6c6f_6375_735f_6964,
    0x706c_6163_655f_6e6d,
    0x6164_6d69_6e5f_6e6d,
    0x636f_756e_7472_7900,
);

const F_ID: &str = "id";
const F_PLACE_NAME: &str = "place_name";
const F_ADMIN_NAMES: &str = "admin_names";
const F_COUNTRY: &str = "country_code";

/// Text search seam used by the full-text fallback.
///
/// Returns `(place id, score)` pairs, best first, restricted to `country`.
pub trait TextIndex: Send + Sync {
    fn search(
        &self,
        query: &str,
        country: &str,
        limit: usize,
        fuzzy: bool,
    ) -> Result<Vec<(u64, f32)>>;

    /// Bring the index in line with `data` after a reimport. Indexes that
    /// cannot go stale keep the default no-op.
    fn refresh(&self, _data: LazyFrame) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct PlaceTextIndex {
    index: Index,
    f_id: Field,
    f_place_name: Field,
    f_admin_names: Field,
    f_country: Field,
    dir: Option<PathBuf>,
    /// Content hash of the rows the index was built from.
    fingerprint: Arc<AtomicU64>,
}

impl std::fmt::Debug for PlaceTextIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceTextIndex")
            .field("num_docs", &self.num_docs().ok())
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

fn schema() -> Schema {
    let mut schema_builder = SchemaBuilder::new();

    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer("default")
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_indexing);

    // Country codes must match exactly
    let code_options = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("raw")
            .set_index_option(IndexRecordOption::Basic),
    );

    schema_builder.add_u64_field(F_ID, STORED | INDEXED | FAST);
    schema_builder.add_text_field(F_PLACE_NAME, text_options.clone());
    schema_builder.add_text_field(F_ADMIN_NAMES, text_options);
    schema_builder.add_text_field(F_COUNTRY, code_options);
    schema_builder.build()
}

fn columns_for_indexing() -> Vec<&'static str> {
    vec![ID, COUNTRY_CODE, PLACE_NAME, ADMIN_NAME1, ADMIN_NAME2, ADMIN_NAME3]
}

/// The indexed columns of a frame, cast for iteration.
struct IndexColumns {
    ids: Column,
    countries: Column,
    names: Column,
    admin: [Column; 3],
}

impl IndexColumns {
    fn from_frame(df: &DataFrame) -> Result<Self> {
        let string = |name: &str| df.column(name)?.cast(&DataType::String);
        Ok(Self {
            ids: df.column(ID)?.cast(&DataType::UInt64)?,
            countries: string(COUNTRY_CODE)?,
            names: string(PLACE_NAME)?,
            admin: [string(ADMIN_NAME1)?, string(ADMIN_NAME2)?, string(ADMIN_NAME3)?],
        })
    }
}

/// Hash over every indexed value, in row order. Two frames with the same
/// fingerprint produce the same documents.
fn fingerprint(df: &DataFrame) -> Result<u64> {
    let columns = IndexColumns::from_frame(df)?;
    let [admin1, admin2, admin3] = &columns.admin;
    let mut hasher = FINGERPRINT_STATE.build_hasher();
    df.height().hash(&mut hasher);
    for row in izip!(
        columns.ids.u64()?,
        columns.countries.str()?,
        columns.names.str()?,
        admin1.str()?,
        admin2.str()?,
        admin3.str()?,
    ) {
        row.hash(&mut hasher);
    }
    Ok(hasher.finish())
}

fn read_fingerprint(dir: &Path) -> Option<u64> {
    let raw = std::fs::read_to_string(dir.join(FINGERPRINT_FILE)).ok()?;
    u64::from_str_radix(raw.trim(), 16).ok()
}

impl PlaceTextIndex {
    fn from_index(index: Index, dir: Option<&Path>, fingerprint: u64) -> Result<Self> {
        let schema = index.schema();
        Ok(Self {
            f_id: schema.get_field(F_ID)?,
            f_place_name: schema.get_field(F_PLACE_NAME)?,
            f_admin_names: schema.get_field(F_ADMIN_NAMES)?,
            f_country: schema.get_field(F_COUNTRY)?,
            dir: dir.map(Path::to_path_buf),
            fingerprint: Arc::new(AtomicU64::new(fingerprint)),
            index,
        })
    }

    /// Default on-disk location: `<data_dir>/tantivy_indexes/places`.
    pub fn default_path() -> PathBuf {
        locus_data::get_data_dir()
            .join("tantivy_indexes")
            .join(INDEX_NAME)
    }

    /// Build an index held entirely in memory.
    #[instrument(name = "Create In-Memory Index", skip(data))]
    pub fn in_memory(data: LazyFrame) -> Result<Self> {
        let df = Self::indexable(data)?;
        let index = Index::create_in_ram(schema());
        let text_index = Self::from_index(index, None, fingerprint(&df)?)?;
        text_index.populate(&df)?;
        Ok(text_index)
    }

    /// Create or load the index at the default path.
    pub fn open_or_build(data: LazyFrame, overwrite: bool) -> Result<Self> {
        Self::open_or_build_in(&Self::default_path(), data, overwrite)
    }

    /// Create or load an index in `index_path`.
    ///
    /// An existing index is reused when its document count and content
    /// fingerprint match the indexable rows; otherwise it is rebuilt.
    #[instrument(name = "Create Index", skip(data))]
    pub fn open_or_build_in(index_path: &Path, data: LazyFrame, overwrite: bool) -> Result<Self> {
        info!(path = ?index_path, "Using FTS index path.");
        let df = Self::indexable(data)?;
        let expected_fingerprint = fingerprint(&df)?;

        if overwrite && index_path.exists() {
            info!(path = ?index_path, "Overwriting existing index directory.");
            std::fs::remove_dir_all(index_path)?;
        }
        std::fs::create_dir_all(index_path)?;

        if index_path.join("meta.json").exists() {
            match Index::open_in_dir(index_path) {
                Ok(existing_index) => {
                    let expected_doc_count = df.height();
                    let actual_doc_count = existing_index.reader()?.searcher().num_docs() as usize;
                    let stored_fingerprint = read_fingerprint(index_path);

                    if actual_doc_count == expected_doc_count
                        && stored_fingerprint == Some(expected_fingerprint)
                    {
                        info!(
                            path = ?index_path,
                            actual_doc_count,
                            "Index is up-to-date. Loaded existing index."
                        );
                        return Self::from_index(
                            existing_index,
                            Some(index_path),
                            expected_fingerprint,
                        );
                    }
                    info!(
                        path = ?index_path,
                        actual_doc_count,
                        expected_doc_count,
                        fingerprint_matches = stored_fingerprint == Some(expected_fingerprint),
                        "Index out of date. Re-indexing."
                    );
                    Self::safely_recreate_dir(index_path)?;
                }
                Err(e) => {
                    warn!(path = ?index_path, error = ?e, "Failed to open existing index, will re-index.");
                    Self::safely_recreate_dir(index_path)?;
                }
            }
        }

        info!(path = ?index_path, "Creating new FTS index");
        let index = Index::create_in_dir(index_path, schema())?;
        let text_index = Self::from_index(index, Some(index_path), expected_fingerprint)?;
        text_index.populate(&df)?;
        text_index.record_fingerprint(expected_fingerprint)?;
        Ok(text_index)
    }

    fn safely_recreate_dir(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    /// Rows that become documents: id, country and place name present.
    fn indexable(data: LazyFrame) -> Result<DataFrame> {
        Ok(data
            .select(
                columns_for_indexing()
                    .into_iter()
                    .map(col)
                    .collect::<Vec<_>>(),
            )
            .filter(
                col(ID)
                    .is_not_null()
                    .and(col(COUNTRY_CODE).is_not_null())
                    .and(col(PLACE_NAME).is_not_null()),
            )
            .collect()?)
    }

    /// Replaces every document with the rows of `df`.
    fn populate(&self, df: &DataFrame) -> Result<()> {
        if df.is_empty() {
            warn!(index = INDEX_NAME, "No data to index. Index will be empty.");
        }

        info!(index = INDEX_NAME, num_rows = df.height(), "Populating index");
        let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        writer.delete_all_documents()?;

        let columns = IndexColumns::from_frame(df)?;
        let [admin1, admin2, admin3] = &columns.admin;

        for (id, country, name, a1, a2, a3) in izip!(
            columns.ids.u64()?,
            columns.countries.str()?,
            columns.names.str()?,
            admin1.str()?,
            admin2.str()?,
            admin3.str()?,
        ) {
            let (Some(id), Some(country), Some(name)) = (id, country, name) else {
                continue;
            };
            let mut doc = TantivyDocument::default();
            doc.add_u64(self.f_id, id);
            doc.add_text(self.f_country, country);
            doc.add_text(self.f_place_name, name);
            for admin_name in [a1, a2, a3].into_iter().flatten() {
                doc.add_text(self.f_admin_names, admin_name);
            }
            writer.add_document(doc)?;
        }
        writer.commit()?;
        info!(index = INDEX_NAME, "Index creation complete");
        Ok(())
    }

    /// Written only after a successful commit, so an interrupted build is
    /// rebuilt on the next open.
    fn record_fingerprint(&self, fingerprint: u64) -> Result<()> {
        self.fingerprint.store(fingerprint, Ordering::Relaxed);
        if let Some(dir) = &self.dir {
            std::fs::write(dir.join(FINGERPRINT_FILE), format!("{fingerprint:016x}"))?;
        }
        Ok(())
    }

    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.index.reader()?.searcher().num_docs())
    }

    #[instrument(name = "Build Base Query", skip_all, level = "trace")]
    fn build_query(&self, query_str: &str, country: &str, fuzzy: bool) -> Result<Box<dyn Query>> {
        let query_str = query_str.trim();
        if query_str.is_empty() {
            return Err(anyhow::anyhow!("Query string is empty.").into());
        }

        let mut parser =
            QueryParser::for_index(&self.index, vec![self.f_place_name, self.f_admin_names]);
        parser.set_field_boost(self.f_place_name, 3.0);
        parser.set_field_boost(self.f_admin_names, 1.0);
        let (text_query, errors) = parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            warn!(?errors, "Query parsing errors occurred");
        }

        let mut text_clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Should, text_query)];
        if fuzzy {
            for term_str in query_str.split_whitespace().filter(|t| t.chars().count() > 2) {
                let term = Term::from_field_text(self.f_place_name, &term_str.to_lowercase());
                text_clauses.push((
                    Occur::Should,
                    Box::new(BoostQuery::new(
                        Box::new(FuzzyTermQuery::new(term, 1, true)),
                        1.5,
                    )),
                ));
            }
        }

        let country_term = Term::from_field_text(self.f_country, country);
        let final_query = BooleanQuery::new(vec![
            (Occur::Must, Box::new(BooleanQuery::new(text_clauses))),
            (
                Occur::Must,
                Box::new(TermQuery::new(country_term, IndexRecordOption::Basic)),
            ),
        ]);
        trace!(?final_query, "Final query constructed");
        Ok(Box::new(final_query))
    }
}

impl TextIndex for PlaceTextIndex {
    #[instrument(name = "Search Text Index", skip(self), level = "debug")]
    fn search(
        &self,
        query: &str,
        country: &str,
        limit: usize,
        fuzzy: bool,
    ) -> Result<Vec<(u64, f32)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = self.build_query(query, country, fuzzy)?;

        let reader = self.index.reader()?;
        let searcher = reader.searcher();

        let t_search = std::time::Instant::now();
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit))?;
        debug!(
            num_results = top_docs.len(),
            search_execution_seconds = t_search.elapsed().as_secs_f32(),
            "Tantivy search execution complete"
        );

        top_docs
            .into_iter()
            .map(|(score, doc_address)| {
                let doc = searcher.doc::<TantivyDocument>(doc_address)?;
                let id = doc
                    .get_first(self.f_id)
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| anyhow::anyhow!("Document without id: {doc:?}"))?;
                Ok((id, score))
            })
            .collect()
    }

    #[instrument(name = "Refresh Text Index", skip_all, level = "info")]
    fn refresh(&self, data: LazyFrame) -> Result<()> {
        let df = Self::indexable(data)?;
        let fingerprint = fingerprint(&df)?;
        if fingerprint == self.fingerprint.load(Ordering::Relaxed) {
            debug!("Index already matches the store");
            return Ok(());
        }
        info!(num_rows = df.height(), "Store changed, re-indexing");
        self.populate(&df)?;
        self.record_fingerprint(fingerprint)
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_data::sample::sample_places;
    use polars::prelude::IntoLazy;

    fn index() -> PlaceTextIndex {
        PlaceTextIndex::in_memory(sample_places().unwrap().lazy()).unwrap()
    }

    #[test]
    fn test_indexes_every_sample_row() {
        let idx = index();
        assert_eq!(idx.num_docs().unwrap(), sample_places().unwrap().height() as u64);
    }

    #[test]
    fn test_search_is_scoped_to_country() {
        let idx = index();
        let de = idx.search("wien", "DE", 10, false).unwrap();
        assert!(de.is_empty());
        let at = idx.search("wien", "AT", 10, false).unwrap();
        assert_eq!(at.len(), 1);
        assert_eq!(at[0].0, 16);
    }

    #[test]
    fn test_finds_token_inside_longer_name() {
        let idx = index();
        let hits = idx.search("main", "DE", 10, false).unwrap();
        assert_eq!(hits.first().map(|h| h.0), Some(15));
    }

    #[test]
    fn test_fuzzy_tolerates_a_typo() {
        let idx = index();
        assert!(idx.search("hamburk", "DE", 10, false).unwrap().is_empty());
        let hits = idx.search("hamburk", "DE", 10, true).unwrap();
        assert_eq!(hits.first().map(|h| h.0), Some(12));
    }

    #[test]
    fn test_empty_query_is_an_error() {
        assert!(index().search("   ", "DE", 10, true).is_err());
    }

    #[test]
    fn test_on_disk_index_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places");
        let data = sample_places().unwrap().lazy();

        let first = PlaceTextIndex::open_or_build_in(&path, data.clone(), false).unwrap();
        let n = first.num_docs().unwrap();
        assert!(path.join("meta.json").exists());

        let second = PlaceTextIndex::open_or_build_in(&path, data, false).unwrap();
        assert_eq!(second.num_docs().unwrap(), n);
        assert_eq!(second.search("hamburg", "DE", 5, false).unwrap()[0].0, 12);
    }

    #[test]
    fn test_stale_on_disk_index_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places");
        let full = sample_places().unwrap();
        PlaceTextIndex::open_or_build_in(&path, full.clone().lazy(), false).unwrap();

        let smaller = full.head(Some(3));
        let rebuilt = PlaceTextIndex::open_or_build_in(&path, smaller.lazy(), false).unwrap();
        assert_eq!(rebuilt.num_docs().unwrap(), 3);
    }

    fn rename(data: DataFrame, id: u64, name: &str) -> DataFrame {
        use polars::prelude::{lit, when};
        data.lazy()
            .with_column(
                when(col(ID).eq(lit(id)))
                    .then(lit(name))
                    .otherwise(col(PLACE_NAME))
                    .alias(PLACE_NAME),
            )
            .collect()
            .unwrap()
    }

    #[test]
    fn test_renamed_rows_with_same_count_are_reindexed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places");
        let full = sample_places().unwrap();
        PlaceTextIndex::open_or_build_in(&path, full.clone().lazy(), false).unwrap();
        assert!(path.join(FINGERPRINT_FILE).exists());

        let renamed = rename(full.clone(), 15, "Frankfurt Oder");
        assert_eq!(renamed.height(), full.height());
        let rebuilt = PlaceTextIndex::open_or_build_in(&path, renamed.lazy(), false).unwrap();

        assert_eq!(rebuilt.num_docs().unwrap(), full.height() as u64);
        let oder = rebuilt.search("oder", "DE", 10, false).unwrap();
        assert_eq!(oder.first().map(|h| h.0), Some(15));
        assert!(rebuilt.search("main", "DE", 10, false).unwrap().is_empty());
    }

    #[test]
    fn test_missing_fingerprint_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places");
        let data = sample_places().unwrap();
        PlaceTextIndex::open_or_build_in(&path, data.clone().lazy(), false).unwrap();
        std::fs::remove_file(path.join(FINGERPRINT_FILE)).unwrap();

        let idx = PlaceTextIndex::open_or_build_in(&path, data.lazy(), false).unwrap();
        assert_eq!(idx.num_docs().unwrap(), 18);
        assert!(path.join(FINGERPRINT_FILE).exists());
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let data = PlaceTextIndex::indexable(sample_places().unwrap().lazy()).unwrap();
        assert_eq!(fingerprint(&data).unwrap(), fingerprint(&data.clone()).unwrap());
        let renamed = rename(data.clone(), 12, "Hammerbrook");
        assert_ne!(fingerprint(&data).unwrap(), fingerprint(&renamed).unwrap());
    }

    #[test]
    fn test_refresh_picks_up_renamed_rows() {
        let full = sample_places().unwrap();
        let idx = PlaceTextIndex::in_memory(full.clone().lazy()).unwrap();
        let docs = idx.num_docs().unwrap();

        idx.refresh(rename(full, 15, "Frankfurt Oder").lazy()).unwrap();

        assert_eq!(idx.num_docs().unwrap(), docs);
        assert_eq!(idx.search("oder", "DE", 10, false).unwrap()[0].0, 15);
        assert!(idx.search("main", "DE", 10, false).unwrap().is_empty());
    }

    #[test]
    fn test_refresh_updates_on_disk_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places");
        let full = sample_places().unwrap();
        let idx = PlaceTextIndex::open_or_build_in(&path, full.clone().lazy(), false).unwrap();
        let before = read_fingerprint(&path);

        let renamed = rename(full, 12, "Hammerbrook");
        idx.refresh(renamed.clone().lazy()).unwrap();
        assert_ne!(read_fingerprint(&path), before);

        drop(idx);
        let reopened = PlaceTextIndex::open_or_build_in(&path, renamed.lazy(), false).unwrap();
        assert_eq!(reopened.search("hammerbrook", "DE", 5, false).unwrap()[0].0, 12);
    }
}
