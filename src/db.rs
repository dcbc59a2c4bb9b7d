//! The database module
//! Provide the persistent embedding store: load, add, find, list and count
//!
//! Records live in memory as an immutable snapshot (`Arc<Vec<Record>>`).
//! Readers take a clone of the current snapshot and scan it without holding
//! any lock. Writers are serialized by a single mutex; a write builds the next
//! snapshot, persists it, and only then publishes it, so callers only ever see
//! states that are also on disk.
//!
//! The backing file is replaced atomically (temporary file in the same
//! directory, then rename). This protects against torn files but is not a
//! cross-process lock: two processes adding to the same path concurrently
//! can lose each other's records.

use crate::compat::{self, CompatibilityWarning};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::record::{Metadata, Record, RecordSummary, StoreFile, StoreFileRef};
use crate::vector::{distance, first_non_finite, is_comparable};
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Best match returned by [`EmbeddingStore::find`].
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub record: Record,
    pub distance: f64,
}

/// Something worth telling the operator about a load. None of these stop
/// the store from serving.
#[derive(Debug)]
pub enum LoadWarning {
    /// Stored embeddings come from another model than the configured one.
    ModelCompatibilityDrift(CompatibilityWarning),
    /// The backing file could not be read or parsed; the store started empty.
    Fallback(StoreError),
    /// A record's `embedding_dim` disagreed with its embedding and was fixed.
    DimensionRepaired { id: String, stored: usize, actual: usize },
}

/// Outcome of [`EmbeddingStore::load`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub warnings: Vec<LoadWarning>,
}

pub struct EmbeddingStore {
    config: StoreConfig,
    records: RwLock<Arc<Vec<Record>>>,
    writer: Mutex<()>,
}

impl EmbeddingStore {
    /// Creates a store for `config.path` and loads it immediately.
    ///
    /// A missing, unreadable or malformed file yields an empty store; see
    /// [`load`](EmbeddingStore::load).
    ///
    /// # Examples
    ///
    /// ```
    /// use facedb::{EmbeddingStore, StoreConfig};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = EmbeddingStore::open(StoreConfig::new(dir.path().join("users.json")));
    /// assert_eq!(store.count(), 0);
    /// ```
    pub fn open(config: StoreConfig) -> EmbeddingStore {
        let store = EmbeddingStore {
            config,
            records: RwLock::new(Arc::new(Vec::new())),
            writer: Mutex::new(()),
        };
        store.load();
        store
    }

    /// Replaces the in-memory records with the content of the backing file.
    ///
    /// Never fails: a missing file is an empty store, and an unreadable or
    /// malformed file is logged and also treated as an empty store. When the
    /// first stored record was produced by another model than the configured
    /// one, a compatibility warning is logged and returned, but every record
    /// is still loaded.
    ///
    /// # Returns
    ///
    /// A [`LoadReport`] with the number of records loaded and any warnings.
    pub fn load(&self) -> LoadReport {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let path = &self.config.path;
        let mut report = LoadReport::default();

        let mut records = match read_store_file(path) {
            Ok(Some(file)) => file.users,
            Ok(None) => {
                info!("No existing store at '{}'. Starting fresh.", path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to load store, starting empty: {}", e);
                report.warnings.push(LoadWarning::Fallback(e));
                Vec::new()
            }
        };

        for record in &mut records {
            let actual = record.embedding.len();
            if record.embedding_dim == actual {
                continue;
            }
            // Older files do not carry embedding_dim at all.
            if record.embedding_dim != 0 {
                warn!(
                    id = %record.id,
                    stored = record.embedding_dim,
                    actual,
                    "embedding_dim does not match the stored embedding, repairing"
                );
                report.warnings.push(LoadWarning::DimensionRepaired {
                    id: record.id.clone(),
                    stored: record.embedding_dim,
                    actual,
                });
            }
            record.embedding_dim = actual;
        }

        if let Some(first) = records.first() {
            if let Some(warning) =
                compat::check_compatibility(&first.model_tag, first.embedding_dim, &self.config.model_tag)
            {
                compat::report(&warning);
                report.warnings.push(LoadWarning::ModelCompatibilityDrift(warning));
            }
        }

        report.loaded = records.len();
        info!("Loaded {} records from '{}'", report.loaded, path.display());
        self.publish(records);
        report
    }

    /// Adds a new identity and persists the whole store before returning.
    ///
    /// # Arguments
    ///
    /// * `metadata` - Caller attributes, stored and returned verbatim
    /// * `embedding` - Embedding vector (must not be empty, every component
    ///   finite)
    /// * `model_tag` - Model that produced `embedding`
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The generated id
    /// * `Err(StoreError)` - Empty or non-finite embedding, or the store could not be
    ///   persisted. On error the store is left exactly as it was.
    ///
    /// # Examples
    ///
    /// ```
    /// use facedb::{EmbeddingStore, Metadata, StoreConfig};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = EmbeddingStore::open(StoreConfig::new(dir.path().join("users.json")));
    ///
    /// let id = store.add(Metadata::new(), vec![0.1, 0.2, 0.3], "Facenet").unwrap();
    /// assert_eq!(store.count(), 1);
    /// assert_eq!(store.get(&id).unwrap().embedding_dim, 3);
    ///
    /// // Empty embeddings are rejected
    /// assert!(store.add(Metadata::new(), vec![], "Facenet").is_err());
    /// ```
    pub fn add(&self, metadata: Metadata, embedding: Vec<f64>, model_tag: impl Into<String>) -> Result<String> {
        if embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding);
        }
        // NaN and infinities would be written as null and make the whole file unreadable.
        if let Some(index) = first_non_finite(&embedding) {
            return Err(StoreError::NonFiniteEmbedding { index });
        }

        let _guard = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let current = self.snapshot();

        let id = fresh_id(&current);
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Record::new(id.clone(), metadata, embedding, model_tag.into()));

        if let Err(e) = persist(&self.config.path, &next) {
            warn!("Failed to persist new record, store unchanged: {}", e);
            return Err(e);
        }

        let count = next.len();
        self.publish(next);
        info!(id = %id, "Added record, store now holds {} records", count);
        Ok(id)
    }

    /// [`add`](EmbeddingStore::add) tagged with the configured model.
    pub fn add_with_current_model(&self, metadata: Metadata, embedding: Vec<f64>) -> Result<String> {
        self.add(metadata, embedding, self.config.model_tag.clone())
    }

    /// Finds the stored identity closest to `embedding`.
    ///
    /// Every record is compared (exhaustive scan). The closest record is
    /// returned only if its distance is strictly below `threshold`; on ties
    /// the earliest inserted record wins. Records whose embedding length
    /// differs from the query are never matched. An empty query, or one with
    /// a NaN or infinite component, matches nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use facedb::{EmbeddingStore, Metadata, StoreConfig};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = EmbeddingStore::open(StoreConfig::new(dir.path().join("users.json")));
    /// store.add(Metadata::new(), vec![0.0, 0.0], "M1").unwrap();
    ///
    /// assert!(store.find(&[0.05, 0.0], 0.7).is_some());
    /// assert!(store.find(&[5.0, 5.0], 0.7).is_none());
    /// assert!(store.find(&[0.0, 0.0, 0.0], 0.7).is_none());
    /// ```
    pub fn find(&self, embedding: &[f64], threshold: f64) -> Option<Match> {
        if embedding.is_empty() {
            debug!("find called without an embedding");
            return None;
        }
        if let Some(index) = first_non_finite(embedding) {
            debug!(index, "find called with a non-finite embedding");
            return None;
        }

        let records = self.snapshot();
        if records.is_empty() {
            return None;
        }

        let mut best: Option<&Record> = None;
        let mut best_distance = f64::INFINITY;
        let mut mismatched = 0usize;
        let mut mismatched_dim = 0usize;

        for record in records.iter() {
            if !is_comparable(embedding, &record.embedding) {
                mismatched += 1;
                mismatched_dim = record.embedding.len();
            }

            let dist = distance(embedding, &record.embedding);
            if dist < best_distance {
                best_distance = dist;
                best = Some(record);
            }
        }

        if mismatched > 0 {
            warn!(
                query_dim = embedding.len(),
                stored_dim = mismatched_dim,
                mismatched,
                "embedding dimension mismatch, usually caused by switching embedding models"
            );
        }

        match best {
            Some(record) if best_distance < threshold => {
                debug!(id = %record.id, distance = best_distance, "match found");
                Some(Match { record: record.clone(), distance: best_distance })
            }
            _ => {
                debug!(distance = best_distance, threshold, "no match");
                None
            }
        }
    }

    /// [`find`](EmbeddingStore::find) with the configured threshold.
    pub fn find_default(&self, embedding: &[f64]) -> Option<Match> {
        self.find(embedding, self.config.match_threshold)
    }

    /// Retrieves a record by its id.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.snapshot().iter().find(|record| record.id == id).cloned()
    }

    /// Returns every record's public fields in insertion order.
    ///
    /// Embeddings are not included.
    pub fn list(&self) -> Vec<RecordSummary> {
        self.snapshot().iter().map(Record::summary).collect()
    }

    /// Returns the number of records in the store.
    pub fn count(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn model_tag(&self) -> &str {
        &self.config.model_tag
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn snapshot(&self) -> Arc<Vec<Record>> {
        let guard = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn publish(&self, records: Vec<Record>) {
        let mut guard = self.records.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(records);
    }
}

/// Random v4 UUID not already used by `records`.
fn fresh_id(records: &[Record]) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !records.iter().any(|record| record.id == id) {
            return id;
        }
    }
}

/// Reads the store file. `Ok(None)` when it does not exist.
fn read_store_file(path: &Path) -> Result<Option<StoreFile>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let reader = BufReader::new(file);
    let store_file = serde_json::from_reader(reader).map_err(|source| {
        if source.is_io() {
            StoreError::io(path, io::Error::other(source))
        } else {
            StoreError::Malformed { path: path.to_path_buf(), source }
        }
    })?;

    Ok(Some(store_file))
}

/// Writes all records to `path`, replacing it atomically.
fn persist(path: &Path, records: &[Record]) -> Result<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, &StoreFileRef::new(records))?;
        Ok(())
    })
}

/// Runs `write` against a temporary file next to `path`, then renames it over
/// `path`. If anything fails the temporary file is removed and `path` keeps
/// its previous content.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| StoreError::io(&parent, e))?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| StoreError::io(&parent, e))?;
    let tmp_path = tmp.path().to_path_buf();

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(|e| StoreError::io(&tmp_path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| StoreError::io(&tmp_path, e))?;

    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
