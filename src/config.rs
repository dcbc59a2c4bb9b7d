//! Store configuration.

use std::env;
use std::path::{Path, PathBuf};

/// Backing file used when nothing else is configured.
pub const DEFAULT_DATABASE_PATH: &str = "data/users_database.json";
/// Embedding model assumed when nothing else is configured.
pub const DEFAULT_MODEL: &str = "Facenet";
/// Maximum distance for two embeddings to be the same identity.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;

pub const ENV_DATABASE_PATH: &str = "DATABASE_PATH";
pub const ENV_MODEL: &str = "FACE_RECOGNITION_MODEL";
pub const ENV_MATCH_THRESHOLD: &str = "FACE_MATCH_THRESHOLD";

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Persisted backing file.
    pub path: PathBuf,
    /// Model currently producing embeddings; new records are tagged with it
    /// and stored records are checked against it on load.
    pub model_tag: String,
    /// Threshold used by `find_default`.
    pub match_threshold: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
            model_tag: DEFAULT_MODEL.to_string(),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        StoreConfig { path: path.as_ref().to_path_buf(), ..StoreConfig::default() }
    }

    /// Defaults overridden by `DATABASE_PATH`, `FACE_RECOGNITION_MODEL` and
    /// `FACE_MATCH_THRESHOLD`. An unparsable threshold is ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = StoreConfig::default();

        if let Ok(path) = env::var(ENV_DATABASE_PATH) {
            config.path = PathBuf::from(path);
        }
        if let Ok(model) = env::var(ENV_MODEL) {
            config.model_tag = model;
        }
        if let Ok(raw) = env::var(ENV_MATCH_THRESHOLD) {
            match raw.parse::<f64>() {
                Ok(threshold) => config.match_threshold = threshold,
                Err(e) => tracing::warn!("ignoring {}='{}': {}", ENV_MATCH_THRESHOLD, raw, e),
            }
        }

        config
    }

    pub fn with_model(mut self, model_tag: impl Into<String>) -> Self {
        self.model_tag = model_tag.into();
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }
}
