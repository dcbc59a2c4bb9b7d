//! # FaceDB - An Embedding Identity Store
//!
//! FaceDB keeps face embeddings together with caller-supplied metadata in a
//! single JSON file and answers "is this a known identity?" by exhaustive
//! nearest-neighbor search: the closest stored embedding (Euclidean distance)
//! matches if its distance is strictly below a threshold.
//!
//! Embeddings come from an external model and are opaque vectors here.
//! Vectors from different models are never compared: a length mismatch is an
//! infinite distance, and loading a store built with another model logs a
//! compatibility warning.
//!
//! ## Example
//!
//! ```
//! use facedb::{EmbeddingStore, Metadata, StoreConfig};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = EmbeddingStore::open(StoreConfig::new(dir.path().join("users.json")));
//!
//! let mut metadata = Metadata::new();
//! metadata.insert("name".to_string(), json!("Asha"));
//! let id = store.add(metadata, vec![0.0, 0.0], "Facenet").unwrap();
//!
//! // Close enough to the stored embedding
//! let hit = store.find(&[0.05, 0.0], 0.7).unwrap();
//! assert_eq!(hit.record.id, id);
//!
//! // Too far away
//! assert!(store.find(&[5.0, 5.0], 0.7).is_none());
//! ```

pub mod compat;
pub mod config;
pub mod error;
pub mod record;
pub mod server;
pub mod vector;
mod db;

// Re-export the store as the primary public API
pub use compat::CompatibilityWarning;
pub use config::StoreConfig;
pub use db::{EmbeddingStore, LoadReport, LoadWarning, Match};
pub use error::{Result, StoreError};
pub use record::{Metadata, Record, RecordSummary};
