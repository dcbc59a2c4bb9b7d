//! The record module
//! Stored identities and the on-disk document that holds them

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Caller-supplied attributes of an identity, kept in insertion order.
///
/// The store never reads or validates any key.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Model tag used when a record does not say which model produced it.
pub const UNKNOWN_MODEL: &str = "Unknown";

fn unknown_model() -> String {
    UNKNOWN_MODEL.to_string()
}

/// A stored identity.
///
/// Field names on disk follow the `users` array of the store file:
/// `user_id`, `timestamp`, `face_embedding`, `embedding_dim`, `model_name`
/// and `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "user_id")]
    pub id: String,
    #[serde(rename = "timestamp", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "face_embedding")]
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub embedding_dim: usize,
    #[serde(rename = "model_name", default = "unknown_model")]
    pub model_tag: String,
    #[serde(rename = "data", default)]
    pub metadata: Metadata,
}

impl Record {
    /// Creates a record stamped with the current time.
    pub fn new(id: String, metadata: Metadata, embedding: Vec<f64>, model_tag: String) -> Record {
        Record {
            id,
            created_at: Utc::now(),
            embedding_dim: embedding.len(),
            embedding,
            model_tag,
            metadata,
        }
    }

    /// Public projection of the record, without the embedding.
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            model_tag: self.model_tag.clone(),
        }
    }
}

/// Whether `tag` names a model rather than the unknown placeholder.
pub fn is_known_model(tag: &str) -> bool {
    !tag.is_empty() && tag != UNKNOWN_MODEL
}

/// What `list` exposes about an identity. Embeddings are biometric data
/// and are never part of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    pub id: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub model_tag: String,
}

/// The persisted document, as read back from disk.
#[derive(Debug, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub users: Vec<Record>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// The persisted document, as written by the store.
#[derive(Debug, Serialize)]
pub struct StoreFileRef<'a> {
    pub users: &'a [Record],
    #[serde(with = "timestamp")]
    pub last_updated: DateTime<Utc>,
}

impl<'a> StoreFileRef<'a> {
    pub fn new(users: &'a [Record]) -> Self {
        StoreFileRef { users, last_updated: Utc::now() }
    }
}

/// ISO-8601 timestamps.
///
/// Written as RFC 3339 with an explicit offset. Timestamps without an offset
/// (older files) are read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
    }
}

fn optional_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => timestamp::parse(&raw).map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}
