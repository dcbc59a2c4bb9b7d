//! Model compatibility check run when a store is loaded.
//!
//! Switching embedding models changes the geometry (and usually the length)
//! of the vectors it produces. Identities enrolled with the old model keep
//! loading fine but can no longer be matched, so the drift is reported to the
//! operator instead of failing silently. Loading is never refused.

use std::fmt;

use serde::Serialize;

use crate::record::is_known_model;

/// Stored embeddings were produced by a different model than the one
/// currently configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityWarning {
    pub stored_model: String,
    pub stored_dim: usize,
    pub current_model: String,
}

impl fmt::Display for CompatibilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "store was created with model '{}' (embedding dim {}) but the current model is '{}'; \
             existing identities will not be recognized. Either delete the store file and re-enroll, \
             or switch the configured model back to '{}'",
            self.stored_model, self.stored_dim, self.current_model, self.stored_model
        )
    }
}

/// Compares the provenance of stored embeddings with the current model.
///
/// Returns `None` when the tags agree or when the stored tag is unknown.
pub fn check_compatibility(
    stored_model_tag: &str,
    stored_embedding_dim: usize,
    current_model_tag: &str,
) -> Option<CompatibilityWarning> {
    if !is_known_model(stored_model_tag) || stored_model_tag == current_model_tag {
        return None;
    }

    Some(CompatibilityWarning {
        stored_model: stored_model_tag.to_string(),
        stored_dim: stored_embedding_dim,
        current_model: current_model_tag.to_string(),
    })
}

/// Surfaces a warning on the operator log.
pub fn report(warning: &CompatibilityWarning) {
    tracing::warn!(
        stored_model = %warning.stored_model,
        stored_dim = warning.stored_dim,
        current_model = %warning.current_model,
        "model compatibility warning: {}",
        warning
    );
}
