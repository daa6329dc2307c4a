//! Snapshot codec - serializes a schema model into a storable artifact.
//!
//! A snapshot is a canonical, versioned JSON document rendered from the
//! model. The content hash is computed over the rendered text, so two
//! structurally equal models always hash identically. The stored body is
//! the gzip-compressed document.

mod document;

pub use document::SNAPSHOT_TYPE_NAME;

use crate::model::SchemaModel;
use document::SnapshotDocument;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use thiserror::Error;

/// Snapshot codec errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Compilation of the model into a snapshot failed. Fatal for the
    /// current migration attempt.
    #[error("snapshot compile failed: {0}")]
    Compile(String),

    /// Restoration of a stored snapshot failed. The orchestrator treats
    /// this as "no persisted model found" and falls back to a baseline.
    #[error("snapshot restore failed: {0}")]
    Restore(String),
}

/// A compiled snapshot of a schema model.
#[derive(Debug, Clone)]
pub struct CompiledSnapshot {
    /// Compressed snapshot document.
    pub body: Vec<u8>,
    /// Hex-encoded blake3 hash of the rendered document text.
    pub hash: String,
    /// Format identifier stored alongside the body.
    pub type_name: String,
}

/// Compile a schema model into a storable snapshot.
pub fn compile(model: &SchemaModel) -> Result<CompiledSnapshot, SnapshotError> {
    let text = render(model)?;
    let hash = hex::encode(blake3::hash(text.as_bytes()).as_bytes());

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .map_err(|e| SnapshotError::Compile(e.to_string()))?;
    let body = encoder
        .finish()
        .map_err(|e| SnapshotError::Compile(e.to_string()))?;

    Ok(CompiledSnapshot {
        body,
        hash,
        type_name: SNAPSHOT_TYPE_NAME.to_string(),
    })
}

/// Compute the content hash of a model without producing a body.
pub fn content_hash(model: &SchemaModel) -> Result<String, SnapshotError> {
    let text = render(model)?;
    Ok(hex::encode(blake3::hash(text.as_bytes()).as_bytes()))
}

/// Restore a schema model from a stored snapshot body.
pub fn restore(body: &[u8], type_name: &str) -> Result<SchemaModel, SnapshotError> {
    if type_name != SNAPSHOT_TYPE_NAME {
        return Err(SnapshotError::Restore(format!(
            "unknown snapshot type '{type_name}'"
        )));
    }

    let mut text = String::new();
    GzDecoder::new(body)
        .read_to_string(&mut text)
        .map_err(|e| SnapshotError::Restore(e.to_string()))?;

    let document: SnapshotDocument =
        serde_json::from_str(&text).map_err(|e| SnapshotError::Restore(e.to_string()))?;
    document.into_model()
}

/// Render the canonical document text for a model.
fn render(model: &SchemaModel) -> Result<String, SnapshotError> {
    let document = SnapshotDocument::from_model(model);
    serde_json::to_string_pretty(&document).map_err(|e| SnapshotError::Compile(e.to_string()))
}
