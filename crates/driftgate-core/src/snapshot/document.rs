//! The versioned snapshot document format.

use super::SnapshotError;
use crate::model::SchemaModel;
use serde::{Deserialize, Serialize};

/// Format identifier for the current snapshot document version.
pub const SNAPSHOT_TYPE_NAME: &str = "driftgate.schema-snapshot.v1";

/// The self-describing document rendered from a schema model.
///
/// The `format` field travels inside the body as well as in the stored
/// record so a restored artifact can be validated on its own.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct SnapshotDocument {
    pub format: String,
    pub model: SchemaModel,
}

impl SnapshotDocument {
    pub fn from_model(model: &SchemaModel) -> Self {
        Self {
            format: SNAPSHOT_TYPE_NAME.to_string(),
            model: model.clone(),
        }
    }

    pub fn into_model(self) -> Result<SchemaModel, SnapshotError> {
        if self.format != SNAPSHOT_TYPE_NAME {
            return Err(SnapshotError::Restore(format!(
                "incompatible snapshot format '{}'",
                self.format
            )));
        }
        Ok(self.model)
    }
}
