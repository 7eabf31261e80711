// ❌ Pipeline Errors - the fatal half of the failure taxonomy
//
// Only structural faults live here. Missing files, unreadable files, column
// drift, bad rows and partial loads are report events, never errors.

use crate::db::DbError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The metadata file is unusable; no catalog can be built
    #[error("malformed metadata file {}: {reason}", path.display())]
    MalformedMetadata { path: PathBuf, reason: String },

    /// A CREATE SCHEMA / CREATE TABLE statement failed
    #[error("failed to create {object}: {source}")]
    SchemaCreation {
        object: String,
        statement: String,
        #[source]
        source: DbError,
    },

    #[error("database error during {operation}: {source}")]
    Database {
        operation: String,
        #[source]
        source: DbError,
    },
}

impl PipelineError {
    pub fn malformed_metadata(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedMetadata {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn database(operation: impl Into<String>, source: DbError) -> Self {
        PipelineError::Database {
            operation: operation.into(),
            source,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
