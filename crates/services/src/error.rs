//! Shared error types for the services crate.

use thiserror::Error;

use bunpo_core::model::{GrammarPointId, ParseJlptLevelError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading the seed dataset.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeedError {
    #[error("invalid seed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("grammar point {id}: {source}")]
    Level {
        id: GrammarPointId,
        #[source]
        source: ParseJlptLevelError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Seed(#[from] SeedError),
}
