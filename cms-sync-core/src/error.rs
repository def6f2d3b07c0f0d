//! Error types for the sync pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::contract::SourceError;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to load content type models: {0}")]
    Models(#[source] SourceError),

    #[error("failed to fetch entries for content type `{content_type}` (skip={skip}): {source}")]
    Fetch {
        content_type: String,
        skip: usize,
        #[source]
        source: SourceError,
    },

    #[error("failed to clean collection directory {path}: {source}")]
    Clean {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while persisting a single document.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize front matter for {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl WriteError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
