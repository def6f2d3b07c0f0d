//! Writer: publish gating, serialization and the filesystem side of a sync.
//!
//! Every write is a full overwrite; there is no incremental state. A
//! document that is not yet (or no longer) published is suppressed, which is
//! reported as `Ok(false)` rather than an error.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::document::{collection_dir, Document};
use crate::error::{SyncError, WriteError};
use crate::timestamp;

pub const PUBLISHED_AT: &str = "published_at";
pub const UNPUBLISHED_AT: &str = "unpublished_at";

/// Why a document was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suppression {
    /// `published_at` lies in the future.
    Scheduled(DateTime<Utc>),
    /// `unpublished_at` has passed.
    Unpublished(DateTime<Utc>),
    /// The file name starts with a future date.
    FutureDatedFile(DateTime<Utc>),
}

/// Writes documents below a site root.
#[derive(Debug, Clone)]
pub struct Writer {
    root: PathBuf,
    now: DateTime<Utc>,
}

impl Writer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            now: Utc::now(),
        }
    }

    /// Pins the clock used for publish gating.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Absolute path a document would be written to.
    pub fn path_for(&self, document: &Document) -> PathBuf {
        self.root.join(document.destination_path())
    }

    pub fn suppression(&self, document: &Document) -> Option<Suppression> {
        let at = |key: &str| document.get(key).and_then(timestamp::parse_value);

        if let Some(published_at) = at(PUBLISHED_AT).filter(|t| *t > self.now) {
            return Some(Suppression::Scheduled(published_at));
        }
        if let Some(unpublished_at) = at(UNPUBLISHED_AT).filter(|t| *t <= self.now) {
            return Some(Suppression::Unpublished(unpublished_at));
        }
        document
            .destination_path()
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(timestamp::date_prefix)
            .filter(|date| *date > self.now)
            .map(Suppression::FutureDatedFile)
    }

    /// `Ok(true)` when a file was written, `Ok(false)` when suppressed.
    pub fn write(&self, document: &Document) -> Result<bool, WriteError> {
        if let Some(reason) = self.suppression(document) {
            info!(
                id = document.id(),
                content_type = document.content_type(),
                ?reason,
                "Skipping unpublished document"
            );
            return Ok(false);
        }

        let contents = serialize(document)?;
        let path = self.path_for(document);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| WriteError::io(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| WriteError::io(&path, e))?;
        debug!(id = document.id(), path = %path.display(), "Wrote document");
        Ok(true)
    }

    /// Deletes the files of a collection; a missing directory counts as clean.
    pub fn remove_collection(&self, content_type: &str) -> Result<usize, SyncError> {
        let dir = self.root.join(collection_dir(content_type));
        let clean_err = |source: std::io::Error| SyncError::Clean {
            path: dir.clone(),
            source,
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %dir.display(), "Collection directory absent; nothing to clean");
                return Ok(0);
            }
            Err(e) => return Err(clean_err(e)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(clean_err)?.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(clean_err)?;
                removed += 1;
            }
        }
        info!(content_type, removed, path = %dir.display(), "Cleaned collection");
        Ok(removed)
    }
}

/// `---\n<yaml>---\n\n<body>`; no body leaves the content section empty.
pub fn serialize(document: &Document) -> Result<String, WriteError> {
    let yaml = serde_yaml::to_string(&document.front_matter).map_err(|source| {
        WriteError::Serialize {
            id: document.id().to_string(),
            source,
        }
    })?;
    Ok(format!("---\n{yaml}---\n\n{}", document.body().unwrap_or_default()))
}
