use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use super::domain::{DocumentId, FilePayload};
use crate::error::{Classify, ErrorKind};

/// Where accepted files end up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub location: String,
    pub bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("file sink failed writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("file sink refused document {0}: unsafe storage key")]
    UnsafeKey(DocumentId),
    #[error("file sink unavailable: {0}")]
    Unavailable(String),
}

impl Classify for SinkError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Infrastructure
    }
}

/// Physical storage for uploaded files, keyed by document id. Storing the
/// same key twice replaces the earlier file.
pub trait DocumentSink: Send + Sync + Debug {
    fn store(&self, document_id: &DocumentId, payload: &FilePayload)
        -> Result<StoredFile, SinkError>;
}

/// Writes each upload to `<root>/<document id>.<ext>`.
#[derive(Debug, Clone)]
pub struct FilesystemSink {
    root: PathBuf,
}

impl FilesystemSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(
        &self,
        document_id: &DocumentId,
        payload: &FilePayload,
    ) -> Result<PathBuf, SinkError> {
        let key = document_id.as_str();
        let safe = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !safe {
            return Err(SinkError::UnsafeKey(document_id.clone()));
        }

        let extension = mime_guess::get_mime_extensions(&payload.content_type)
            .and_then(|extensions| extensions.first())
            .copied()
            .unwrap_or("bin");
        Ok(self.root.join(format!("{key}.{extension}")))
    }
}

impl DocumentSink for FilesystemSink {
    fn store(
        &self,
        document_id: &DocumentId,
        payload: &FilePayload,
    ) -> Result<StoredFile, SinkError> {
        let target = self.path_for(document_id, payload)?;
        let staging = target.with_extension("part");
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SinkError::Io { path, source }
        };

        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;
        let mut file = fs::File::create(&staging).map_err(io_error(&staging))?;
        let written = file
            .write_all(&payload.bytes)
            .and_then(|_| file.sync_all())
            .map_err(io_error(&staging));
        drop(file);

        let placed = written.and_then(|()| fs::rename(&staging, &target).map_err(io_error(&target)));
        if let Err(err) = placed {
            fs::remove_file(&staging).ok();
            return Err(err);
        }

        Ok(StoredFile {
            location: target.display().to_string(),
            bytes: payload.len(),
        })
    }
}

/// Keeps payloads in memory. Useful for demos and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<DocumentId, FilePayload>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self, document_id: &DocumentId) -> Option<FilePayload> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(document_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentSink for MemorySink {
    fn store(
        &self,
        document_id: &DocumentId,
        payload: &FilePayload,
    ) -> Result<StoredFile, SinkError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document_id.clone(), payload.clone());
        Ok(StoredFile {
            location: format!("memory://{document_id}"),
            bytes: payload.len(),
        })
    }
}
