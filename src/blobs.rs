//! Blob storage for rendered images.
//!
//! A store is a plain key/overwrite map from [`Handle`] to bytes: storing a
//! second blob under the same handle replaces the first, and a handle is
//! "ready" exactly when a blob exists under it.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::handle::Handle;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Opaque rendered bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// MIME type sniffed from the payload.
    pub fn content_type(&self) -> &'static str {
        if self.data.starts_with(PNG_SIGNATURE) {
            "image/png"
        } else if self.data.starts_with(b"<svg") {
            "image/svg+xml"
        } else {
            "application/octet-stream"
        }
    }
}

/// Storage for blobs keyed by handle.
pub trait BlobStore: Send + Sync {
    /// Store `blob` under `handle`, replacing any previous blob.
    fn store(&self, handle: &Handle, blob: &Blob) -> Result<()>;

    /// Fetch the blob under `handle`; `Ok(None)` if nothing is stored yet.
    fn fetch(&self, handle: &Handle) -> Result<Option<Blob>>;
}

/// Process-local store, for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<Handle, Blob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Handle, Blob>>> {
        self.blobs
            .lock()
            .map_err(|_| Error::Io(std::io::Error::new(ErrorKind::Other, "blob store lock poisoned")))
    }
}

impl BlobStore for InMemoryBlobStore {
    fn store(&self, handle: &Handle, blob: &Blob) -> Result<()> {
        self.lock()?.insert(*handle, blob.clone());
        Ok(())
    }

    fn fetch(&self, handle: &Handle) -> Result<Option<Blob>> {
        Ok(self.lock()?.get(handle).cloned())
    }
}

/// Flat directory of files named `{timestamp}{n1}{n2}{n3}.png`.
///
/// Each write goes through its own temporary file in the same directory and
/// is then renamed into place, so a reader never sees a partially written blob
/// and concurrent writes to one handle simply overwrite each other.
#[derive(Debug, Clone)]
pub struct LocalFsBlobStore {
    location: PathBuf,
}

impl LocalFsBlobStore {
    /// Store rooted at `location`, created if missing.
    pub fn new(location: impl Into<PathBuf>) -> Result<Self> {
        let location = location.into();
        std::fs::create_dir_all(&location)?;
        Ok(Self { location })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn filename(&self, handle: &Handle) -> PathBuf {
        self.location.join(format!("{}.png", handle.storage_key()))
    }
}

impl BlobStore for LocalFsBlobStore {
    fn store(&self, handle: &Handle, blob: &Blob) -> Result<()> {
        let path = self.filename(handle);

        // Private temp file per write; dropped (and removed) if anything fails
        let mut tmp = NamedTempFile::new_in(&self.location)?;
        tmp.write_all(&blob.data)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!("[LocalFsBlobStore] wrote {} bytes to {}", blob.data.len(), path.display());
        Ok(())
    }

    fn fetch(&self, handle: &Handle) -> Result<Option<Blob>> {
        match std::fs::read(self.filename(handle)) {
            Ok(data) => Ok(Some(Blob::new(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
