//! Decrypted files and their local references.
//!
//! Decrypted bytes are registered in a [`FileRegistry`] under a `blob:` URL
//! so the presentation layer can address them. The registration lives as
//! long as its [`FileHandle`]; dropping the handle releases the bytes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bytes::Bytes;

/// Scheme prefix of local file references.
pub const URL_PREFIX: &str = "blob:allowvault/";

#[derive(Default)]
struct Registry {
    files: Mutex<HashMap<String, Bytes>>,
    next_id: AtomicU64,
}

impl Registry {
    /// A panic while holding the lock leaves the map itself intact.
    fn files(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Registry of locally addressable decrypted files.
#[derive(Clone, Default)]
pub struct FileRegistry {
    inner: Arc<Registry>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes and return the owning handle.
    pub fn register(&self, data: Bytes) -> FileHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}{:016x}", URL_PREFIX, id);

        self.inner.files().insert(url.clone(), data);

        FileHandle {
            url,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Look up the bytes behind a URL, if still registered.
    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        self.inner.files().get(url).cloned()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.inner.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegistry")
            .field("live", &self.len())
            .finish()
    }
}

/// Owning reference to a registered file. Not cloneable.
#[derive(Debug)]
pub struct FileHandle {
    url: String,
    registry: Weak<Registry>,
}

impl FileHandle {
    /// The `blob:` URL addressing the file.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.files().remove(&self.url);
        }
    }
}

/// A decrypted, classified, locally addressable file.
#[derive(Debug)]
pub struct DecryptedFile {
    /// `decrypted-{index}.{extension}`
    pub filename: String,
    pub mime: &'static str,
    pub extension: &'static str,
    pub data: Bytes,
    pub handle: FileHandle,
}

impl DecryptedFile {
    pub fn url(&self) -> &str {
        self.handle.url()
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}
