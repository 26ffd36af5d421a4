use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info};

use crate::ParsedAddress;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future type for storage reads, enabling object safety.
pub type StorageFuture<'a> = Pin<Box<dyn Future<Output = StorageResult<Vec<u8>>> + Send + 'a>>;

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The object was not found.
    NotFound,
    /// An I/O error occurred.
    Io(io::Error),
    /// A storage engine error occurred.
    Engine(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "Object not found"),
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Engine(msg) => write!(f, "Storage error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound
        } else {
            StorageError::Io(e)
        }
    }
}

/// Read access to the object storage holding raw inbound messages.
///
/// Implementations provide different backends, such as the local
/// filesystem or an in-memory map.
pub trait ObjectStore: Send + Sync {
    /// Fetches the full content of the object at `key` in `bucket`.
    fn get<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a>;

    /// Returns the name of this store.
    fn name(&self) -> &str;
}

/// Filesystem-backed object store.
///
/// Objects live at `{base_path}/{bucket}/{key}`, keys may contain `/`
/// separated directories.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    base_path: PathBuf,
}

impl FileObjectStore {
    /// Creates a new [`FileObjectStore`] rooted at `base_path`.
    pub fn new(base_path: PathBuf) -> Self {
        info!(path = %base_path.display(), "File object store initialized");
        Self { base_path }
    }

    /// Returns the filesystem path for an object, refusing keys that would
    /// escape the bucket directory.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || key.is_empty() {
            return Err(StorageError::Engine(format!("Invalid object key: {bucket}/{key}")));
        }
        Ok(self.base_path.join(relative))
    }
}

impl Default for FileObjectStore {
    fn default() -> Self {
        Self::new(PathBuf::from("mailbox"))
    }
}

impl ObjectStore for FileObjectStore {
    fn get<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a> {
        Box::pin(async move {
            let path = self.object_path(bucket, key)?;
            debug!(path = %path.display(), "Reading object");
            Ok(fs::read(path).await?)
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// In-memory object store.
///
/// Useful for testing and development, it also counts the reads it
/// served.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    /// Objects: (bucket, key) -> content
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,

    reads: AtomicUsize,
}

impl MemoryObjectStore {
    /// Creates a new empty [`MemoryObjectStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` under `key` in `bucket`, replacing any previous one.
    pub fn put(&self, bucket: &str, key: &str, content: Vec<u8>) {
        self.objects
            .write()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), content);
    }

    /// Returns the number of `get` calls served so far, hits and misses.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Returns the number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.read().unwrap().len()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get<'a>(&'a self, bucket: &'a str, key: &'a str) -> StorageFuture<'a> {
        Box::pin(async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let objects = self.objects.read().unwrap();
            objects
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or(StorageError::NotFound)
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Mailbox to storage directory table.
///
/// Lets the receiving side store messages for different mailboxes under
/// different key prefixes within the same bucket.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryMapping {
    /// Directory used when no mailbox entry matches.
    #[serde(default)]
    pub default: Option<String>,

    /// Address or domain -> directory.
    #[serde(default)]
    pub mailboxes: HashMap<String, String>,
}

impl DirectoryMapping {
    /// Builds the storage key for a message delivered to `destination`.
    ///
    /// Looks up the full address, then the domain and its parent domains,
    /// then falls back to the default directory. Without any directory the
    /// bare message id is the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let mut directories = relaymail_core::DirectoryMapping::default();
    /// directories.mailboxes.insert("example.com".to_string(), "inbox/".to_string());
    /// assert_eq!(
    ///     directories.key_for(Some("jane@mail.example.com"), "abc"),
    ///     "inbox/abc"
    /// );
    /// assert_eq!(directories.key_for(None, "abc"), "abc");
    /// ```
    pub fn key_for(&self, destination: Option<&str>, message_id: &str) -> String {
        let directory = destination
            .and_then(ParsedAddress::parse)
            .and_then(|address| self.lookup(&address))
            .or(self.default.as_deref())
            .map(|d| d.trim_matches('/'))
            .filter(|d| !d.is_empty());
        match directory {
            Some(directory) => format!("{directory}/{message_id}"),
            None => message_id.to_string(),
        }
    }

    fn lookup(&self, address: &ParsedAddress) -> Option<&str> {
        std::iter::once(address.address())
            .chain(address.domain_chain())
            .find_map(|candidate| {
                self.mailboxes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&candidate))
                    .map(|(_, directory)| directory.as_str())
            })
    }
}
