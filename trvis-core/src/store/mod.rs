//! Persistent key-value stores used by the local repository backend.
//!
//! A store maps string keys to string values and answers synchronously.
//! [`FileStore`] keeps one file per key in a data directory; [`MemoryStore`]
//! keeps everything in process memory and is mostly useful in tests.

mod file;
mod memory;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Synchronous string key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Returns `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Errors raised by a key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error for {}: {1}", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Quota exceeded writing '{key}': {size} bytes would exceed the {quota} byte limit")]
    QuotaExceeded {
        key: String,
        size: usize,
        quota: usize,
    },
}

/// Keys become file names, so they are limited to a portable character set.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
