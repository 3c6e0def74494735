use std::path::Path;

use crate::config::StoreConfig;
use crate::error::StoreError;

/// Outcome of a backend open attempt, distinguishing the one retryable
/// condition (the database's lock file is held by another process) from
/// every other, fatal failure. Replaces the original's string-prefix
/// sniffing (`"IO error: lock "`) with a typed variant the backend wrapper
/// is responsible for recognizing.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("backend lock is held by another process")]
    Locked,

    #[error(transparent)]
    Fatal(#[from] StoreError),
}

/// Raised when a bucket exhausts `open_retries` without ever observing the
/// lock clear.
#[derive(Debug, thiserror::Error)]
#[error("backend lock was never released within the configured retry budget")]
pub struct LockRetriesExhausted;

/// One key/value pair read back from an index range scan.
pub type IdxEntry = (Vec<u8>, Vec<u8>);

/// The embedded ordered key-value database owned by one bucket.
///
/// Implemented once for real use (the `redb`-backed crate) and trivially
/// fakeable in tests; kept as a trait so the bucket actor never depends on
/// a concrete storage engine.
pub trait Backend: Send + Sync + Sized + 'static {
    /// Opens (or creates) the backend rooted at `dir`, honoring
    /// `write_buffer_size_mb` and `config.backend_cache_size_mb`. Returns
    /// `OpenError::Locked` exactly when the open failed because another
    /// process holds the backend's lock; the caller is responsible for
    /// retrying that case per `config.open_retries`.
    fn open(dir: &Path, write_buffer_size_mb: usize, config: &StoreConfig) -> Result<Self, OpenError>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes a single key/value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Writes two key/value pairs atomically (used for the first-reference
    /// write of a new `msg_ref`: payload + index, in one batch).
    fn put_batch(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StoreError>;

    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Deletes several keys atomically (used when a refcount reaches zero:
    /// index + payload, in one batch).
    fn delete_batch(&self, keys: &[&[u8]]) -> Result<(), StoreError>;

    /// Forward range scan over `[start, end)`, returned fully materialized:
    /// ranges here are bounded (one subscriber's prefix, or the whole `idx`
    /// tag at recovery) and the actor processes them to completion before
    /// taking its next request, so there is no benefit to a lazy iterator
    /// that would otherwise have to be threaded back out to the caller.
    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<IdxEntry>, StoreError>;
}
