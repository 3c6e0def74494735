use std::path::Path;

use store_core::{Backend, StoreConfig};
use store_redb::RedbBackend;

/// Opens a `RedbBackend` rooted at `dir` using the store's documented
/// default write-buffer size, panicking on failure (test-only helper).
pub fn open_backend(dir: &Path, config: &StoreConfig) -> RedbBackend {
    RedbBackend::open(dir, config.write_buffer_size_min_mb, config)
        .expect("test backend should open cleanly")
}
