use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Recognized `msg_store_opts`: the set of options the store accepts from
/// its configuration source. Defaults match the documented config defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory under which each bucket gets `<store_dir>/<n>/`.
    pub store_dir: PathBuf,

    /// Number of independent buckets (shards), N.
    pub bucket_count: usize,

    /// Number of staging tables shared across buckets, M.
    pub staging_table_count: usize,

    /// Lower bound (MiB) of the randomized per-bucket write-buffer size.
    pub write_buffer_size_min_mb: usize,

    /// Upper bound (MiB) of the randomized per-bucket write-buffer size.
    pub write_buffer_size_max_mb: usize,

    /// Number of times to retry opening a backend that reports its lock is
    /// already held.
    pub open_retries: u32,

    /// Delay between open retries, in milliseconds.
    pub open_retry_delay_ms: u64,

    /// Whether to keep the backend's read cache warm on range scans.
    pub fill_cache: bool,

    /// Passthrough tuning key forwarded straight to the backend's own
    /// cache-size knob; `None` uses the backend's own default.
    pub backend_cache_size_mb: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("data/msgstore"),
            bucket_count: 16,
            staging_table_count: 16,
            write_buffer_size_min_mb: 30,
            write_buffer_size_max_mb: 60,
            open_retries: 30,
            open_retry_delay_ms: 2000,
            fill_cache: false,
            backend_cache_size_mb: None,
        }
    }
}

impl StoreConfig {
    /// Rejects configurations that cannot be honored, rather than letting
    /// them panic deep inside bucket startup.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.bucket_count == 0 {
            return Err(StoreError::Config("bucket_count must be >= 1".into()));
        }
        if self.staging_table_count == 0 {
            return Err(StoreError::Config("staging_table_count must be >= 1".into()));
        }
        if self.open_retries == 0 {
            return Err(StoreError::Config("open_retries must be >= 1".into()));
        }
        if self.write_buffer_size_min_mb > self.write_buffer_size_max_mb {
            return Err(StoreError::Config(
                "write_buffer_size_min_mb must be <= write_buffer_size_max_mb".into(),
            ));
        }
        if self.write_buffer_size_min_mb == 0 {
            return Err(StoreError::Config("write_buffer_size_min_mb must be >= 1".into()));
        }
        Ok(())
    }

    pub fn bucket_dir(&self, instance_id: usize) -> PathBuf {
        self.store_dir.join(instance_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.store_dir, PathBuf::from("data/msgstore"));
        assert_eq!(cfg.write_buffer_size_min_mb, 30);
        assert_eq!(cfg.write_buffer_size_max_mb, 60);
        assert_eq!(cfg.open_retries, 30);
        assert_eq!(cfg.open_retry_delay_ms, 2000);
        assert!(!cfg.fill_cache);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_zero_buckets() {
        let mut cfg = StoreConfig::default();
        cfg.bucket_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_write_buffer_bounds() {
        let mut cfg = StoreConfig::default();
        cfg.write_buffer_size_min_mb = 100;
        cfg.write_buffer_size_max_mb = 10;
        assert!(cfg.validate().is_err());
    }
}
