//! The `redb`-backed embedded ordered key-value backend for one bucket.
//!
//! A single value table (`&[u8] -> &[u8]`) holds both payload and index
//! records; the order-preserving key encoding in `store_core::keys` keeps
//! the two tags separated and the index entries grouped by subscriber, so
//! one table is enough — redb's byte-slice keys already compare
//! lexicographically, matching the ordering this store needs.

use std::fs;
use std::path::Path;

use redb::{Database, ReadableDatabase as _, ReadableTable as _, TableDefinition};
use tracing::warn;

use store_core::{Backend, OpenError, StoreConfig, StoreError};

const TABLE: TableDefinition<'static, &'static [u8], &'static [u8]> = TableDefinition::new("store");

pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    fn map_db_err(err: redb::DatabaseError) -> OpenError {
        match err {
            redb::DatabaseError::DatabaseAlreadyOpen => OpenError::Locked,
            other => OpenError::Fatal(StoreError::backend(other)),
        }
    }
}

impl Backend for RedbBackend {
    fn open(dir: &Path, write_buffer_size_mb: usize, config: &StoreConfig) -> Result<Self, OpenError> {
        fs::create_dir_all(dir).map_err(|e| OpenError::Fatal(StoreError::backend(e)))?;

        let path = dir.join("data.redb");
        let cache_bytes = config
            .backend_cache_size_mb
            .unwrap_or(write_buffer_size_mb)
            * 1024
            * 1024;

        let db = Database::builder()
            .set_repair_callback(|progress| {
                warn!(progress = progress.progress() * 100.0, "backend repairing on open");
            })
            .set_cache_size(cache_bytes)
            .create(path)
            .map_err(Self::map_db_err)?;

        {
            let mut wx = db.begin_write().map_err(|e| OpenError::Fatal(StoreError::backend(e)))?;
            wx.open_table(TABLE).map_err(|e| OpenError::Fatal(StoreError::backend(e)))?;
            wx.commit().map_err(|e| OpenError::Fatal(StoreError::backend(e)))?;
        }

        Ok(Self { db })
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let mut rx = self.db.begin_read().map_err(StoreError::backend)?;
        let table = rx.open_table(TABLE).map_err(StoreError::backend)?;
        let value = table.get(key).map_err(StoreError::backend)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.put_batch(&[(key, value)])
    }

    fn put_batch(&self, entries: &[(&[u8], &[u8])]) -> Result<(), StoreError> {
        let mut wx = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = wx.open_table(TABLE).map_err(StoreError::backend)?;
            for (key, value) in entries {
                table.insert(*key, *value).map_err(StoreError::backend)?;
            }
        }
        wx.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.delete_batch(&[key])
    }

    fn delete_batch(&self, keys: &[&[u8]]) -> Result<(), StoreError> {
        let mut wx = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut table = wx.open_table(TABLE).map_err(StoreError::backend)?;
            for key in keys {
                table.remove(*key).map_err(StoreError::backend)?;
            }
        }
        wx.commit().map_err(StoreError::backend)?;
        Ok(())
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut rx = self.db.begin_read().map_err(StoreError::backend)?;
        let table = rx.open_table(TABLE).map_err(StoreError::backend)?;
        let mut out = Vec::new();
        let range = table.range(start..end).map_err(StoreError::backend)?;
        for item in range {
            let (k, v) = item.map_err(StoreError::backend)?;
            out.push((k.value().to_vec(), v.value().to_vec()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_core::keys::{encode_idx_key, encode_msg_key, idx_range_end, idx_range_start};
    use store_core::{MsgRef, SubscriberId};

    fn cfg() -> StoreConfig {
        StoreConfig::default()
    }

    #[test]
    fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path(), 30, &cfg()).unwrap();

        let key = encode_msg_key("m", &MsgRef::from(vec![1, 2, 3]));
        backend.put(&key, b"hello").unwrap();
        assert_eq!(backend.get(&key).unwrap(), Some(b"hello".to_vec()));

        backend.delete(&key).unwrap();
        assert_eq!(backend.get(&key).unwrap(), None);
    }

    #[test]
    fn put_batch_is_visible_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path(), 30, &cfg()).unwrap();

        let msg_ref = MsgRef::from(vec![9]);
        let msg_key = encode_msg_key("m", &msg_ref);
        let idx_key = encode_idx_key(&SubscriberId::new("m", "a"), &msg_ref);

        backend
            .put_batch(&[(&msg_key, b"payload"), (&idx_key, b"idx")])
            .unwrap();

        assert_eq!(backend.get(&msg_key).unwrap(), Some(b"payload".to_vec()));
        assert_eq!(backend.get(&idx_key).unwrap(), Some(b"idx".to_vec()));
    }

    #[test]
    fn scan_range_covers_whole_idx_tag() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path(), 30, &cfg()).unwrap();

        let a = encode_idx_key(&SubscriberId::new("m", "a"), &MsgRef::from(vec![1]));
        let b = encode_idx_key(&SubscriberId::new("m", "b"), &MsgRef::from(vec![2]));
        let msg = encode_msg_key("m", &MsgRef::from(vec![3]));

        backend.put(&a, b"1").unwrap();
        backend.put(&b, b"2").unwrap();
        backend.put(&msg, b"payload").unwrap();

        let scanned = backend.scan_range(&idx_range_start(), &idx_range_end()).unwrap();
        assert_eq!(scanned.len(), 2);
    }

    #[test]
    fn reopening_same_directory_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let key = encode_msg_key("m", &MsgRef::from(vec![1]));

        {
            let backend = RedbBackend::open(dir.path(), 30, &cfg()).unwrap();
            backend.put(&key, b"durable").unwrap();
        }

        let backend = RedbBackend::open(dir.path(), 30, &cfg()).unwrap();
        assert_eq!(backend.get(&key).unwrap(), Some(b"durable".to_vec()));
    }
}
