//! The bucket registry: the in-process collaborator that maps any `msg_ref`
//! to its owning bucket by a stable hash, and that a bucket registers with
//! only after its own recovery completes. A key's absence from the registry
//! (because its bucket hasn't finished recovering, or never started) is
//! reported to callers as `StoreError::BucketUnavailable`, never as a panic
//! or a silently wrong route.

use std::collections::HashMap;
use std::sync::RwLock;

use store_core::{MsgRef, StoreError};

use crate::bucket::BucketHandle;

pub struct BucketRegistry {
    bucket_count: usize,
    buckets: RwLock<HashMap<usize, BucketHandle>>,
}

impl BucketRegistry {
    pub fn new(bucket_count: usize) -> Self {
        Self {
            bucket_count,
            buckets: RwLock::new(HashMap::with_capacity(bucket_count)),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Registers a bucket handle. Called once per bucket, after that
    /// bucket's recovery has completed; before this call, the instance is
    /// simply absent from the registry and every lookup for keys it owns
    /// fails with `BucketUnavailable`.
    pub fn register_bucket(&self, instance_id: usize, handle: BucketHandle) {
        self.buckets
            .write()
            .expect("bucket registry lock poisoned")
            .insert(instance_id, handle);
    }

    fn instance_for(&self, msg_ref: &MsgRef) -> usize {
        let hash = xxhash_rust::xxh3::xxh3_64(msg_ref.as_bytes());
        (hash as usize) % self.bucket_count
    }

    /// Deterministic mapping from `msg_ref` to its owning bucket. Writes,
    /// reads, deletes and single-key refcount lookups all route through
    /// here.
    pub fn get_bucket(&self, msg_ref: &MsgRef) -> Result<BucketHandle, StoreError> {
        let instance_id = self.instance_for(msg_ref);
        self.buckets
            .read()
            .expect("bucket registry lock poisoned")
            .get(&instance_id)
            .cloned()
            .ok_or(StoreError::BucketUnavailable)
    }

    /// Every registered bucket, for fan-out `find`. Buckets that have not
    /// finished recovery are simply absent here.
    pub fn get_buckets(&self) -> Vec<BucketHandle> {
        self.buckets
            .read()
            .expect("bucket registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn is_initialized(&self, instance_id: usize) -> bool {
        self.buckets
            .read()
            .expect("bucket registry lock poisoned")
            .contains_key(&instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_key_reports_bucket_unavailable() {
        let registry = BucketRegistry::new(4);
        let err = registry.get_bucket(&MsgRef::from(vec![1])).unwrap_err();
        assert!(matches!(err, StoreError::BucketUnavailable));
    }

    #[test]
    fn instance_for_is_stable_and_within_range() {
        let registry = BucketRegistry::new(8);
        let msg_ref = MsgRef::from(vec![1, 2, 3]);
        let a = registry.instance_for(&msg_ref);
        let b = registry.instance_for(&msg_ref);
        assert_eq!(a, b);
        assert!(a < 8);
    }
}
