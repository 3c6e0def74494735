//! `MessageStore`: the facade the broker core talks to. Wires together the
//! bucket registry, the shared staging table and the per-bucket actors
//! behind the six operations of the programmatic surface.

use std::marker::PhantomData;
use std::sync::Arc;

use store_core::{Backend, FindMode, Message, MsgRef, StagingTable, StoreConfig, StoreError, StoredMessage, SubscriberId};

use crate::bucket::spawn_buckets;
use crate::find;
use crate::registry::BucketRegistry;

/// Mirrors `get_state(bucket)`: a bucket is `Initialized` once its recovery
/// has completed and it has registered itself; until then (or if the
/// instance id is out of range) it is `Initializing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    Initializing,
    Initialized,
}

/// The persistent offline message store, generic over its backend so the
/// `redb`-backed implementation can be swapped for a test fake without
/// touching this module. See `vmq_offline_store::RedbMessageStore` for the
/// concrete alias most callers want.
pub struct MessageStore<B: Backend> {
    config: StoreConfig,
    registry: Arc<BucketRegistry>,
    staging: StagingTable,
    _backend: PhantomData<B>,
}

impl<B: Backend> MessageStore<B> {
    /// Validates `config`, then opens every bucket concurrently. A bucket
    /// is only considered open once its recovery has finished and it has
    /// registered itself; this call does not return until all of them have.
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;

        let staging = StagingTable::new(config.staging_table_count);
        let registry = Arc::new(BucketRegistry::new(config.bucket_count));

        let handles = spawn_buckets::<B>(config.bucket_count, &config, &staging).await?;
        for handle in handles {
            registry.register_bucket(handle.instance_id(), handle);
        }

        Ok(Self {
            config,
            registry,
            staging,
            _backend: PhantomData,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// `write(subscriber_id, msg)`. Routes by `msg.msg_ref` to the owning
    /// bucket.
    pub async fn write(&self, subscriber: SubscriberId, msg: Message) -> Result<(), StoreError> {
        let bucket = self.registry.get_bucket(&msg.msg_ref)?;
        bucket.write(subscriber, msg).await
    }

    /// `read(subscriber_id, msg_ref)`.
    pub async fn read(&self, subscriber: SubscriberId, msg_ref: MsgRef) -> Result<StoredMessage, StoreError> {
        let bucket = self.registry.get_bucket(&msg_ref)?;
        bucket.read(subscriber, msg_ref).await
    }

    /// `delete(subscriber_id, msg_ref)`. Idempotent: a second delete after
    /// the last reference was already dropped is a no-op, not an error.
    pub async fn delete(&self, subscriber: SubscriberId, msg_ref: MsgRef) -> Result<(), StoreError> {
        let bucket = self.registry.get_bucket(&msg_ref)?;
        bucket.delete(subscriber, msg_ref).await
    }

    /// `find(subscriber_id, mode)`.
    pub async fn find(&self, subscriber: SubscriberId, mode: FindMode) -> Result<Vec<MsgRef>, StoreError> {
        find::find(&self.registry, &self.staging, &subscriber, mode).await
    }

    /// `refcount(msg_ref)`.
    pub async fn refcount(&self, msg_ref: &MsgRef) -> Result<u64, StoreError> {
        let bucket = self.registry.get_bucket(msg_ref)?;
        bucket.refcount(msg_ref.clone()).await
    }

    /// `get_state(bucket)`.
    pub fn bucket_state(&self, instance_id: usize) -> BucketState {
        if self.registry.is_initialized(instance_id) {
            BucketState::Initialized
        } else {
            BucketState::Initializing
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.registry.bucket_count()
    }

    /// Diagnostic per-bucket stats, used by `msgstorectl` and tests; not
    /// part of the programmatic surface proper.
    pub async fn bucket_stats(&self) -> Vec<crate::bucket::BucketStats> {
        let mut out = Vec::new();
        for bucket in self.registry.get_buckets() {
            if let Ok(stats) = bucket.stats().await {
                out.push(stats);
            }
        }
        out.sort_by_key(|s| s.instance_id);
        out
    }
}
