use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::ids::{MsgRef, SubscriberId, Timestamp};

/// Identifies one `find` operation. `Init` is reserved for the per-bucket
/// recovery scan and is never produced by `ScanId::fresh`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScanId {
    Init,
    Scan(u64),
}

impl ScanId {
    /// A scan-id unique enough that concurrent `find` calls never collide on
    /// the same staging-table key space. Collisions are harmless in
    /// practice (they would only merge two concurrent scans' results for
    /// the same subscriber) but are vanishingly unlikely at 64 bits of
    /// entropy.
    pub fn fresh() -> Self {
        use rand::RngCore;
        ScanId::Scan(rand::rng().next_u64())
    }
}

/// One entry deposited by a bucket's `find_for_subscriber_id` scan (or by
/// recovery, under `ScanId::Init`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StagingEntry {
    pub scan_id: ScanId,
    pub subscriber: SubscriberId,
    pub timestamp: Timestamp,
    pub msg_ref: MsgRef,
}

/// Process-wide, cross-bucket rendezvous for `find` results.
///
/// Sharded into `M` independent `BTreeSet`s, selected by
/// `hash(subscriber_id) mod M`. Every key carries a `scan_id` that is unique
/// per find-op (or the reserved `Init`), so concurrent inserts into the
/// same shard from different buckets never contend on the same key.
#[derive(Clone)]
pub struct StagingTable {
    shards: Arc<Vec<Mutex<BTreeSet<StagingEntry>>>>,
}

impl StagingTable {
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count > 0, "staging table needs at least one shard");
        let shards = (0..shard_count).map(|_| Mutex::new(BTreeSet::new())).collect();
        Self {
            shards: Arc::new(shards),
        }
    }

    fn shard_for(&self, subscriber: &SubscriberId) -> &Mutex<BTreeSet<StagingEntry>> {
        let hash = xxhash_rust::xxh3::xxh3_64(subscriber.to_string().as_bytes());
        let idx = (hash as usize) % self.shards.len();
        &self.shards[idx]
    }

    pub fn insert(
        &self,
        scan_id: ScanId,
        subscriber: SubscriberId,
        timestamp: Timestamp,
        msg_ref: MsgRef,
    ) {
        let shard = self.shard_for(&subscriber);
        let mut shard = shard.lock().expect("staging shard mutex poisoned");
        shard.insert(StagingEntry {
            scan_id,
            subscriber,
            timestamp,
            msg_ref,
        });
    }

    /// Removes and returns every entry under `scan_id` for `subscriber`, in
    /// ascending `(timestamp, msg_ref)` order.
    pub fn take(&self, scan_id: &ScanId, subscriber: &SubscriberId) -> Vec<StagingEntry> {
        let shard = self.shard_for(subscriber);
        let mut shard = shard.lock().expect("staging shard mutex poisoned");
        let matching: Vec<StagingEntry> = shard
            .iter()
            .filter(|e| &e.scan_id == scan_id && &e.subscriber == subscriber)
            .cloned()
            .collect();
        for entry in &matching {
            shard.remove(entry);
        }
        matching
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}
