//! One shard's single-threaded actor: owns a backend handle and a refcount
//! table, and serializes every write/read/delete/find request against them
//! through a bounded channel. See the registry module for how a `msg_ref`
//! is routed to its owning bucket, and the find module for the cross-bucket
//! fan-out that calls `find_for_subscriber`.

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use store_core::keys;
use store_core::{
    Backend, DecrOutcome, IndexValue, Message, OpenError, PayloadValue, RefcountTable, ScanId,
    StagingTable, StoreConfig, StoreError, StoredMessage, SubscriberId, Timestamp,
};
use store_core::MsgRef;

const COMMAND_CHANNEL_CAPACITY: usize = 1024;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Write {
        subscriber: SubscriberId,
        msg: Message,
        reply: Reply<Result<(), StoreError>>,
    },
    Read {
        subscriber: SubscriberId,
        msg_ref: MsgRef,
        reply: Reply<Result<StoredMessage, StoreError>>,
    },
    Delete {
        subscriber: SubscriberId,
        msg_ref: MsgRef,
        reply: Reply<Result<(), StoreError>>,
    },
    FindForSubscriber {
        scan_id: ScanId,
        subscriber: SubscriberId,
        reply: Reply<Result<(), StoreError>>,
    },
    Refcount {
        msg_ref: MsgRef,
        reply: Reply<u64>,
    },
    Stats {
        reply: Reply<BucketStats>,
    },
}

/// Diagnostic snapshot of a bucket's in-memory state, used by `msgstorectl`
/// and tests; never part of the write/read/delete/find data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketStats {
    pub instance_id: usize,
    pub refcount_rows: usize,
}

/// A cheaply cloneable reference to a running bucket actor. Every method
/// sends one request and awaits its reply; the actor processes requests one
/// at a time, in arrival order, which is what makes refcount bookkeeping
/// consistent without a lock.
#[derive(Clone)]
pub struct BucketHandle {
    instance_id: usize,
    tx: mpsc::Sender<Command>,
}

impl BucketHandle {
    pub fn instance_id(&self) -> usize {
        self.instance_id
    }

    pub async fn write(&self, subscriber: SubscriberId, msg: Message) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Write { subscriber, msg, reply }).await?;
        rx.await.map_err(|_| StoreError::BucketGone)?
    }

    pub async fn read(&self, subscriber: SubscriberId, msg_ref: MsgRef) -> Result<StoredMessage, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Read { subscriber, msg_ref, reply }).await?;
        rx.await.map_err(|_| StoreError::BucketGone)?
    }

    pub async fn delete(&self, subscriber: SubscriberId, msg_ref: MsgRef) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Delete { subscriber, msg_ref, reply }).await?;
        rx.await.map_err(|_| StoreError::BucketGone)?
    }

    /// Invoked by the find coordinator during fan-out. Returns
    /// `Err(StoreError::BucketGone)` when the actor has shut down (the
    /// coordinator treats that as collaborator-absence and skips this
    /// bucket silently); any other error is a genuine scan failure and
    /// propagates to the caller.
    pub async fn find_for_subscriber(&self, scan_id: ScanId, subscriber: SubscriberId) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::FindForSubscriber { scan_id, subscriber, reply }).await?;
        rx.await.map_err(|_| StoreError::BucketGone)?
    }

    pub async fn refcount(&self, msg_ref: MsgRef) -> Result<u64, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Refcount { msg_ref, reply }).await?;
        rx.await.map_err(|_| StoreError::BucketGone)
    }

    pub async fn stats(&self) -> Result<BucketStats, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| StoreError::BucketGone)
    }

    async fn send(&self, command: Command) -> Result<(), StoreError> {
        self.tx.send(command).await.map_err(|_| StoreError::BucketGone)
    }
}

/// Owns one backend database and one refcount table; processed by exactly
/// one `run` task for its whole lifetime.
struct Bucket<B: Backend> {
    instance_id: usize,
    backend: B,
    refcounts: RefcountTable,
    staging: StagingTable,
    rx: mpsc::Receiver<Command>,
}

impl<B: Backend> Bucket<B> {
    /// Ensures the bucket's data directory exists, opens its backend
    /// (retrying on lock contention), replays its on-disk index into the
    /// refcount table and the `init` staging scan-id, then spawns the
    /// actor task. The returned handle is only produced after recovery
    /// completes, which is what keeps a partially initialized backend from
    /// ever being registered (see `registry::BucketRegistry`).
    pub async fn spawn(
        instance_id: usize,
        config: StoreConfig,
        staging: StagingTable,
    ) -> Result<BucketHandle, OpenError> {
        let dir = config.bucket_dir(instance_id);
        std::fs::create_dir_all(&dir).map_err(|e| OpenError::Fatal(StoreError::backend(e)))?;

        let write_buffer_size_mb = {
            let mut rng = rand::rng();
            rng.random_range(config.write_buffer_size_min_mb..=config.write_buffer_size_max_mb)
        };

        let backend = open_with_retry::<B>(instance_id, &dir, write_buffer_size_mb, &config).await?;

        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let mut bucket = Bucket {
            instance_id,
            backend,
            refcounts: RefcountTable::new(),
            staging,
            rx,
        };

        let recovered = bucket.setup_index().map_err(OpenError::Fatal)?;
        if recovered > 0 {
            info!(instance_id, count = recovered, "recovered index entries from storage");
        }

        tokio::spawn(bucket.run());

        Ok(BucketHandle { instance_id, tx })
    }

    /// Iterates the whole `idx` key-range once, depositing every decoded
    /// entry into the `init` staging scan-id and incrementing the refcount
    /// table. Returns the number of entries visited.
    fn setup_index(&mut self) -> Result<usize, StoreError> {
        let entries = self
            .backend
            .scan_range(&keys::idx_range_start(), &keys::idx_range_end())?;

        let mut count = 0;
        for (key, value) in entries {
            let Some((subscriber, msg_ref)) = keys::decode_idx_key(&key) else {
                continue;
            };
            let idx_val = IndexValue::decode(&value)?;
            self.staging
                .insert(ScanId::Init, subscriber, idx_val.timestamp, msg_ref.clone());
            self.refcounts.incr(&msg_ref);
            count += 1;
        }
        Ok(count)
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Write { subscriber, msg, reply } => {
                    let _ = reply.send(self.handle_write(subscriber, msg));
                }
                Command::Read { subscriber, msg_ref, reply } => {
                    let _ = reply.send(self.handle_read(&subscriber, &msg_ref));
                }
                Command::Delete { subscriber, msg_ref, reply } => {
                    let _ = reply.send(self.handle_delete(&subscriber, &msg_ref));
                }
                Command::FindForSubscriber { scan_id, subscriber, reply } => {
                    let _ = reply.send(self.handle_find_for_subscriber(scan_id, subscriber));
                }
                Command::Refcount { msg_ref, reply } => {
                    let _ = reply.send(self.refcounts.get(&msg_ref));
                }
                Command::Stats { reply } => {
                    let _ = reply.send(BucketStats {
                        instance_id: self.instance_id,
                        refcount_rows: self.refcounts.len(),
                    });
                }
            }
        }
    }

    fn handle_write(&mut self, subscriber: SubscriberId, msg: Message) -> Result<(), StoreError> {
        if msg.mountpoint != subscriber.mountpoint {
            return Err(StoreError::MountpointMismatch {
                subscriber: subscriber.mountpoint,
                message: msg.mountpoint,
            });
        }

        let msg_key = keys::encode_msg_key(&msg.mountpoint, &msg.msg_ref);
        let idx_key = keys::encode_idx_key(&subscriber, &msg.msg_ref);
        let idx_val = IndexValue {
            timestamp: Timestamp::now(),
            dup: msg.dup,
            qos: msg.qos,
        };
        let idx_bytes = idx_val.encode()?;

        if self.refcounts.incr(&msg.msg_ref) == 1 {
            let payload = PayloadValue {
                routing_key: msg.routing_key,
                payload: msg.payload,
            };
            let payload_bytes = payload.encode()?;
            self.backend
                .put_batch(&[(&msg_key, &payload_bytes), (&idx_key, &idx_bytes)])
        } else {
            self.backend.put(&idx_key, &idx_bytes)
        }
    }

    fn handle_read(&self, subscriber: &SubscriberId, msg_ref: &MsgRef) -> Result<StoredMessage, StoreError> {
        let msg_key = keys::encode_msg_key(&subscriber.mountpoint, msg_ref);
        let Some(payload_bytes) = self.backend.get(&msg_key)? else {
            return Err(StoreError::NotFound);
        };
        let payload = PayloadValue::decode(&payload_bytes)?;

        let idx_key = keys::encode_idx_key(subscriber, msg_ref);
        let Some(idx_bytes) = self.backend.get(&idx_key)? else {
            return Err(StoreError::IdxValNotFound);
        };
        let idx_val = IndexValue::decode(&idx_bytes)?;

        Ok(StoredMessage {
            msg_ref: msg_ref.clone(),
            mountpoint: subscriber.mountpoint.clone(),
            dup: idx_val.dup,
            qos: idx_val.qos,
            routing_key: payload.routing_key,
            payload: payload.payload,
            persisted: true,
        })
    }

    fn handle_delete(&mut self, subscriber: &SubscriberId, msg_ref: &MsgRef) -> Result<(), StoreError> {
        let idx_key = keys::encode_idx_key(subscriber, msg_ref);

        match self.refcounts.decr(msg_ref) {
            DecrOutcome::NotFound => {
                warn!(%msg_ref, "refcount decrement on absent counter, treating delete as a no-op");
                Ok(())
            }
            DecrOutcome::Zero => {
                let msg_key = keys::encode_msg_key(&subscriber.mountpoint, msg_ref);
                self.backend.delete_batch(&[&idx_key, &msg_key])
            }
            DecrOutcome::Positive(_) => self.backend.delete(&idx_key),
        }
    }

    fn handle_find_for_subscriber(&self, scan_id: ScanId, subscriber: SubscriberId) -> Result<(), StoreError> {
        let prefix = keys::encode_idx_prefix(&subscriber);
        let upper = keys::idx_prefix_upper_bound(&prefix);
        let entries = self.backend.scan_range(&prefix, &upper)?;

        for (key, value) in entries {
            let Some((decoded_subscriber, msg_ref)) = keys::decode_idx_key(&key) else {
                continue;
            };
            if decoded_subscriber != subscriber {
                continue;
            }
            let idx_val = IndexValue::decode(&value)?;
            self.staging
                .insert(scan_id.clone(), subscriber.clone(), idx_val.timestamp, msg_ref);
        }
        Ok(())
    }
}

async fn open_with_retry<B: Backend>(
    instance_id: usize,
    dir: &Path,
    write_buffer_size_mb: usize,
    config: &StoreConfig,
) -> Result<B, OpenError> {
    for attempt in 1..=config.open_retries {
        match B::open(dir, write_buffer_size_mb, config) {
            Ok(backend) => return Ok(backend),
            Err(OpenError::Locked) if attempt < config.open_retries => {
                warn!(
                    instance_id,
                    attempt,
                    retries = config.open_retries,
                    "backend lock held by another process, retrying open"
                );
                tokio::time::sleep(Duration::from_millis(config.open_retry_delay_ms)).await;
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("open_retries validated to be >= 1")
}

/// Opens `count` buckets rooted at `config.store_dir`, concurrently, and
/// returns their handles indexed by instance id. Each handle is only
/// produced after that bucket's recovery completes.
pub async fn spawn_buckets<B: Backend>(
    count: usize,
    config: &StoreConfig,
    staging: &StagingTable,
) -> Result<Vec<BucketHandle>, OpenError> {
    let mut tasks = Vec::with_capacity(count);
    for instance_id in 0..count {
        let config = config.clone();
        let staging = staging.clone();
        tasks.push(tokio::spawn(async move {
            Bucket::<B>::spawn(instance_id, config, staging).await
        }));
    }

    let mut handles = Vec::with_capacity(count);
    for task in tasks {
        let handle = task
            .await
            .map_err(|e| OpenError::Fatal(StoreError::backend(JoinPanic(e.to_string()))))??;
        handles.push(handle);
    }
    Ok(handles)
}

#[derive(Debug, thiserror::Error)]
#[error("bucket open task panicked: {0}")]
struct JoinPanic(String);

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use store_core::{IdxEntry, StoreConfig};
    use store_redb::RedbBackend;

    use super::*;

    /// Builds a `Bucket` directly against a real `redb` backend, bypassing
    /// `spawn`/the channel, so handler logic can be exercised synchronously
    /// and mid-state (e.g. a manually introduced orphan index) can be
    /// inspected between calls.
    fn test_bucket(dir: &std::path::Path) -> Bucket<RedbBackend> {
        let config = StoreConfig::default();
        let backend = RedbBackend::open(dir, config.write_buffer_size_min_mb, &config).unwrap();
        let (_tx, rx) = mpsc::channel(1);
        Bucket {
            instance_id: 0,
            backend,
            refcounts: RefcountTable::new(),
            staging: StagingTable::new(1),
            rx,
        }
    }

    fn sub(mountpoint: &str, client_id: &str) -> SubscriberId {
        SubscriberId::new(mountpoint, client_id)
    }

    fn sample_msg(mountpoint: &str, msg_ref: MsgRef) -> Message {
        Message {
            msg_ref,
            mountpoint: mountpoint.to_string(),
            dup: false,
            qos: 1,
            routing_key: vec!["a".into(), "b".into()],
            payload: b"hello".to_vec(),
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut bucket = test_bucket(dir.path());
        let subscriber = sub("m", "a");
        let msg_ref = MsgRef::from(vec![1, 2, 3]);
        let msg = sample_msg("m", msg_ref.clone());

        bucket.handle_write(subscriber.clone(), msg.clone()).unwrap();
        let read_back = bucket.handle_read(&subscriber, &msg_ref).unwrap();

        assert_eq!(read_back.routing_key, msg.routing_key);
        assert_eq!(read_back.payload, msg.payload);
        assert_eq!(read_back.qos, msg.qos);
        assert_eq!(read_back.dup, msg.dup);
        assert!(read_back.persisted);
    }

    #[test]
    fn second_writer_shares_the_payload_and_bumps_refcount() {
        let dir = tempfile::tempdir().unwrap();
        let mut bucket = test_bucket(dir.path());
        let msg_ref = MsgRef::from(vec![9]);

        bucket.handle_write(sub("m", "a"), sample_msg("m", msg_ref.clone())).unwrap();
        bucket.handle_write(sub("m", "b"), sample_msg("m", msg_ref.clone())).unwrap();

        assert_eq!(bucket.refcounts.get(&msg_ref), 2);
    }

    #[test]
    fn delete_drops_payload_only_at_last_reference() {
        let dir = tempfile::tempdir().unwrap();
        let mut bucket = test_bucket(dir.path());
        let msg_ref = MsgRef::from(vec![4]);
        let sub_a = sub("m", "a");
        let sub_b = sub("m", "b");

        bucket.handle_write(sub_a.clone(), sample_msg("m", msg_ref.clone())).unwrap();
        bucket.handle_write(sub_b.clone(), sample_msg("m", msg_ref.clone())).unwrap();

        bucket.handle_delete(&sub_a, &msg_ref).unwrap();
        assert!(bucket.handle_read(&sub_b, &msg_ref).is_ok());

        bucket.handle_delete(&sub_b, &msg_ref).unwrap();
        assert_eq!(bucket.refcounts.get(&msg_ref), 0);
        assert!(matches!(
            bucket.handle_read(&sub_b, &msg_ref).unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[test]
    fn delete_on_absent_refcount_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut bucket = test_bucket(dir.path());
        let msg_ref = MsgRef::from(vec![7]);
        assert!(bucket.handle_delete(&sub("m", "a"), &msg_ref).is_ok());
    }

    #[test]
    fn write_rejects_mismatched_mountpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut bucket = test_bucket(dir.path());
        let subscriber = sub("tenant-a", "client-1");
        let msg = sample_msg("tenant-b", MsgRef::from(vec![1]));

        let err = bucket.handle_write(subscriber, msg).unwrap_err();
        assert!(matches!(err, StoreError::MountpointMismatch { .. }));
    }

    #[test]
    fn read_reports_orphan_index_as_idx_val_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut bucket = test_bucket(dir.path());
        let subscriber = sub("m", "a");
        let msg_ref = MsgRef::from(vec![5]);

        bucket
            .handle_write(subscriber.clone(), sample_msg("m", msg_ref.clone()))
            .unwrap();

        // Simulate a crash that left the payload but dropped the index
        // entry (e.g. another subscriber's delete tore it down first).
        let idx_key = keys::encode_idx_key(&subscriber, &msg_ref);
        bucket.backend.delete(&idx_key).unwrap();

        let err = bucket.handle_read(&subscriber, &msg_ref).unwrap_err();
        assert!(matches!(err, StoreError::IdxValNotFound));
    }

    #[test]
    fn setup_index_rebuilds_refcounts_and_init_staging() {
        let dir = tempfile::tempdir().unwrap();
        let msg_ref = MsgRef::from(vec![3]);

        {
            let mut bucket = test_bucket(dir.path());
            bucket
                .handle_write(sub("m", "a"), sample_msg("m", msg_ref.clone()))
                .unwrap();
        }

        let mut bucket = test_bucket(dir.path());
        let recovered = bucket.setup_index().unwrap();
        assert_eq!(recovered, 1);
        assert_eq!(bucket.refcounts.get(&msg_ref), 1);

        let staged = bucket.staging.take(&ScanId::Init, &sub("m", "a"));
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].msg_ref, msg_ref);
    }

    #[test]
    fn setup_index_on_empty_backend_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut bucket = test_bucket(dir.path());
        assert_eq!(bucket.setup_index().unwrap(), 0);
    }

    #[test]
    fn find_for_subscriber_only_visits_matching_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut bucket = test_bucket(dir.path());
        let target = sub("m", "a");
        let other = sub("m", "ab");

        bucket.handle_write(target.clone(), sample_msg("m", MsgRef::from(vec![1]))).unwrap();
        bucket.handle_write(other.clone(), sample_msg("m", MsgRef::from(vec![2]))).unwrap();

        let scan_id = ScanId::fresh();
        bucket.handle_find_for_subscriber(scan_id.clone(), target.clone()).unwrap();

        let staged = bucket.staging.take(&scan_id, &target);
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].msg_ref, MsgRef::from(vec![1]));
    }

    /// A `Backend` that reports its lock held for a fixed number of opens
    /// before succeeding, letting the retry boundary behaviors be tested
    /// without touching a real file lock. The countdown lives in a
    /// thread-local, not a process-wide static: each `#[tokio::test]`
    /// function body runs on its own test-harness thread, so this is
    /// effectively per-test state with no cross-test interference.
    struct FlakyLockBackend;

    thread_local! {
        static LOCK_FAILURES_REMAINING: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
    }

    impl Backend for FlakyLockBackend {
        fn open(_dir: &Path, _write_buffer_size_mb: usize, _config: &StoreConfig) -> Result<Self, OpenError> {
            let remaining = LOCK_FAILURES_REMAINING.with(|c| c.get());
            if remaining > 0 {
                LOCK_FAILURES_REMAINING.with(|c| c.set(remaining - 1));
                return Err(OpenError::Locked);
            }
            Ok(Self)
        }

        fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        fn put(&self, _key: &[u8], _value: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }

        fn put_batch(&self, _entries: &[(&[u8], &[u8])]) -> Result<(), StoreError> {
            Ok(())
        }

        fn delete(&self, _key: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }

        fn delete_batch(&self, _keys: &[&[u8]]) -> Result<(), StoreError> {
            Ok(())
        }

        fn scan_range(&self, _start: &[u8], _end: &[u8]) -> Result<Vec<IdxEntry>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn open_succeeds_after_retries_under_the_budget() {
        let mut config = StoreConfig::default();
        config.open_retries = 5;
        config.open_retry_delay_ms = 0;
        LOCK_FAILURES_REMAINING.with(|c| c.set((config.open_retries - 1) as usize));

        let result = open_with_retry::<FlakyLockBackend>(0, &PathBuf::from("unused"), 30, &config).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn open_fails_when_lock_never_clears() {
        let mut config = StoreConfig::default();
        config.open_retries = 5;
        config.open_retry_delay_ms = 0;
        LOCK_FAILURES_REMAINING.with(|c| c.set(config.open_retries as usize));

        let result = open_with_retry::<FlakyLockBackend>(0, &PathBuf::from("unused"), 30, &config).await;
        assert!(matches!(result, Err(OpenError::Locked)));
    }
}
