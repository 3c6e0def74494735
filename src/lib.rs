//! Persistent offline message store for a distributed MQTT broker.
//!
//! Durably records in-flight publications (QoS>0) for subscribers that are
//! disconnected or slow, exposes them again at subscriber reconnect, and
//! deduplicates identical payloads so one message fanned out to many
//! subscribers is stored once.
//!
//! The store is a set of independent buckets (`bucket`), each owning one
//! embedded key-value backend and one in-memory refcount table. A
//! `registry` maps any `msg_ref` to its owning bucket by a stable hash.
//! `find` fans a subscriber-reconnect query out across every bucket and
//! collects results through a shared staging table. See `SPEC_FULL.md` in
//! the repository root for the full design this crate implements.

pub mod bucket;
pub mod error;
pub mod find;
pub mod registry;
pub mod settings;
pub mod store;

pub use store_core::{
    Backend, CodecError, FindMode, LockRetriesExhausted, Message, MsgRef, OpenError, StoreConfig,
    StoreError, StoredMessage, SubscriberId, Timestamp,
};

pub use bucket::{BucketHandle, BucketStats};
pub use error::Error;
pub use registry::BucketRegistry;
pub use store::{BucketState, MessageStore};

/// The store configured with the only backend this crate ships: the
/// `redb`-backed embedded key-value database.
pub type RedbMessageStore = MessageStore<store_redb::RedbBackend>;
