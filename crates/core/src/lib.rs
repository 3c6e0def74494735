//! Domain types and backend-agnostic machinery shared by every store crate.
//!
//! Glossary:
//!  - `bucket`: one shard owning a backend database and a refcount table.
//!  - `msg_ref`: opaque content-addressable identifier of a payload.
//!  - `staging table`: cross-bucket rendezvous for `find` results.

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod keys;
pub mod message;
pub mod refcount;
pub mod staging;

pub use backend::{Backend, IdxEntry, LockRetriesExhausted, OpenError};
pub use codec::{IndexValue, PayloadValue};
pub use config::StoreConfig;
pub use error::{CodecError, StoreError};
pub use ids::{MsgRef, SubscriberId, Timestamp};
pub use message::{Message, StoredMessage};
pub use refcount::{DecrOutcome, RefcountTable};
pub use staging::{ScanId, StagingEntry, StagingTable};

/// Find-mode argument to the find coordinator (see `FindMode` at the root crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindMode {
    /// Fast path at first connect: harvest the recovery-populated `init` scan
    /// before falling back to a full fan-out.
    QueueInit,
    Other,
}
