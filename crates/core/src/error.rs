use thiserror::Error;

/// Errors raised while encoding or decoding on-disk values.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("value uses a schema this version does not recognize")]
    UnrecognizedSchema,

    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}

/// Crate-wide error taxonomy for the message store (see the error handling
/// design: storage I/O, missing payload, orphan index, collaborator
/// absence, and version-shim mismatch).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Payload record missing for the requested `msg_ref`. A normal outcome,
    /// not a corruption.
    #[error("message not found")]
    NotFound,

    /// Payload present but the per-subscriber index entry is missing
    /// (orphan payload, typically left by another subscriber's delete).
    #[error("index entry not found")]
    IdxValNotFound,

    /// `write` was called with a message whose mountpoint does not match
    /// the subscriber's mountpoint.
    #[error("mountpoint mismatch: subscriber is on {subscriber}, message claims {message}")]
    MountpointMismatch { subscriber: String, message: String },

    /// The registry has no bucket for this key (collaborator absence).
    #[error("no bucket owns this key")]
    BucketUnavailable,

    /// The bucket actor has shut down; its channel is closed.
    #[error("bucket is not running")]
    BucketGone,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

impl From<crate::backend::OpenError> for StoreError {
    fn from(err: crate::backend::OpenError) -> Self {
        match err {
            crate::backend::OpenError::Locked => Self::backend(crate::backend::LockRetriesExhausted),
            crate::backend::OpenError::Fatal(err) => err,
        }
    }
}
