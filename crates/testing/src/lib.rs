//! Fixtures and harness helpers shared across the store crates' test suites.

use rand::Rng;
use store_core::{Message, MsgRef, StoreConfig, SubscriberId};

#[cfg(feature = "backend")]
pub mod backend;

/// A fresh `StoreConfig` rooted at a caller-owned temp directory, with small
/// bucket/staging counts suitable for fast tests.
pub fn test_config(root: &std::path::Path) -> StoreConfig {
    StoreConfig {
        store_dir: root.to_path_buf(),
        bucket_count: 4,
        staging_table_count: 4,
        ..StoreConfig::default()
    }
}

/// A random content-addressable-looking `msg_ref`.
pub fn random_msg_ref() -> MsgRef {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    MsgRef::from(bytes.to_vec())
}

/// Builds a sample message for `subscriber`, with a freshly generated
/// `msg_ref` unless `msg_ref` is supplied.
pub fn sample_message(subscriber: &SubscriberId, msg_ref: Option<MsgRef>) -> Message {
    Message {
        msg_ref: msg_ref.unwrap_or_else(random_msg_ref),
        mountpoint: subscriber.mountpoint.clone(),
        dup: false,
        qos: 1,
        routing_key: vec!["a".to_string(), "b".to_string()],
        payload: b"hello world".to_vec(),
    }
}
