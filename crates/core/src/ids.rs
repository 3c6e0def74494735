use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque content-addressable identifier of a payload, stable across fanout.
///
/// The store never interprets the bits beyond ordering and equality; callers
/// typically supply a content hash or a UUID.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MsgRef(pub Vec<u8>);

impl MsgRef {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for MsgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MsgRef({})", hex::encode(&self.0))
    }
}

impl fmt::Display for MsgRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for MsgRef {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for MsgRef {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

/// A pair `(mountpoint, client_id)` identifying one MQTT client within one
/// tenant. `mountpoint` is the multi-tenant namespace prepended to topic
/// routing; `client_id` is the MQTT client identifier string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId {
    pub mountpoint: String,
    pub client_id: String,
}

impl SubscriberId {
    pub fn new(mountpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            mountpoint: mountpoint.into(),
            client_id: client_id.into(),
        }
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mountpoint, self.client_id)
    }
}

/// Monotonic-ish triple captured at write time, used only to order index
/// entries per subscriber. Field order defines the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs_hi: u32,
    pub secs_lo: u32,
    pub micros: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = since_epoch.as_secs();
        Self {
            secs_hi: (secs >> 32) as u32,
            secs_lo: secs as u32,
            micros: since_epoch.subsec_micros(),
        }
    }

    pub fn to_be_bytes(self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.secs_hi.to_be_bytes());
        out[4..8].copy_from_slice(&self.secs_lo.to_be_bytes());
        out[8..12].copy_from_slice(&self.micros.to_be_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_ref_orders_by_bytes() {
        let a = MsgRef::from(vec![1, 2]);
        let b = MsgRef::from(vec![1, 3]);
        assert!(a < b);
    }

    #[test]
    fn subscriber_id_orders_by_mountpoint_then_client() {
        let a = SubscriberId::new("m", "a");
        let b = SubscriberId::new("m", "b");
        let c = SubscriberId::new("n", "a");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn timestamp_orders_chronologically() {
        let a = Timestamp { secs_hi: 0, secs_lo: 10, micros: 5 };
        let b = Timestamp { secs_hi: 0, secs_lo: 10, micros: 6 };
        assert!(a < b);
    }
}
