use serde::{Deserialize, Serialize};

use crate::ids::MsgRef;

/// A publication as handed to the store by the broker core. QoS is accepted
/// and round-tripped as-is; the store does not validate it against {0,1,2}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_ref: MsgRef,
    pub mountpoint: String,
    pub dup: bool,
    pub qos: u8,
    pub routing_key: Vec<String>,
    pub payload: Vec<u8>,
}

/// A message as returned by `read`, with `persisted` always `true`: it was
/// reconstructed from the backend, not handed in by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub msg_ref: MsgRef,
    pub mountpoint: String,
    pub dup: bool,
    pub qos: u8,
    pub routing_key: Vec<String>,
    pub payload: Vec<u8>,
    pub persisted: bool,
}
