//! On-disk value encoding with forward/backward-compatible version shims.
//!
//! Two value families are defined: the per-subscriber index value
//! (`{timestamp, dup, qos}`) and the payload value (`{routing_key,
//! payload}`). Both are written to disk in their untagged "current" form.
//! The decoder additionally accepts a tagged future form carrying a
//! `version > 0` and extra trailing fields, extracting only the fields this
//! version understands. This version never writes the tagged form: a newer
//! writer producing tagged records is read correctly here, but writes from
//! here are always downgraded to plain current-version records.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::ids::Timestamp;

/// Wire representation of the index value. The enum discriminant doubles as
/// the tag: variant 0 is the untagged current form, variant 1 is the
/// future-compatible tagged form. A future writer that adds fields appends
/// them to `extra` and bumps `version`; this reader ignores `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum IndexValueWire {
    Current {
        timestamp: Timestamp,
        dup: bool,
        qos: u8,
    },
    Tagged {
        version: u32,
        timestamp: Timestamp,
        dup: bool,
        qos: u8,
        extra: Vec<u8>,
    },
}

/// In-memory representation of a subscriber index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexValue {
    pub timestamp: Timestamp,
    pub dup: bool,
    pub qos: u8,
}

impl IndexValue {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let wire = IndexValueWire::Current {
            timestamp: self.timestamp,
            dup: self.dup,
            qos: self.qos,
        };
        Ok(bincode::serialize(&wire)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let wire: IndexValueWire = bincode::deserialize(bytes)?;
        match wire {
            IndexValueWire::Current { timestamp, dup, qos } => {
                Ok(Self { timestamp, dup, qos })
            }
            IndexValueWire::Tagged {
                version,
                timestamp,
                dup,
                qos,
                ..
            } => {
                if version == 0 {
                    return Err(CodecError::UnrecognizedSchema);
                }
                Ok(Self { timestamp, dup, qos })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum PayloadValueWire {
    Current {
        routing_key: Vec<String>,
        payload: Vec<u8>,
    },
    Tagged {
        version: u32,
        routing_key: Vec<String>,
        payload: Vec<u8>,
        extra: Vec<u8>,
    },
}

/// In-memory representation of a payload record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadValue {
    pub routing_key: Vec<String>,
    pub payload: Vec<u8>,
}

impl PayloadValue {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let wire = PayloadValueWire::Current {
            routing_key: self.routing_key.clone(),
            payload: self.payload.clone(),
        };
        Ok(bincode::serialize(&wire)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let wire: PayloadValueWire = bincode::deserialize(bytes)?;
        match wire {
            PayloadValueWire::Current { routing_key, payload } => {
                Ok(Self { routing_key, payload })
            }
            PayloadValueWire::Tagged {
                version,
                routing_key,
                payload,
                ..
            } => {
                if version == 0 {
                    return Err(CodecError::UnrecognizedSchema);
                }
                Ok(Self { routing_key, payload })
            }
        }
    }
}
