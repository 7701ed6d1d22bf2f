//! Record definitions
//!
//! A record is an opaque value plus the absolute offset the log assigned it.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single entry in the log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Payload bytes
    pub value: Vec<u8>,

    /// Absolute offset, set by the log on append
    pub offset: u64,
}

impl Record {
    /// Create an unassigned record
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            offset: 0,
        }
    }

    /// Encode to the bytes stored inside a store frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a frame payload
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
