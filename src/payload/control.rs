//! Inbound control messages

use crate::modem::response::parse_receive;
use crate::payload::PayloadError;
use serde::{Deserialize, Serialize};

/// Options the collector can push down; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Adjustment period in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periode: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<PrecisionOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionOption {
    /// HDOP threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valeur: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl ControlMessage {
    pub fn is_empty(&self) -> bool {
        self.periode.is_none() && self.start.is_none() && self.precision.is_none()
    }
}

/// Decode a CBOR control map
pub fn decode_control(bytes: &[u8]) -> Result<ControlMessage, PayloadError> {
    serde_cbor::from_slice(bytes).map_err(PayloadError::Decode)
}

/// Decode the control message carried by a `+CARECV` reply, if any
pub fn decode_receive(reply: &[u8]) -> Result<Option<ControlMessage>, PayloadError> {
    match parse_receive(reply)? {
        Some(bytes) => decode_control(&bytes).map(Some),
        None => Ok(None),
    }
}
