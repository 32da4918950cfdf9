//! Wire payloads exchanged with the collector
//!
//! Outbound batches are composed as JSON records and shipped as CBOR;
//! inbound control messages arrive as CBOR maps.

pub mod compose;
pub mod control;

pub use compose::{compose_batch, compose_record, encode_batch};
pub use control::{decode_control, decode_receive, ControlMessage, PrecisionOption};

use crate::modem::response::ReceiveError;
use thiserror::Error;

/// Error types for payload handling
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CBOR encode failed: {0}")]
    Encode(serde_cbor::Error),

    #[error("CBOR decode failed: {0}")]
    Decode(serde_cbor::Error),

    #[error("coordinate '{0}' is not a number")]
    Coordinate(String),

    #[error("malformed receive reply: {0}")]
    Receive(#[from] ReceiveError),
}
