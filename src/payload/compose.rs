//! Outbound batch composition

use crate::core::{CoordinateEntry, CoordinateRingBuffer, Coordinate, Fix};
use crate::payload::PayloadError;
use serde::Serialize;

/// One outbound position record
#[derive(Debug, Serialize)]
struct PositionRecord<'a> {
    imei: &'a str,
    latitude: f64,
    longitude: f64,
}

fn number(coordinate: &Coordinate) -> Result<f64, PayloadError> {
    coordinate
        .to_f64()
        .ok_or_else(|| PayloadError::Coordinate(coordinate.to_decimal_string()))
}

/// Serialize one fix as `{"imei":..,"latitude":..,"longitude":..}`
pub fn compose_record(device_id: &str, fix: &Fix) -> Result<String, PayloadError> {
    let record = PositionRecord {
        imei: device_id,
        latitude: number(&fix.latitude)?,
        longitude: number(&fix.longitude)?,
    };
    Ok(serde_json::to_string(&record)?)
}

/// Compose every buffered fix, oldest first, into a JSON array
///
/// Each entry keeps its own record in `message`.
pub fn compose_batch(
    device_id: &str,
    fixes: &mut CoordinateRingBuffer<CoordinateEntry>,
) -> Result<String, PayloadError> {
    let mut records = Vec::with_capacity(fixes.len());
    for entry in fixes.iter_mut() {
        entry.message = compose_record(device_id, &entry.fix)?;
        entry.ready_to_send = true;
        records.push(entry.message.as_str());
    }
    Ok(format!("[{}]", records.join(",")))
}

/// Re-encode a composed JSON batch as CBOR
pub fn encode_batch(json: &str) -> Result<Vec<u8>, PayloadError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    serde_cbor::to_vec(&value).map_err(PayloadError::Encode)
}
