//! Per-device tracker context - state shared by the pipelines between ticks

use crate::core::config::{RuntimeConfig, TrackerConfig};
use crate::core::fix::Fix;
use crate::core::ring::{CoordinateEntry, CoordinateRingBuffer};
use std::time::Instant;

/// Where the TCP socket is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

/// Shared state for one tracker
///
/// Each pipeline keeps its own step register; everything the pipelines hand
/// to each other lives here.
#[derive(Debug, Clone)]
pub struct TrackerContext {
    /// 15-digit device identity placed in every outbound record
    pub device_id: String,

    pub endpoint: ServerEndpoint,

    pub apn: String,

    pub runtime: RuntimeConfig,

    pub fixes: CoordinateRingBuffer<CoordinateEntry>,

    /// Composed JSON array awaiting transmission
    pub payload: String,

    /// Offset used when logging fix times
    pub utc_offset_hours: i32,

    /// Start of the running cycle; EndGlobal measures the adjustment period from it
    pub cycle_started: Option<Instant>,

    /// Number of cycles completed
    pub cycles: u64,
}

impl TrackerContext {
    /// Create a context from the file configuration
    pub fn new(device_id: impl Into<String>, config: &TrackerConfig) -> Self {
        Self {
            device_id: device_id.into(),
            endpoint: ServerEndpoint {
                host: config.server.host.clone(),
                port: config.server.port,
            },
            apn: config.network.apn.clone(),
            runtime: config.initial_runtime(),
            fixes: CoordinateRingBuffer::new(),
            payload: String::new(),
            utc_offset_hours: config.timing.utc_offset_hours,
            cycle_started: None,
            cycles: 0,
        }
    }

    /// Queue an accepted fix; returns false when the buffer is already full
    pub fn record_fix(&mut self, fix: Fix) -> bool {
        if self.fixes.is_full() {
            return false;
        }
        self.fixes.push(CoordinateEntry::new(fix));
        true
    }

    /// Most recent buffered fix
    pub fn latest_fix(&self) -> Option<&Fix> {
        self.fixes.back().map(|entry| &entry.fix)
    }

    /// Drop everything that belongs to the running cycle only
    pub fn clear_cycle(&mut self) {
        self.payload.clear();
    }
}
