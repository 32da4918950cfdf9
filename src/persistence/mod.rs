//! Persistent store for the device identity and the last fix
//!
//! Backends expose a flat byte image. Writes are staged and only become
//! durable on `commit()`. [`TrackerStore`] lays the tracker's records out on
//! top of any backend.

pub mod store;

pub use store::FileStore;

use crate::core::{Coordinate, Fix};
use thiserror::Error;

/// Size of the store image in bytes
pub const STORE_SIZE: usize = 256;

const IDENTITY_ADDR: usize = 0;
const IDENTITY_LEN: usize = 16;
const LATITUDE_ADDR: usize = 16;
const LONGITUDE_ADDR: usize = 24;
const COORDINATE_LEN: usize = 8;
const TIMESTAMP_ADDR: usize = 32;
const TIMESTAMP_LEN: usize = 20;
/// Fraction digits that fit a `u32`
const MAX_FRACTION_DIGITS: usize = 9;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Access of {len} bytes at {addr} is outside the store")]
    OutOfBounds { addr: usize, len: usize },

    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored text at {0} is not valid UTF-8")]
    InvalidText(usize),

    #[error("Store image has {actual} bytes, expected {expected}")]
    WrongSize { expected: usize, actual: usize },

    #[error("Value does not fit its slot: {0}")]
    Overflow(String),
}

/// Byte-addressable persistent storage
pub trait ByteStore: Send {
    /// Read `buf.len()` bytes starting at `addr` from the staged image
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Stage bytes at `addr`
    fn write(&mut self, addr: usize, bytes: &[u8]) -> Result<(), StoreError>;

    /// Make every staged write durable
    fn commit(&mut self) -> Result<(), StoreError>;
}

pub(crate) fn check_bounds(addr: usize, len: usize) -> Result<(), StoreError> {
    match addr.checked_add(len) {
        Some(end) if end <= STORE_SIZE => Ok(()),
        _ => Err(StoreError::OutOfBounds { addr, len }),
    }
}

/// In-memory store (for testing or ephemeral use)
pub struct MemoryStore {
    staged: Vec<u8>,
    committed: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            staged: vec![0; STORE_SIZE],
            committed: vec![0; STORE_SIZE],
        }
    }

    /// The image as of the last commit
    pub fn committed(&self) -> &[u8] {
        &self.committed
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStore for MemoryStore {
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        check_bounds(addr, buf.len())?;
        buf.copy_from_slice(&self.staged[addr..addr + buf.len()]);
        Ok(())
    }

    fn write(&mut self, addr: usize, bytes: &[u8]) -> Result<(), StoreError> {
        check_bounds(addr, bytes.len())?;
        self.staged[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.committed.copy_from_slice(&self.staged);
        Ok(())
    }
}

/// Last fix as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFix {
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub timestamp: String,
}

/// Typed view over a [`ByteStore`]
pub struct TrackerStore {
    backend: Box<dyn ByteStore>,
}

impl TrackerStore {
    pub fn new(backend: impl ByteStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn write_identity(&mut self, identity: &str) -> Result<(), StoreError> {
        self.write_text(IDENTITY_ADDR, IDENTITY_LEN, identity)?;
        self.backend.commit()
    }

    /// Stored identity; `None` when the slot was never written
    pub fn read_identity(&self) -> Result<Option<String>, StoreError> {
        let identity = self.read_text(IDENTITY_ADDR, IDENTITY_LEN)?;
        Ok(Some(identity).filter(|id| !id.is_empty()))
    }

    /// Persist the coordinates and timestamp of `fix`
    pub fn save_last_fix(&mut self, fix: &Fix) -> Result<(), StoreError> {
        let latitude = encode_coordinate(&fix.latitude)?;
        let longitude = encode_coordinate(&fix.longitude)?;
        self.backend.write(LATITUDE_ADDR, &latitude)?;
        self.backend.write(LONGITUDE_ADDR, &longitude)?;
        self.write_text(TIMESTAMP_ADDR, TIMESTAMP_LEN, &fix.timestamp)?;
        self.backend.commit()
    }

    /// Last stored fix; `None` when no coordinates were ever saved
    pub fn load_last_fix(&self) -> Result<Option<StoredFix>, StoreError> {
        let mut latitude = [0u8; COORDINATE_LEN];
        let mut longitude = [0u8; COORDINATE_LEN];
        self.backend.read(LATITUDE_ADDR, &mut latitude)?;
        self.backend.read(LONGITUDE_ADDR, &mut longitude)?;
        if latitude.iter().chain(longitude.iter()).all(|b| *b == 0) {
            return Ok(None);
        }
        Ok(Some(StoredFix {
            latitude: decode_coordinate(&latitude),
            longitude: decode_coordinate(&longitude),
            timestamp: self.read_text(TIMESTAMP_ADDR, TIMESTAMP_LEN)?,
        }))
    }

    fn write_text(&mut self, addr: usize, len: usize, text: &str) -> Result<(), StoreError> {
        if text.len() > len {
            return Err(StoreError::Overflow(text.to_string()));
        }
        let mut slot = vec![0u8; len];
        slot[..text.len()].copy_from_slice(text.as_bytes());
        self.backend.write(addr, &slot)
    }

    fn read_text(&self, addr: usize, len: usize) -> Result<String, StoreError> {
        let mut slot = vec![0u8; len];
        self.backend.read(addr, &mut slot)?;
        let end = slot.iter().position(|b| *b == 0).unwrap_or(len);
        slot.truncate(end);
        String::from_utf8(slot).map_err(|_| StoreError::InvalidText(addr))
    }
}

/// `[sign, whole(2, BE), fraction(4, BE), digit count]`
fn encode_coordinate(coordinate: &Coordinate) -> Result<[u8; COORDINATE_LEN], StoreError> {
    let whole = u16::try_from(coordinate.whole)
        .map_err(|_| StoreError::Overflow(coordinate.to_decimal_string()))?;
    let digits = &coordinate.fraction[..coordinate.fraction.len().min(MAX_FRACTION_DIGITS)];
    let fraction = if digits.is_empty() {
        0
    } else {
        digits
            .parse::<u32>()
            .map_err(|_| StoreError::Overflow(coordinate.to_decimal_string()))?
    };

    let mut bytes = [0u8; COORDINATE_LEN];
    bytes[0] = u8::from(coordinate.negative);
    bytes[1..3].copy_from_slice(&whole.to_be_bytes());
    bytes[3..7].copy_from_slice(&fraction.to_be_bytes());
    bytes[7] = digits.len() as u8;
    Ok(bytes)
}

fn decode_coordinate(bytes: &[u8; COORDINATE_LEN]) -> Coordinate {
    let whole = u16::from_be_bytes([bytes[1], bytes[2]]);
    let fraction = u32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);
    let digits = usize::from(bytes[7]).min(MAX_FRACTION_DIGITS);
    Coordinate {
        negative: bytes[0] != 0,
        whole: u32::from(whole),
        fraction: if digits == 0 {
            String::new()
        } else {
            format!("{:0width$}", fraction, width = digits)
        },
    }
}
