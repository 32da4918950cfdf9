//! GNSS fix model and status-line parsing
//!
//! The receiver answers `AT+CGNSINF` with one comma separated record:
//!
//! ```text
//! +CGNSINF: <run>,<fix>,<utc yyyyMMddhhmmss.sss>,<lat>,<lon>,<alt>,<speed>,<course>,<mode>,,<hdop>,...
//! ```
//!
//! Fields are picked by position. Coordinates keep their integer part and
//! their fractional digits apart so nothing is rounded before the payload is
//! composed.

use crate::core::config::PrecisionFilter;
use chrono::NaiveDateTime;
use thiserror::Error;

const RECORD_PREFIX: &str = "+CGNSINF:";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%.f";

const FIELD_RUN: usize = 0;
const FIELD_FIX: usize = 1;
const FIELD_TIMESTAMP: usize = 2;
const FIELD_LATITUDE: usize = 3;
const FIELD_LONGITUDE: usize = 4;
const FIELD_ALTITUDE: usize = 5;
const FIELD_HDOP: usize = 10;

/// Reasons a status line could not be turned into a fix
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixError {
    #[error("no +CGNSINF record in reply")]
    MissingRecord,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed {field}: '{value}'")]
    Malformed { field: &'static str, value: String },
}

/// Decimal degrees kept as text-exact parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coordinate {
    pub negative: bool,
    pub whole: u32,
    /// Digits after the decimal point, as received
    pub fraction: String,
}

impl Coordinate {
    pub fn new(whole: i32, fraction: impl Into<String>) -> Self {
        Self {
            negative: whole < 0,
            whole: whole.unsigned_abs(),
            fraction: fraction.into(),
        }
    }

    /// Parse a `[-]ddd.dddddd` field
    pub fn parse(text: &str, field: &'static str) -> Result<Self, FixError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FixError::MissingField(field));
        }
        let malformed = || FixError::Malformed {
            field,
            value: text.to_string(),
        };

        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        if whole.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let whole = whole.parse::<u32>().map_err(|_| malformed())?;

        Ok(Self {
            negative,
            whole,
            fraction: fraction.to_string(),
        })
    }

    /// Either part carries a nonzero digit
    pub fn is_nonzero(&self) -> bool {
        self.whole != 0 || self.fraction.bytes().any(|b| b != b'0')
    }

    /// Full decimal text, e.g. `47.123`
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.negative { "-" } else { "" };
        if self.fraction.is_empty() {
            format!("{}{}", sign, self.whole)
        } else {
            format!("{}{}.{}", sign, self.whole, self.fraction)
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        self.to_decimal_string().parse().ok()
    }
}

/// One GNSS-derived position sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fix {
    pub run_status: bool,
    pub fix_status: bool,
    /// Raw UTC timestamp as sent by the receiver
    pub timestamp: String,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub altitude: Option<f32>,
    pub hdop: Option<f32>,
    pub valid: bool,
}

impl Fix {
    /// Build a fix from coordinates alone (status flags set, not yet assessed)
    pub fn from_coordinates(latitude: Coordinate, longitude: Coordinate) -> Self {
        Self {
            run_status: true,
            fix_status: true,
            latitude,
            longitude,
            ..Self::default()
        }
    }

    /// Parse the last `+CGNSINF:` record found in a modem reply
    pub fn parse(reply: &str) -> Result<Self, FixError> {
        let record = reply
            .lines()
            .rev()
            .find_map(|line| line.trim().strip_prefix(RECORD_PREFIX))
            .ok_or(FixError::MissingRecord)?;

        let fields: Vec<&str> = record.trim().split(',').map(str::trim).collect();
        let field = |index: usize, name: &'static str| {
            fields
                .get(index)
                .copied()
                .ok_or(FixError::MissingField(name))
        };

        let latitude = Coordinate::parse(field(FIELD_LATITUDE, "latitude")?, "latitude")?;
        let longitude = Coordinate::parse(field(FIELD_LONGITUDE, "longitude")?, "longitude")?;

        Ok(Self {
            run_status: field(FIELD_RUN, "run status")? == "1",
            fix_status: field(FIELD_FIX, "fix status")? == "1",
            timestamp: field(FIELD_TIMESTAMP, "timestamp")?.to_string(),
            latitude,
            longitude,
            altitude: fields.get(FIELD_ALTITUDE).and_then(|v| v.parse().ok()),
            hdop: fields.get(FIELD_HDOP).and_then(|v| v.parse().ok()),
            valid: false,
        })
    }

    /// Apply the validity heuristic and record the verdict
    ///
    /// There is no checksum to rely on: a fix counts when both coordinates
    /// carry a nonzero digit and the precision filter (if active) accepts its
    /// HDOP.
    pub fn assess(&mut self, filter: &PrecisionFilter) -> bool {
        self.valid = self.latitude.is_nonzero()
            && self.longitude.is_nonzero()
            && filter.accepts(self.hdop);
        self.valid
    }

    pub fn utc_time(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }

    /// Render the fix time shifted by `offset_hours`, as `YYYY/MM/DD hh:mm:ss`
    pub fn local_time(&self, offset_hours: i32) -> Option<String> {
        let utc = self.utc_time()?;
        let local = utc.checked_add_signed(chrono::Duration::hours(i64::from(offset_hours)))?;
        Some(local.format("%Y/%m/%d %H:%M:%S").to_string())
    }
}
