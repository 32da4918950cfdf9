//! Positional parsing of modem replies

use thiserror::Error;

const RECEIVE_PREFIX: &[u8] = b"+CARECV:";

/// Malformed `+CARECV` record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("receive record has no length")]
    MissingLength,

    #[error("receive record announced {expected} bytes but carried {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Comma separated field `index` of the last line containing `anchor`
///
/// Text between the anchor and the first field (`:` and spaces) is skipped
/// and surrounding quotes are dropped, so
/// `select_field("+APP PDP: 0,ACTIVE", "PDP", 1)` gives `ACTIVE`.
pub fn select_field(reply: &str, anchor: &str, index: usize) -> Option<String> {
    let line = reply.lines().rev().find(|line| line.contains(anchor))?;
    let start = line.find(anchor)? + anchor.len();
    let rest = line[start..].trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    rest.split(',')
        .nth(index)
        .map(|field| field.trim().trim_matches('"').to_string())
}

/// 15-digit IMEI printed on its own line by `AT+GSN`
pub fn parse_imei(reply: &str) -> Option<String> {
    reply
        .lines()
        .map(str::trim)
        .find(|line| line.len() == 15 && line.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
}

/// Address reported by `AT+CNACT?` for PDP `context`
pub fn pdp_address(reply: &str, context: u8) -> Option<String> {
    let prefix = format!("+CNACT: {},", context);
    let line = reply.lines().find(|line| line.trim().starts_with(&prefix))?;
    select_field(line, "+CNACT:", 2)
}

/// `(rssi, ber)` from `+CSQ: <rssi>,<ber>`
pub fn parse_signal_quality(reply: &str) -> Option<(u8, u8)> {
    let rssi = select_field(reply, "+CSQ", 0)?.parse().ok()?;
    let ber = select_field(reply, "+CSQ", 1)?.parse().ok()?;
    Some((rssi, ber))
}

/// Payload bytes of the last `+CARECV: <len>,<bytes>` record
///
/// Works on raw bytes since the payload is binary. A zero length means
/// nothing was pending.
pub fn parse_receive(reply: &[u8]) -> Result<Option<Vec<u8>>, ReceiveError> {
    let start = match find_last(reply, RECEIVE_PREFIX) {
        Some(pos) => pos + RECEIVE_PREFIX.len(),
        None => return Ok(None),
    };
    let rest = &reply[start..];
    let rest = &rest[rest.iter().take_while(|b| **b == b' ').count()..];

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    let expected: usize = std::str::from_utf8(&rest[..digits])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ReceiveError::MissingLength)?;
    if expected == 0 {
        return Ok(None);
    }

    let data = match rest[digits..].strip_prefix(b",") {
        Some(data) => data,
        None => return Err(ReceiveError::Truncated { expected, actual: 0 }),
    };
    if data.len() < expected {
        return Err(ReceiveError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    Ok(Some(data[..expected].to_vec()))
}

fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
