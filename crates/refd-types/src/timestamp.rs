use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Server-side modification timestamp: Unix seconds plus a millisecond
/// component, carried separately to mirror the storage columns
/// (`serverDateModified` + `serverDateModifiedMS`).
///
/// Used as the change-tracking cursor for sync. Sub-second precision matters
/// when multiple writes land within the same second, so a cursor parsed
/// without a fractional part is normalized to `.0` before comparison.
///
/// Ordering: seconds, then milliseconds (total order).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerTimestamp {
    /// Seconds since the Unix epoch.
    pub unix: i64,
    /// Millisecond component, `0..=999`.
    pub ms: u16,
}

impl ServerTimestamp {
    /// Create a timestamp from explicit components.
    pub fn new(unix: i64, ms: u16) -> Self {
        Self { unix, ms }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let now = chrono::Utc::now();
        Self {
            unix: now.timestamp(),
            ms: now.timestamp_subsec_millis().min(999) as u16,
        }
    }

    /// The zero timestamp (epoch).
    pub const fn zero() -> Self {
        Self { unix: 0, ms: 0 }
    }

    /// Parse a sync cursor of the form `"1234567890"` or `"1234567890.123"`.
    ///
    /// A missing or empty fractional part is normalized to `.0`.
    pub fn parse_cursor(s: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidTimestamp(s.to_string());
        let (secs, frac) = match s.split_once('.') {
            Some((secs, frac)) => (secs, frac),
            None => (s, ""),
        };
        let unix: i64 = secs.parse().map_err(|_| invalid())?;
        let ms: u16 = if frac.is_empty() {
            0
        } else {
            if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            frac.parse().map_err(|_| invalid())?
        };
        if ms > 999 {
            return Err(invalid());
        }
        Ok(Self { unix, ms })
    }
}

impl PartialOrd for ServerTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServerTimestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.unix.cmp(&other.unix).then(self.ms.cmp(&other.ms))
    }
}

impl fmt::Debug for ServerTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerTimestamp({}.{})", self.unix, self.ms)
    }
}

impl fmt::Display for ServerTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unix, self.ms)
    }
}
