//! Nanosecond-granularity timestamps.
//!
//! Every stored tag is temporal: `"<unix_nanos>|<tag_body>"`. This type is
//! the single source of truth for parsing/formatting that prefix.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A point in time expressed as nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Capture the current wall-clock time.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_nanos();
        Timestamp(nanos as u64)
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(nanos: u64) -> Self {
        Timestamp(nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_nonzero_and_monotonic_enough() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(a.as_nanos() > 0);
        assert!(b >= a);
    }

    #[test]
    fn from_nanos_roundtrips() {
        let ts = Timestamp::from_nanos(1_700_000_000_000_000_000);
        assert_eq!(ts.as_nanos(), 1_700_000_000_000_000_000);
        assert_eq!(ts.to_string(), "1700000000000000000");
    }
}
