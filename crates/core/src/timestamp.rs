//! Millisecond-precision timestamp type
//!
//! Array versions, fragments and metadata are all stamped with the time they
//! were written. Opening an array selects a window `[start, end]` of those
//! stamps, so timestamps must be totally ordered and cheap to copy.
//!
//! ```
//! use tessera_core::Timestamp;
//!
//! let now = Timestamp::now();
//! let pinned = Timestamp::from_millis(1_700_000_000_000);
//! assert!(pinned < now);
//! ```

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Largest representable timestamp; used as an open upper bound
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Current wall-clock time
    ///
    /// Returns the epoch if the system clock reads earlier than 1970.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as u64)
    }

    /// From milliseconds since epoch
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Milliseconds since epoch
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// True if `self` falls inside the closed interval `[start, end]`
    #[inline]
    pub fn within(&self, start: Timestamp, end: Timestamp) -> bool {
        start.0 <= self.0 && self.0 <= end.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::EPOCH
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Timestamp::from_millis(millis)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}
