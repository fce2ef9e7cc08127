//! Size limits enforced by [`crate::ArraySchema::check`]

use serde::{Deserialize, Serialize};

/// Default cap on a single enumeration's buffers (10 MiB)
pub const DEFAULT_ENUMERATION_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Default cap on all of a schema's loaded enumerations together (50 MiB)
pub const DEFAULT_ENUMERATION_MAX_TOTAL_SIZE: u64 = 50 * 1024 * 1024;

/// Enumeration size limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerationLimits {
    /// Maximum data plus offsets bytes of one enumeration
    pub max_size: u64,
    /// Maximum data plus offsets bytes across all loaded enumerations
    pub max_total_size: u64,
}

impl Default for EnumerationLimits {
    fn default() -> Self {
        EnumerationLimits {
            max_size: DEFAULT_ENUMERATION_MAX_SIZE,
            max_total_size: DEFAULT_ENUMERATION_MAX_TOTAL_SIZE,
        }
    }
}
