//! Open modes for an array handle

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mode an array is opened in
///
/// `ModifyExclusive` is the only mode that refuses to share a URI with any
/// other open handle; it is required for destructive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    /// Read cells, metadata and enumerations
    Read,
    /// Append new fragments and metadata
    Write,
    /// Delete cells matching a condition
    Delete,
    /// Update cells matching a condition
    Update,
    /// Exclusive access for destructive maintenance
    ModifyExclusive,
}

impl QueryType {
    /// True for [`QueryType::Read`]
    pub fn is_read(&self) -> bool {
        matches!(self, QueryType::Read)
    }

    /// True for every mode that mutates the array
    pub fn is_write(&self) -> bool {
        !self.is_read()
    }

    /// True for [`QueryType::ModifyExclusive`]
    pub fn is_exclusive(&self) -> bool {
        matches!(self, QueryType::ModifyExclusive)
    }

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Read => "READ",
            QueryType::Write => "WRITE",
            QueryType::Delete => "DELETE",
            QueryType::Update => "UPDATE",
            QueryType::ModifyExclusive => "MODIFY_EXCLUSIVE",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_classification() {
        assert!(QueryType::Read.is_read());
        for mode in [
            QueryType::Write,
            QueryType::Delete,
            QueryType::Update,
            QueryType::ModifyExclusive,
        ] {
            assert!(mode.is_write(), "{} should be a write mode", mode);
        }
        assert!(QueryType::ModifyExclusive.is_exclusive());
        assert!(!QueryType::Write.is_exclusive());
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryType::ModifyExclusive.to_string(), "MODIFY_EXCLUSIVE");
    }
}
