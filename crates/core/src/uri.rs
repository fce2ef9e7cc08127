//! Array location

use serde::{Deserialize, Serialize};
use std::fmt;

/// URI scheme served by a remote service rather than local storage
pub const REMOTE_SCHEME: &str = "rest://";

/// Location of an array
///
/// Opaque apart from the scheme check in [`ArrayUri::is_remote`]. Emptiness is
/// not rejected here; the consistency controller refuses empty URIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArrayUri(String);

impl ArrayUri {
    /// Wrap a URI string
    pub fn new(uri: impl Into<String>) -> Self {
        ArrayUri(uri.into())
    }

    /// The URI as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the URI is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if the array is served by a remote service
    pub fn is_remote(&self) -> bool {
        self.0.starts_with(REMOTE_SCHEME)
    }
}

impl fmt::Display for ArrayUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArrayUri {
    fn from(s: &str) -> Self {
        ArrayUri::new(s)
    }
}

impl From<String> for ArrayUri {
    fn from(s: String) -> Self {
        ArrayUri(s)
    }
}

impl AsRef<str> for ArrayUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
