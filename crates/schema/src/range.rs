//! Typed closed intervals over a dimension's coordinate space

use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_core::Datatype;

/// Closed interval `[low, high]`
///
/// The variant is chosen by the dimension's datatype family. Ranges of
/// different variants never compare; operations across variants report
/// a mismatch instead of guessing a conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Range {
    /// Signed integer coordinates
    Int {
        /// Inclusive lower bound
        low: i64,
        /// Inclusive upper bound
        high: i64,
    },
    /// Unsigned integer coordinates
    UInt {
        /// Inclusive lower bound
        low: u64,
        /// Inclusive upper bound
        high: u64,
    },
    /// Floating point coordinates
    Float {
        /// Inclusive lower bound
        low: f64,
        /// Inclusive upper bound
        high: f64,
    },
    /// String coordinates, compared bytewise
    Str {
        /// Inclusive lower bound
        low: String,
        /// Inclusive upper bound
        high: String,
    },
}

impl Range {
    /// Signed integer range
    pub fn int(low: i64, high: i64) -> Self {
        Range::Int { low, high }
    }

    /// Unsigned integer range
    pub fn uint(low: u64, high: u64) -> Self {
        Range::UInt { low, high }
    }

    /// Floating point range
    pub fn float(low: f64, high: f64) -> Self {
        Range::Float { low, high }
    }

    /// String range
    pub fn string(low: impl Into<String>, high: impl Into<String>) -> Self {
        Range::Str {
            low: low.into(),
            high: high.into(),
        }
    }

    /// `low <= high`; false for NaN float bounds
    pub fn is_valid(&self) -> bool {
        match self {
            Range::Int { low, high } => low <= high,
            Range::UInt { low, high } => low <= high,
            Range::Float { low, high } => low <= high,
            Range::Str { low, high } => low <= high,
        }
    }

    /// True if this range's variant is the one used for `datatype`
    pub fn matches_datatype(&self, datatype: Datatype) -> bool {
        match self {
            Range::Int { .. } => datatype.is_signed_integer(),
            Range::UInt { .. } => datatype.is_unsigned_integer(),
            Range::Float { .. } => datatype.is_float(),
            Range::Str { .. } => datatype.is_string(),
        }
    }

    /// Whether `other` lies entirely within `self`
    ///
    /// `None` if the two ranges are of different variants.
    pub fn covers(&self, other: &Range) -> Option<bool> {
        let covered = match (self, other) {
            (Range::Int { low, high }, Range::Int { low: l, high: h }) => low <= l && h <= high,
            (Range::UInt { low, high }, Range::UInt { low: l, high: h }) => low <= l && h <= high,
            (Range::Float { low, high }, Range::Float { low: l, high: h }) => low <= l && h <= high,
            (Range::Str { low, high }, Range::Str { low: l, high: h }) => low <= l && h <= high,
            _ => return None,
        };
        Some(covered)
    }

    /// Grow `self` to the smallest range covering both
    ///
    /// Returns false and leaves `self` untouched on a variant mismatch.
    pub fn expand_to(&mut self, other: &Range) -> bool {
        match (self, other) {
            (Range::Int { low, high }, Range::Int { low: l, high: h }) => {
                *low = (*low).min(*l);
                *high = (*high).max(*h);
            }
            (Range::UInt { low, high }, Range::UInt { low: l, high: h }) => {
                *low = (*low).min(*l);
                *high = (*high).max(*h);
            }
            (Range::Float { low, high }, Range::Float { low: l, high: h }) => {
                *low = low.min(*l);
                *high = high.max(*h);
            }
            (Range::Str { low, high }, Range::Str { low: l, high: h }) => {
                if *l < *low {
                    *low = l.clone();
                }
                if *h > *high {
                    *high = h.clone();
                }
            }
            _ => return false,
        }
        true
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Range::Int { low, high } => write!(f, "[{}, {}]", low, high),
            Range::UInt { low, high } => write!(f, "[{}, {}]", low, high),
            Range::Float { low, high } => write!(f, "[{}, {}]", low, high),
            Range::Str { low, high } => write!(f, "[{:?}, {:?}]", low, high),
        }
    }
}
