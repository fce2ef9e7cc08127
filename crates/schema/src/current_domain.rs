//! Current domain: the writable sub-region of the outer domain
//!
//! An array may start with a small current domain and grow it over time
//! through schema evolution. It can never shrink and never leave the outer
//! domain fixed at creation.

use crate::dimension::Domain;
use crate::range::Range;
use serde::{Deserialize, Serialize};
use tessera_core::{TesseraError, TesseraResult};

/// Per-dimension ranges, or nothing at all
///
/// The empty current domain (no ranges) means the whole outer domain is
/// writable. A non-empty one must eventually carry a range for every
/// dimension; unset slots are rejected by [`CurrentDomain::check`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentDomain {
    ranges: Vec<Option<Range>>,
}

impl CurrentDomain {
    /// The empty current domain
    pub fn empty() -> Self {
        CurrentDomain::default()
    }

    /// A rectangle for `dim_num` dimensions with every slot unset
    pub fn with_dim_num(dim_num: usize) -> Self {
        CurrentDomain {
            ranges: vec![None; dim_num],
        }
    }

    /// Build directly from one range per dimension
    pub fn from_ranges(ranges: Vec<Range>) -> Self {
        CurrentDomain {
            ranges: ranges.into_iter().map(Some).collect(),
        }
    }

    /// True if no rectangle is set
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of dimension slots
    pub fn dim_num(&self) -> usize {
        self.ranges.len()
    }

    /// Range for dimension `idx`
    pub fn range(&self, idx: usize) -> Option<&Range> {
        self.ranges.get(idx).and_then(Option::as_ref)
    }

    /// Set the range for dimension `idx`
    pub fn set_range(&mut self, idx: usize, range: Range) -> TesseraResult<()> {
        let len = self.ranges.len();
        let slot = self.ranges.get_mut(idx).ok_or_else(|| {
            TesseraError::validation(format!(
                "Invalid dimension index {} for a current domain of {} dimensions.",
                idx, len
            ))
        })?;
        *slot = Some(range);
        Ok(())
    }

    /// Set the range for the dimension named `name` in `domain`
    pub fn set_range_by_name(
        &mut self,
        domain: &Domain,
        name: &str,
        range: Range,
    ) -> TesseraResult<()> {
        let idx = domain.dimension_index(name).ok_or_else(|| {
            TesseraError::validation(format!("Unknown dimension '{}'.", name))
        })?;
        self.set_range(idx, range)
    }

    /// Validate against the outer domain
    pub fn check(&self, domain: &Domain) -> TesseraResult<()> {
        if self.ranges.len() != domain.dim_num() {
            return Err(TesseraError::evolution(format!(
                "The current domain and the array schema have a non-equal number of dimensions ({} vs {}).",
                self.ranges.len(),
                domain.dim_num()
            )));
        }
        for (idx, (slot, dim)) in self.ranges.iter().zip(domain.dimensions()).enumerate() {
            let range = slot.as_ref().ok_or_else(|| {
                TesseraError::evolution(format!(
                    "The current domain has no range specified for dimension idx: {}.",
                    idx
                ))
            })?;
            if !range.matches_datatype(dim.datatype()) {
                return Err(TesseraError::evolution(format!(
                    "The current domain range {} does not match the type {} of dimension '{}'.",
                    range,
                    dim.datatype(),
                    dim.name()
                )));
            }
            if !range.is_valid() {
                return Err(TesseraError::evolution(format!(
                    "The current domain range {} for dimension '{}' has a lower bound above its upper bound.",
                    range,
                    dim.name()
                )));
            }
            if let Some(outer) = dim.domain() {
                if outer.covers(range) != Some(true) {
                    return Err(TesseraError::evolution(format!(
                        "The current domain range {} for dimension '{}' is past the boundaries of the array schema domain {}.",
                        range,
                        dim.name(),
                        outer
                    )));
                }
            }
        }
        Ok(())
    }

    /// True if every range of `self` contains the matching range of `other`
    ///
    /// Both must have the same number of fully-set dimensions.
    pub fn covers(&self, other: &CurrentDomain) -> bool {
        self.ranges.len() == other.ranges.len()
            && self
                .ranges
                .iter()
                .zip(&other.ranges)
                .all(|(mine, theirs)| match (mine, theirs) {
                    (Some(mine), Some(theirs)) => mine.covers(theirs) == Some(true),
                    _ => false,
                })
    }
}
