//! Fragment metadata
//!
//! A fragment is one immutable batch of written cells. The control plane
//! never reads cell data; it only needs to know which fragments fall inside
//! an opened window and what region of the domain they touch.

use serde::{Deserialize, Serialize};
use tessera_core::Timestamp;
use tessera_schema::Range;

/// Summary of one written fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    name: String,
    timestamp_range: (Timestamp, Timestamp),
    array_schema_name: String,
    non_empty_domain: Vec<Range>,
    cell_num: u64,
}

impl FragmentMetadata {
    /// Describe a fragment written under `array_schema_name`
    pub fn new(
        name: impl Into<String>,
        timestamp_range: (Timestamp, Timestamp),
        array_schema_name: impl Into<String>,
        non_empty_domain: Vec<Range>,
        cell_num: u64,
    ) -> Self {
        FragmentMetadata {
            name: name.into(),
            timestamp_range,
            array_schema_name: array_schema_name.into(),
            non_empty_domain,
            cell_num,
        }
    }

    /// Fragment name, unique within its array
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write interval of the fragment
    pub fn timestamp_range(&self) -> (Timestamp, Timestamp) {
        self.timestamp_range
    }

    /// Name of the schema version the fragment was written with
    pub fn array_schema_name(&self) -> &str {
        &self.array_schema_name
    }

    /// Per-dimension bounding ranges of the written cells
    pub fn non_empty_domain(&self) -> &[Range] {
        &self.non_empty_domain
    }

    /// Number of cells in the fragment
    pub fn cell_num(&self) -> u64 {
        self.cell_num
    }

    /// True if the whole write interval lies in `[start, end]`
    pub fn is_within(&self, start: Timestamp, end: Timestamp) -> bool {
        self.timestamp_range.0.within(start, end) && self.timestamp_range.1.within(start, end)
    }
}

/// Union of the non-empty domains of `fragments`, dimension by dimension
///
/// Empty when there are no fragments. Ranges of mismatched variants are
/// ignored.
pub fn union_non_empty_domain(fragments: &[FragmentMetadata]) -> Vec<Range> {
    let mut union: Vec<Range> = Vec::new();
    for fragment in fragments {
        if union.is_empty() {
            union = fragment.non_empty_domain.clone();
            continue;
        }
        for (acc, range) in union.iter_mut().zip(&fragment.non_empty_domain) {
            acc.expand_to(range);
        }
    }
    union
}
