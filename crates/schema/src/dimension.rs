//! Dimensions and the array domain

use crate::range::Range;
use serde::{Deserialize, Serialize};
use tessera_core::{Datatype, TesseraError, TesseraResult};

/// One axis of the array's coordinate space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    name: String,
    datatype: Datatype,
    domain: Option<Range>,
}

impl Dimension {
    /// Create a dimension
    ///
    /// String dimensions are unbounded and take no domain; every other type
    /// requires one whose variant matches the datatype.
    pub fn new(
        name: impl Into<String>,
        datatype: Datatype,
        domain: Option<Range>,
    ) -> TesseraResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(TesseraError::validation(
                "Dimension name must not be empty.",
            ));
        }
        match (&domain, datatype.is_string()) {
            (Some(_), true) => {
                return Err(TesseraError::validation(format!(
                    "Dimension '{}' has a string type and must not set a domain.",
                    name
                )));
            }
            (None, false) => {
                return Err(TesseraError::validation(format!(
                    "Dimension '{}' requires a domain.",
                    name
                )));
            }
            (Some(range), false) => {
                if !range.matches_datatype(datatype) || !range.is_valid() {
                    return Err(TesseraError::validation(format!(
                        "Invalid domain {} for dimension '{}' of type {}.",
                        range, name, datatype
                    )));
                }
            }
            (None, true) => {}
        }
        Ok(Dimension {
            name,
            datatype,
            domain,
        })
    }

    /// Dimension name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinate type
    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    /// Outer bounds, `None` for string dimensions
    pub fn domain(&self) -> Option<&Range> {
        self.domain.as_ref()
    }
}

/// Ordered set of dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    dimensions: Vec<Dimension>,
}

impl Domain {
    /// Build a domain from at least one uniquely named dimension
    pub fn new(dimensions: Vec<Dimension>) -> TesseraResult<Self> {
        if dimensions.is_empty() {
            return Err(TesseraError::validation(
                "Domain must have at least one dimension.",
            ));
        }
        for (idx, dim) in dimensions.iter().enumerate() {
            if dimensions[..idx].iter().any(|d| d.name == dim.name) {
                return Err(TesseraError::validation(format!(
                    "Duplicate dimension name '{}'.",
                    dim.name
                )));
            }
        }
        Ok(Domain { dimensions })
    }

    /// Number of dimensions
    pub fn dim_num(&self) -> usize {
        self.dimensions.len()
    }

    /// Dimension at `idx`
    pub fn dimension(&self, idx: usize) -> Option<&Dimension> {
        self.dimensions.get(idx)
    }

    /// Dimension named `name`
    pub fn dimension_by_name(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Position of the dimension named `name`
    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    /// All dimensions in order
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_dimension_has_no_domain() {
        assert!(Dimension::new("s", Datatype::StringAscii, None).is_ok());
        assert!(Dimension::new("s", Datatype::StringAscii, Some(Range::string("a", "z"))).is_err());
    }

    #[test]
    fn test_domain_type_must_match() {
        assert!(Dimension::new("d", Datatype::Int32, Some(Range::int(1, 10))).is_ok());
        assert!(Dimension::new("d", Datatype::Int32, Some(Range::uint(1, 10))).is_err());
        assert!(Dimension::new("d", Datatype::Int32, Some(Range::int(10, 1))).is_err());
        assert!(Dimension::new("d", Datatype::Int32, None).is_err());
    }

    #[test]
    fn test_domain_rejects_duplicates() {
        let d = Dimension::new("d", Datatype::UInt64, Some(Range::uint(0, 9))).unwrap();
        assert!(Domain::new(vec![d.clone(), d.clone()]).is_err());
        assert!(Domain::new(vec![]).is_err());

        let domain = Domain::new(vec![d]).unwrap();
        assert_eq!(domain.dim_num(), 1);
        assert_eq!(domain.dimension_index("d"), Some(0));
    }
}
