//! Attribute definitions

use crate::enumeration::VAR_NUM;
use serde::{Deserialize, Serialize};
use tessera_core::{Datatype, TesseraError, TesseraResult};

/// A named value stored in every cell
///
/// An attribute may reference an enumeration by name, in which case its
/// stored values are indices into that enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    datatype: Datatype,
    cell_val_num: u32,
    nullable: bool,
    enumeration_name: Option<String>,
}

impl Attribute {
    /// Single-valued, non-nullable attribute
    pub fn new(name: impl Into<String>, datatype: Datatype) -> Self {
        Attribute {
            name: name.into(),
            datatype,
            cell_val_num: 1,
            nullable: false,
            enumeration_name: None,
        }
    }

    /// Set the number of values per cell ([`VAR_NUM`] for var-sized)
    pub fn with_cell_val_num(mut self, cell_val_num: u32) -> Self {
        self.cell_val_num = cell_val_num;
        self
    }

    /// Set nullability
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Reference the enumeration named `name`
    pub fn with_enumeration_name(mut self, name: &str) -> TesseraResult<Self> {
        self.set_enumeration_name(Some(name))?;
        Ok(self)
    }

    /// Set or clear the referenced enumeration
    pub fn set_enumeration_name(&mut self, name: Option<&str>) -> TesseraResult<()> {
        if name == Some("") {
            return Err(TesseraError::validation(
                "Invalid enumeration name; name must not be empty.",
            ));
        }
        self.enumeration_name = name.map(str::to_string);
        Ok(())
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value type
    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    /// Values per cell
    pub fn cell_val_num(&self) -> u32 {
        self.cell_val_num
    }

    /// True if cells hold a variable number of values
    pub fn var_size(&self) -> bool {
        self.cell_val_num == VAR_NUM
    }

    /// Whether cells may be null
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Referenced enumeration, if any
    pub fn enumeration_name(&self) -> Option<&str> {
        self.enumeration_name.as_deref()
    }
}
