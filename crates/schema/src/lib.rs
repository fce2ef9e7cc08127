//! Array schema model for tessera
//!
//! - Enumeration: immutable value dictionaries and their binary record
//! - Attribute, Dimension, Domain, Range: the structural pieces of a schema
//! - CurrentDomain: the expandable writable region
//! - ArraySchema: one immutable version of an array's structure
//! - ArraySchemaEvolution: batched, clone-first schema changes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array_schema;
pub mod attribute;
pub mod current_domain;
pub mod dimension;
pub mod enumeration;
pub mod evolution;
pub mod limits;
pub mod range;

pub use array_schema::{ArraySchema, ArrayType};
pub use attribute::Attribute;
pub use current_domain::CurrentDomain;
pub use dimension::{Dimension, Domain};
pub use enumeration::{
    encode_fixed_values, encode_var_values, Enumeration, FixedValue,
    ENUMERATIONS_VERSION, ENUMERATION_MISSING_VALUE, VAR_NUM,
};
pub use evolution::ArraySchemaEvolution;
pub use limits::{
    EnumerationLimits, DEFAULT_ENUMERATION_MAX_SIZE, DEFAULT_ENUMERATION_MAX_TOTAL_SIZE,
};
pub use range::Range;
