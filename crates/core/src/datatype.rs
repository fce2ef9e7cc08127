//! Cell value types
//!
//! The discriminants are the on-disk type codes used by the enumeration
//! record and must never be renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a single value stored in an attribute, dimension or enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Datatype {
    /// 32-bit signed integer
    Int32 = 0,
    /// 64-bit signed integer
    Int64 = 1,
    /// 32-bit IEEE float
    Float32 = 2,
    /// 64-bit IEEE float
    Float64 = 3,
    /// Single byte character
    Char = 4,
    /// 8-bit signed integer
    Int8 = 5,
    /// 8-bit unsigned integer
    UInt8 = 6,
    /// 16-bit signed integer
    Int16 = 7,
    /// 16-bit unsigned integer
    UInt16 = 8,
    /// 32-bit unsigned integer
    UInt32 = 9,
    /// 64-bit unsigned integer
    UInt64 = 10,
    /// ASCII string byte
    StringAscii = 11,
    /// UTF-8 string byte
    StringUtf8 = 12,
    /// Opaque byte
    Blob = 40,
    /// Boolean stored as one byte
    Bool = 41,
}

impl Datatype {
    /// Size in bytes of one value
    pub const fn size(&self) -> u64 {
        match self {
            Datatype::Int8
            | Datatype::UInt8
            | Datatype::Char
            | Datatype::StringAscii
            | Datatype::StringUtf8
            | Datatype::Blob
            | Datatype::Bool => 1,
            Datatype::Int16 | Datatype::UInt16 => 2,
            Datatype::Int32 | Datatype::UInt32 | Datatype::Float32 => 4,
            Datatype::Int64 | Datatype::UInt64 | Datatype::Float64 => 8,
        }
    }

    /// On-disk type code
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Inverse of [`Datatype::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        let dt = match code {
            0 => Datatype::Int32,
            1 => Datatype::Int64,
            2 => Datatype::Float32,
            3 => Datatype::Float64,
            4 => Datatype::Char,
            5 => Datatype::Int8,
            6 => Datatype::UInt8,
            7 => Datatype::Int16,
            8 => Datatype::UInt16,
            9 => Datatype::UInt32,
            10 => Datatype::UInt64,
            11 => Datatype::StringAscii,
            12 => Datatype::StringUtf8,
            40 => Datatype::Blob,
            41 => Datatype::Bool,
            _ => return None,
        };
        Some(dt)
    }

    /// Signed or unsigned integer type
    pub const fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    /// Signed integer type
    pub const fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            Datatype::Int8 | Datatype::Int16 | Datatype::Int32 | Datatype::Int64
        )
    }

    /// Unsigned integer type
    pub const fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            Datatype::UInt8 | Datatype::UInt16 | Datatype::UInt32 | Datatype::UInt64
        )
    }

    /// Floating point type
    pub const fn is_float(&self) -> bool {
        matches!(self, Datatype::Float32 | Datatype::Float64)
    }

    /// Character or string type
    pub const fn is_string(&self) -> bool {
        matches!(
            self,
            Datatype::Char | Datatype::StringAscii | Datatype::StringUtf8
        )
    }

    /// Number of distinct enumeration indices an attribute of this type can
    /// hold, i.e. the type's maximum value plus one
    ///
    /// `None` for non-integer types, which cannot reference an enumeration.
    pub fn enumeration_index_capacity(&self) -> Option<u64> {
        let capacity = match self {
            Datatype::Int8 => i8::MAX as u64 + 1,
            Datatype::UInt8 => u8::MAX as u64 + 1,
            Datatype::Int16 => i16::MAX as u64 + 1,
            Datatype::UInt16 => u16::MAX as u64 + 1,
            Datatype::Int32 => i32::MAX as u64 + 1,
            Datatype::UInt32 => u32::MAX as u64 + 1,
            Datatype::Int64 => i64::MAX as u64 + 1,
            Datatype::UInt64 => u64::MAX,
            _ => return None,
        };
        Some(capacity)
    }

    /// Canonical upper-case name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Datatype::Int32 => "INT32",
            Datatype::Int64 => "INT64",
            Datatype::Float32 => "FLOAT32",
            Datatype::Float64 => "FLOAT64",
            Datatype::Char => "CHAR",
            Datatype::Int8 => "INT8",
            Datatype::UInt8 => "UINT8",
            Datatype::Int16 => "INT16",
            Datatype::UInt16 => "UINT16",
            Datatype::UInt32 => "UINT32",
            Datatype::UInt64 => "UINT64",
            Datatype::StringAscii => "STRING_ASCII",
            Datatype::StringUtf8 => "STRING_UTF8",
            Datatype::Blob => "BLOB",
            Datatype::Bool => "BOOL",
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
