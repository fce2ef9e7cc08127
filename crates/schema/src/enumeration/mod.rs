//! Enumerations: immutable dictionaries of distinct values
//!
//! An attribute that references an enumeration stores small integer indices
//! instead of the values themselves. The enumeration owns the value buffer
//! and a lookup index from value bytes to position.
//!
//! ## Buffers
//!
//! Values live in one contiguous `data` buffer. Fixed-size enumerations slice
//! it into `cell_val_num * datatype.size()` byte cells. Var-size enumerations
//! (`cell_val_num == VAR_NUM`) additionally carry one little-endian `u64`
//! start offset per value; value `i` spans `offsets[i]..offsets[i + 1]` (the
//! last one runs to the end of `data`). Empty values are allowed anywhere, so
//! offsets may repeat but never decrease.
//!
//! ## Lookup
//!
//! The index stores only value positions, bucketed by an `FxHasher` hash of
//! the value bytes. Lookups hash the probe and compare it against spans of
//! the enumeration's own buffer, so no value is ever copied into the index.

mod codec;

pub use codec::ENUMERATIONS_VERSION;

use byteorder::{ByteOrder, LittleEndian};
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;
use std::fmt;
use std::hash::Hasher;
use tessera_core::{Datatype, TesseraError, TesseraResult};
use uuid::Uuid;

/// `cell_val_num` marking a variable number of values per cell
pub const VAR_NUM: u32 = u32::MAX;

/// Returned by [`Enumeration::index_of`] when the value is absent
pub const ENUMERATION_MISSING_VALUE: u64 = u64::MAX;

const OFFSET_SIZE: usize = std::mem::size_of::<u64>();

type ValueIndex = FxHashMap<u64, SmallVec<[u64; 1]>>;

/// Immutable, deduplicated value dictionary
#[derive(Clone)]
pub struct Enumeration {
    name: String,
    path_name: String,
    datatype: Datatype,
    cell_val_num: u32,
    ordered: bool,
    data: Vec<u8>,
    offsets: Vec<u64>,
    value_index: ValueIndex,
}

// ============================================================================
// Fixed-size value helpers
// ============================================================================

/// Primitive types that can be stored in a fixed-size enumeration
pub trait FixedValue: Copy {
    /// Datatype the value is stored as
    const DATATYPE: Datatype;

    /// Append the little-endian encoding of `self`
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly `size_of::<Self>()` little-endian bytes
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! fixed_value {
    ($($t:ty => $dt:ident),* $(,)?) => {$(
        impl FixedValue for $t {
            const DATATYPE: Datatype = Datatype::$dt;

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }
        }
    )*};
}

fixed_value!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

/// Encode fixed-size values into a data buffer
pub fn encode_fixed_values<T: FixedValue>(values: &[T]) -> Vec<u8> {
    let mut data = Vec::with_capacity(values.len() * std::mem::size_of::<T>());
    for value in values {
        value.write_le(&mut data);
    }
    data
}

/// Encode var-size values into `(data, offsets)` buffers
pub fn encode_var_values<S: AsRef<[u8]>>(values: &[S]) -> (Vec<u8>, Vec<u8>) {
    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(values.len() * OFFSET_SIZE);
    for value in values {
        offsets.extend_from_slice(&(data.len() as u64).to_le_bytes());
        data.extend_from_slice(value.as_ref());
    }
    (data, offsets)
}

// ============================================================================
// Validation
// ============================================================================

fn validate_name(name: &str, what: &str) -> TesseraResult<()> {
    if name.is_empty() {
        return Err(TesseraError::validation(format!(
            "Enumeration {} must not be empty.",
            what
        )));
    }
    if name.contains('/') {
        return Err(TesseraError::validation(format!(
            "Enumeration {} must not contain path separators: '{}'.",
            what, name
        )));
    }
    Ok(())
}

fn decode_offsets(bytes: &[u8]) -> TesseraResult<Vec<u64>> {
    if bytes.len() % OFFSET_SIZE != 0 {
        return Err(TesseraError::validation(format!(
            "Invalid offsets size {}; must be a multiple of {} bytes.",
            bytes.len(),
            OFFSET_SIZE
        )));
    }
    Ok(bytes.chunks_exact(OFFSET_SIZE).map(LittleEndian::read_u64).collect())
}

/// Check decoded offsets against the data they index
///
/// `data` is `None` when the caller supplied no data buffer at all, which is
/// only meaningful if every value is empty.
fn check_offsets(offsets: &[u64], data: Option<&[u8]>) -> TesseraResult<()> {
    if offsets.first().copied().unwrap_or(0) != 0 {
        return Err(TesseraError::validation(
            "Invalid offsets; the first offset must be zero.",
        ));
    }
    if offsets.windows(2).any(|w| w[1] < w[0]) {
        return Err(TesseraError::validation(
            "Invalid offsets; offsets must be non-decreasing.",
        ));
    }
    let last = offsets.last().copied().unwrap_or(0);
    match data {
        None if last > 0 => Err(TesseraError::validation(
            "Invalid data input, nullptr provided when the provided offsets require data.",
        )),
        Some(data) if last > data.len() as u64 => Err(TesseraError::validation(
            "Invalid data input, data_size is smaller than the last provided offset.",
        )),
        _ => Ok(()),
    }
}

fn generate_path_name() -> String {
    format!("__{}_{}", Uuid::new_v4().simple(), ENUMERATIONS_VERSION)
}

fn hash_value(value: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(value);
    hasher.finish()
}

impl Enumeration {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Create an enumeration with a freshly generated path name
    ///
    /// `None` buffers stand for absent (null) inputs; a slice's length is its
    /// size. Passing `None` for both buffers creates an empty enumeration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid name, a zero `cell_val_num`,
    /// malformed buffers, or duplicate values.
    pub fn create(
        name: &str,
        datatype: Datatype,
        cell_val_num: u32,
        ordered: bool,
        data: Option<&[u8]>,
        offsets: Option<&[u8]>,
    ) -> TesseraResult<Self> {
        Self::create_with_path_name(
            name,
            &generate_path_name(),
            datatype,
            cell_val_num,
            ordered,
            data,
            offsets,
        )
    }

    /// Create an enumeration that keeps an existing path name
    ///
    /// Used when decoding stored enumerations.
    pub fn create_with_path_name(
        name: &str,
        path_name: &str,
        datatype: Datatype,
        cell_val_num: u32,
        ordered: bool,
        data: Option<&[u8]>,
        offsets: Option<&[u8]>,
    ) -> TesseraResult<Self> {
        validate_name(name, "name")?;
        validate_name(path_name, "path name")?;
        if cell_val_num == 0 {
            return Err(TesseraError::validation(
                "Invalid cell_val_num in Enumeration; must not be zero.",
            ));
        }

        let (data, offsets) = match (data, offsets) {
            (None, None) => (Vec::new(), Vec::new()),
            _ if cell_val_num == VAR_NUM => Self::validate_var_buffers(data, offsets)?,
            _ => (
                Self::validate_fixed_buffers(datatype, cell_val_num, data, offsets)?,
                Vec::new(),
            ),
        };

        Self::build(
            name.to_string(),
            path_name.to_string(),
            datatype,
            cell_val_num,
            ordered,
            data,
            offsets,
        )
    }

    /// Create a fixed-size enumeration with one value per cell
    pub fn from_fixed_values<T: FixedValue>(
        name: &str,
        ordered: bool,
        values: &[T],
    ) -> TesseraResult<Self> {
        let data = encode_fixed_values(values);
        let data = (!data.is_empty()).then_some(data.as_slice());
        Self::create(name, T::DATATYPE, 1, ordered, data, None)
    }

    /// Create a var-size enumeration from a list of values
    ///
    /// An empty list yields an empty enumeration.
    pub fn from_var_values<S: AsRef<[u8]>>(
        name: &str,
        datatype: Datatype,
        ordered: bool,
        values: &[S],
    ) -> TesseraResult<Self> {
        if values.is_empty() {
            return Self::create(name, datatype, VAR_NUM, ordered, None, None);
        }
        let (data, offsets) = encode_var_values(values);
        Self::create(
            name,
            datatype,
            VAR_NUM,
            ordered,
            Some(&data),
            Some(&offsets),
        )
    }

    fn validate_var_buffers(
        data: Option<&[u8]>,
        offsets: Option<&[u8]>,
    ) -> TesseraResult<(Vec<u8>, Vec<u64>)> {
        let offsets = offsets.ok_or_else(|| {
            TesseraError::validation(
                "Var sized enumeration values require a non-null offsets pointer.",
            )
        })?;
        if offsets.is_empty() {
            return Err(TesseraError::validation(
                "Var sized enumeration values require a non-zero offsets size.",
            ));
        }
        let offsets = decode_offsets(offsets)?;
        check_offsets(&offsets, data)?;
        Ok((data.unwrap_or_default().to_vec(), offsets))
    }

    fn validate_fixed_buffers(
        datatype: Datatype,
        cell_val_num: u32,
        data: Option<&[u8]>,
        offsets: Option<&[u8]>,
    ) -> TesseraResult<Vec<u8>> {
        let data = data.ok_or_else(|| {
            TesseraError::validation(
                "Invalid data buffer must not be nullptr for fixed sized data.",
            )
        })?;
        if data.is_empty() {
            return Err(TesseraError::validation(
                "Invalid data size; must be non-zero for fixed size data.",
            ));
        }
        if offsets.is_some() {
            return Err(TesseraError::validation(
                "Offsets buffer must not be provided for fixed size data.",
            ));
        }
        let cell_size = u64::from(cell_val_num) * datatype.size();
        if data.len() as u64 % cell_size != 0 {
            return Err(TesseraError::validation(
                "Invalid data size is not a multiple of the cell size.",
            ));
        }
        Ok(data.to_vec())
    }

    fn build(
        name: String,
        path_name: String,
        datatype: Datatype,
        cell_val_num: u32,
        ordered: bool,
        data: Vec<u8>,
        offsets: Vec<u64>,
    ) -> TesseraResult<Self> {
        let mut enmr = Enumeration {
            name,
            path_name,
            datatype,
            cell_val_num,
            ordered,
            data,
            offsets,
            value_index: ValueIndex::default(),
        };
        enmr.value_index = enmr.index_values()?;
        Ok(enmr)
    }

    fn index_values(&self) -> TesseraResult<ValueIndex> {
        let count = self.elem_count();
        let mut index = ValueIndex::default();
        index.reserve(count as usize);
        for idx in 0..count {
            let value = self.span(idx);
            let bucket = index.entry(hash_value(value)).or_default();
            if bucket.iter().any(|&other| self.span(other) == value) {
                return Err(TesseraError::validation(format!(
                    "Invalid duplicated value in enumeration '{}'.",
                    String::from_utf8_lossy(value)
                )));
            }
            bucket.push(idx);
        }
        Ok(index)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Position of `value`, or [`ENUMERATION_MISSING_VALUE`]
    pub fn index_of(&self, value: &[u8]) -> u64 {
        self.value_index
            .get(&hash_value(value))
            .and_then(|bucket| bucket.iter().copied().find(|&idx| self.span(idx) == value))
            .unwrap_or(ENUMERATION_MISSING_VALUE)
    }

    /// Bytes of the value at `idx`
    pub fn value(&self, idx: u64) -> Option<&[u8]> {
        (idx < self.elem_count()).then(|| self.span(idx))
    }

    /// All values in index order
    pub fn values(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.elem_count()).map(move |idx| self.span(idx))
    }

    /// Decode a fixed-size, single-valued enumeration as `T`
    pub fn fixed_values<T: FixedValue>(&self) -> TesseraResult<Vec<T>> {
        if self.datatype != T::DATATYPE || self.cell_val_num != 1 {
            return Err(TesseraError::validation(format!(
                "Enumeration '{}' of type {} cannot be read as {}.",
                self.name,
                self.datatype,
                T::DATATYPE
            )));
        }
        Ok(self.values().map(T::read_le).collect())
    }

    fn span(&self, idx: u64) -> &[u8] {
        let idx = idx as usize;
        if self.var_size() {
            let start = self.offsets[idx] as usize;
            let end = self
                .offsets
                .get(idx + 1)
                .map_or(self.data.len(), |&o| o as usize);
            &self.data[start..end]
        } else {
            let size = self.fixed_cell_size() as usize;
            &self.data[idx * size..(idx + 1) * size]
        }
    }

    // =========================================================================
    // Extension
    // =========================================================================

    /// New enumeration holding these values followed by the given ones
    ///
    /// The result has a new path name. Uniqueness is checked across old and
    /// new values together.
    pub fn extend(&self, data: Option<&[u8]>, offsets: Option<&[u8]>) -> TesseraResult<Self> {
        let mut new_data = self.data.clone();
        let mut new_offsets = self.offsets.clone();

        if self.var_size() {
            let offsets = offsets.ok_or_else(|| {
                TesseraError::validation(
                    "Error extending var sized enumeration with fixed size data.",
                )
            })?;
            if offsets.is_empty() {
                return Err(TesseraError::validation(
                    "Unable to extend an enumeration with an empty vector.",
                ));
            }
            let added = decode_offsets(offsets)?;
            check_offsets(&added, data)?;
            let base = new_data.len() as u64;
            new_offsets.extend(added.into_iter().map(|o| o + base));
            new_data.extend_from_slice(data.unwrap_or_default());
        } else {
            if offsets.is_some() {
                return Err(TesseraError::validation(
                    "Error extending fixed sized enumeration with var size data.",
                ));
            }
            let data = match data {
                Some(data) if !data.is_empty() => data,
                _ => {
                    return Err(TesseraError::validation(
                        "Unable to extend an enumeration with an empty vector.",
                    ))
                }
            };
            if data.len() as u64 % self.fixed_cell_size() != 0 {
                return Err(TesseraError::validation(
                    "Invalid data size is not a multiple of the cell size.",
                ));
            }
            new_data.extend_from_slice(data);
        }

        Self::build(
            self.name.clone(),
            generate_path_name(),
            self.datatype,
            self.cell_val_num,
            self.ordered,
            new_data,
            new_offsets,
        )
    }

    /// True if `self` was produced by extending `other`
    ///
    /// Requires identical name, type, cell_val_num and ordering, strictly
    /// more values, and `other`'s values as an exact prefix.
    pub fn is_extension_of(&self, other: &Enumeration) -> bool {
        self.name == other.name
            && self.datatype == other.datatype
            && self.cell_val_num == other.cell_val_num
            && self.ordered == other.ordered
            && self.elem_count() > other.elem_count()
            && other.values().zip(self.values()).all(|(a, b)| a == b)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Enumeration name, unique within a schema
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage file name
    pub fn path_name(&self) -> &str {
        &self.path_name
    }

    /// Value type
    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    /// Values per cell, or [`VAR_NUM`]
    pub fn cell_val_num(&self) -> u32 {
        self.cell_val_num
    }

    /// True for var-size values
    pub fn var_size(&self) -> bool {
        self.cell_val_num == VAR_NUM
    }

    /// Bytes per value, `None` for var-size enumerations
    pub fn cell_size(&self) -> Option<u64> {
        (!self.var_size()).then(|| self.fixed_cell_size())
    }

    fn fixed_cell_size(&self) -> u64 {
        u64::from(self.cell_val_num) * self.datatype.size()
    }

    /// Whether value order is meaningful
    pub fn ordered(&self) -> bool {
        self.ordered
    }

    /// Raw value buffer
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Start offset of each var-size value; empty for fixed-size
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Number of values
    pub fn elem_count(&self) -> u64 {
        if self.var_size() {
            self.offsets.len() as u64
        } else {
            self.data.len() as u64 / self.fixed_cell_size()
        }
    }

    /// Size of the data and offsets buffers together, in bytes
    pub fn byte_size(&self) -> u64 {
        (self.data.len() + self.offsets.len() * OFFSET_SIZE) as u64
    }
}

impl PartialEq for Enumeration {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.path_name == other.path_name
            && self.datatype == other.datatype
            && self.cell_val_num == other.cell_val_num
            && self.ordered == other.ordered
            && self.data == other.data
            && self.offsets == other.offsets
    }
}

impl Eq for Enumeration {}

impl fmt::Debug for Enumeration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enumeration")
            .field("name", &self.name)
            .field("path_name", &self.path_name)
            .field("datatype", &self.datatype)
            .field("cell_val_num", &self.cell_val_num)
            .field("ordered", &self.ordered)
            .field("elem_count", &self.elem_count())
            .finish()
    }
}
