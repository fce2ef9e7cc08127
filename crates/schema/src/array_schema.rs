//! Array schema
//!
//! A schema is an immutable value once stored: evolution never edits a stored
//! schema, it clones one, applies changes to the clone, and stores the clone
//! as a new version under a new name.
//!
//! Enumerations are tracked twice. `enumeration_path_map` (name to storage
//! path) is part of the persisted schema. `loaded_enumerations` is an
//! in-memory cache filled on demand and never persisted.

use crate::attribute::Attribute;
use crate::current_domain::CurrentDomain;
use crate::dimension::Domain;
use crate::enumeration::Enumeration;
use crate::limits::EnumerationLimits;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::{TesseraError, TesseraResult, Timestamp};
use uuid::Uuid;

/// Cell layout of the array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayType {
    /// Every cell in the domain exists
    Dense,
    /// Only written cells exist
    Sparse,
}

/// Structure of an array at one version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArraySchema {
    array_type: ArrayType,
    domain: Domain,
    attributes: Vec<Attribute>,
    enumeration_path_map: BTreeMap<String, String>,
    #[serde(skip)]
    loaded_enumerations: BTreeMap<String, Arc<Enumeration>>,
    current_domain: CurrentDomain,
    timestamp_range: (Timestamp, Timestamp),
    name: String,
}

fn generate_name(timestamp_range: (Timestamp, Timestamp)) -> String {
    format!(
        "__{}_{}_{}",
        timestamp_range.0.as_millis(),
        timestamp_range.1.as_millis(),
        Uuid::new_v4().simple()
    )
}

impl ArraySchema {
    /// Schema with no attributes, stamped with the current time
    pub fn new(array_type: ArrayType, domain: Domain) -> Self {
        let now = Timestamp::now();
        ArraySchema {
            array_type,
            domain,
            attributes: Vec::new(),
            enumeration_path_map: BTreeMap::new(),
            loaded_enumerations: BTreeMap::new(),
            current_domain: CurrentDomain::empty(),
            timestamp_range: (now, now),
            name: generate_name((now, now)),
        }
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Add an attribute
    ///
    /// Fails on an empty or duplicate name (attributes and dimensions share
    /// one namespace), or if a referenced enumeration is unknown, not loaded,
    /// or cannot be indexed by the attribute's type.
    pub fn add_attribute(&mut self, attr: Attribute) -> TesseraResult<()> {
        if attr.name().is_empty() {
            return Err(TesseraError::validation(
                "Cannot add attribute; attribute name must not be empty.",
            ));
        }
        if self.has_attribute(attr.name()) || self.domain.dimension_by_name(attr.name()).is_some()
        {
            return Err(TesseraError::validation(format!(
                "Cannot add attribute; an attribute or dimension named '{}' already exists.",
                attr.name()
            )));
        }
        if let Some(enmr_name) = attr.enumeration_name() {
            if !self.enumeration_path_map.contains_key(enmr_name) {
                return Err(TesseraError::validation(format!(
                    "Cannot add attribute '{}'; it references missing enumeration '{}'.",
                    attr.name(),
                    enmr_name
                )));
            }
            let enmr = self.loaded_enumerations.get(enmr_name).ok_or_else(|| {
                TesseraError::validation(format!(
                    "Cannot add attribute '{}'; enumeration '{}' is not loaded.",
                    attr.name(),
                    enmr_name
                ))
            })?;
            check_enumeration_fits(&attr, enmr)?;
        }
        self.attributes.push(attr);
        Ok(())
    }

    /// Remove an attribute
    ///
    /// Fails if `name` is a dimension, is unknown, or is the last attribute.
    pub fn drop_attribute(&mut self, name: &str) -> TesseraResult<()> {
        if self.domain.dimension_by_name(name).is_some() {
            return Err(TesseraError::validation(format!(
                "Cannot drop '{}'; it is a dimension, not an attribute.",
                name
            )));
        }
        let idx = self
            .attributes
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| {
                TesseraError::validation(format!("Cannot drop unknown attribute '{}'.", name))
            })?;
        if self.attributes.len() == 1 {
            return Err(TesseraError::validation(format!(
                "Cannot drop attribute '{}'; an array schema must have at least one attribute.",
                name
            )));
        }
        self.attributes.remove(idx);
        Ok(())
    }

    /// Attribute named `name`
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// True if an attribute named `name` exists
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// All attributes in definition order
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Number of attributes
    pub fn attribute_num(&self) -> usize {
        self.attributes.len()
    }

    // =========================================================================
    // Enumerations
    // =========================================================================

    /// Register and cache a new enumeration
    pub fn add_enumeration(&mut self, enmr: Arc<Enumeration>) -> TesseraResult<()> {
        if self.enumeration_path_map.contains_key(enmr.name()) {
            return Err(TesseraError::validation(format!(
                "Cannot add enumeration; an enumeration named '{}' already exists.",
                enmr.name()
            )));
        }
        self.enumeration_path_map
            .insert(enmr.name().to_string(), enmr.path_name().to_string());
        self.loaded_enumerations.insert(enmr.name().to_string(), enmr);
        Ok(())
    }

    /// Replace a loaded enumeration with an extension of it
    pub fn extend_enumeration(&mut self, enmr: Arc<Enumeration>) -> TesseraResult<()> {
        let current = self.loaded_enumerations.get(enmr.name()).ok_or_else(|| {
            if self.enumeration_path_map.contains_key(enmr.name()) {
                TesseraError::validation(format!(
                    "Cannot extend enumeration '{}'; it is not loaded.",
                    enmr.name()
                ))
            } else {
                TesseraError::validation(format!(
                    "Cannot extend unknown enumeration '{}'.",
                    enmr.name()
                ))
            }
        })?;
        if !enmr.is_extension_of(current) {
            return Err(TesseraError::validation(format!(
                "Cannot extend enumeration '{}'; the provided enumeration is not an extension of the current one.",
                enmr.name()
            )));
        }
        for attr in self
            .attributes
            .iter()
            .filter(|a| a.enumeration_name() == Some(enmr.name()))
        {
            check_enumeration_fits(attr, &enmr)?;
        }
        self.enumeration_path_map
            .insert(enmr.name().to_string(), enmr.path_name().to_string());
        self.loaded_enumerations.insert(enmr.name().to_string(), enmr);
        Ok(())
    }

    /// Remove an enumeration no attribute references
    pub fn drop_enumeration(&mut self, name: &str) -> TesseraResult<()> {
        if name.is_empty() {
            return Err(TesseraError::validation(
                "Cannot drop enumeration; enumeration name must not be empty.",
            ));
        }
        if !self.enumeration_path_map.contains_key(name) {
            return Err(TesseraError::validation(format!(
                "Cannot drop unknown enumeration '{}'.",
                name
            )));
        }
        if let Some(attr) = self
            .attributes
            .iter()
            .find(|a| a.enumeration_name() == Some(name))
        {
            return Err(TesseraError::validation(format!(
                "Cannot drop enumeration '{}'; it is still used by attribute '{}'.",
                name,
                attr.name()
            )));
        }
        self.enumeration_path_map.remove(name);
        self.loaded_enumerations.remove(name);
        Ok(())
    }

    /// Cache an enumeration loaded from storage
    ///
    /// The enumeration must be known by name, match the recorded path, and
    /// not be cached already.
    pub fn store_enumeration(&mut self, enmr: Arc<Enumeration>) -> TesseraResult<()> {
        let path = self.enumeration_path_map.get(enmr.name()).ok_or_else(|| {
            TesseraError::validation(format!(
                "Cannot store unknown enumeration '{}'.",
                enmr.name()
            ))
        })?;
        if path != enmr.path_name() {
            return Err(TesseraError::validation(format!(
                "Cannot store enumeration '{}'; path name '{}' does not match '{}'.",
                enmr.name(),
                enmr.path_name(),
                path
            )));
        }
        if self.loaded_enumerations.contains_key(enmr.name()) {
            return Err(TesseraError::validation(format!(
                "Cannot store enumeration '{}'; it is already loaded.",
                enmr.name()
            )));
        }
        self.loaded_enumerations.insert(enmr.name().to_string(), enmr);
        Ok(())
    }

    /// Cached enumeration named `name`
    ///
    /// `Ok(None)` if the enumeration exists but has not been loaded.
    pub fn get_enumeration(&self, name: &str) -> TesseraResult<Option<Arc<Enumeration>>> {
        if !self.enumeration_path_map.contains_key(name) {
            return Err(TesseraError::not_found(format!("enumeration '{}'", name)));
        }
        Ok(self.loaded_enumerations.get(name).cloned())
    }

    /// True if an enumeration named `name` is registered
    pub fn has_enumeration(&self, name: &str) -> bool {
        self.enumeration_path_map.contains_key(name)
    }

    /// True if the enumeration named `name` is cached
    pub fn is_enumeration_loaded(&self, name: &str) -> bool {
        self.loaded_enumerations.contains_key(name)
    }

    /// Storage path of the enumeration named `name`
    pub fn enumeration_path_name(&self, name: &str) -> Option<&str> {
        self.enumeration_path_map.get(name).map(String::as_str)
    }

    /// Names of all registered enumerations, sorted
    pub fn enumeration_names(&self) -> Vec<String> {
        self.enumeration_path_map.keys().cloned().collect()
    }

    /// Names of all cached enumerations, sorted
    pub fn loaded_enumeration_names(&self) -> Vec<String> {
        self.loaded_enumerations.keys().cloned().collect()
    }

    /// All cached enumerations, sorted by name
    pub fn loaded_enumerations(&self) -> impl Iterator<Item = &Arc<Enumeration>> + '_ {
        self.loaded_enumerations.values()
    }

    // =========================================================================
    // Domain
    // =========================================================================

    /// Dense or sparse
    pub fn array_type(&self) -> ArrayType {
        self.array_type
    }

    /// Outer domain
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Number of dimensions
    pub fn dim_num(&self) -> usize {
        self.domain.dim_num()
    }

    /// Current domain; empty means the whole outer domain
    pub fn current_domain(&self) -> &CurrentDomain {
        &self.current_domain
    }

    /// Set the current domain of a schema that has none yet
    pub fn set_current_domain(&mut self, current_domain: CurrentDomain) -> TesseraResult<()> {
        if !self.current_domain.is_empty() {
            return Err(TesseraError::validation(
                "The current domain is already set; use schema evolution to expand it.",
            ));
        }
        if !current_domain.is_empty() {
            current_domain.check(&self.domain)?;
        }
        self.current_domain = current_domain;
        Ok(())
    }

    /// Replace the current domain with a superset of it
    pub fn expand_current_domain(&mut self, new_domain: CurrentDomain) -> TesseraResult<()> {
        if new_domain.is_empty() {
            return Err(TesseraError::evolution(
                "Unable to expand the array current domain, the new current domain specified is empty.",
            ));
        }
        new_domain.check(&self.domain)?;
        if !self.current_domain.is_empty() && !new_domain.covers(&self.current_domain) {
            return Err(TesseraError::evolution(
                "The current domain of an array can only be expanded, please adjust your new current domain object.",
            ));
        }
        self.current_domain = new_domain;
        Ok(())
    }

    // =========================================================================
    // Versioning
    // =========================================================================

    /// Storage name, `__{start}_{end}_{uuid}`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version stamp
    pub fn timestamp_range(&self) -> (Timestamp, Timestamp) {
        self.timestamp_range
    }

    /// Start of the version stamp
    pub fn timestamp_start(&self) -> Timestamp {
        self.timestamp_range.0
    }

    /// End of the version stamp
    pub fn timestamp_end(&self) -> Timestamp {
        self.timestamp_range.1
    }

    /// Restamp and regenerate the storage name
    pub fn set_timestamp_range(&mut self, timestamp_range: (Timestamp, Timestamp)) {
        self.timestamp_range = timestamp_range;
        self.name = generate_name(timestamp_range);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate the schema before it is stored
    pub fn check(&self, limits: &EnumerationLimits) -> TesseraResult<()> {
        if self.attributes.is_empty() {
            return Err(TesseraError::validation(
                "Array schema check failed; the schema has no attributes.",
            ));
        }

        for attr in &self.attributes {
            if let Some(enmr_name) = attr.enumeration_name() {
                if !self.enumeration_path_map.contains_key(enmr_name) {
                    return Err(TesseraError::validation(format!(
                        "Array schema check failed; attribute '{}' references missing enumeration '{}'.",
                        attr.name(),
                        enmr_name
                    )));
                }
            }
        }

        let mut total: u64 = 0;
        for enmr in self.loaded_enumerations.values() {
            let size = enmr.byte_size();
            if size > limits.max_size {
                return Err(TesseraError::validation(format!(
                    "Invalid enumeration '{}' has a size exceeding {} bytes.",
                    enmr.name(),
                    limits.max_size
                )));
            }
            total = total.saturating_add(size);
        }
        if total > limits.max_total_size {
            return Err(TesseraError::validation(format!(
                "Total enumeration size {} exceeds the limit of {} bytes.",
                total, limits.max_total_size
            )));
        }

        if !self.current_domain.is_empty() {
            self.current_domain.check(&self.domain)?;
        }
        Ok(())
    }
}

fn check_enumeration_fits(attr: &Attribute, enmr: &Enumeration) -> TesseraResult<()> {
    let capacity = attr
        .datatype()
        .enumeration_index_capacity()
        .ok_or_else(|| {
            TesseraError::validation(format!(
                "Attribute '{}' has type {}; enumeration attributes must have an integral type.",
                attr.name(),
                attr.datatype()
            ))
        })?;
    if attr.cell_val_num() != 1 {
        return Err(TesseraError::validation(format!(
            "Attribute '{}' must have a cell_val_num of 1 to use an enumeration.",
            attr.name()
        )));
    }
    if enmr.elem_count() > capacity {
        return Err(TesseraError::validation(format!(
            "Unable to use enumeration '{}' for attribute '{}': the attribute type {} can index {} values, the enumeration has {}.",
            enmr.name(),
            attr.name(),
            attr.datatype(),
            capacity,
            enmr.elem_count()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Dimension;
    use crate::range::Range;
    use tessera_core::Datatype;

    fn schema() -> ArraySchema {
        let domain = Domain::new(vec![
            Dimension::new("d", Datatype::Int32, Some(Range::int(1, 100))).unwrap(),
        ])
        .unwrap();
        let mut schema = ArraySchema::new(ArrayType::Sparse, domain);
        schema.add_attribute(Attribute::new("a", Datatype::Int32)).unwrap();
        schema
    }

    fn letters(count: usize) -> Arc<Enumeration> {
        let values: Vec<String> = (0..count).map(|i| format!("v{}", i)).collect();
        Arc::new(
            Enumeration::from_var_values("letters", Datatype::StringAscii, false, &values)
                .unwrap(),
        )
    }

    #[test]
    fn test_attribute_names_are_unique() {
        let mut s = schema();
        assert!(s.add_attribute(Attribute::new("a", Datatype::Int64)).is_err());
        assert!(s.add_attribute(Attribute::new("d", Datatype::Int64)).is_err());
        assert!(s.add_attribute(Attribute::new("", Datatype::Int64)).is_err());
    }

    #[test]
    fn test_drop_attribute_rules() {
        let mut s = schema();
        assert!(s.drop_attribute("d").is_err());
        assert!(s.drop_attribute("missing").is_err());
        assert!(s.drop_attribute("a").is_err(), "last attribute");

        s.add_attribute(Attribute::new("b", Datatype::Int32)).unwrap();
        s.drop_attribute("a").unwrap();
        assert_eq!(s.attribute_num(), 1);
    }

    #[test]
    fn test_enumerated_attribute_capacity() {
        let mut s = schema();
        s.add_enumeration(letters(129)).unwrap();
        let int8 = Attribute::new("i8", Datatype::Int8)
            .with_enumeration_name("letters")
            .unwrap();
        assert!(s.add_attribute(int8).is_err());

        let uint8 = Attribute::new("u8", Datatype::UInt8)
            .with_enumeration_name("letters")
            .unwrap();
        s.add_attribute(uint8).unwrap();

        let float = Attribute::new("f", Datatype::Float32)
            .with_enumeration_name("letters")
            .unwrap();
        assert!(s.add_attribute(float).is_err());

        let multi = Attribute::new("m", Datatype::Int32)
            .with_cell_val_num(2)
            .with_enumeration_name("letters")
            .unwrap();
        assert!(s.add_attribute(multi).is_err());
    }

    #[test]
    fn test_attribute_with_missing_enumeration() {
        let mut s = schema();
        let attr = Attribute::new("x", Datatype::Int32)
            .with_enumeration_name("nope")
            .unwrap();
        assert!(s.add_attribute(attr).is_err());
    }

    #[test]
    fn test_enumeration_bookkeeping() {
        let mut s = schema();
        let enmr = letters(3);
        s.add_enumeration(enmr.clone()).unwrap();
        assert!(s.add_enumeration(enmr.clone()).is_err());
        assert_eq!(s.enumeration_path_name("letters"), Some(enmr.path_name()));
        assert!(Arc::ptr_eq(
            &s.get_enumeration("letters").unwrap().unwrap(),
            &enmr
        ));
        assert!(s.get_enumeration("other").is_err());

        assert!(s.drop_enumeration("").is_err());
        assert!(s.drop_enumeration("other").is_err());
        s.drop_enumeration("letters").unwrap();
        assert!(!s.has_enumeration("letters"));
    }

    #[test]
    fn test_drop_enumeration_in_use() {
        let mut s = schema();
        s.add_enumeration(letters(3)).unwrap();
        s.add_attribute(
            Attribute::new("e", Datatype::UInt8)
                .with_enumeration_name("letters")
                .unwrap(),
        )
        .unwrap();
        let err = s.drop_enumeration("letters").unwrap_err();
        assert!(err.to_string().contains("still used by attribute 'e'"));
    }

    #[test]
    fn test_store_enumeration_after_persistence() {
        let mut s = schema();
        let enmr = letters(2);
        s.add_enumeration(enmr.clone()).unwrap();

        // Loaded enumerations are not persisted.
        let bytes = bincode::serialize(&s).unwrap();
        let mut restored: ArraySchema = bincode::deserialize(&bytes).unwrap();
        assert!(restored.has_enumeration("letters"));
        assert!(!restored.is_enumeration_loaded("letters"));
        assert_eq!(restored.get_enumeration("letters").unwrap(), None);

        assert!(restored.store_enumeration(letters(2)).is_err(), "path mismatch");
        restored.store_enumeration(enmr.clone()).unwrap();
        assert!(restored.store_enumeration(enmr).is_err(), "already loaded");
    }

    #[test]
    fn test_check_enumeration_limits() {
        let mut s = schema();
        s.add_enumeration(letters(100)).unwrap();
        let tight = EnumerationLimits {
            max_size: 64,
            max_total_size: 1024 * 1024,
        };
        let err = s.check(&tight).unwrap_err();
        assert!(err.to_string().contains("has a size exceeding"));

        let tight_total = EnumerationLimits {
            max_size: 1024 * 1024,
            max_total_size: 64,
        };
        let err = s.check(&tight_total).unwrap_err();
        assert!(err.to_string().contains("Total enumeration size"));

        s.check(&EnumerationLimits::default()).unwrap();
    }

    #[test]
    fn test_current_domain_expansion() {
        let mut s = schema();
        s.set_current_domain(CurrentDomain::from_ranges(vec![Range::int(1, 10)]))
            .unwrap();

        let err = s
            .expand_current_domain(CurrentDomain::from_ranges(vec![Range::int(2, 10)]))
            .unwrap_err();
        assert!(err.to_string().contains("can only be expanded"));

        let err = s
            .expand_current_domain(CurrentDomain::from_ranges(vec![Range::int(1, 1000)]))
            .unwrap_err();
        assert!(err.to_string().contains("past the boundaries"));

        s.expand_current_domain(CurrentDomain::from_ranges(vec![Range::int(1, 50)]))
            .unwrap();
        assert_eq!(s.current_domain().range(0), Some(&Range::int(1, 50)));
    }

    #[test]
    fn test_set_timestamp_range_renames() {
        let mut s = schema();
        let before = s.name().to_string();
        s.set_timestamp_range((Timestamp::from_millis(7), Timestamp::from_millis(7)));
        assert_ne!(s.name(), before);
        assert!(s.name().starts_with("__7_7_"));
    }
}
