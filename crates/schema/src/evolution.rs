//! Schema evolution
//!
//! An [`ArraySchemaEvolution`] accumulates pending changes and applies them
//! all at once to a clone of an existing schema. The input schema is never
//! touched, so a failed evolution leaves nothing half-applied.
//!
//! ## Application order
//!
//! 1. add enumerations
//! 2. extend enumerations
//! 3. add attributes
//! 4. drop attributes
//! 5. drop enumerations (names the schema does not have are skipped)
//! 6. stamp the new version and regenerate the schema name
//! 7. expand the current domain

use crate::array_schema::ArraySchema;
use crate::attribute::Attribute;
use crate::current_domain::CurrentDomain;
use crate::enumeration::Enumeration;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tessera_core::{TesseraError, TesseraResult, Timestamp};
use tracing::debug;

#[derive(Debug, Default)]
struct PendingChanges {
    attributes_to_add: Vec<Attribute>,
    attributes_to_drop: BTreeSet<String>,
    enumerations_to_add: BTreeMap<String, Arc<Enumeration>>,
    enumerations_to_extend: BTreeMap<String, Arc<Enumeration>>,
    enumerations_to_drop: BTreeSet<String>,
    timestamp_range: Option<(Timestamp, Timestamp)>,
    current_domain_to_expand: Option<CurrentDomain>,
}

/// Accumulated set of schema changes
///
/// All methods take `&self`; an internal lock serializes them.
#[derive(Debug, Default)]
pub struct ArraySchemaEvolution {
    pending: Mutex<PendingChanges>,
}

// Failures raised by schema mutators during evolution are evolution failures.
fn as_evolution_error(e: TesseraError) -> TesseraError {
    match e {
        TesseraError::Validation { message } => TesseraError::evolution(message),
        other => other,
    }
}

impl ArraySchemaEvolution {
    /// Empty evolution
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Queue an attribute for addition
    ///
    /// Cancels a pending drop of the same name.
    pub fn add_attribute(&self, attr: Attribute) -> TesseraResult<()> {
        let mut pending = self.pending.lock();
        if pending
            .attributes_to_add
            .iter()
            .any(|a| a.name() == attr.name())
        {
            return Err(TesseraError::evolution(format!(
                "Cannot add attribute; attribute '{}' is already pending addition.",
                attr.name()
            )));
        }
        pending.attributes_to_drop.remove(attr.name());
        pending.attributes_to_add.push(attr);
        Ok(())
    }

    /// Queue an attribute for removal
    ///
    /// Discards a pending addition of the same name.
    pub fn drop_attribute(&self, name: &str) {
        let mut pending = self.pending.lock();
        pending.attributes_to_add.retain(|a| a.name() != name);
        pending.attributes_to_drop.insert(name.to_string());
    }

    /// Names of attributes pending addition, in insertion order
    pub fn attribute_names_to_add(&self) -> Vec<String> {
        self.pending
            .lock()
            .attributes_to_add
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    /// Copy of the attribute pending addition under `name`
    pub fn attribute_to_add(&self, name: &str) -> Option<Attribute> {
        self.pending
            .lock()
            .attributes_to_add
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Names of attributes pending removal
    pub fn attribute_names_to_drop(&self) -> Vec<String> {
        self.pending
            .lock()
            .attributes_to_drop
            .iter()
            .cloned()
            .collect()
    }

    // =========================================================================
    // Enumerations
    // =========================================================================

    /// Queue a new enumeration
    pub fn add_enumeration(&self, enmr: Arc<Enumeration>) -> TesseraResult<()> {
        let mut pending = self.pending.lock();
        if pending.enumerations_to_add.contains_key(enmr.name()) {
            return Err(TesseraError::evolution(format!(
                "Cannot add enumeration; enumeration '{}' is already pending addition.",
                enmr.name()
            )));
        }
        pending
            .enumerations_to_add
            .insert(enmr.name().to_string(), enmr);
        Ok(())
    }

    /// Queue the replacement of an enumeration by an extension of it
    pub fn extend_enumeration(&self, enmr: Arc<Enumeration>) -> TesseraResult<()> {
        let mut pending = self.pending.lock();
        if pending.enumerations_to_extend.contains_key(enmr.name()) {
            return Err(TesseraError::evolution(format!(
                "Cannot extend enumeration; enumeration '{}' is already pending extension.",
                enmr.name()
            )));
        }
        pending
            .enumerations_to_extend
            .insert(enmr.name().to_string(), enmr);
        Ok(())
    }

    /// Queue an enumeration for removal
    ///
    /// Discards pending additions and extensions of the same name. Repeating
    /// the call is a no-op.
    pub fn drop_enumeration(&self, name: &str) {
        let mut pending = self.pending.lock();
        pending.enumerations_to_add.remove(name);
        pending.enumerations_to_extend.remove(name);
        pending.enumerations_to_drop.insert(name.to_string());
    }

    /// Names of enumerations pending addition
    pub fn enumeration_names_to_add(&self) -> Vec<String> {
        self.pending
            .lock()
            .enumerations_to_add
            .keys()
            .cloned()
            .collect()
    }

    /// Enumeration pending addition under `name`
    pub fn enumeration_to_add(&self, name: &str) -> Option<Arc<Enumeration>> {
        self.pending.lock().enumerations_to_add.get(name).cloned()
    }

    /// Names of enumerations pending extension
    pub fn enumeration_names_to_extend(&self) -> Vec<String> {
        self.pending
            .lock()
            .enumerations_to_extend
            .keys()
            .cloned()
            .collect()
    }

    /// Enumeration pending extension under `name`
    pub fn enumeration_to_extend(&self, name: &str) -> Option<Arc<Enumeration>> {
        self.pending.lock().enumerations_to_extend.get(name).cloned()
    }

    /// Names of enumerations pending removal
    pub fn enumeration_names_to_drop(&self) -> Vec<String> {
        self.pending
            .lock()
            .enumerations_to_drop
            .iter()
            .cloned()
            .collect()
    }

    // =========================================================================
    // Version and current domain
    // =========================================================================

    /// Stamp the evolved schema with an explicit version
    ///
    /// Both endpoints must be equal.
    pub fn set_timestamp_range(&self, range: (Timestamp, Timestamp)) -> TesseraResult<()> {
        if range.0 != range.1 {
            return Err(TesseraError::evolution(format!(
                "Cannot set evolution timestamp range ({}, {}); the start and end timestamps must be equal.",
                range.0, range.1
            )));
        }
        self.pending.lock().timestamp_range = Some(range);
        Ok(())
    }

    /// Explicit version stamp, if set
    pub fn timestamp_range(&self) -> Option<(Timestamp, Timestamp)> {
        self.pending.lock().timestamp_range
    }

    /// Request that the current domain be expanded to `current_domain`
    pub fn expand_current_domain(&self, current_domain: CurrentDomain) -> TesseraResult<()> {
        if current_domain.is_empty() {
            return Err(TesseraError::evolution(
                "Unable to expand the array current domain, the new current domain specified is empty.",
            ));
        }
        self.pending.lock().current_domain_to_expand = Some(current_domain);
        Ok(())
    }

    /// Requested current domain, if any
    pub fn current_domain_to_expand(&self) -> Option<CurrentDomain> {
        self.pending.lock().current_domain_to_expand.clone()
    }

    // =========================================================================
    // Application
    // =========================================================================

    /// Apply every pending change to a copy of `origin`
    pub fn evolve_schema(&self, origin: &ArraySchema) -> TesseraResult<ArraySchema> {
        let pending = self.pending.lock();
        let mut schema = origin.clone();

        for enmr in pending.enumerations_to_add.values() {
            schema
                .add_enumeration(Arc::clone(enmr))
                .map_err(as_evolution_error)?;
        }

        for enmr in pending.enumerations_to_extend.values() {
            schema
                .extend_enumeration(Arc::clone(enmr))
                .map_err(as_evolution_error)?;
        }

        for attr in &pending.attributes_to_add {
            schema
                .add_attribute(attr.clone())
                .map_err(as_evolution_error)?;
        }

        for name in &pending.attributes_to_drop {
            schema.drop_attribute(name).map_err(as_evolution_error)?;
        }

        for name in &pending.enumerations_to_drop {
            if schema.has_enumeration(name) {
                schema.drop_enumeration(name).map_err(as_evolution_error)?;
            }
        }

        let range = pending.timestamp_range.unwrap_or_else(|| {
            let now = Timestamp::now();
            (now, now)
        });
        schema.set_timestamp_range(range);

        if let Some(current_domain) = &pending.current_domain_to_expand {
            schema
                .expand_current_domain(current_domain.clone())
                .map_err(as_evolution_error)?;
        }

        debug!(
            target: "tessera::evolution",
            schema = %schema.name(),
            attributes_added = pending.attributes_to_add.len(),
            attributes_dropped = pending.attributes_to_drop.len(),
            enumerations_added = pending.enumerations_to_add.len(),
            enumerations_extended = pending.enumerations_to_extend.len(),
            enumerations_dropped = pending.enumerations_to_drop.len(),
            current_domain_expanded = pending.current_domain_to_expand.is_some(),
            "Evolved array schema"
        );

        Ok(schema)
    }
}
