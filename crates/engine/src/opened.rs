//! The snapshot produced by a successful open
//!
//! An [`OpenedArray`] is shared through `Arc`: the `Array` that produced it
//! holds one reference and any query that attached before `close()` holds
//! another, so the snapshot outlives the handle when it needs to.
//!
//! Schemas, timestamps, and the key never change after construction. Two
//! things do:
//! - enumerations loaded on demand are cached on the schemas by replacing
//!   the schema `Arc` (copy-on-write), so earlier holders keep the value
//!   they saw;
//! - a consolidation pass may swap the fragment list through
//!   [`OpenedArray::replace_fragment_metadata`].

use crate::fragment::{union_non_empty_domain, FragmentMetadata};
use crate::metadata::ArrayMetadata;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::{Datatype, EncryptionKey, TesseraResult, Timestamp};
use tessera_schema::{ArraySchema, Enumeration, Range};

/// Immutable-by-default bundle of everything an open array needs
#[derive(Debug)]
pub struct OpenedArray {
    schema_latest: RwLock<Arc<ArraySchema>>,
    schemas_all: RwLock<BTreeMap<String, Arc<ArraySchema>>>,
    fragment_metadata: RwLock<Vec<FragmentMetadata>>,
    non_empty_domain: Vec<Range>,
    metadata: ArrayMetadata,
    // Writes accumulated by a write-mode handle, flushed on close
    pending_metadata: Mutex<ArrayMetadata>,
    encryption_key: EncryptionKey,
    timestamp_start: Timestamp,
    timestamp_end_opened_at: Timestamp,
}

impl OpenedArray {
    /// Assemble a snapshot
    ///
    /// The non-empty domain is derived from `fragment_metadata`.
    pub fn new(
        schema_latest: Arc<ArraySchema>,
        schemas_all: BTreeMap<String, Arc<ArraySchema>>,
        fragment_metadata: Vec<FragmentMetadata>,
        metadata: ArrayMetadata,
        encryption_key: EncryptionKey,
        timestamp_start: Timestamp,
        timestamp_end_opened_at: Timestamp,
    ) -> Self {
        let non_empty_domain = union_non_empty_domain(&fragment_metadata);
        OpenedArray {
            schema_latest: RwLock::new(schema_latest),
            schemas_all: RwLock::new(schemas_all),
            fragment_metadata: RwLock::new(fragment_metadata),
            non_empty_domain,
            metadata,
            pending_metadata: Mutex::new(ArrayMetadata::new()),
            encryption_key,
            timestamp_start,
            timestamp_end_opened_at,
        }
    }

    /// Newest schema visible in the window
    pub fn schema_latest(&self) -> Arc<ArraySchema> {
        Arc::clone(&*self.schema_latest.read())
    }

    /// Every schema visible in the window, keyed by name
    pub fn schemas_all(&self) -> BTreeMap<String, Arc<ArraySchema>> {
        self.schemas_all.read().clone()
    }

    /// Schema version `name`, if visible
    pub fn schema(&self, name: &str) -> Option<Arc<ArraySchema>> {
        self.schemas_all.read().get(name).cloned()
    }

    /// Fragments in the window, oldest first
    pub fn fragment_metadata(&self) -> Vec<FragmentMetadata> {
        self.fragment_metadata.read().clone()
    }

    /// Swap in a new fragment list after consolidation
    pub fn replace_fragment_metadata(&self, fragments: Vec<FragmentMetadata>) {
        *self.fragment_metadata.write() = fragments;
    }

    /// Union of the fragments' non-empty domains at open time
    pub fn non_empty_domain(&self) -> &[Range] {
        &self.non_empty_domain
    }

    /// Metadata visible in the window
    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    /// Key the array was opened with
    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.encryption_key
    }

    /// Start of the window
    pub fn timestamp_start(&self) -> Timestamp {
        self.timestamp_start
    }

    /// End of the window; also the stamp of writes made through this snapshot
    pub fn timestamp_end_opened_at(&self) -> Timestamp {
        self.timestamp_end_opened_at
    }

    /// Cache `enmr` on the schema version `schema_name`
    ///
    /// Returns the cached instance, which is the one already present if a
    /// concurrent caller got there first.
    pub fn cache_enumeration(
        &self,
        schema_name: &str,
        enmr: Arc<Enumeration>,
    ) -> TesseraResult<Arc<Enumeration>> {
        // Lock order: latest, then all.
        let mut latest = self.schema_latest.write();
        let mut all = self.schemas_all.write();

        if latest.name() == schema_name {
            let stored = store_on(&mut *latest, &enmr)?;
            all.insert(schema_name.to_string(), Arc::clone(&*latest));
            return Ok(stored);
        }
        match all.get_mut(schema_name) {
            Some(schema) => store_on(schema, &enmr),
            None => Ok(enmr),
        }
    }

    pub(crate) fn record_metadata_put(
        &self,
        key: &str,
        datatype: Datatype,
        bytes: &[u8],
    ) -> TesseraResult<()> {
        self.pending_metadata.lock().put(key, datatype, bytes)
    }

    pub(crate) fn record_metadata_delete(&self, key: &str) -> TesseraResult<()> {
        self.pending_metadata.lock().delete(key)
    }

    pub(crate) fn take_pending_metadata(&self) -> ArrayMetadata {
        std::mem::take(&mut *self.pending_metadata.lock())
    }
}

fn store_on(
    schema: &mut Arc<ArraySchema>,
    enmr: &Arc<Enumeration>,
) -> TesseraResult<Arc<Enumeration>> {
    if let Some(existing) = schema.get_enumeration(enmr.name())? {
        return Ok(existing);
    }
    Arc::make_mut(schema).store_enumeration(Arc::clone(enmr))?;
    Ok(Arc::clone(enmr))
}
