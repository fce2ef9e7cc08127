//! The storage seam between the control plane and an array's on-disk layout
//!
//! An [`ArrayDirectory`] knows where schema versions, enumeration records,
//! fragment metadata, and metadata batches live for each array URI. `Array`
//! only talks to storage through this trait, so a backend can be swapped
//! without touching open/close or evolution logic.

use crate::fragment::FragmentMetadata;
use crate::metadata::ArrayMetadata;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::{ArrayUri, EncryptionKey, TesseraResult, Timestamp};
use tessera_schema::{ArraySchema, Enumeration};

/// Storage backend for arrays
///
/// Implementations must be safe to share between threads; every method
/// takes `&self`.
pub trait ArrayDirectory: Send + Sync {
    /// Create a new array whose first schema version is `schema`
    ///
    /// Enumerations loaded on `schema` are persisted with it. Fails if an
    /// array already exists at `uri`.
    fn create_array(
        &self,
        uri: &ArrayUri,
        schema: &ArraySchema,
        key: &EncryptionKey,
    ) -> TesseraResult<()>;

    /// True if an array exists at `uri`
    fn is_array(&self, uri: &ArrayUri) -> bool;

    /// Newest schema version whose timestamp is at or before `timestamp_end`
    ///
    /// The returned schema has no enumerations loaded.
    fn load_array_schema_latest(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_end: Timestamp,
    ) -> TesseraResult<ArraySchema>;

    /// Every schema version at or before `timestamp_end`, keyed by name
    fn load_array_schemas_all(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_end: Timestamp,
    ) -> TesseraResult<BTreeMap<String, Arc<ArraySchema>>>;

    /// Fragments whose write interval lies in `[timestamp_start, timestamp_end]`,
    /// oldest first
    fn load_fragment_metadata(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
    ) -> TesseraResult<Vec<FragmentMetadata>>;

    /// Load the enumeration `name` referenced by `schema`
    fn load_enumeration(
        &self,
        uri: &ArrayUri,
        schema: &ArraySchema,
        name: &str,
        key: &EncryptionKey,
    ) -> TesseraResult<Arc<Enumeration>>;

    /// Load every enumeration of `schema` that is not already loaded on it
    fn load_all_enumerations(
        &self,
        uri: &ArrayUri,
        schema: &ArraySchema,
        key: &EncryptionKey,
    ) -> TesseraResult<Vec<Arc<Enumeration>>> {
        schema
            .enumeration_names()
            .into_iter()
            .filter(|name| !schema.is_enumeration_loaded(name))
            .map(|name| self.load_enumeration(uri, schema, &name, key))
            .collect()
    }

    /// Persist a new schema version and any enumerations loaded on it
    fn store_array_schema(
        &self,
        uri: &ArrayUri,
        schema: &ArraySchema,
        key: &EncryptionKey,
    ) -> TesseraResult<()>;

    /// Merge every metadata batch written in `[timestamp_start, timestamp_end]`
    fn load_metadata(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
    ) -> TesseraResult<ArrayMetadata>;

    /// Persist one metadata batch written at `timestamp`
    fn store_metadata(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp: Timestamp,
        metadata: &ArrayMetadata,
    ) -> TesseraResult<()>;

    /// Remove the array and everything stored for it
    fn delete_array(&self, uri: &ArrayUri, key: &EncryptionKey) -> TesseraResult<()>;

    /// Remove fragments whose write interval lies in `[timestamp_start, timestamp_end]`
    ///
    /// Returns the number of fragments removed.
    fn delete_fragments(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
    ) -> TesseraResult<usize>;

    /// Remove the named fragments; fails without removing anything if a name
    /// is unknown
    fn delete_fragments_list(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        fragment_names: &[String],
    ) -> TesseraResult<()>;
}
