//! In-memory array directory
//!
//! Keeps everything an [`ArrayDirectory`] persists in a sharded map keyed by
//! URI. Schemas are stored as bincode snapshots and enumerations as their
//! binary records, so every load produces a fresh value exactly as a
//! file-backed directory would.

use crate::directory::ArrayDirectory;
use crate::fragment::FragmentMetadata;
use crate::metadata::ArrayMetadata;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tessera_core::{ArrayUri, EncryptionKey, TesseraError, TesseraResult, Timestamp};
use tessera_schema::{ArraySchema, Enumeration};
use tracing::debug;

#[derive(Debug)]
struct StoredArray {
    key: EncryptionKey,
    // bincode snapshots in write order
    schemas: Vec<Vec<u8>>,
    // enumeration records keyed by path name
    enumerations: HashMap<String, Vec<u8>>,
    fragments: Vec<FragmentMetadata>,
    metadata: Vec<(Timestamp, ArrayMetadata)>,
}

impl StoredArray {
    fn new(key: &EncryptionKey) -> Self {
        StoredArray {
            key: key.clone(),
            schemas: Vec::new(),
            enumerations: HashMap::new(),
            fragments: Vec::new(),
            metadata: Vec::new(),
        }
    }

    fn check_key(&self, uri: &ArrayUri, key: &EncryptionKey) -> TesseraResult<()> {
        if self.key != *key {
            return Err(TesseraError::validation(format!(
                "Cannot access array '{}'; the encryption key does not match.",
                uri
            )));
        }
        Ok(())
    }

    fn push_schema(&mut self, uri: &ArrayUri, schema: &ArraySchema) -> TesseraResult<()> {
        for name in schema.enumeration_names() {
            let loaded = schema.is_enumeration_loaded(&name);
            let stored = schema
                .enumeration_path_name(&name)
                .map_or(false, |path| self.enumerations.contains_key(path));
            if !loaded && !stored {
                return Err(TesseraError::storage(format!(
                    "Cannot store array schema for '{}'; enumeration '{}' is neither loaded nor stored.",
                    uri, name
                )));
            }
        }

        let bytes = bincode::serialize(schema)?;
        for enmr in schema.loaded_enumerations() {
            self.enumerations
                .entry(enmr.path_name().to_string())
                .or_insert_with(|| enmr.serialize());
        }
        self.schemas.push(bytes);
        Ok(())
    }

    fn schemas_until(&self, timestamp_end: Timestamp) -> TesseraResult<Vec<ArraySchema>> {
        let mut schemas = Vec::with_capacity(self.schemas.len());
        for bytes in &self.schemas {
            let schema: ArraySchema = bincode::deserialize(bytes)?;
            if schema.timestamp_end() <= timestamp_end {
                schemas.push(schema);
            }
        }
        Ok(schemas)
    }
}

/// [`ArrayDirectory`] backed by process memory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    arrays: DashMap<ArrayUri, StoredArray>,
}

impl MemoryDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fragment as if a writer had just committed it
    pub fn write_fragment(&self, uri: &ArrayUri, fragment: FragmentMetadata) -> TesseraResult<()> {
        let mut stored = self.get_mut(uri)?;
        if stored.fragments.iter().any(|f| f.name() == fragment.name()) {
            return Err(TesseraError::validation(format!(
                "Cannot write fragment '{}'; a fragment with that name already exists.",
                fragment.name()
            )));
        }
        stored.fragments.push(fragment);
        Ok(())
    }

    /// Number of stored schema versions for `uri`
    pub fn schema_version_count(&self, uri: &ArrayUri) -> usize {
        self.arrays.get(uri).map_or(0, |a| a.schemas.len())
    }

    /// Number of stored fragments for `uri`
    pub fn fragment_count(&self, uri: &ArrayUri) -> usize {
        self.arrays.get(uri).map_or(0, |a| a.fragments.len())
    }

    fn get(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
    ) -> TesseraResult<dashmap::mapref::one::Ref<'_, ArrayUri, StoredArray>> {
        let stored = self
            .arrays
            .get(uri)
            .ok_or_else(|| TesseraError::not_found(format!("array '{}'", uri)))?;
        stored.check_key(uri, key)?;
        Ok(stored)
    }

    fn get_mut(
        &self,
        uri: &ArrayUri,
    ) -> TesseraResult<dashmap::mapref::one::RefMut<'_, ArrayUri, StoredArray>> {
        self.arrays
            .get_mut(uri)
            .ok_or_else(|| TesseraError::not_found(format!("array '{}'", uri)))
    }

    fn get_mut_checked(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
    ) -> TesseraResult<dashmap::mapref::one::RefMut<'_, ArrayUri, StoredArray>> {
        let stored = self.get_mut(uri)?;
        stored.check_key(uri, key)?;
        Ok(stored)
    }
}

impl ArrayDirectory for MemoryDirectory {
    fn create_array(
        &self,
        uri: &ArrayUri,
        schema: &ArraySchema,
        key: &EncryptionKey,
    ) -> TesseraResult<()> {
        if uri.is_empty() {
            return Err(TesseraError::validation(
                "Cannot create array; the URI cannot be empty.",
            ));
        }
        let mut stored = StoredArray::new(key);
        stored.push_schema(uri, schema)?;

        match self.arrays.entry(uri.clone()) {
            Entry::Occupied(_) => Err(TesseraError::validation(format!(
                "Cannot create array; an array already exists at '{}'.",
                uri
            ))),
            Entry::Vacant(slot) => {
                slot.insert(stored);
                debug!(
                    target: "tessera::directory",
                    uri = %uri,
                    schema = %schema.name(),
                    "Created array"
                );
                Ok(())
            }
        }
    }

    fn is_array(&self, uri: &ArrayUri) -> bool {
        self.arrays.contains_key(uri)
    }

    fn load_array_schema_latest(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_end: Timestamp,
    ) -> TesseraResult<ArraySchema> {
        let stored = self.get(uri, key)?;
        let mut latest: Option<ArraySchema> = None;
        // Later writes win timestamp ties.
        for schema in stored.schemas_until(timestamp_end)? {
            if latest
                .as_ref()
                .map_or(true, |l| schema.timestamp_end() >= l.timestamp_end())
            {
                latest = Some(schema);
            }
        }
        latest.ok_or_else(|| {
            TesseraError::not_found(format!(
                "array schema of '{}' at or before timestamp {}",
                uri, timestamp_end
            ))
        })
    }

    fn load_array_schemas_all(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_end: Timestamp,
    ) -> TesseraResult<BTreeMap<String, Arc<ArraySchema>>> {
        let stored = self.get(uri, key)?;
        Ok(stored
            .schemas_until(timestamp_end)?
            .into_iter()
            .map(|schema| (schema.name().to_string(), Arc::new(schema)))
            .collect())
    }

    fn load_fragment_metadata(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
    ) -> TesseraResult<Vec<FragmentMetadata>> {
        let stored = self.get(uri, key)?;
        let mut fragments: Vec<FragmentMetadata> = stored
            .fragments
            .iter()
            .filter(|f| f.is_within(timestamp_start, timestamp_end))
            .cloned()
            .collect();
        fragments.sort_by_key(|f| f.timestamp_range());
        Ok(fragments)
    }

    fn load_enumeration(
        &self,
        uri: &ArrayUri,
        schema: &ArraySchema,
        name: &str,
        key: &EncryptionKey,
    ) -> TesseraResult<Arc<Enumeration>> {
        let path_name = schema.enumeration_path_name(name).ok_or_else(|| {
            TesseraError::not_found(format!("enumeration '{}' in array '{}'", name, uri))
        })?;
        let stored = self.get(uri, key)?;
        let bytes = stored.enumerations.get(path_name).ok_or_else(|| {
            TesseraError::storage(format!(
                "Cannot load enumeration '{}'; no record at path '{}'.",
                name, path_name
            ))
        })?;
        let enmr = Enumeration::deserialize(bytes)?;
        if enmr.name() != name {
            return Err(TesseraError::serialization(format!(
                "Enumeration record at path '{}' is named '{}', expected '{}'.",
                path_name,
                enmr.name(),
                name
            )));
        }
        Ok(Arc::new(enmr))
    }

    fn store_array_schema(
        &self,
        uri: &ArrayUri,
        schema: &ArraySchema,
        key: &EncryptionKey,
    ) -> TesseraResult<()> {
        let mut stored = self.get_mut_checked(uri, key)?;
        stored.push_schema(uri, schema)?;
        debug!(
            target: "tessera::directory",
            uri = %uri,
            schema = %schema.name(),
            "Stored array schema"
        );
        Ok(())
    }

    fn load_metadata(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
    ) -> TesseraResult<ArrayMetadata> {
        let stored = self.get(uri, key)?;
        let mut batches: Vec<&(Timestamp, ArrayMetadata)> = stored
            .metadata
            .iter()
            .filter(|(t, _)| t.within(timestamp_start, timestamp_end))
            .collect();
        batches.sort_by_key(|(t, _)| *t);

        let mut merged = ArrayMetadata::new();
        for (_, batch) in batches {
            merged.apply(batch);
        }
        Ok(merged)
    }

    fn store_metadata(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp: Timestamp,
        metadata: &ArrayMetadata,
    ) -> TesseraResult<()> {
        let mut stored = self.get_mut_checked(uri, key)?;
        stored.metadata.push((timestamp, metadata.clone()));
        Ok(())
    }

    fn delete_array(&self, uri: &ArrayUri, key: &EncryptionKey) -> TesseraResult<()> {
        self.get(uri, key)?;
        self.arrays.remove(uri);
        debug!(target: "tessera::directory", uri = %uri, "Deleted array");
        Ok(())
    }

    fn delete_fragments(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
    ) -> TesseraResult<usize> {
        let mut stored = self.get_mut_checked(uri, key)?;
        let before = stored.fragments.len();
        stored
            .fragments
            .retain(|f| !f.is_within(timestamp_start, timestamp_end));
        Ok(before - stored.fragments.len())
    }

    fn delete_fragments_list(
        &self,
        uri: &ArrayUri,
        key: &EncryptionKey,
        fragment_names: &[String],
    ) -> TesseraResult<()> {
        let mut stored = self.get_mut_checked(uri, key)?;
        if let Some(missing) = fragment_names
            .iter()
            .find(|name| !stored.fragments.iter().any(|f| f.name() == name.as_str()))
        {
            return Err(TesseraError::not_found(format!(
                "fragment '{}' of array '{}'",
                missing, uri
            )));
        }
        stored
            .fragments
            .retain(|f| !fragment_names.iter().any(|name| name == f.name()));
        Ok(())
    }
}
