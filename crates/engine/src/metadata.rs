//! Array metadata: small typed key/value pairs stored alongside an array
//!
//! Every write session produces one [`ArrayMetadata`] batch holding puts and
//! deletions. Reads merge all batches inside the opened window in timestamp
//! order, so a later put overrides and a later delete removes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_core::{Datatype, TesseraError, TesseraResult};

/// One typed metadata value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    datatype: Datatype,
    value_num: u32,
    bytes: Vec<u8>,
}

impl MetadataValue {
    /// Element type
    pub fn datatype(&self) -> Datatype {
        self.datatype
    }

    /// Number of elements
    pub fn value_num(&self) -> u32 {
        self.value_num
    }

    /// Raw little-endian element bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Batch of metadata puts and deletions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    // None marks a deletion
    entries: BTreeMap<String, Option<MetadataValue>>,
}

impl ArrayMetadata {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key = bytes`, where `bytes` holds whole `datatype` elements
    pub fn put(&mut self, key: &str, datatype: Datatype, bytes: &[u8]) -> TesseraResult<()> {
        if key.is_empty() {
            return Err(TesseraError::validation(
                "Cannot put array metadata; key cannot be empty.",
            ));
        }
        if bytes.is_empty() {
            return Err(TesseraError::validation(format!(
                "Cannot put array metadata '{}'; value cannot be empty.",
                key
            )));
        }
        let size = datatype.size() as usize;
        if bytes.len() % size != 0 {
            return Err(TesseraError::validation(format!(
                "Cannot put array metadata '{}'; value size {} is not a multiple of the {} size {}.",
                key,
                bytes.len(),
                datatype,
                size
            )));
        }
        let value_num = u32::try_from(bytes.len() / size).map_err(|_| {
            TesseraError::validation(format!(
                "Cannot put array metadata '{}'; too many values.",
                key
            ))
        })?;
        self.entries.insert(
            key.to_string(),
            Some(MetadataValue {
                datatype,
                value_num,
                bytes: bytes.to_vec(),
            }),
        );
        Ok(())
    }

    /// Record the deletion of `key`
    pub fn delete(&mut self, key: &str) -> TesseraResult<()> {
        if key.is_empty() {
            return Err(TesseraError::validation(
                "Cannot delete array metadata; key cannot be empty.",
            ));
        }
        self.entries.insert(key.to_string(), None);
        Ok(())
    }

    /// Live value of `key`
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.get(key).and_then(Option::as_ref)
    }

    /// True if `key` holds a live value
    pub fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.entries.values().filter(|v| v.is_some()).count()
    }

    /// True if no key holds a live value
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the batch records nothing, not even deletions
    pub fn has_no_changes(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys holding live values, sorted
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Apply a later batch on top of this one
    pub fn apply(&mut self, later: &ArrayMetadata) {
        for (key, value) in &later.entries {
            match value {
                Some(v) => {
                    self.entries.insert(key.clone(), Some(v.clone()));
                }
                None => {
                    self.entries.remove(key);
                }
            }
        }
    }
}
