//! Array metadata access through an open handle
//!
//! Writes are buffered on the snapshot and persisted on `close()`; reads see
//! what was in the opened window.

use super::Array;
use crate::metadata::MetadataValue;
use tessera_core::{Datatype, QueryType, TesseraResult};

impl Array {
    /// Buffer `key = values` for the next close
    pub fn put_metadata(&self, key: &str, datatype: Datatype, values: &[u8]) -> TesseraResult<()> {
        self.snapshot_in_mode("put metadata", "a write", |m| m.is_write())?
            .record_metadata_put(key, datatype, values)
    }

    /// Buffer the deletion of `key` for the next close
    pub fn delete_metadata(&self, key: &str) -> TesseraResult<()> {
        self.snapshot_in_mode("delete metadata", "a write", |m| m.is_write())?
            .record_metadata_delete(key)
    }

    /// Value of `key` in the opened window
    pub fn get_metadata(&self, key: &str) -> TesseraResult<Option<MetadataValue>> {
        let opened = self.snapshot_in_mode("get metadata", "READ", |m| m == QueryType::Read)?;
        Ok(opened.metadata().get(key).cloned())
    }

    /// Number of metadata keys in the opened window
    pub fn metadata_num(&self) -> TesseraResult<usize> {
        let opened = self.snapshot_in_mode("get metadata", "READ", |m| m == QueryType::Read)?;
        Ok(opened.metadata().len())
    }

    /// True if `key` has a value in the opened window
    pub fn has_metadata_key(&self, key: &str) -> TesseraResult<bool> {
        let opened = self.snapshot_in_mode("get metadata", "READ", |m| m == QueryType::Read)?;
        Ok(opened.metadata().has_key(key))
    }
}
