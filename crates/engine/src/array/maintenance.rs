//! Array creation, schema evolution, and destructive maintenance

use super::{check_window, Array};
use crate::config::ArrayConfig;
use crate::directory::ArrayDirectory;
use crate::opened::OpenedArray;
use std::sync::Arc;
use tessera_core::{ArrayUri, EncryptionKey, QueryType, TesseraError, TesseraResult, Timestamp};
use tessera_schema::{ArraySchema, ArraySchemaEvolution};
use tracing::info;

impl Array {
    // =========================================================================
    // Creation and evolution
    // =========================================================================

    /// Create a new array at `uri` with `schema` as its first version
    pub fn create(
        directory: &dyn ArrayDirectory,
        uri: &ArrayUri,
        schema: &ArraySchema,
        key: &EncryptionKey,
        config: &ArrayConfig,
    ) -> TesseraResult<()> {
        if uri.is_empty() {
            return Err(TesseraError::validation(
                "Cannot create array; the URI cannot be empty.",
            ));
        }
        schema.check(&config.enumeration_limits())?;
        directory.create_array(uri, schema, key)?;
        info!(target: "tessera::array", uri = %uri, schema = %schema.name(), "Created array");
        Ok(())
    }

    /// Newest stored schema of the array at `uri`, without enumerations loaded
    pub fn load_schema(
        directory: &dyn ArrayDirectory,
        uri: &ArrayUri,
        key: &EncryptionKey,
    ) -> TesseraResult<ArraySchema> {
        directory.load_array_schema_latest(uri, key, Timestamp::MAX)
    }

    /// Apply `evolution` to the newest schema and store the result as a new
    /// version
    ///
    /// Returns the stored schema. Open handles keep their snapshot; the new
    /// version is visible to the next open or reopen whose window includes it.
    pub fn evolve(
        directory: &dyn ArrayDirectory,
        uri: &ArrayUri,
        evolution: &ArraySchemaEvolution,
        key: &EncryptionKey,
        config: &ArrayConfig,
    ) -> TesseraResult<ArraySchema> {
        if uri.is_remote() {
            return Err(TesseraError::remote_unsupported("schema evolution"));
        }

        let mut origin = directory.load_array_schema_latest(uri, key, Timestamp::MAX)?;
        for enmr in directory.load_all_enumerations(uri, &origin, key)? {
            origin.store_enumeration(enmr)?;
        }

        let evolved = evolution.evolve_schema(&origin)?;
        evolved.check(&config.enumeration_limits())?;
        directory.store_array_schema(uri, &evolved, key)?;

        info!(
            target: "tessera::array",
            uri = %uri,
            from = %origin.name(),
            to = %evolved.name(),
            "Evolved array schema"
        );
        Ok(evolved)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Delete the whole array
    ///
    /// The handle stays open until `close()`; buffered metadata writes are
    /// discarded.
    pub fn delete_array(&self) -> TesseraResult<()> {
        let opened = self.exclusive_snapshot("delete array")?;
        opened.take_pending_metadata();
        self.directory
            .delete_array(&self.uri, opened.encryption_key())?;
        info!(target: "tessera::array", uri = %self.uri, array = %self.id, "Deleted array");
        Ok(())
    }

    /// Delete fragments written within `[timestamp_start, timestamp_end]`
    ///
    /// Returns the number of fragments removed.
    pub fn delete_fragments(
        &self,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
    ) -> TesseraResult<usize> {
        let opened = self.exclusive_snapshot("delete fragments")?;
        check_window(timestamp_start, timestamp_end)?;
        let removed = self.directory.delete_fragments(
            &self.uri,
            opened.encryption_key(),
            timestamp_start,
            timestamp_end,
        )?;
        info!(
            target: "tessera::array",
            uri = %self.uri,
            timestamp_start = %timestamp_start,
            timestamp_end = %timestamp_end,
            removed,
            "Deleted fragments"
        );
        Ok(removed)
    }

    /// Delete the named fragments
    pub fn delete_fragments_list(&self, fragment_names: &[String]) -> TesseraResult<()> {
        let opened = self.exclusive_snapshot("delete fragments")?;
        if fragment_names.is_empty() {
            return Err(TesseraError::validation(
                "Failed to delete fragments list; Invalid input number of fragments",
            ));
        }
        self.directory
            .delete_fragments_list(&self.uri, opened.encryption_key(), fragment_names)?;
        info!(
            target: "tessera::array",
            uri = %self.uri,
            count = fragment_names.len(),
            "Deleted fragments by name"
        );
        Ok(())
    }

    fn exclusive_snapshot(&self, operation: &str) -> TesseraResult<Arc<OpenedArray>> {
        self.snapshot_in_mode(operation, "MODIFY_EXCLUSIVE", |m| {
            m == QueryType::ModifyExclusive
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::fixture;
    use super::*;
    use crate::fragment::FragmentMetadata;
    use tessera_schema::Range;

    fn write_fragments(directory: &crate::memory::MemoryDirectory, uri: &ArrayUri, n: u64) {
        for i in 1..=n {
            let t = Timestamp::from_millis(i);
            let fragment =
                FragmentMetadata::new(format!("f{}", i), (t, t), "s", vec![Range::int(0, 1)], 1);
            directory.write_fragment(uri, fragment).unwrap();
        }
    }

    #[test]
    fn test_deletes_require_exclusive_mode() {
        let (directory, _, array) = fixture("mem://del");
        write_fragments(&directory, array.uri(), 2);

        assert!(array.delete_array().is_err());
        array.open(QueryType::Write, EncryptionKey::none()).unwrap();
        let err = array.delete_array().unwrap_err();
        assert!(matches!(err, TesseraError::InvalidState { .. }));
        assert!(array
            .delete_fragments(Timestamp::EPOCH, Timestamp::MAX)
            .is_err());
        assert!(array.delete_fragments_list(&["f1".to_string()]).is_err());
        array.close().unwrap();
        assert_eq!(directory.fragment_count(array.uri()), 2);
    }

    #[test]
    fn test_delete_fragments_in_window() {
        let (directory, _, array) = fixture("mem://del");
        write_fragments(&directory, array.uri(), 3);

        array
            .open(QueryType::ModifyExclusive, EncryptionKey::none())
            .unwrap();
        let removed = array
            .delete_fragments(Timestamp::from_millis(2), Timestamp::from_millis(3))
            .unwrap();
        assert_eq!(removed, 2);

        let err = array.delete_fragments_list(&[]).unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid input number of fragments"));
        array.delete_fragments_list(&["f1".to_string()]).unwrap();
        array.close().unwrap();
        assert_eq!(directory.fragment_count(array.uri()), 0);
    }

    #[test]
    fn test_delete_array() {
        let (directory, _, array) = fixture("mem://del");
        array
            .open(QueryType::ModifyExclusive, EncryptionKey::none())
            .unwrap();
        array.delete_array().unwrap();
        array.close().unwrap();
        assert!(!directory.is_array(array.uri()));
        assert!(array.open(QueryType::Read, EncryptionKey::none()).is_err());
    }

    #[test]
    fn test_evolve_rejects_remote_uri() {
        let (directory, _, _) = fixture("mem://del");
        let err = Array::evolve(
            directory.as_ref(),
            &ArrayUri::new("rest://ns/array"),
            &ArraySchemaEvolution::new(),
            &EncryptionKey::none(),
            &ArrayConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TesseraError::RemoteUnsupported { .. }));
    }
}
