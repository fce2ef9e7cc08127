//! On-demand enumeration loading

use super::Array;
use crate::opened::OpenedArray;
use std::sync::Arc;
use tessera_core::{TesseraError, TesseraResult};
use tessera_schema::{ArraySchema, Enumeration};
use tracing::debug;

impl Array {
    /// Enumeration `name` of the latest schema, loading and caching it if
    /// needed
    pub fn get_enumeration(&self, name: &str) -> TesseraResult<Arc<Enumeration>> {
        let opened = self.enumeration_snapshot("loading enumerations")?;
        let schema = opened.schema_latest();
        self.load_enumeration_into(&opened, &schema, name)
    }

    /// Bulk form of [`Array::get_enumeration`], in the order of `names`
    pub fn get_enumerations(&self, names: &[&str]) -> TesseraResult<Vec<Arc<Enumeration>>> {
        let opened = self.enumeration_snapshot("loading enumerations")?;
        let schema = opened.schema_latest();
        names
            .iter()
            .map(|name| self.load_enumeration_into(&opened, &schema, name))
            .collect()
    }

    /// Load every enumeration of the latest schema, or of every schema in
    /// the window when `latest_only` is false
    ///
    /// Enumerations already loaded are skipped, so repeating the call does
    /// nothing.
    pub fn load_all_enumerations(&self, latest_only: bool) -> TesseraResult<()> {
        let opened = self.enumeration_snapshot("loading enumerations")?;
        let schemas: Vec<Arc<ArraySchema>> = if latest_only {
            vec![opened.schema_latest()]
        } else {
            opened.schemas_all().into_values().collect()
        };

        let mut loaded = 0usize;
        for schema in schemas {
            let enmrs =
                self.directory
                    .load_all_enumerations(&self.uri, &schema, opened.encryption_key())?;
            for enmr in enmrs {
                opened.cache_enumeration(schema.name(), enmr)?;
                loaded += 1;
            }
        }

        debug!(
            target: "tessera::array",
            uri = %self.uri,
            latest_only,
            loaded,
            "Loaded enumerations"
        );
        Ok(())
    }

    fn enumeration_snapshot(&self, operation: &str) -> TesseraResult<Arc<OpenedArray>> {
        let opened = self.with_handle(operation, |h| Arc::clone(&h.opened))?;
        if self.uri.is_remote() {
            return Err(TesseraError::remote_unsupported(operation));
        }
        Ok(opened)
    }

    fn load_enumeration_into(
        &self,
        opened: &OpenedArray,
        schema: &ArraySchema,
        name: &str,
    ) -> TesseraResult<Arc<Enumeration>> {
        if let Some(enmr) = schema.get_enumeration(name)? {
            return Ok(enmr);
        }
        let enmr = self
            .directory
            .load_enumeration(&self.uri, schema, name, opened.encryption_key())?;
        opened.cache_enumeration(schema.name(), enmr)
    }
}
