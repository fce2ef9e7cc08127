//! Consistency controller
//!
//! Arbitrates concurrent open handles to the same array URI. Every open
//! handle holds one registry entry `(uri, array, mode)` for as long as it is
//! open. Any number of entries may share a URI unless one of them is
//! `ModifyExclusive`, which must be alone.
//!
//! Entries are owned by [`ConsistencySentry`] guards; dropping the guard is
//! the only way an entry leaves the registry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_core::{ArrayUri, QueryType, TesseraError, TesseraResult};
use tracing::{debug, warn};

static NEXT_ARRAY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an array handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u64);

impl ArrayId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        ArrayId(NEXT_ARRAY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "array-{}", self.0)
    }
}

/// Identity of one registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EntryId(u64);

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: EntryId,
    array: ArrayId,
    mode: QueryType,
}

/// Registry of open array handles
///
/// One lock guards the whole map. It is held only for the map operation
/// itself, never across I/O.
#[derive(Debug, Default)]
pub struct ConsistencyController {
    registry: Mutex<HashMap<ArrayUri, Vec<Entry>>>,
    next_entry: AtomicU64,
}

impl ConsistencyController {
    /// Empty controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `array` as open on `uri` and wrap the entry in a guard
    ///
    /// # Errors
    ///
    /// - `Validation` if `uri` is empty
    /// - `Conflict` if `mode` is `ModifyExclusive` and `uri` is already open,
    ///   or if `uri` is already open in `ModifyExclusive` mode
    pub fn make_sentry(
        self: &Arc<Self>,
        uri: &ArrayUri,
        array: ArrayId,
        mode: QueryType,
    ) -> TesseraResult<ConsistencySentry> {
        let entry = self.register_array(uri, array, mode)?;
        Ok(ConsistencySentry {
            controller: Arc::clone(self),
            uri: uri.clone(),
            entry,
            array,
            mode,
        })
    }

    pub(crate) fn register_array(
        &self,
        uri: &ArrayUri,
        array: ArrayId,
        mode: QueryType,
    ) -> TesseraResult<EntryId> {
        if uri.is_empty() {
            return Err(TesseraError::validation(
                "Cannot register array; the URI must not be empty.",
            ));
        }

        let mut registry = self.registry.lock();
        if let Some(entries) = registry.get(uri).filter(|e| !e.is_empty()) {
            let conflict = if mode.is_exclusive() {
                Some("Cannot open array in MODIFY_EXCLUSIVE mode; it is already open.")
            } else if entries.iter().any(|e| e.mode.is_exclusive()) {
                Some("Cannot open array; it is already open in MODIFY_EXCLUSIVE mode.")
            } else {
                None
            };
            if let Some(message) = conflict {
                warn!(
                    target: "tessera::consistency",
                    uri = %uri,
                    %array,
                    %mode,
                    open_handles = entries.len(),
                    "Refused array registration"
                );
                return Err(TesseraError::conflict(uri.as_str(), message));
            }
        }

        let id = EntryId(self.next_entry.fetch_add(1, Ordering::Relaxed));
        registry
            .entry(uri.clone())
            .or_default()
            .push(Entry { id, array, mode });
        debug!(target: "tessera::consistency", uri = %uri, %array, %mode, "Registered array");
        Ok(id)
    }

    fn deregister_array(&self, uri: &ArrayUri, id: EntryId) {
        let mut registry = self.registry.lock();
        if let Some(entries) = registry.get_mut(uri) {
            if let Some(pos) = entries.iter().position(|e| e.id == id) {
                let entry = entries.swap_remove(pos);
                debug!(
                    target: "tessera::consistency",
                    uri = %uri,
                    array = %entry.array,
                    mode = %entry.mode,
                    "Deregistered array"
                );
            }
            if entries.is_empty() {
                registry.remove(uri);
            }
        }
    }

    /// True if at least one handle has `uri` open
    pub fn is_open(&self, uri: &ArrayUri) -> bool {
        self.open_count(uri) > 0
    }

    /// Number of handles that have `uri` open
    pub fn open_count(&self, uri: &ArrayUri) -> usize {
        self.registry.lock().get(uri).map_or(0, Vec::len)
    }

    /// Number of distinct open URIs
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    /// True if nothing is open
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }
}

/// Guard owning one registry entry
///
/// Created only by [`ConsistencyController::make_sentry`]. Dropping it
/// removes the entry exactly once.
#[derive(Debug)]
pub struct ConsistencySentry {
    controller: Arc<ConsistencyController>,
    uri: ArrayUri,
    entry: EntryId,
    array: ArrayId,
    mode: QueryType,
}

impl ConsistencySentry {
    /// URI the entry is registered under
    pub fn uri(&self) -> &ArrayUri {
        &self.uri
    }

    /// Handle the entry belongs to
    pub fn array_id(&self) -> ArrayId {
        self.array
    }

    /// Mode the entry was registered with
    pub fn mode(&self) -> QueryType {
        self.mode
    }
}

impl Drop for ConsistencySentry {
    fn drop(&mut self) {
        self.controller.deregister_array(&self.uri, self.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> ArrayUri {
        ArrayUri::new(s)
    }

    #[test]
    fn test_empty_uri_rejected() {
        let controller = Arc::new(ConsistencyController::new());
        let err = controller
            .make_sentry(&uri(""), ArrayId::next(), QueryType::Read)
            .unwrap_err();
        assert!(matches!(err, TesseraError::Validation { .. }));
        assert!(controller.is_empty());
    }

    #[test]
    fn test_shared_modes_coexist() {
        let controller = Arc::new(ConsistencyController::new());
        let a = uri("mem://a");
        let s1 = controller.make_sentry(&a, ArrayId::next(), QueryType::Read).unwrap();
        let s2 = controller.make_sentry(&a, ArrayId::next(), QueryType::Write).unwrap();
        let s3 = controller.make_sentry(&a, ArrayId::next(), QueryType::Read).unwrap();
        assert_eq!(controller.open_count(&a), 3);
        drop((s1, s2, s3));
        assert!(!controller.is_open(&a));
        assert!(controller.is_empty());
    }

    #[test]
    fn test_exclusive_conflicts() {
        let controller = Arc::new(ConsistencyController::new());
        let a = uri("mem://a");

        let reader = controller.make_sentry(&a, ArrayId::next(), QueryType::Read).unwrap();
        let err = controller
            .make_sentry(&a, ArrayId::next(), QueryType::ModifyExclusive)
            .unwrap_err();
        assert!(err.is_conflict());
        drop(reader);

        let exclusive = controller
            .make_sentry(&a, ArrayId::next(), QueryType::ModifyExclusive)
            .unwrap();
        for mode in [QueryType::Read, QueryType::Write, QueryType::ModifyExclusive] {
            assert!(controller.make_sentry(&a, ArrayId::next(), mode).is_err());
        }
        assert_eq!(controller.open_count(&a), 1);
        drop(exclusive);
        assert!(controller.make_sentry(&a, ArrayId::next(), QueryType::Read).is_ok());
    }

    #[test]
    fn test_uris_are_independent() {
        let controller = Arc::new(ConsistencyController::new());
        let _a = controller
            .make_sentry(&uri("mem://a"), ArrayId::next(), QueryType::ModifyExclusive)
            .unwrap();
        let _b = controller
            .make_sentry(&uri("mem://b"), ArrayId::next(), QueryType::ModifyExclusive)
            .unwrap();
        assert_eq!(controller.len(), 2);
    }

    #[test]
    fn test_drop_removes_only_its_entry() {
        let controller = Arc::new(ConsistencyController::new());
        let a = uri("mem://a");
        let id = ArrayId::next();
        // The same handle id may appear twice; entries are still distinct.
        let first = controller.make_sentry(&a, id, QueryType::Read).unwrap();
        let second = controller.make_sentry(&a, id, QueryType::Read).unwrap();
        drop(first);
        assert_eq!(controller.open_count(&a), 1);
        assert_eq!(second.array_id(), id);
        assert_eq!(second.mode(), QueryType::Read);
        assert_eq!(second.uri(), &a);
    }

    #[test]
    fn test_moved_sentry_deregisters_once() {
        let controller = Arc::new(ConsistencyController::new());
        let a = uri("mem://a");
        let sentry = controller.make_sentry(&a, ArrayId::next(), QueryType::Read).unwrap();
        let moved = Some(sentry);
        assert_eq!(controller.open_count(&a), 1);
        drop(moved);
        assert_eq!(controller.open_count(&a), 0);
    }

    #[test]
    fn test_register_array_directly() {
        let controller = ConsistencyController::new();
        let a = uri("mem://a");
        let id = controller
            .register_array(&a, ArrayId::next(), QueryType::Update)
            .unwrap();
        assert!(controller.is_open(&a));
        controller.deregister_array(&a, id);
        controller.deregister_array(&a, id);
        assert!(!controller.is_open(&a));
    }
}
