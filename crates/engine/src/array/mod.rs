//! Array handle and its open/close lifecycle
//!
//! An [`Array`] is a handle to one array URI. It starts closed; `open`
//! registers the handle with a [`ConsistencyController`] and only then loads
//! a snapshot ([`OpenedArray`]) through the [`ArrayDirectory`].
//!
//! ## States
//!
//! ```text
//! Closed --open()--> Opening --ok--> Open(mode) --close()--> Closed
//!                       |
//!                       +--error--> Closed
//! ```
//!
//! `reopen` swaps the snapshot for a new timestamp window without leaving
//! `Open`. All transitions hold the handle's write lock for their whole body.

mod enumerations;
mod maintenance;
mod metadata;

use crate::config::ArrayConfig;
use crate::directory::ArrayDirectory;
use crate::fragment::FragmentMetadata;
use crate::metadata::ArrayMetadata;
use crate::opened::OpenedArray;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessera_concurrency::{global_controller, ArrayId, ConsistencyController, ConsistencySentry};
use tessera_core::{ArrayUri, EncryptionKey, QueryType, TesseraError, TesseraResult, Timestamp};
use tessera_schema::{ArraySchema, Range};
use tracing::{info, warn};

/// Lifecycle state of an [`Array`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayState {
    /// Not open
    Closed,
    /// Inside `open()`
    Opening,
    /// Open in the given mode
    Open(QueryType),
}

// Everything that exists only while open. Dropping it releases the
// registration.
struct OpenHandle {
    sentry: ConsistencySentry,
    opened: Arc<OpenedArray>,
}

struct Inner {
    state: ArrayState,
    handle: Option<OpenHandle>,
    timestamp_start: Timestamp,
    user_timestamp_end: Option<Timestamp>,
}

/// Handle to one array
///
/// `Array` is `Send + Sync`; every method takes `&self`.
pub struct Array {
    id: ArrayId,
    uri: ArrayUri,
    directory: Arc<dyn ArrayDirectory>,
    controller: Arc<ConsistencyController>,
    config: ArrayConfig,
    inner: RwLock<Inner>,
    opening_or_closing: AtomicBool,
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Array {
    /// Closed handle registered with the process-wide controller
    pub fn new(uri: impl Into<ArrayUri>, directory: Arc<dyn ArrayDirectory>) -> Self {
        Self::with_controller(uri, directory, global_controller())
    }

    /// Closed handle registered with `controller`
    pub fn with_controller(
        uri: impl Into<ArrayUri>,
        directory: Arc<dyn ArrayDirectory>,
        controller: Arc<ConsistencyController>,
    ) -> Self {
        Array {
            id: ArrayId::next(),
            uri: uri.into(),
            directory,
            controller,
            config: ArrayConfig::default(),
            inner: RwLock::new(Inner {
                state: ArrayState::Closed,
                handle: None,
                timestamp_start: Timestamp::EPOCH,
                user_timestamp_end: None,
            }),
            opening_or_closing: AtomicBool::new(false),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ArrayConfig) -> Self {
        self.config = config;
        self
    }

    // =========================================================================
    // Always-available accessors
    // =========================================================================

    /// Handle identity used for registration
    pub fn id(&self) -> ArrayId {
        self.id
    }

    /// Array URI
    pub fn uri(&self) -> &ArrayUri {
        &self.uri
    }

    /// True if the URI names a remote array
    pub fn is_remote(&self) -> bool {
        self.uri.is_remote()
    }

    /// Handle configuration
    pub fn config(&self) -> &ArrayConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> ArrayState {
        self.inner.read().state
    }

    /// True while open
    pub fn is_open(&self) -> bool {
        matches!(self.state(), ArrayState::Open(_))
    }

    /// True while inside `open()`, `reopen()` or `close()`
    ///
    /// Unlike the other accessors this never waits for the handle lock.
    pub fn is_opening_or_closing(&self) -> bool {
        self.opening_or_closing.load(Ordering::Acquire)
    }

    /// Start of the window used by the next open
    pub fn user_timestamp_start(&self) -> Timestamp {
        self.inner.read().timestamp_start
    }

    /// Pinned end of the window, if any
    pub fn user_timestamp_end(&self) -> Option<Timestamp> {
        self.inner.read().user_timestamp_end
    }

    /// Set the start of the window used by the next open
    pub fn set_timestamp_start(&self, timestamp: Timestamp) -> TesseraResult<()> {
        let mut inner = self.inner.write();
        self.require_closed(&inner, "set timestamp start")?;
        inner.timestamp_start = timestamp;
        Ok(())
    }

    /// Pin the end of the window used by the next open
    pub fn set_timestamp_end(&self, timestamp: Timestamp) -> TesseraResult<()> {
        let mut inner = self.inner.write();
        self.require_closed(&inner, "set timestamp end")?;
        inner.user_timestamp_end = Some(timestamp);
        Ok(())
    }

    // =========================================================================
    // Open-only accessors
    // =========================================================================

    /// The shared snapshot, for query collaborators
    pub fn opened_array(&self) -> TesseraResult<Arc<OpenedArray>> {
        self.with_handle("get the opened array", |h| Arc::clone(&h.opened))
    }

    /// Newest schema in the opened window
    pub fn schema_latest(&self) -> TesseraResult<Arc<ArraySchema>> {
        self.with_handle("get the array schema", |h| h.opened.schema_latest())
    }

    /// All schemas in the opened window, keyed by name
    pub fn schemas_all(&self) -> TesseraResult<BTreeMap<String, Arc<ArraySchema>>> {
        self.with_handle("get the array schemas", |h| h.opened.schemas_all())
    }

    /// Fragments in the opened window, oldest first
    pub fn fragment_metadata(&self) -> TesseraResult<Vec<FragmentMetadata>> {
        self.with_handle("get fragment metadata", |h| h.opened.fragment_metadata())
    }

    /// Union of the fragments' non-empty domains
    pub fn non_empty_domain(&self) -> TesseraResult<Vec<Range>> {
        self.with_handle("get the non-empty domain", |h| {
            h.opened.non_empty_domain().to_vec()
        })
    }

    /// Start of the opened window
    pub fn timestamp_start(&self) -> TesseraResult<Timestamp> {
        self.with_handle("get timestamp start", |h| h.opened.timestamp_start())
    }

    /// End of the opened window
    pub fn timestamp_end_opened_at(&self) -> TesseraResult<Timestamp> {
        self.with_handle("get timestamp end", |h| h.opened.timestamp_end_opened_at())
    }

    /// Mode the array is open in
    pub fn query_type(&self) -> TesseraResult<QueryType> {
        self.with_handle("get the query type", |h| h.sentry.mode())
    }

    /// Key the array was opened with
    pub fn encryption_key(&self) -> TesseraResult<EncryptionKey> {
        self.with_handle("get the encryption key", |h| {
            h.opened.encryption_key().clone()
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the array in `mode`
    ///
    /// The window is `[timestamp start, pinned end or now]`.
    pub fn open(&self, mode: QueryType, key: EncryptionKey) -> TesseraResult<()> {
        let mut inner = self.inner.write();
        let window = (inner.timestamp_start, inner.user_timestamp_end);
        self.open_locked(&mut inner, mode, key, window)
    }

    /// Open for reads over an explicit window
    pub fn open_at(
        &self,
        mode: QueryType,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
        key: EncryptionKey,
    ) -> TesseraResult<()> {
        if !mode.is_read() {
            return Err(TesseraError::invalid_state(format!(
                "Cannot open array '{}' at a timestamp range; time traveling is only supported in READ mode, not {}.",
                self.uri, mode
            )));
        }
        check_window(timestamp_start, timestamp_end)?;

        let mut inner = self.inner.write();
        self.open_locked(&mut inner, mode, key, (timestamp_start, Some(timestamp_end)))
    }

    /// Reload the snapshot up to the pinned end, or now
    pub fn reopen(&self) -> TesseraResult<()> {
        let mut inner = self.inner.write();
        let window = (inner.timestamp_start, inner.user_timestamp_end);
        self.reopen_locked(&mut inner, window)
    }

    /// Reload the snapshot for a new window
    pub fn reopen_at(
        &self,
        timestamp_start: Timestamp,
        timestamp_end: Timestamp,
    ) -> TesseraResult<()> {
        check_window(timestamp_start, timestamp_end)?;
        let mut inner = self.inner.write();
        self.reopen_locked(&mut inner, (timestamp_start, Some(timestamp_end)))
    }

    /// Close the array
    ///
    /// Pending metadata writes are flushed first. The handle is closed and
    /// deregistered even when the flush fails; the flush error is returned.
    pub fn close(&self) -> TesseraResult<()> {
        let mut inner = self.inner.write();
        let mode = match inner.state {
            ArrayState::Open(mode) => mode,
            _ => {
                return Err(TesseraError::invalid_state(format!(
                    "Cannot close array '{}'; the array is not open.",
                    self.uri
                )))
            }
        };
        let handle = inner.handle.take().ok_or_else(|| {
            TesseraError::invalid_state(format!(
                "Cannot close array '{}'; the array is not open.",
                self.uri
            ))
        })?;

        self.opening_or_closing.store(true, Ordering::Release);
        let flushed = if mode.is_write() {
            self.flush_metadata(&handle.opened)
        } else {
            Ok(())
        };
        drop(handle);
        inner.state = ArrayState::Closed;
        self.opening_or_closing.store(false, Ordering::Release);

        info!(
            target: "tessera::array",
            uri = %self.uri,
            array = %self.id,
            mode = %mode,
            "Closed array"
        );
        flushed
    }

    // The window `(start, pinned end)` is recorded on the handle only once
    // the open succeeds; a failed open leaves the previous window in place.
    fn open_locked(
        &self,
        inner: &mut Inner,
        mode: QueryType,
        key: EncryptionKey,
        (start, pinned_end): (Timestamp, Option<Timestamp>),
    ) -> TesseraResult<()> {
        self.require_closed(inner, "open array")?;
        let end = pinned_end.unwrap_or_else(Timestamp::now);

        inner.state = ArrayState::Opening;
        self.opening_or_closing.store(true, Ordering::Release);
        let result = self.open_handle(mode, start, end, key);
        self.opening_or_closing.store(false, Ordering::Release);

        match result {
            Ok(handle) => {
                inner.handle = Some(handle);
                inner.state = ArrayState::Open(mode);
                inner.timestamp_start = start;
                inner.user_timestamp_end = pinned_end;
                info!(
                    target: "tessera::array",
                    uri = %self.uri,
                    array = %self.id,
                    mode = %mode,
                    timestamp_start = %start,
                    timestamp_end = %end,
                    "Opened array"
                );
                Ok(())
            }
            Err(e) => {
                inner.state = ArrayState::Closed;
                warn!(
                    target: "tessera::array",
                    uri = %self.uri,
                    array = %self.id,
                    mode = %mode,
                    code = e.error_code(),
                    error = %e,
                    "Failed to open array"
                );
                Err(e)
            }
        }
    }

    // Registration happens before any data is loaded; a failed load drops
    // the sentry and with it the registration.
    fn open_handle(
        &self,
        mode: QueryType,
        start: Timestamp,
        end: Timestamp,
        key: EncryptionKey,
    ) -> TesseraResult<OpenHandle> {
        let sentry = self.controller.make_sentry(&self.uri, self.id, mode)?;
        let opened = self.load_snapshot(mode, start, end, key)?;
        Ok(OpenHandle {
            sentry,
            opened: Arc::new(opened),
        })
    }

    // A failed reload keeps both the previous snapshot and window.
    fn reopen_locked(
        &self,
        inner: &mut Inner,
        (start, pinned_end): (Timestamp, Option<Timestamp>),
    ) -> TesseraResult<()> {
        let key = self.require_read_open(inner, "reopen array")?;
        let end = pinned_end.unwrap_or_else(Timestamp::now);

        self.opening_or_closing.store(true, Ordering::Release);
        let result = self.load_snapshot(QueryType::Read, start, end, key);
        self.opening_or_closing.store(false, Ordering::Release);
        let opened = result.map_err(|e| {
            warn!(
                target: "tessera::array",
                uri = %self.uri,
                array = %self.id,
                code = e.error_code(),
                error = %e,
                "Failed to reopen array"
            );
            e
        })?;

        if let Some(handle) = inner.handle.as_mut() {
            handle.opened = Arc::new(opened);
        }
        inner.timestamp_start = start;
        inner.user_timestamp_end = pinned_end;
        info!(
            target: "tessera::array",
            uri = %self.uri,
            array = %self.id,
            timestamp_start = %start,
            timestamp_end = %end,
            "Reopened array"
        );
        Ok(())
    }

    fn load_snapshot(
        &self,
        mode: QueryType,
        start: Timestamp,
        end: Timestamp,
        key: EncryptionKey,
    ) -> TesseraResult<OpenedArray> {
        let latest = self
            .directory
            .load_array_schema_latest(&self.uri, &key, end)?;
        let schemas_all = self
            .directory
            .load_array_schemas_all(&self.uri, &key, end)?;
        let schema_latest = schemas_all
            .get(latest.name())
            .cloned()
            .unwrap_or_else(|| Arc::new(latest));

        let (fragments, metadata) = if mode.is_read() {
            let fragments = if self.config.load_fragments_on_open {
                self.directory
                    .load_fragment_metadata(&self.uri, &key, start, end)?
            } else {
                Vec::new()
            };
            let metadata = self.directory.load_metadata(&self.uri, &key, start, end)?;
            (fragments, metadata)
        } else {
            (Vec::new(), ArrayMetadata::new())
        };

        Ok(OpenedArray::new(
            schema_latest,
            schemas_all,
            fragments,
            metadata,
            key,
            start,
            end,
        ))
    }

    fn flush_metadata(&self, opened: &OpenedArray) -> TesseraResult<()> {
        let batch = opened.take_pending_metadata();
        if batch.has_no_changes() {
            return Ok(());
        }
        self.directory.store_metadata(
            &self.uri,
            opened.encryption_key(),
            opened.timestamp_end_opened_at(),
            &batch,
        )
    }

    // =========================================================================
    // State checks
    // =========================================================================

    fn require_closed(&self, inner: &Inner, operation: &str) -> TesseraResult<()> {
        if inner.state != ArrayState::Closed {
            return Err(TesseraError::invalid_state(format!(
                "Cannot {}; array '{}' is already open.",
                operation, self.uri
            )));
        }
        Ok(())
    }

    // Returns the key of the current snapshot.
    fn require_read_open(
        &self,
        inner: &Inner,
        operation: &str,
    ) -> TesseraResult<EncryptionKey> {
        match (inner.state, inner.handle.as_ref()) {
            (ArrayState::Open(QueryType::Read), Some(handle)) => {
                Ok(handle.opened.encryption_key().clone())
            }
            (ArrayState::Open(mode), Some(_)) => Err(TesseraError::invalid_state(format!(
                "Cannot {}; array '{}' was opened in {} mode, not READ.",
                operation, self.uri, mode
            ))),
            _ => Err(self.not_open(operation)),
        }
    }

    fn with_handle<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&OpenHandle) -> T,
    ) -> TesseraResult<T> {
        let inner = self.inner.read();
        match inner.handle.as_ref() {
            Some(handle) => Ok(f(handle)),
            None => Err(self.not_open(operation)),
        }
    }

    // Snapshot of an array open in a mode accepted by `allowed`.
    fn snapshot_in_mode(
        &self,
        operation: &str,
        required: &str,
        allowed: impl Fn(QueryType) -> bool,
    ) -> TesseraResult<Arc<OpenedArray>> {
        let inner = self.inner.read();
        let handle = inner.handle.as_ref().ok_or_else(|| self.not_open(operation))?;
        let mode = handle.sentry.mode();
        if !allowed(mode) {
            return Err(TesseraError::invalid_state(format!(
                "Cannot {}; array '{}' must be opened in {} mode, not {}.",
                operation, self.uri, required, mode
            )));
        }
        Ok(Arc::clone(&handle.opened))
    }

    fn not_open(&self, operation: &str) -> TesseraError {
        TesseraError::invalid_state(format!(
            "Cannot {}; array '{}' is not open.",
            operation, self.uri
        ))
    }
}

fn check_window(start: Timestamp, end: Timestamp) -> TesseraResult<()> {
    if start > end {
        return Err(TesseraError::validation(format!(
            "Invalid timestamp range ({}, {}); the start is after the end.",
            start, end
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDirectory;
    use tessera_core::Datatype;
    use tessera_schema::{ArrayType, Attribute, Dimension, Domain};

    pub(super) type Fixture = (Arc<MemoryDirectory>, Arc<ConsistencyController>, Array);

    pub(super) fn fixture(uri: &str) -> Fixture {
        let directory = Arc::new(MemoryDirectory::new());
        let dimension = Dimension::new("d", Datatype::Int64, Some(Range::int(0, 99))).unwrap();
        let domain = Domain::new(vec![dimension]).unwrap();
        let mut schema = ArraySchema::new(ArrayType::Sparse, domain);
        schema
            .add_attribute(Attribute::new("a", Datatype::Float64))
            .unwrap();
        Array::create(
            directory.as_ref(),
            &ArrayUri::new(uri),
            &schema,
            &EncryptionKey::none(),
            &ArrayConfig::default(),
        )
        .unwrap();

        let controller = Arc::new(ConsistencyController::new());
        let array = Array::with_controller(uri, directory.clone(), Arc::clone(&controller));
        (directory, controller, array)
    }

    #[test]
    fn test_open_close_transitions() {
        let (_, controller, array) = fixture("mem://lifecycle");
        assert_eq!(array.state(), ArrayState::Closed);
        assert!(!array.is_opening_or_closing());

        array.open(QueryType::Read, EncryptionKey::none()).unwrap();
        assert_eq!(array.state(), ArrayState::Open(QueryType::Read));
        assert!(controller.is_open(array.uri()));
        assert_eq!(array.query_type().unwrap(), QueryType::Read);

        let err = array
            .open(QueryType::Read, EncryptionKey::none())
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidState { .. }));

        array.close().unwrap();
        assert_eq!(array.state(), ArrayState::Closed);
        assert!(!controller.is_open(array.uri()));
        assert!(array.close().is_err());
        assert!(array.schema_latest().is_err());
    }

    #[test]
    fn test_failed_open_releases_registration() {
        let (_, controller, array) = fixture("mem://lifecycle");
        let missing = Array::with_controller(
            "mem://missing",
            array.directory.clone(),
            Arc::clone(&controller),
        );

        let err = missing
            .open(QueryType::Read, EncryptionKey::none())
            .unwrap_err();
        assert!(matches!(err, TesseraError::NotFound { .. }));
        assert_eq!(missing.state(), ArrayState::Closed);
        assert!(!controller.is_open(missing.uri()));
    }

    #[test]
    fn test_open_at_rejects_write_modes_and_inverted_windows() {
        let (_, _, array) = fixture("mem://tt");
        let t = Timestamp::from_millis;
        let err = array
            .open_at(QueryType::Write, t(0), t(10), EncryptionKey::none())
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidState { .. }));
        assert!(array
            .open_at(QueryType::Read, t(10), t(0), EncryptionKey::none())
            .is_err());
        assert_eq!(array.state(), ArrayState::Closed);
    }

    #[test]
    fn test_timestamps_only_settable_while_closed() {
        let (_, _, array) = fixture("mem://ts");
        array.set_timestamp_end(Timestamp::MAX).unwrap();
        array.open(QueryType::Read, EncryptionKey::none()).unwrap();
        assert_eq!(array.timestamp_end_opened_at().unwrap(), Timestamp::MAX);
        assert!(array.set_timestamp_start(Timestamp::EPOCH).is_err());
        array.close().unwrap();
        assert_eq!(array.user_timestamp_end(), Some(Timestamp::MAX));
    }

    #[test]
    fn test_reopen_requires_read_mode() {
        let (_, _, array) = fixture("mem://reopen");
        assert!(array.reopen().is_err());
        array.open(QueryType::Write, EncryptionKey::none()).unwrap();
        let err = array.reopen().unwrap_err();
        assert!(err.to_string().contains("not READ"));
        array.close().unwrap();
    }
}
