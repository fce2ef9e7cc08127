//! Tessera - control plane for versioned multi-dimensional arrays
//!
//! Tessera manages the lifecycle of array handles: registering opens so that
//! exclusive maintenance never overlaps other access, loading a consistent
//! snapshot of schemas, fragments and metadata for a timestamp window, and
//! evolving schemas (attributes, enumerations, current domain) without ever
//! mutating a stored version.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera::{Array, ArrayConfig, ArrayUri, EncryptionKey, MemoryDirectory, QueryType};
//!
//! let directory = Arc::new(MemoryDirectory::new());
//! let uri = ArrayUri::new("mem://quickstart");
//! Array::create(directory.as_ref(), &uri, &schema, &EncryptionKey::none(), &ArrayConfig::default())?;
//!
//! let array = Array::new(uri, directory);
//! array.open(QueryType::Read, EncryptionKey::none())?;
//! let colors = array.get_enumeration("colors")?;
//! array.close()?;
//! ```
//!
//! # Architecture
//!
//! - `tessera-core`: errors, timestamps, datatypes, open modes, keys, URIs
//! - `tessera-schema`: enumerations, schema model, schema evolution
//! - `tessera-concurrency`: consistency controller and sentries
//! - `tessera-engine`: array handles, snapshots, storage directory

pub use tessera_concurrency::{
    global_controller, ArrayId, ConsistencyController, ConsistencySentry,
};
pub use tessera_core::{
    ArrayUri, Datatype, EncryptionKey, EncryptionType, QueryType, TesseraError, TesseraResult,
    Timestamp,
};
pub use tessera_engine::{
    Array, ArrayConfig, ArrayDirectory, ArrayMetadata, ArrayState, FragmentMetadata,
    MemoryDirectory, MetadataValue, OpenedArray,
};
pub use tessera_schema::{
    ArraySchema, ArraySchemaEvolution, ArrayType, Attribute, CurrentDomain, Dimension, Domain,
    Enumeration, EnumerationLimits, Range,
};
