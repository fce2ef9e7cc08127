//! Array engine for tessera
//!
//! This crate ties the lower layers together:
//! - Array: handle with open/close/reopen over a timestamp window
//! - OpenedArray: the shared snapshot a successful open produces
//! - ArrayDirectory: storage seam, with an in-memory implementation
//! - Fragment and array metadata models
//! - ArrayConfig: `tessera.toml` settings
//!
//! The engine is the only component that knows about:
//! - Registration with the consistency controller before loading data
//! - Time travel over schema versions, fragments and metadata
//! - Persisting evolved schemas

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array;
pub mod config;
pub mod directory;
pub mod fragment;
pub mod memory;
pub mod metadata;
pub mod opened;

pub use array::{Array, ArrayState};
pub use config::{ArrayConfig, CONFIG_FILE_NAME};
pub use directory::ArrayDirectory;
pub use fragment::{union_non_empty_domain, FragmentMetadata};
pub use memory::MemoryDirectory;
pub use metadata::{ArrayMetadata, MetadataValue};
pub use opened::OpenedArray;
