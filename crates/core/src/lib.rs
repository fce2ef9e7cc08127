//! Core types for tessera
//!
//! This crate defines the foundational types used throughout the workspace:
//! - TesseraError / TesseraResult: the shared error taxonomy
//! - Timestamp: millisecond version stamps
//! - Datatype: cell value types and their on-disk codes
//! - QueryType: modes an array can be opened in
//! - EncryptionKey: opaque key forwarded to storage
//! - ArrayUri: array location

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datatype;
pub mod encryption;
pub mod error;
pub mod query_type;
pub mod timestamp;
pub mod uri;

pub use datatype::Datatype;
pub use encryption::{EncryptionKey, EncryptionType, AES_256_GCM_KEY_LEN};
pub use error::{TesseraError, TesseraResult};
pub use query_type::QueryType;
pub use timestamp::Timestamp;
pub use uri::{ArrayUri, REMOTE_SCHEME};
