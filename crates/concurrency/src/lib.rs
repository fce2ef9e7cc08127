//! Concurrency control for tessera array handles
//!
//! - ConsistencyController: registry of open `(uri, handle, mode)` entries
//! - ConsistencySentry: guard that deregisters its entry on drop
//! - global_controller: the default process-wide controller

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod consistency;
pub mod registry;

pub use consistency::{ArrayId, ConsistencyController, ConsistencySentry};
pub use registry::global_controller;
