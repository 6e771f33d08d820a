//! Cadence core model.
//!
//! This crate defines the command abstraction the scheduler drives: resource
//! handles, the `Command` trait with its owning handle, and the per-cycle
//! context commands see.

#![warn(missing_docs)]

// Identities
mod id;

// Resources and commands
mod resource;
mod command;
mod context;
mod error;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use id::{CommandId, ResourceId};
pub use resource::{Resource, union_of, first_shared};
pub use command::{Command, CommandPtr, InterruptBehavior, short_type_name};
pub use context::{CycleContext, Clock, MonotonicClock, ManualClock};
pub use error::CompositionError;
