//! Errors raised while building composite commands.

use thiserror::Error;

/// Rejected composition of child commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositionError {
    /// Two children that would run at the same time need the same resource
    #[error("commands '{first}' and '{second}' in a parallel composition both require '{resource}'")]
    SharedResource {
        /// Resource name
        resource: String,
        /// First child requiring it
        first: String,
        /// Second child requiring it
        second: String,
    },

    /// A composition that needs children was given none
    #[error("{0} needs at least one command")]
    Empty(&'static str),
}
