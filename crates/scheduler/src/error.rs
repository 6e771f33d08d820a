//! Scheduler errors and command faults.

use cadence_core::CommandId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Misuse of the scheduler or its registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// A command requires a resource that was never registered
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// A resource was registered twice
    #[error("Resource already registered: {0}")]
    DuplicateResource(String),

    /// A default command must require the resource it is the default for
    #[error("Default command '{command}' does not require '{resource}'")]
    DefaultMissingRequirement {
        /// Resource name
        resource: String,
        /// Command name
        command: String,
    },
}

/// Lifecycle hook in which a command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// `initialize`
    Initialize,
    /// `execute`
    Execute,
    /// `end`
    End,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialize => f.write_str("initialize"),
            Self::Execute => f.write_str("execute"),
            Self::End => f.write_str("end"),
        }
    }
}

/// A command returned an error from one of its hooks and was removed.
#[derive(Debug, Error)]
#[error("Command '{name}' ({command}) faulted during {phase}: {error}")]
pub struct CommandFault {
    /// The faulted command
    pub command: CommandId,
    /// Its name
    pub name: String,
    /// The hook that failed
    pub phase: LifecyclePhase,
    /// What the command reported
    pub error: anyhow::Error,
}
