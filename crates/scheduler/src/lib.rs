//! Cadence scheduler.
//!
//! Owns the resource registry and every admitted command, and drives them
//! one cycle at a time:
//!
//! ```text
//! schedule ──> Admitted ──run──> initialize → execute* → end(false)
//!                  │                              │
//!                  └──── cancel / preempt ───> end(true)
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod registry;
pub mod scheduler;
pub mod watchdog;

pub use config::{ConfigError, SchedulerConfig};
pub use error::{CommandFault, LifecyclePhase, Result, SchedulerError};
pub use event::{EventKind, EventLog, InterruptCause, RejectReason, SchedulerEvent};
pub use registry::{Claim, ResourceRegistry};
pub use scheduler::{Admission, CycleReport, Scheduler};
pub use watchdog::LoopWatchdog;
