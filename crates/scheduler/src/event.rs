//! Scheduler events - what happened to which command, and when.

use crate::error::LifecyclePhase;
use cadence_core::CommandId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Why a command was ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterruptCause {
    /// A newly scheduled command took one of its resources
    Preempted {
        /// The incoming command
        by: CommandId,
    },
    /// `cancel` or `cancel_all` was called
    Cancelled,
    /// It was a default command and was replaced or removed
    DefaultReplaced,
    /// The scheduler shut down
    Shutdown,
}

/// Why a command was not scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RejectReason {
    /// A resource is held and the conflict resolves in favour of the holder
    Conflict {
        /// Name of the contested resource
        resource: String,
        /// The command holding it
        holder: CommandId,
    },
    /// The scheduler is disabled
    Disabled,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Admitted into the scheduler
    Scheduled {
        /// Admitted as a resource's default command
        default: bool,
    },
    /// `initialize` ran
    Initialized,
    /// Finished on its own
    Finished,
    /// Ended early
    Interrupted {
        /// Why
        cause: InterruptCause,
    },
    /// Not admitted
    Rejected {
        /// Why
        reason: RejectReason,
    },
    /// A hook failed and the command was removed
    Faulted {
        /// Which hook
        phase: LifecyclePhase,
        /// The error message
        message: String,
    },
}

/// A single scheduler event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerEvent {
    /// When it happened
    pub timestamp: DateTime<Utc>,

    /// Scheduler cycle it happened in (0 before the first cycle)
    pub cycle: u64,

    /// The command concerned
    pub command: CommandId,

    /// Its name
    pub name: String,

    /// What happened
    pub kind: EventKind,
}

impl SchedulerEvent {
    /// Create an event stamped with the current time.
    pub fn new(cycle: u64, command: CommandId, name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            cycle,
            command,
            name: name.into(),
            kind,
        }
    }
}

/// Bounded log of the most recent events.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    events: VecDeque<SchedulerEvent>,
}

impl EventLog {
    /// Create a log keeping at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append an event, dropping the oldest when full.
    pub fn push(&mut self, event: SchedulerEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SchedulerEvent> {
        self.events.iter()
    }

    /// Events concerning one command, oldest first.
    pub fn for_command(&self, id: CommandId) -> Vec<&SchedulerEvent> {
        self.events.iter().filter(|e| e.command == id).collect()
    }

    /// Number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Serialize the held events as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events)
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(256)
    }
}
