//! Command composition - groups, decorators and closure-based commands.
//!
//! Compositions take ownership of their children and are themselves
//! commands, so they nest freely:
//!
//! ```text
//! sequence(drive, parallel(lift, spin)) → with_timeout → schedule
//! ```

#![warn(missing_docs)]

pub mod functional;
pub mod group;
pub mod decorator;
pub mod ext;

pub use functional::{FunctionalCommand, WaitCommand, ConditionalCommand};
pub use group::{SequentialGroup, ParallelGroup, ParallelPolicy};
pub use decorator::{RepeatCommand, LimitedCommand, WithInterruptBehavior, NamedCommand};
pub use ext::CommandExt;

use cadence_core::{Command, CommandPtr, CompositionError, InterruptBehavior};
use std::time::Duration;

/// Run `commands` one after another.
pub fn sequence(commands: impl IntoIterator<Item = CommandPtr>) -> CommandPtr {
    SequentialGroup::new(commands).into_ptr()
}

/// Run `commands` together until all have finished.
pub fn parallel(commands: impl IntoIterator<Item = CommandPtr>) -> Result<CommandPtr, CompositionError> {
    ParallelGroup::new(ParallelPolicy::All, commands).map(Command::into_ptr)
}

/// Run `commands` together until any one finishes.
pub fn race(commands: impl IntoIterator<Item = CommandPtr>) -> Result<CommandPtr, CompositionError> {
    ParallelGroup::new(ParallelPolicy::Race, commands).map(Command::into_ptr)
}

/// Run `others` alongside `leader` until `leader` finishes.
pub fn deadline(
    leader: CommandPtr,
    others: impl IntoIterator<Item = CommandPtr>,
) -> Result<CommandPtr, CompositionError> {
    ParallelGroup::new(ParallelPolicy::Deadline, std::iter::once(leader).chain(others))
        .map(Command::into_ptr)
}

/// Restart `command` after each completion until `predicate` holds.
pub fn repeat_until(command: CommandPtr, predicate: impl FnMut() -> bool + 'static) -> CommandPtr {
    command.repeat_until(predicate)
}

/// Interrupt `command` if it has not finished within `timeout`.
pub fn with_timeout(command: CommandPtr, timeout: Duration) -> CommandPtr {
    command.with_timeout(timeout)
}

/// Override the interrupt behavior of `command`.
pub fn with_interrupt_behavior(command: CommandPtr, behavior: InterruptBehavior) -> CommandPtr {
    command.with_interrupt_behavior(behavior)
}

/// Run `action` once and finish.
pub fn instant(action: impl FnMut() + 'static) -> CommandPtr {
    FunctionalCommand::instant(action).into_ptr()
}

/// Run `action` every cycle until interrupted.
pub fn run(action: impl FnMut() + 'static) -> CommandPtr {
    FunctionalCommand::run(action).into_ptr()
}

/// Finish after `duration`.
pub fn wait(duration: Duration) -> CommandPtr {
    WaitCommand::new(duration).into_ptr()
}

/// Finish once `condition` holds.
pub fn wait_until(condition: impl FnMut() -> bool + 'static) -> CommandPtr {
    FunctionalCommand::wait_until(condition).into_ptr()
}

/// Log `message` and finish.
pub fn print(message: impl Into<String>) -> CommandPtr {
    FunctionalCommand::print(message).into_ptr()
}

/// Choose between `on_true` and `on_false` when started.
pub fn either(
    on_true: CommandPtr,
    on_false: CommandPtr,
    condition: impl FnMut() -> bool + 'static,
) -> CommandPtr {
    ConditionalCommand::new(on_true, on_false, condition).into_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::test_utils::{Recorder, CallLog};
    use cadence_core::{CycleContext, Resource};

    #[test]
    fn test_deadline_puts_leader_first() {
        let log = CallLog::new();
        let mut cmd = deadline(
            Recorder::new("leader", &log).finish_after(1).into_ptr(),
            [Recorder::new("other", &log).into_ptr()],
        )
        .unwrap();
        let ctx = CycleContext::new(1, Duration::ZERO);

        cmd.initialize(&ctx).unwrap();
        cmd.execute(&ctx).unwrap();
        assert!(cmd.is_finished(&ctx));
        assert_eq!(log.ends("other"), vec![true]);
    }

    #[test]
    fn test_nested_composition_requirements() {
        let log = CallLog::new();
        let drive = Resource::new("drive");
        let arm = Resource::new("arm");
        let intake = Resource::new("intake");

        let cmd = sequence([
            Recorder::new("drive", &log).requiring(&drive).into_ptr(),
            parallel([
                Recorder::new("lift", &log).requiring(&arm).into_ptr(),
                Recorder::new("spin", &log).requiring(&intake).into_ptr(),
            ])
            .unwrap(),
        ]);

        assert_eq!(cmd.requirements(), &[drive, arm, intake]);
        assert!(cmd.type_name().ends_with("SequentialGroup"));
    }

    #[test]
    fn test_wait_free_function() {
        let mut cmd = wait(Duration::from_millis(10));
        cmd.initialize(&CycleContext::new(1, Duration::ZERO)).unwrap();
        assert!(!cmd.is_finished(&CycleContext::new(1, Duration::from_millis(5))));
        assert!(cmd.is_finished(&CycleContext::new(2, Duration::from_millis(10))));
    }
}
