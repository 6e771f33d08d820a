//! Decorator methods available on every command.

use crate::decorator::{LimitedCommand, NamedCommand, RepeatCommand, WithInterruptBehavior};
use crate::functional::FunctionalCommand;
use crate::group::{ParallelGroup, ParallelPolicy, SequentialGroup};
use cadence_core::{Command, CommandPtr, CompositionError, InterruptBehavior};
use std::time::Duration;

/// Fluent composition on top of [`Command`].
///
/// Every method consumes the receiver and returns a new owning handle, so a
/// command that has been composed cannot be used on its own again.
pub trait CommandExt: Command + Sized + 'static {
    /// Run `next` after this command finishes.
    fn and_then(self, next: impl Command + 'static) -> CommandPtr {
        SequentialGroup::new([self.into_ptr(), next.into_ptr()]).into_ptr()
    }

    /// Run `action` once before this command starts.
    fn before_starting(self, action: impl FnMut() + 'static) -> CommandPtr {
        SequentialGroup::new([FunctionalCommand::instant(action).into_ptr(), self.into_ptr()]).into_ptr()
    }

    /// Run alongside `other`; done when both are.
    fn along_with(self, other: impl Command + 'static) -> Result<CommandPtr, CompositionError> {
        ParallelGroup::new(ParallelPolicy::All, [self.into_ptr(), other.into_ptr()]).map(Command::into_ptr)
    }

    /// Run alongside `other`; done when either is.
    fn race_with(self, other: impl Command + 'static) -> Result<CommandPtr, CompositionError> {
        ParallelGroup::new(ParallelPolicy::Race, [self.into_ptr(), other.into_ptr()]).map(Command::into_ptr)
    }

    /// Run alongside `other`; done when this command is.
    fn deadline_with(self, other: impl Command + 'static) -> Result<CommandPtr, CompositionError> {
        ParallelGroup::new(ParallelPolicy::Deadline, [self.into_ptr(), other.into_ptr()])
            .map(Command::into_ptr)
    }

    /// Restart whenever finished, until interrupted.
    fn repeatedly(self) -> CommandPtr {
        RepeatCommand::forever(self).into_ptr()
    }

    /// Restart whenever finished, until `predicate` holds after a completion.
    fn repeat_until(self, predicate: impl FnMut() -> bool + 'static) -> CommandPtr {
        RepeatCommand::until(self, predicate).into_ptr()
    }

    /// Interrupt if not finished within `timeout`.
    fn with_timeout(self, timeout: Duration) -> CommandPtr {
        LimitedCommand::timeout(self, timeout).into_ptr()
    }

    /// Interrupt as soon as `condition` holds.
    fn until(self, condition: impl FnMut() -> bool + 'static) -> CommandPtr {
        LimitedCommand::until(self, condition).into_ptr()
    }

    /// Override the interrupt behavior.
    fn with_interrupt_behavior(self, behavior: InterruptBehavior) -> CommandPtr {
        WithInterruptBehavior::new(self, behavior).into_ptr()
    }

    /// Override the display name.
    fn with_name(self, name: impl Into<String>) -> CommandPtr {
        NamedCommand::new(self, name).into_ptr()
    }
}

impl<C: Command + 'static> CommandExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::test_utils::{Recorder, CallLog};
    use cadence_core::{CycleContext, Resource};

    #[test]
    fn test_decorated_ptr_reports_decorator_type() {
        let log = CallLog::new();
        let ptr = Recorder::new("p", &log).with_timeout(Duration::from_secs(1));
        assert!(ptr.type_name().ends_with("LimitedCommand"));
        assert_eq!(ptr.name(), "p");
    }

    #[test]
    fn test_chained_decorators_keep_requirements() {
        let log = CallLog::new();
        let drive = Resource::new("drive");
        let arm = Resource::new("arm");

        let ptr = Recorder::new("a", &log)
            .requiring(&drive)
            .and_then(Recorder::new("b", &log).requiring(&arm))
            .with_timeout(Duration::from_secs(2))
            .with_interrupt_behavior(InterruptBehavior::CancelIncoming)
            .with_name("auto");

        assert_eq!(ptr.name(), "auto");
        assert_eq!(ptr.requirements(), &[drive, arm]);
        assert_eq!(ptr.interrupt_behavior(), InterruptBehavior::CancelIncoming);
    }

    #[test]
    fn test_along_with_shared_resource_fails() {
        let log = CallLog::new();
        let drive = Resource::new("drive");
        let result = Recorder::new("a", &log)
            .requiring(&drive)
            .along_with(Recorder::new("b", &log).requiring(&drive));
        assert!(matches!(result, Err(CompositionError::SharedResource { .. })));
    }

    #[test]
    fn test_before_starting_runs_action_first() {
        let log = CallLog::new();
        let flag = std::rc::Rc::new(std::cell::Cell::new(false));
        let set = flag.clone();
        let mut ptr = Recorder::new("p", &log).finish_after(1).before_starting(move || set.set(true));
        let ctx = CycleContext::new(1, Duration::ZERO);

        ptr.initialize(&ctx).unwrap();
        assert!(flag.get());
        assert!(log.calls("p").is_empty());

        ptr.execute(&ctx).unwrap();
        assert_eq!(log.initializes("p"), 1);
    }
}
