//! Recorder commands for exercising schedulers and compositions in tests.

use crate::command::{Command, InterruptBehavior};
use crate::context::CycleContext;
use crate::resource::Resource;
use std::cell::RefCell;
use std::rc::Rc;

/// A lifecycle hook invocation seen by a [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// `initialize` ran
    Initialize,
    /// `execute` ran
    Execute,
    /// `end` ran
    End {
        /// Whether the command was interrupted
        interrupted: bool,
    },
}

/// Shared, ordered record of recorder calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Rc<RefCell<Vec<(String, Call)>>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str, call: Call) {
        self.calls.borrow_mut().push((name.to_string(), call));
    }

    /// Every recorded call, in order.
    pub fn entries(&self) -> Vec<(String, Call)> {
        self.calls.borrow().clone()
    }

    /// Calls made on one recorder, in order.
    pub fn calls(&self, name: &str) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, c)| *c)
            .collect()
    }

    /// Number of `initialize` calls on a recorder.
    pub fn initializes(&self, name: &str) -> usize {
        self.calls(name).iter().filter(|c| **c == Call::Initialize).count()
    }

    /// Number of `execute` calls on a recorder.
    pub fn executes(&self, name: &str) -> usize {
        self.calls(name).iter().filter(|c| **c == Call::Execute).count()
    }

    /// The `interrupted` flag of every `end` call on a recorder.
    pub fn ends(&self, name: &str) -> Vec<bool> {
        self.calls(name)
            .iter()
            .filter_map(|c| match c {
                Call::End { interrupted } => Some(*interrupted),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

/// Hook at which a recorder returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    /// Fail in `initialize`
    Initialize,
    /// Fail on the nth `execute` (1-based) since the last `initialize`
    Execute(usize),
    /// Fail in `end`
    End,
}

/// Configurable command that records its lifecycle in a [`CallLog`].
#[derive(Debug)]
pub struct Recorder {
    name: String,
    log: CallLog,
    requirements: Vec<Resource>,
    behavior: InterruptBehavior,
    finish_after: Option<usize>,
    fail_at: Option<FailAt>,
    executed: usize,
}

impl Recorder {
    /// Create a recorder that never finishes on its own.
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            requirements: Vec::new(),
            behavior: InterruptBehavior::CancelSelf,
            finish_after: None,
            fail_at: None,
            executed: 0,
        }
    }

    /// Add a required resource.
    pub fn requiring(mut self, resource: &Resource) -> Self {
        self.requirements.push(resource.clone());
        self
    }

    /// Use [`InterruptBehavior::CancelIncoming`].
    pub fn cancel_incoming(mut self) -> Self {
        self.behavior = InterruptBehavior::CancelIncoming;
        self
    }

    /// Finish after `executes` calls to `execute` since the last `initialize`.
    pub fn finish_after(mut self, executes: usize) -> Self {
        self.finish_after = Some(executes);
        self
    }

    /// Return an error from the given hook.
    pub fn fail_at(mut self, at: FailAt) -> Self {
        self.fail_at = Some(at);
        self
    }
}

impl Command for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> &[Resource] {
        &self.requirements
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.behavior
    }

    fn initialize(&mut self, _ctx: &CycleContext) -> anyhow::Result<()> {
        self.log.record(&self.name, Call::Initialize);
        self.executed = 0;
        if self.fail_at == Some(FailAt::Initialize) {
            anyhow::bail!("{} failed to initialize", self.name);
        }
        Ok(())
    }

    fn execute(&mut self, _ctx: &CycleContext) -> anyhow::Result<()> {
        self.log.record(&self.name, Call::Execute);
        self.executed += 1;
        if self.fail_at == Some(FailAt::Execute(self.executed)) {
            anyhow::bail!("{} failed on execute {}", self.name, self.executed);
        }
        Ok(())
    }

    fn end(&mut self, interrupted: bool, _ctx: &CycleContext) -> anyhow::Result<()> {
        self.log.record(&self.name, Call::End { interrupted });
        if self.fail_at == Some(FailAt::End) {
            anyhow::bail!("{} failed to end", self.name);
        }
        Ok(())
    }

    fn is_finished(&mut self, _ctx: &CycleContext) -> bool {
        self.finish_after.is_some_and(|n| self.executed >= n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_recorder_records_lifecycle() {
        let log = CallLog::new();
        let ctx = CycleContext::new(1, Duration::ZERO);
        let mut recorder = Recorder::new("a", &log).finish_after(2);

        recorder.initialize(&ctx).unwrap();
        recorder.execute(&ctx).unwrap();
        assert!(!recorder.is_finished(&ctx));
        recorder.execute(&ctx).unwrap();
        assert!(recorder.is_finished(&ctx));
        recorder.end(false, &ctx).unwrap();

        assert_eq!(
            log.calls("a"),
            vec![Call::Initialize, Call::Execute, Call::Execute, Call::End { interrupted: false }]
        );
        assert_eq!(log.ends("a"), vec![false]);
    }

    #[test]
    fn test_recorder_fails_on_nth_execute() {
        let log = CallLog::new();
        let ctx = CycleContext::new(1, Duration::ZERO);
        let mut recorder = Recorder::new("a", &log).fail_at(FailAt::Execute(2));

        recorder.initialize(&ctx).unwrap();
        assert!(recorder.execute(&ctx).is_ok());
        assert!(recorder.execute(&ctx).is_err());
    }
}
