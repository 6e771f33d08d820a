//! Decorators that wrap a single command.

use cadence_core::{Command, CommandPtr, CycleContext, InterruptBehavior, Resource};
use std::time::Duration;
use tracing::debug;

/// Restarts its child every time the child finishes.
///
/// With a predicate, the predicate is checked after each completion and the
/// repeat stops once it holds. Without one, it repeats until interrupted.
pub struct RepeatCommand {
    child: CommandPtr,
    until: Option<Box<dyn FnMut() -> bool>>,
    child_running: bool,
    done: bool,
    completions: usize,
}

impl RepeatCommand {
    /// Repeat forever.
    pub fn forever(child: impl Command + 'static) -> Self {
        Self {
            child: child.into_ptr(),
            until: None,
            child_running: false,
            done: false,
            completions: 0,
        }
    }

    /// Repeat until `predicate` holds after a completion.
    pub fn until(child: impl Command + 'static, predicate: impl FnMut() -> bool + 'static) -> Self {
        Self {
            until: Some(Box::new(predicate)),
            ..Self::forever(child)
        }
    }

    /// How many times the child has completed in the current run.
    pub fn completions(&self) -> usize {
        self.completions
    }
}

impl Command for RepeatCommand {
    fn name(&self) -> &str {
        self.child.name()
    }

    fn requirements(&self) -> &[Resource] {
        self.child.requirements()
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.child.interrupt_behavior()
    }

    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.done = false;
        self.completions = 0;
        self.child_running = true;
        self.child.initialize(ctx)
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        if self.done {
            return Ok(());
        }
        if !self.child_running {
            self.child_running = true;
            self.child.initialize(ctx)?;
        }

        self.child.execute(ctx)?;
        if self.child.is_finished(ctx) {
            self.child_running = false;
            self.child.end(false, ctx)?;
            self.completions += 1;
            if let Some(predicate) = self.until.as_mut() {
                self.done = predicate();
            }
            debug!("{} completed {} time(s)", self.child.name(), self.completions);
        }
        Ok(())
    }

    fn end(&mut self, interrupted: bool, ctx: &CycleContext) -> anyhow::Result<()> {
        if self.child_running {
            self.child_running = false;
            self.child.end(interrupted, ctx)?;
        }
        Ok(())
    }

    fn is_finished(&mut self, _ctx: &CycleContext) -> bool {
        self.done
    }
}

/// Why a [`LimitedCommand`] stops its child early.
enum Limit {
    Elapsed { after: Duration, started_at: Duration },
    Condition(Box<dyn FnMut() -> bool>),
}

/// Runs a child until it finishes or a limit is reached, whichever is first.
///
/// When the limit wins, the child is ended with `interrupted = true`. The
/// limit is checked in `is_finished`, after the child's step for the cycle.
pub struct LimitedCommand {
    child: CommandPtr,
    limit: Limit,
    child_finished: bool,
}

impl LimitedCommand {
    /// Interrupt the child once `timeout` of cycle time has passed since
    /// this command started.
    pub fn timeout(child: impl Command + 'static, timeout: Duration) -> Self {
        Self {
            child: child.into_ptr(),
            limit: Limit::Elapsed {
                after: timeout,
                started_at: Duration::ZERO,
            },
            child_finished: false,
        }
    }

    /// Interrupt the child once `condition` holds.
    pub fn until(child: impl Command + 'static, condition: impl FnMut() -> bool + 'static) -> Self {
        Self {
            child: child.into_ptr(),
            limit: Limit::Condition(Box::new(condition)),
            child_finished: false,
        }
    }

    fn limit_reached(&mut self, ctx: &CycleContext) -> bool {
        match &mut self.limit {
            Limit::Elapsed { after, started_at } => ctx.elapsed_since(*started_at) >= *after,
            Limit::Condition(condition) => condition(),
        }
    }
}

impl Command for LimitedCommand {
    fn name(&self) -> &str {
        self.child.name()
    }

    fn requirements(&self) -> &[Resource] {
        self.child.requirements()
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.child.interrupt_behavior()
    }

    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child_finished = false;
        if let Limit::Elapsed { started_at, .. } = &mut self.limit {
            *started_at = ctx.now;
        }
        self.child.initialize(ctx)
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child.execute(ctx)
    }

    fn end(&mut self, interrupted: bool, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child.end(interrupted || !self.child_finished, ctx)
    }

    fn is_finished(&mut self, ctx: &CycleContext) -> bool {
        if self.child.is_finished(ctx) {
            self.child_finished = true;
            return true;
        }
        if self.limit_reached(ctx) {
            debug!("{} hit its limit, interrupting", self.child.name());
            return true;
        }
        false
    }
}

/// Overrides the interrupt behavior of its child.
pub struct WithInterruptBehavior {
    child: CommandPtr,
    behavior: InterruptBehavior,
}

impl WithInterruptBehavior {
    /// Wrap `child` with `behavior`.
    pub fn new(child: impl Command + 'static, behavior: InterruptBehavior) -> Self {
        Self {
            child: child.into_ptr(),
            behavior,
        }
    }
}

impl Command for WithInterruptBehavior {
    fn name(&self) -> &str {
        self.child.name()
    }

    fn requirements(&self) -> &[Resource] {
        self.child.requirements()
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.behavior
    }

    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child.initialize(ctx)
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child.execute(ctx)
    }

    fn end(&mut self, interrupted: bool, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child.end(interrupted, ctx)
    }

    fn is_finished(&mut self, ctx: &CycleContext) -> bool {
        self.child.is_finished(ctx)
    }
}

/// Gives its child a different display name.
pub struct NamedCommand {
    child: CommandPtr,
    name: String,
}

impl NamedCommand {
    /// Wrap `child` under `name`.
    pub fn new(child: impl Command + 'static, name: impl Into<String>) -> Self {
        Self {
            child: child.into_ptr(),
            name: name.into(),
        }
    }
}

impl Command for NamedCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> &[Resource] {
        self.child.requirements()
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.child.interrupt_behavior()
    }

    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child.initialize(ctx)
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child.execute(ctx)
    }

    fn end(&mut self, interrupted: bool, ctx: &CycleContext) -> anyhow::Result<()> {
        self.child.end(interrupted, ctx)
    }

    fn is_finished(&mut self, ctx: &CycleContext) -> bool {
        self.child.is_finished(ctx)
    }
}
