//! Commands built from closures, plus waits and branching.

use cadence_core::{union_of, Command, CommandPtr, CycleContext, InterruptBehavior, Resource};
use std::time::Duration;
use tracing::info;

/// A command whose hooks are closures.
///
/// The other constructors on this type cover the common shapes: run once,
/// run forever, start/end pairs and condition waits.
pub struct FunctionalCommand {
    name: String,
    on_init: Box<dyn FnMut()>,
    on_execute: Box<dyn FnMut()>,
    on_end: Box<dyn FnMut(bool)>,
    is_finished: Box<dyn FnMut() -> bool>,
    requirements: Vec<Resource>,
}

impl FunctionalCommand {
    /// Create a command from its four hooks.
    pub fn new(
        on_init: impl FnMut() + 'static,
        on_execute: impl FnMut() + 'static,
        on_end: impl FnMut(bool) + 'static,
        is_finished: impl FnMut() -> bool + 'static,
    ) -> Self {
        Self {
            name: "FunctionalCommand".to_string(),
            on_init: Box::new(on_init),
            on_execute: Box::new(on_execute),
            on_end: Box::new(on_end),
            is_finished: Box::new(is_finished),
            requirements: Vec::new(),
        }
    }

    /// Run `action` once on initialize and finish immediately.
    pub fn instant(action: impl FnMut() + 'static) -> Self {
        Self::new(action, || {}, |_| {}, || true).named("InstantCommand")
    }

    /// Run `action` every cycle; never finishes on its own.
    pub fn run(action: impl FnMut() + 'static) -> Self {
        Self::new(|| {}, action, |_| {}, || false).named("RunCommand")
    }

    /// Run `on_start` on initialize and `on_end` on end; never finishes on its own.
    pub fn start_end(on_start: impl FnMut() + 'static, mut on_end: impl FnMut() + 'static) -> Self {
        Self::new(on_start, || {}, move |_| on_end(), || false).named("StartEndCommand")
    }

    /// Do nothing until `condition` holds.
    pub fn wait_until(condition: impl FnMut() -> bool + 'static) -> Self {
        Self::new(|| {}, || {}, |_| {}, condition).named("WaitUntilCommand")
    }

    /// Log a message once and finish.
    pub fn print(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::instant(move || info!("{}", message)).named("PrintCommand")
    }

    /// Add a required resource.
    pub fn requiring(mut self, resource: &Resource) -> Self {
        if !self.requirements.contains(resource) {
            self.requirements.push(resource.clone());
        }
        self
    }

    /// Set the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Command for FunctionalCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> &[Resource] {
        &self.requirements
    }

    fn initialize(&mut self, _ctx: &CycleContext) -> anyhow::Result<()> {
        (self.on_init)();
        Ok(())
    }

    fn execute(&mut self, _ctx: &CycleContext) -> anyhow::Result<()> {
        (self.on_execute)();
        Ok(())
    }

    fn end(&mut self, interrupted: bool, _ctx: &CycleContext) -> anyhow::Result<()> {
        (self.on_end)(interrupted);
        Ok(())
    }

    fn is_finished(&mut self, _ctx: &CycleContext) -> bool {
        (self.is_finished)()
    }
}

/// Finishes once a duration of cycle time has passed since it started.
#[derive(Debug, Clone)]
pub struct WaitCommand {
    duration: Duration,
    started_at: Duration,
}

impl WaitCommand {
    /// Create a wait.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started_at: Duration::ZERO,
        }
    }
}

impl Command for WaitCommand {
    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.started_at = ctx.now;
        Ok(())
    }

    fn is_finished(&mut self, ctx: &CycleContext) -> bool {
        ctx.elapsed_since(self.started_at) >= self.duration
    }
}

/// Runs one of two commands, chosen when it starts.
pub struct ConditionalCommand {
    on_true: CommandPtr,
    on_false: CommandPtr,
    condition: Box<dyn FnMut() -> bool>,
    selected: Option<bool>,
    requirements: Vec<Resource>,
}

impl ConditionalCommand {
    /// Create a branch. Requirements are the union of both branches.
    pub fn new(
        on_true: impl Command + 'static,
        on_false: impl Command + 'static,
        condition: impl FnMut() -> bool + 'static,
    ) -> Self {
        let on_true = on_true.into_ptr();
        let on_false = on_false.into_ptr();
        let requirements = union_of([on_true.requirements(), on_false.requirements()]);
        Self {
            on_true,
            on_false,
            condition: Box::new(condition),
            selected: None,
            requirements,
        }
    }

    fn branch(&mut self) -> Option<&mut CommandPtr> {
        match self.selected? {
            true => Some(&mut self.on_true),
            false => Some(&mut self.on_false),
        }
    }
}

impl Command for ConditionalCommand {
    fn requirements(&self) -> &[Resource] {
        &self.requirements
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        if self.on_true.interrupt_behavior() == InterruptBehavior::CancelIncoming
            && self.on_false.interrupt_behavior() == InterruptBehavior::CancelIncoming
        {
            InterruptBehavior::CancelIncoming
        } else {
            InterruptBehavior::CancelSelf
        }
    }

    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.selected = Some((self.condition)());
        match self.branch() {
            Some(branch) => branch.initialize(ctx),
            None => Ok(()),
        }
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        match self.branch() {
            Some(branch) => branch.execute(ctx),
            None => Ok(()),
        }
    }

    fn end(&mut self, interrupted: bool, ctx: &CycleContext) -> anyhow::Result<()> {
        let result = match self.branch() {
            Some(branch) => branch.end(interrupted, ctx),
            None => Ok(()),
        };
        self.selected = None;
        result
    }

    fn is_finished(&mut self, ctx: &CycleContext) -> bool {
        self.branch().is_some_and(|branch| branch.is_finished(ctx))
    }
}
