//! Command groups: sequential and parallel composition.

use cadence_core::{
    first_shared, union_of, Command, CommandPtr, CompositionError, CycleContext, InterruptBehavior,
    Resource,
};
use tracing::debug;

/// Interrupt behavior of a group: it only refuses to yield when every child does.
fn combined_behavior<'a>(children: impl IntoIterator<Item = &'a CommandPtr>) -> InterruptBehavior {
    let mut any = false;
    for child in children {
        any = true;
        if child.interrupt_behavior() == InterruptBehavior::CancelSelf {
            return InterruptBehavior::CancelSelf;
        }
    }
    if any {
        InterruptBehavior::CancelIncoming
    } else {
        InterruptBehavior::CancelSelf
    }
}

/// Runs its children one after another.
///
/// The group holds the union of all children's resources for its whole run,
/// so nothing can slip in between steps and take a resource a later step
/// needs.
pub struct SequentialGroup {
    commands: Vec<CommandPtr>,
    /// Index of the running child; `None` when the group is not running
    current: Option<usize>,
    requirements: Vec<Resource>,
    behavior: InterruptBehavior,
}

impl SequentialGroup {
    /// Create a sequence. An empty sequence finishes as soon as it starts.
    pub fn new(commands: impl IntoIterator<Item = CommandPtr>) -> Self {
        let commands: Vec<CommandPtr> = commands.into_iter().collect();
        let requirements = union_of(commands.iter().map(|c| c.requirements()));
        let behavior = combined_behavior(&commands);
        Self {
            commands,
            current: None,
            requirements,
            behavior,
        }
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the sequence has no steps.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for SequentialGroup {
    fn requirements(&self) -> &[Resource] {
        &self.requirements
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.behavior
    }

    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.current = Some(0);
        match self.commands.first_mut() {
            Some(first) => first.initialize(ctx),
            None => Ok(()),
        }
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        let Some(index) = self.current else {
            return Ok(());
        };
        let Some(command) = self.commands.get_mut(index) else {
            return Ok(());
        };

        command.execute(ctx)?;
        if !command.is_finished(ctx) {
            return Ok(());
        }
        // The child is done either way; a failed end must not be repeated
        self.current = None;
        command.end(false, ctx)?;

        let next = index + 1;
        let total = self.commands.len();
        self.current = Some(next);
        if let Some(command) = self.commands.get_mut(next) {
            debug!("Sequence advancing to step {}/{}: {}", next + 1, total, command.name());
            command.initialize(ctx)?;
        }
        Ok(())
    }

    fn end(&mut self, interrupted: bool, ctx: &CycleContext) -> anyhow::Result<()> {
        let running = self.current.take();
        if interrupted {
            if let Some(command) = running.and_then(|i| self.commands.get_mut(i)) {
                command.end(true, ctx)?;
            }
        }
        Ok(())
    }

    fn is_finished(&mut self, _ctx: &CycleContext) -> bool {
        self.current == Some(self.commands.len())
    }
}

/// When a parallel group is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelPolicy {
    /// Once every child has finished
    All,
    /// Once any child finishes; the rest are interrupted
    Race,
    /// Once the first child (the leader) finishes; the rest are interrupted
    Deadline,
}

struct Member {
    command: CommandPtr,
    running: bool,
}

/// Runs its children side by side, interleaved within each cycle.
///
/// Children may not share resources. The group holds the union of all
/// children's resources until the group itself ends, even after some
/// children have finished.
pub struct ParallelGroup {
    members: Vec<Member>,
    policy: ParallelPolicy,
    finished: bool,
    requirements: Vec<Resource>,
    behavior: InterruptBehavior,
}

impl ParallelGroup {
    /// Create a group.
    ///
    /// Fails when two children require the same resource, or when a race or
    /// deadline is given no children.
    pub fn new(
        policy: ParallelPolicy,
        commands: impl IntoIterator<Item = CommandPtr>,
    ) -> Result<Self, CompositionError> {
        let commands: Vec<CommandPtr> = commands.into_iter().collect();

        if commands.is_empty() {
            match policy {
                ParallelPolicy::All => {}
                ParallelPolicy::Race => return Err(CompositionError::Empty("race")),
                ParallelPolicy::Deadline => return Err(CompositionError::Empty("deadline")),
            }
        }

        for (i, first) in commands.iter().enumerate() {
            for second in &commands[i + 1..] {
                if let Some(resource) = first_shared(first.requirements(), second.requirements()) {
                    return Err(CompositionError::SharedResource {
                        resource: resource.name().to_string(),
                        first: first.name().to_string(),
                        second: second.name().to_string(),
                    });
                }
            }
        }

        let requirements = union_of(commands.iter().map(|c| c.requirements()));
        let behavior = combined_behavior(&commands);
        Ok(Self {
            members: commands
                .into_iter()
                .map(|command| Member {
                    command,
                    running: false,
                })
                .collect(),
            policy,
            finished: false,
            requirements,
            behavior,
        })
    }

    /// The completion policy.
    pub fn policy(&self) -> ParallelPolicy {
        self.policy
    }

    /// Interrupt every child still running.
    fn interrupt_running(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        for member in self.members.iter_mut().filter(|m| m.running) {
            member.running = false;
            member.command.end(true, ctx)?;
        }
        Ok(())
    }
}

impl Command for ParallelGroup {
    fn requirements(&self) -> &[Resource] {
        &self.requirements
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.behavior
    }

    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.finished = self.members.is_empty();
        for member in &mut self.members {
            member.running = true;
            member.command.initialize(ctx)?;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        if self.finished {
            return Ok(());
        }

        for (index, member) in self.members.iter_mut().enumerate() {
            if !member.running {
                continue;
            }
            member.command.execute(ctx)?;
            if member.command.is_finished(ctx) {
                member.running = false;
                member.command.end(false, ctx)?;
                match self.policy {
                    ParallelPolicy::All => {}
                    ParallelPolicy::Race => self.finished = true,
                    ParallelPolicy::Deadline if index == 0 => self.finished = true,
                    ParallelPolicy::Deadline => {}
                }
            }
        }

        match self.policy {
            ParallelPolicy::All => {
                self.finished = self.members.iter().all(|m| !m.running);
            }
            ParallelPolicy::Race | ParallelPolicy::Deadline => {
                if self.finished {
                    debug!("Parallel group ({:?}) decided, interrupting remaining children", self.policy);
                    self.interrupt_running(ctx)?;
                }
            }
        }
        Ok(())
    }

    fn end(&mut self, _interrupted: bool, ctx: &CycleContext) -> anyhow::Result<()> {
        self.interrupt_running(ctx)
    }

    fn is_finished(&mut self, _ctx: &CycleContext) -> bool {
        self.finished
    }
}
