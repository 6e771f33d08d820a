//! Command model - the unit of scheduled, resumable work.

use crate::context::CycleContext;
use crate::id::CommandId;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};

/// What happens when a command is scheduled while a conflicting one holds
/// one of its resources.
///
/// A conflict is resolved in favour of the running command when either side
/// is [`InterruptBehavior::CancelIncoming`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterruptBehavior {
    /// Yield: the running command is interrupted and the incoming one admitted
    #[default]
    CancelSelf,

    /// Hold on: the incoming command is not scheduled
    CancelIncoming,
}

/// A unit of work that declares the resources it needs and is driven by the
/// scheduler one short step at a time.
///
/// Lifecycle: `initialize` once, then `execute` once per cycle until
/// `is_finished` returns true or the command is interrupted, then `end`
/// exactly once. Hooks must not block.
///
/// Errors returned from hooks are treated as faults of this command only.
pub trait Command {
    /// Display name used in logs and events.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Resources this command needs exclusive use of. Must not change once
    /// the command has been scheduled.
    fn requirements(&self) -> &[Resource] {
        &[]
    }

    /// Whether `resource` is among this command's requirements.
    fn requires(&self, resource: &Resource) -> bool {
        self.requirements().contains(resource)
    }

    /// Conflict policy for this command.
    fn interrupt_behavior(&self) -> InterruptBehavior {
        InterruptBehavior::CancelSelf
    }

    /// Called once when the command starts.
    fn initialize(&mut self, _ctx: &CycleContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once per cycle while the command is active.
    fn execute(&mut self, _ctx: &CycleContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once when the command finishes or is interrupted.
    ///
    /// May be called without a prior `initialize` when the command is
    /// cancelled before its first cycle.
    fn end(&mut self, _interrupted: bool, _ctx: &CycleContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Whether the command has completed its work.
    fn is_finished(&mut self, _ctx: &CycleContext) -> bool {
        false
    }

    /// Move this command into a new heap slot behind the abstract interface.
    ///
    /// The boxed value keeps its concrete runtime type.
    fn transfer_ownership(self) -> Box<dyn Command>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }

    /// Move this command into the framework's owning handle.
    fn into_ptr(self) -> CommandPtr
    where
        Self: Sized + 'static,
    {
        CommandPtr::new(self)
    }
}

/// Strip the module path and generic arguments from a type name.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Owning handle to a type-erased command.
///
/// Every handle gets its own [`CommandId`] and remembers the concrete type it
/// was built from.
pub struct CommandPtr {
    id: CommandId,
    type_name: &'static str,
    inner: Box<dyn Command>,
}

impl CommandPtr {
    /// Take ownership of a concrete command.
    pub fn new<C: Command + 'static>(command: C) -> Self {
        Self {
            id: CommandId::new(),
            type_name: std::any::type_name::<C>(),
            inner: command.transfer_ownership(),
        }
    }

    /// The id assigned to this handle.
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Fully qualified name of the concrete command type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Give up the handle and return the boxed command.
    pub fn into_inner(self) -> Box<dyn Command> {
        self.inner
    }
}

impl Command for CommandPtr {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn requirements(&self) -> &[Resource] {
        self.inner.requirements()
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.inner.interrupt_behavior()
    }

    fn initialize(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.inner.initialize(ctx)
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        self.inner.execute(ctx)
    }

    fn end(&mut self, interrupted: bool, ctx: &CycleContext) -> anyhow::Result<()> {
        self.inner.end(interrupted, ctx)
    }

    fn is_finished(&mut self, ctx: &CycleContext) -> bool {
        self.inner.is_finished(ctx)
    }

    fn transfer_ownership(self) -> Box<dyn Command> {
        self.inner
    }

    fn into_ptr(self) -> CommandPtr {
        self
    }
}

impl std::fmt::Debug for CommandPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPtr")
            .field("id", &self.id)
            .field("name", &self.inner.name())
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl Command for Idle {}

    struct Claims {
        resources: Vec<Resource>,
    }

    impl Command for Claims {
        fn name(&self) -> &str {
            "claims"
        }

        fn requirements(&self) -> &[Resource] {
            &self.resources
        }

        fn interrupt_behavior(&self) -> InterruptBehavior {
            InterruptBehavior::CancelIncoming
        }
    }

    #[test]
    fn test_default_name_is_short_type_name() {
        assert_eq!(Idle.name(), "Idle");
        assert_eq!(short_type_name("a::b::Wrapper<c::D>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[test]
    fn test_into_ptr_keeps_concrete_type() {
        let ptr = Idle.into_ptr();
        assert!(ptr.type_name().ends_with("Idle"));
        assert_eq!(ptr.name(), "Idle");
    }

    #[test]
    fn test_into_ptr_on_ptr_is_identity() {
        let ptr = Idle.into_ptr();
        let id = ptr.id();
        let again = ptr.into_ptr();
        assert_eq!(again.id(), id);
        assert!(again.type_name().ends_with("Idle"));
    }

    #[test]
    fn test_ptr_delegates() {
        let drive = Resource::new("drive");
        let ptr = Claims {
            resources: vec![drive.clone()],
        }
        .into_ptr();

        assert_eq!(ptr.name(), "claims");
        assert!(ptr.requires(&drive));
        assert!(!ptr.requires(&Resource::new("arm")));
        assert_eq!(ptr.interrupt_behavior(), InterruptBehavior::CancelIncoming);
    }

    #[test]
    fn test_interrupt_behavior_default() {
        assert_eq!(InterruptBehavior::default(), InterruptBehavior::CancelSelf);
    }
}
