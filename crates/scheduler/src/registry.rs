//! Resource registry - who holds what, and each resource's default command.

use crate::error::{Result, SchedulerError};
use cadence_core::{Command, CommandId, CommandPtr, CycleContext, InterruptBehavior, Resource, ResourceId};
use std::collections::HashMap;

/// The active command holding a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    /// Holding command
    pub holder: CommandId,
    /// Its interrupt behavior
    pub behavior: InterruptBehavior,
}

/// A resource's default command. `parked` is empty while it runs.
struct DefaultSlot {
    id: CommandId,
    parked: Option<CommandPtr>,
}

struct Slot {
    resource: Resource,
    claim: Option<Claim>,
    default_command: Option<DefaultSlot>,
    periodic: Option<Box<dyn FnMut(&CycleContext)>>,
}

/// Registry of resources known to a scheduler.
pub struct ResourceRegistry {
    slots: HashMap<ResourceId, Slot>,
    /// Registration order
    order: Vec<ResourceId>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a resource.
    pub fn register(&mut self, resource: Resource) -> Result<()> {
        if self.slots.contains_key(&resource.id()) {
            return Err(SchedulerError::DuplicateResource(resource.name().to_string()));
        }
        self.order.push(resource.id());
        self.slots.insert(
            resource.id(),
            Slot {
                resource,
                claim: None,
                default_command: None,
                periodic: None,
            },
        );
        Ok(())
    }

    /// Whether a resource is registered.
    pub fn contains(&self, resource: &Resource) -> bool {
        self.slots.contains_key(&resource.id())
    }

    /// Look up a resource by id.
    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.slots.get(&id).map(|s| &s.resource)
    }

    /// All resources in registration order.
    pub fn resources(&self) -> Vec<&Resource> {
        self.order
            .iter()
            .filter_map(|id| self.slots.get(id).map(|s| &s.resource))
            .collect()
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no resource is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The first of `requirements` that is not registered.
    pub fn first_unknown<'a>(&self, requirements: &'a [Resource]) -> Option<&'a Resource> {
        requirements.iter().find(|r| !self.contains(r))
    }

    fn slot(&self, resource: &Resource) -> Result<&Slot> {
        self.slots
            .get(&resource.id())
            .ok_or_else(|| SchedulerError::UnknownResource(resource.name().to_string()))
    }

    fn slot_mut(&mut self, resource: &Resource) -> Result<&mut Slot> {
        self.slots
            .get_mut(&resource.id())
            .ok_or_else(|| SchedulerError::UnknownResource(resource.name().to_string()))
    }

    // === Claims ===

    /// Current claim on a resource.
    pub fn claim_of(&self, resource: &Resource) -> Option<Claim> {
        self.slots.get(&resource.id()).and_then(|s| s.claim)
    }

    /// Existing claims on any of `requirements`.
    pub fn conflicts(&self, requirements: &[Resource]) -> Vec<(Resource, Claim)> {
        requirements
            .iter()
            .filter_map(|r| self.claim_of(r).map(|claim| (r.clone(), claim)))
            .collect()
    }

    /// Whether all of `requirements` are free.
    pub fn all_free(&self, requirements: &[Resource]) -> bool {
        requirements.iter().all(|r| self.claim_of(r).is_none())
    }

    /// Claim `requirements` for `holder`. Callers resolve conflicts first.
    pub fn claim(&mut self, requirements: &[Resource], holder: CommandId, behavior: InterruptBehavior) {
        for resource in requirements {
            if let Some(slot) = self.slots.get_mut(&resource.id()) {
                debug_assert!(slot.claim.is_none(), "resource {} already claimed", resource);
                slot.claim = Some(Claim { holder, behavior });
            }
        }
    }

    /// Release whatever of `requirements` `holder` still holds.
    pub fn release(&mut self, requirements: &[Resource], holder: CommandId) {
        for resource in requirements {
            if let Some(slot) = self.slots.get_mut(&resource.id()) {
                if slot.claim.is_some_and(|c| c.holder == holder) {
                    slot.claim = None;
                }
            }
        }
    }

    // === Default commands ===

    /// Install a default command, dropping any previous one.
    ///
    /// Callers make sure a running previous default has been stopped.
    pub fn set_default(&mut self, resource: &Resource, command: CommandPtr) -> Result<()> {
        let slot = self.slot_mut(resource)?;
        slot.default_command = Some(DefaultSlot {
            id: command.id(),
            parked: Some(command),
        });
        Ok(())
    }

    /// Remove the default command if it is parked.
    pub fn remove_default(&mut self, resource: &Resource) -> Option<CommandPtr> {
        let slot = self.slots.get_mut(&resource.id())?;
        let parked = slot.default_command.as_mut()?.parked.take();
        if parked.is_some() {
            slot.default_command = None;
        }
        parked
    }

    /// Forget the default command if it is still `id`, parked or not.
    pub fn clear_default(&mut self, resource_id: ResourceId, id: CommandId) {
        if let Some(slot) = self.slots.get_mut(&resource_id) {
            if slot.default_command.as_ref().is_some_and(|d| d.id == id) {
                slot.default_command = None;
            }
        }
    }

    /// Id of a resource's default command.
    pub fn default_id(&self, resource: &Resource) -> Option<CommandId> {
        self.slots
            .get(&resource.id())
            .and_then(|s| s.default_command.as_ref())
            .map(|d| d.id)
    }

    /// Resources whose parked default command could run now: the resource is
    /// unclaimed and so is everything else the command requires.
    pub fn ready_defaults(&self) -> Vec<ResourceId> {
        self.order
            .iter()
            .filter(|id| {
                self.slots.get(id).is_some_and(|slot| {
                    slot.claim.is_none()
                        && slot
                            .default_command
                            .as_ref()
                            .and_then(|d| d.parked.as_ref())
                            .is_some_and(|cmd| self.all_free(cmd.requirements()))
                })
            })
            .copied()
            .collect()
    }

    /// Take a parked default command out to run it.
    pub fn take_default(&mut self, resource_id: ResourceId) -> Option<CommandPtr> {
        self.slots
            .get_mut(&resource_id)?
            .default_command
            .as_mut()?
            .parked
            .take()
    }

    /// Put a default command back after it ended.
    ///
    /// Returns the command if it is no longer the resource's default.
    pub fn park_default(&mut self, resource_id: ResourceId, command: CommandPtr) -> Option<CommandPtr> {
        let Some(slot) = self
            .slots
            .get_mut(&resource_id)
            .and_then(|s| s.default_command.as_mut())
            .filter(|d| d.id == command.id())
        else {
            return Some(command);
        };
        slot.parked = Some(command);
        None
    }

    // === Periodic hooks ===

    /// Run `hook` once per cycle, before any command.
    pub fn set_periodic(&mut self, resource: &Resource, hook: impl FnMut(&CycleContext) + 'static) -> Result<()> {
        self.slot_mut(resource)?.periodic = Some(Box::new(hook));
        Ok(())
    }

    /// Run every periodic hook in registration order.
    pub fn run_periodic(&mut self, ctx: &CycleContext) {
        for id in &self.order {
            if let Some(hook) = self.slots.get_mut(id).and_then(|s| s.periodic.as_mut()) {
                hook(ctx);
            }
        }
    }

    /// Whether a resource has a periodic hook.
    pub fn has_periodic(&self, resource: &Resource) -> bool {
        self.slot(resource).is_ok_and(|s| s.periodic.is_some())
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
