//! The cooperative scheduler - admits commands and drives them cycle by cycle.

use crate::config::SchedulerConfig;
use crate::error::{CommandFault, LifecyclePhase, Result, SchedulerError};
use crate::event::{EventKind, EventLog, InterruptCause, RejectReason, SchedulerEvent};
use crate::registry::ResourceRegistry;
use crate::watchdog::LoopWatchdog;
use cadence_core::{
    union_of, Clock, Command, CommandId, CommandPtr, CycleContext, InterruptBehavior, MonotonicClock,
    Resource, ResourceId,
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where an active entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Passed to `schedule`
    Scheduled,
    /// A resource's default command
    Default(ResourceId),
}

/// An admitted command and what it holds.
struct Entry {
    command: CommandPtr,
    /// Deduplicated at admission
    requirements: Vec<Resource>,
    origin: Origin,
    initialized: bool,
}

/// Outcome of [`Scheduler::schedule`].
#[derive(Debug)]
pub enum Admission {
    /// The command is now active
    Admitted(CommandId),
    /// The command was not scheduled and is handed back
    Rejected {
        /// The command, untouched
        command: CommandPtr,
        /// Why
        reason: RejectReason,
    },
}

impl Admission {
    /// Whether the command was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }

    /// Id of the admitted command.
    pub fn id(&self) -> Option<CommandId> {
        match self {
            Self::Admitted(id) => Some(*id),
            Self::Rejected { .. } => None,
        }
    }
}

/// Result of a single scheduler cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Cycle number
    pub cycle: u64,
    /// Time sampled for this cycle
    pub now: Duration,
    /// Default commands admitted
    pub admitted_defaults: usize,
    /// Commands initialized
    pub initialized: usize,
    /// Commands executed
    pub executed: usize,
    /// Commands that finished on their own
    pub finished: usize,
    /// Commands active after the cycle
    pub active: usize,
    /// Commands removed because a hook failed, including faults raised by
    /// `schedule` or `cancel` since the previous cycle
    pub faults: Vec<CommandFault>,
    /// Wall time of the cycle, when it exceeded the loop period
    pub overrun: Option<Duration>,
    /// The scheduler was disabled and did nothing
    pub skipped: bool,
}

impl CycleReport {
    /// Whether no command faulted.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

type Listener = Box<dyn FnMut(&SchedulerEvent)>;

/// Cooperative, single-threaded command scheduler.
///
/// Each call to [`run`](Self::run) is one cycle:
/// ```text
/// Periodic → Admit defaults → Initialize → Execute → Reap
/// ```
/// Conflicts are resolved when a command is scheduled. At most one active
/// command holds any resource.
pub struct Scheduler {
    registry: ResourceRegistry,
    entries: Vec<Entry>,
    clock: Box<dyn Clock>,
    config: SchedulerConfig,
    cycle: u64,
    enabled: bool,
    events: EventLog,
    listeners: Vec<Listener>,
    watchdog: LoopWatchdog,
    pending_faults: Vec<CommandFault>,
}

impl Scheduler {
    /// Create a scheduler with the default configuration and a wall clock.
    pub fn new() -> Self {
        let config = SchedulerConfig::default();
        Self {
            registry: ResourceRegistry::new(),
            entries: Vec::new(),
            clock: Box::new(MonotonicClock::new()),
            events: EventLog::new(config.event_log_capacity),
            watchdog: LoopWatchdog::new(config.loop_period(), config.warn_on_overrun),
            config,
            cycle: 0,
            enabled: true,
            listeners: Vec::new(),
            pending_faults: Vec::new(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.events = EventLog::new(config.event_log_capacity);
        self.watchdog = LoopWatchdog::new(config.loop_period(), config.warn_on_overrun);
        self.config = config;
        self
    }

    /// Set the clock sampled at the start of every cycle.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // === Resources ===

    /// Register a resource so commands may require it.
    pub fn register_resource(&mut self, resource: Resource) -> Result<()> {
        debug!("Registering resource '{}'", resource);
        self.registry.register(resource)
    }

    /// Run `hook` at the start of every cycle, before any command.
    pub fn register_periodic(
        &mut self,
        resource: &Resource,
        hook: impl FnMut(&CycleContext) + 'static,
    ) -> Result<()> {
        self.registry.set_periodic(resource, hook)
    }

    /// The resource registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Set the command that runs on `resource` whenever nothing else holds it.
    ///
    /// The command must require `resource`. A running previous default is
    /// interrupted and dropped.
    pub fn set_default_command(&mut self, resource: &Resource, command: impl Command + 'static) -> Result<()> {
        let command = command.into_ptr();
        if !self.registry.contains(resource) {
            return Err(SchedulerError::UnknownResource(resource.name().to_string()));
        }
        if !command.requires(resource) {
            return Err(SchedulerError::DefaultMissingRequirement {
                resource: resource.name().to_string(),
                command: command.name().to_string(),
            });
        }
        if let Some(unknown) = self.registry.first_unknown(command.requirements()) {
            return Err(SchedulerError::UnknownResource(unknown.name().to_string()));
        }

        self.stop_running_default(resource);
        info!("Default command for '{}' is now '{}'", resource, command.name());
        self.registry.set_default(resource, command)
    }

    /// Remove and return the default command of `resource`, interrupting it
    /// first if it is running.
    pub fn remove_default_command(&mut self, resource: &Resource) -> Option<CommandPtr> {
        self.stop_running_default(resource);
        self.registry.remove_default(resource)
    }

    /// Id of the default command of `resource`.
    pub fn default_command(&self, resource: &Resource) -> Option<CommandId> {
        self.registry.default_id(resource)
    }

    fn stop_running_default(&mut self, resource: &Resource) {
        if let Some(id) = self.registry.default_id(resource) {
            if self.is_scheduled(id) {
                self.interrupt(id, InterruptCause::DefaultReplaced);
            }
        }
    }

    // === Submission ===

    /// Take ownership of a command and try to admit it.
    ///
    /// When the command conflicts with active commands, it is rejected if it
    /// or any conflicting holder is [`InterruptBehavior::CancelIncoming`];
    /// otherwise the holders are interrupted. Rejected commands are handed
    /// back. The command is initialized on the next cycle.
    pub fn schedule(&mut self, command: impl Command + 'static) -> Result<Admission> {
        let command = command.into_ptr();

        if !self.enabled {
            debug!("Scheduler disabled, not scheduling '{}'", command.name());
            self.emit(command.id(), command.name(), EventKind::Rejected { reason: RejectReason::Disabled });
            return Ok(Admission::Rejected {
                command,
                reason: RejectReason::Disabled,
            });
        }

        let requirements = union_of([command.requirements()]);
        if let Some(unknown) = self.registry.first_unknown(&requirements) {
            return Err(SchedulerError::UnknownResource(unknown.name().to_string()));
        }

        let conflicts = self.registry.conflicts(&requirements);
        if !conflicts.is_empty() {
            let incoming_yields = command.interrupt_behavior() == InterruptBehavior::CancelIncoming;
            let blocking = conflicts
                .iter()
                .find(|(_, claim)| claim.behavior == InterruptBehavior::CancelIncoming)
                .or_else(|| conflicts.first().filter(|_| incoming_yields));

            if let Some((resource, claim)) = blocking {
                warn!(
                    "Not scheduling '{}': '{}' is held by {}",
                    command.name(),
                    resource,
                    claim.holder
                );
                let reason = RejectReason::Conflict {
                    resource: resource.name().to_string(),
                    holder: claim.holder,
                };
                self.emit(command.id(), command.name(), EventKind::Rejected { reason: reason.clone() });
                return Ok(Admission::Rejected { command, reason });
            }

            let mut holders: Vec<CommandId> = Vec::new();
            for (_, claim) in &conflicts {
                if !holders.contains(&claim.holder) {
                    holders.push(claim.holder);
                }
            }
            for holder in holders {
                self.interrupt(holder, InterruptCause::Preempted { by: command.id() });
            }
        }

        let id = command.id();
        info!("Scheduled '{}' ({})", command.name(), id);
        self.admit(command, requirements, Origin::Scheduled);
        Ok(Admission::Admitted(id))
    }

    /// Interrupt an active command. Returns false, doing nothing, when `id`
    /// is not active.
    pub fn cancel(&mut self, id: CommandId) -> bool {
        self.interrupt(id, InterruptCause::Cancelled)
    }

    /// Interrupt every active command.
    pub fn cancel_all(&mut self) {
        self.interrupt_all(InterruptCause::Cancelled);
    }

    /// Interrupt everything and return the faults not yet reported.
    pub fn shutdown(mut self) -> Vec<CommandFault> {
        info!("Scheduler shutting down with {} active command(s)", self.entries.len());
        self.interrupt_all(InterruptCause::Shutdown);
        std::mem::take(&mut self.pending_faults)
    }

    // === Queries ===

    /// Whether `id` is active.
    pub fn is_scheduled(&self, id: CommandId) -> bool {
        self.position(id).is_some()
    }

    /// The active command holding `resource`.
    pub fn requiring(&self, resource: &Resource) -> Option<CommandId> {
        self.registry.claim_of(resource).map(|claim| claim.holder)
    }

    /// Number of active commands.
    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// Active commands in admission order.
    pub fn active(&self) -> Vec<(CommandId, &str)> {
        self.entries
            .iter()
            .map(|e| (e.command.id(), e.command.name()))
            .collect()
    }

    /// Cycles run so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Enable or disable the scheduler. While disabled, `run` does nothing
    /// and `schedule` rejects everything; active commands stay active.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!("Scheduler {}", if enabled { "enabled" } else { "disabled" });
        }
        self.enabled = enabled;
    }

    /// Whether the scheduler is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Call `listener` for every event.
    pub fn on_event(&mut self, listener: impl FnMut(&SchedulerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Recent events.
    pub fn event_log(&self) -> &EventLog {
        &self.events
    }

    // === Run loop ===

    /// Run one cycle.
    pub fn run(&mut self) -> CycleReport {
        if !self.enabled {
            return CycleReport {
                cycle: self.cycle,
                skipped: true,
                ..Default::default()
            };
        }

        self.watchdog.start();
        self.cycle += 1;
        let ctx = self.context();
        let mut report = CycleReport {
            cycle: self.cycle,
            now: ctx.now,
            faults: std::mem::take(&mut self.pending_faults),
            ..Default::default()
        };

        self.registry.run_periodic(&ctx);
        self.watchdog.epoch("periodic");

        // 1. Admit defaults for idle resources
        for resource_id in self.registry.ready_defaults() {
            let Some(command) = self.registry.take_default(resource_id) else {
                continue;
            };
            let requirements = union_of([command.requirements()]);
            if !self.registry.all_free(&requirements) {
                self.registry.park_default(resource_id, command);
                continue;
            }
            debug!("Admitting default command '{}'", command.name());
            self.admit(command, requirements, Origin::Default(resource_id));
            report.admitted_defaults += 1;
        }
        self.watchdog.epoch("admit");

        // 2. Initialize new entries
        let mut index = 0;
        while index < self.entries.len() {
            let entry = &mut self.entries[index];
            if entry.initialized {
                index += 1;
                continue;
            }
            entry.initialized = true;
            let result = entry.command.initialize(&ctx);
            let (id, name) = (entry.command.id(), entry.command.name().to_string());
            match result {
                Ok(()) => {
                    self.emit(id, &name, EventKind::Initialized);
                    report.initialized += 1;
                    index += 1;
                }
                Err(error) => {
                    let entry = self.entries.remove(index);
                    let faults = self.fault_with_cleanup(entry, LifecyclePhase::Initialize, error, &ctx);
                    report.faults.extend(faults);
                }
            }
        }
        self.watchdog.epoch("initialize");

        // 3. Execute
        let mut index = 0;
        while index < self.entries.len() {
            match self.entries[index].command.execute(&ctx) {
                Ok(()) => {
                    report.executed += 1;
                    index += 1;
                }
                Err(error) => {
                    let entry = self.entries.remove(index);
                    let faults = self.fault_with_cleanup(entry, LifecyclePhase::Execute, error, &ctx);
                    report.faults.extend(faults);
                }
            }
        }
        self.watchdog.epoch("execute");

        // 4. Reap finished entries
        let mut index = 0;
        while index < self.entries.len() {
            if !self.entries[index].command.is_finished(&ctx) {
                index += 1;
                continue;
            }
            let mut entry = self.entries.remove(index);
            match entry.command.end(false, &ctx) {
                Ok(()) => {
                    if entry.origin == Origin::Scheduled {
                        info!("Finished '{}'", entry.command.name());
                    } else {
                        debug!("Default command '{}' finished", entry.command.name());
                    }
                    self.emit(entry.command.id(), entry.command.name(), EventKind::Finished);
                    self.retire(entry);
                    report.finished += 1;
                }
                Err(error) => {
                    let fault = self.fault(entry, LifecyclePhase::End, error);
                    report.faults.push(fault);
                }
            }
        }
        self.watchdog.epoch("reap");

        report.active = self.entries.len();
        report.overrun = self.watchdog.finish(self.cycle);
        report
    }

    // === Internals ===

    fn context(&self) -> CycleContext {
        CycleContext::new(self.cycle, self.clock.now())
    }

    fn position(&self, id: CommandId) -> Option<usize> {
        self.entries.iter().position(|e| e.command.id() == id)
    }

    fn emit(&mut self, command: CommandId, name: &str, kind: EventKind) {
        let event = SchedulerEvent::new(self.cycle, command, name, kind);
        for listener in &mut self.listeners {
            listener(&event);
        }
        self.events.push(event);
    }

    fn admit(&mut self, command: CommandPtr, requirements: Vec<Resource>, origin: Origin) {
        let behavior = command.interrupt_behavior();
        self.registry.claim(&requirements, command.id(), behavior);
        self.emit(
            command.id(),
            command.name(),
            EventKind::Scheduled {
                default: matches!(origin, Origin::Default(_)),
            },
        );
        self.entries.push(Entry {
            command,
            requirements,
            origin,
            initialized: false,
        });
    }

    fn interrupt_all(&mut self, cause: InterruptCause) {
        let ids: Vec<CommandId> = self.entries.iter().map(|e| e.command.id()).collect();
        for id in ids {
            self.interrupt(id, cause);
        }
    }

    /// End an active command with `interrupted = true` and remove it.
    fn interrupt(&mut self, id: CommandId, cause: InterruptCause) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let mut entry = self.entries.remove(index);
        let ctx = self.context();

        if entry.origin == Origin::Scheduled {
            info!("Interrupting '{}' ({:?})", entry.command.name(), cause);
        } else {
            debug!("Interrupting default command '{}' ({:?})", entry.command.name(), cause);
        }

        let result = entry.command.end(true, &ctx);
        self.emit(id, entry.command.name(), EventKind::Interrupted { cause });
        match result {
            Ok(()) => self.retire(entry),
            Err(error) => {
                let fault = self.fault(entry, LifecyclePhase::End, error);
                self.pending_faults.push(fault);
            }
        }
        true
    }

    /// Release an ended entry's resources; default commands go back to their slot.
    fn retire(&mut self, entry: Entry) {
        self.registry.release(&entry.requirements, entry.command.id());
        if let Origin::Default(resource_id) = entry.origin {
            if let Some(stale) = self.registry.park_default(resource_id, entry.command) {
                debug!("Dropping replaced default command '{}'", stale.name());
            }
        }
    }

    /// Remove a faulted entry for good and describe the fault.
    fn fault(&mut self, entry: Entry, phase: LifecyclePhase, error: anyhow::Error) -> CommandFault {
        let id = entry.command.id();
        let name = entry.command.name().to_string();
        error!("Command '{}' faulted during {}: {:#}", name, phase, error);

        self.emit(
            id,
            &name,
            EventKind::Faulted {
                phase,
                message: format!("{:#}", error),
            },
        );
        self.registry.release(&entry.requirements, id);
        if let Origin::Default(resource_id) = entry.origin {
            warn!("Removing faulted default command '{}'", name);
            self.registry.clear_default(resource_id, id);
        }

        CommandFault {
            command: id,
            name,
            phase,
            error,
        }
    }

    /// Fault an entry whose `initialize` or `execute` failed, giving it a
    /// chance to clean up with `end(true)` first.
    fn fault_with_cleanup(
        &mut self,
        mut entry: Entry,
        phase: LifecyclePhase,
        error: anyhow::Error,
        ctx: &CycleContext,
    ) -> Vec<CommandFault> {
        let cleanup = entry.command.end(true, ctx);
        let (id, name) = (entry.command.id(), entry.command.name().to_string());

        let mut faults = vec![self.fault(entry, phase, error)];
        if let Err(error) = cleanup {
            error!("Command '{}' also failed to end after a fault: {:#}", name, error);
            faults.push(CommandFault {
                command: id,
                name,
                phase: LifecyclePhase::End,
                error,
            });
        }
        faults
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            debug!("Dropping scheduler with {} active command(s)", self.entries.len());
            self.interrupt_all(InterruptCause::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_commands::{parallel, sequence, CommandExt};
    use cadence_core::test_utils::{Call, FailAt, Recorder, CallLog};
    use cadence_core::ManualClock;
    use std::cell::RefCell;
    use std::rc::Rc;

    const PERIOD: Duration = Duration::from_millis(20);

    struct Rig {
        scheduler: Scheduler,
        clock: ManualClock,
        log: CallLog,
        drive: Resource,
        arm: Resource,
    }

    impl Rig {
        fn new() -> Self {
            let clock = ManualClock::new();
            let mut scheduler = Scheduler::new().with_clock(clock.clone());
            let drive = Resource::new("drive");
            let arm = Resource::new("arm");
            scheduler.register_resource(drive.clone()).unwrap();
            scheduler.register_resource(arm.clone()).unwrap();
            Self {
                scheduler,
                clock,
                log: CallLog::new(),
                drive,
                arm,
            }
        }

        fn recorder(&self, name: &str) -> Recorder {
            Recorder::new(name, &self.log)
        }

        /// Run one cycle at the current time, then advance by one period.
        fn tick(&mut self) -> CycleReport {
            let report = self.scheduler.run();
            self.clock.advance(PERIOD);
            report
        }

        fn ticks(&mut self, n: usize) {
            for _ in 0..n {
                self.tick();
            }
        }

        fn schedule(&mut self, command: impl Command + 'static) -> Admission {
            self.scheduler.schedule(command).unwrap()
        }
    }

    #[test]
    fn test_lifecycle_initialize_once_execute_each_cycle_end_once() {
        let mut rig = Rig::new();
        let cmd = rig.recorder("a").requiring(&rig.drive).finish_after(3);
        let id = rig.schedule(cmd).id().unwrap();

        let report = rig.tick();
        assert_eq!(report.initialized, 1);
        assert_eq!(report.executed, 1);
        rig.ticks(2);

        assert!(!rig.scheduler.is_scheduled(id));
        assert_eq!(
            rig.log.calls("a"),
            vec![
                Call::Initialize,
                Call::Execute,
                Call::Execute,
                Call::Execute,
                Call::End { interrupted: false },
            ]
        );
        assert_eq!(rig.scheduler.requiring(&rig.drive), None);
    }

    #[test]
    fn test_cancel_incoming_rejects_second() {
        let mut rig = Rig::new();
        let first = rig.recorder("first").requiring(&rig.drive).cancel_incoming();
        let first_id = rig.schedule(first).id().unwrap();
        rig.tick();

        let second = rig.recorder("second").requiring(&rig.drive).cancel_incoming();
        match rig.schedule(second) {
            Admission::Rejected { command, reason } => {
                assert_eq!(command.name(), "second");
                assert_eq!(
                    reason,
                    RejectReason::Conflict {
                        resource: "drive".to_string(),
                        holder: first_id,
                    }
                );
            }
            other => panic!("expected rejection, got {:?}", other),
        }

        rig.tick();
        assert!(rig.scheduler.is_scheduled(first_id));
        assert_eq!(rig.log.executes("first"), 2);
        assert!(rig.log.calls("second").is_empty());
    }

    #[test]
    fn test_holder_refusing_to_yield_rejects_incoming() {
        let mut rig = Rig::new();
        let holder = rig.recorder("holder").requiring(&rig.drive).cancel_incoming();
        let holder_id = rig.schedule(holder).id().unwrap();

        let incoming = rig.recorder("incoming").requiring(&rig.drive);
        assert!(!rig.schedule(incoming).is_admitted());
        assert_eq!(rig.scheduler.requiring(&rig.drive), Some(holder_id));
    }

    #[test]
    fn test_cancel_self_holder_is_preempted() {
        let mut rig = Rig::new();
        let holder = rig.recorder("holder").requiring(&rig.drive);
        let holder_id = rig.schedule(holder).id().unwrap();
        rig.ticks(2);

        let incoming = rig.recorder("incoming").requiring(&rig.drive).requiring(&rig.arm);
        let incoming_id = rig.schedule(incoming).id().unwrap();

        assert_eq!(rig.log.ends("holder"), vec![true]);
        assert!(!rig.scheduler.is_scheduled(holder_id));
        assert_eq!(rig.scheduler.requiring(&rig.drive), Some(incoming_id));
        assert_eq!(rig.scheduler.requiring(&rig.arm), Some(incoming_id));

        let preempted = rig
            .scheduler
            .event_log()
            .for_command(holder_id)
            .into_iter()
            .any(|e| {
                e.kind
                    == EventKind::Interrupted {
                        cause: InterruptCause::Preempted { by: incoming_id },
                    }
            });
        assert!(preempted);
    }

    #[test]
    fn test_unrelated_commands_run_side_by_side() {
        let mut rig = Rig::new();
        rig.schedule(rig.recorder("a").requiring(&rig.drive));
        rig.schedule(rig.recorder("b").requiring(&rig.arm));
        rig.schedule(rig.recorder("c"));

        let report = rig.tick();
        assert_eq!(report.executed, 3);
        assert_eq!(report.active, 3);
    }

    #[test]
    fn test_execute_follows_admission_order() {
        let mut rig = Rig::new();
        rig.schedule(rig.recorder("a"));
        rig.schedule(rig.recorder("b"));
        rig.tick();
        rig.log.clear();
        rig.tick();

        let names: Vec<String> = rig.log.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_sequence_never_overlaps() {
        let mut rig = Rig::new();
        let seq = sequence([
            rig.recorder("a").requiring(&rig.drive).finish_after(2).into_ptr(),
            rig.recorder("b").requiring(&rig.arm).finish_after(2).into_ptr(),
        ]);
        let id = rig.schedule(seq).id().unwrap();

        // The sequence holds both resources from the start
        assert_eq!(rig.scheduler.requiring(&rig.arm), Some(id));

        rig.ticks(4);
        assert!(!rig.scheduler.is_scheduled(id));

        let mut a_done = false;
        for (name, call) in rig.log.entries() {
            if name == "a" && call == (Call::End { interrupted: false }) {
                a_done = true;
            }
            if name == "b" {
                assert!(a_done, "b ran before a finished: {:?}", call);
            }
        }
        assert_eq!(rig.log.executes("a"), 2);
        assert_eq!(rig.log.executes("b"), 2);
    }

    #[test]
    fn test_parallel_finishes_after_all() {
        let mut rig = Rig::new();
        let group = parallel([
            rig.recorder("fast").requiring(&rig.drive).finish_after(1).into_ptr(),
            rig.recorder("slow").requiring(&rig.arm).finish_after(3).into_ptr(),
        ])
        .unwrap();
        let id = rig.schedule(group).id().unwrap();

        rig.ticks(2);
        assert!(rig.scheduler.is_scheduled(id));
        assert_eq!(rig.log.executes("fast"), 1);
        assert_eq!(rig.log.executes("slow"), 2);

        let report = rig.tick();
        assert_eq!(report.finished, 1);
        assert!(!rig.scheduler.is_scheduled(id));
        assert_eq!(rig.log.executes("slow"), 3);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut rig = Rig::new();
        let id = rig.schedule(rig.recorder("a").finish_after(1)).id().unwrap();
        rig.tick();

        assert!(!rig.scheduler.is_scheduled(id));
        assert!(!rig.scheduler.cancel(id));
        assert!(!rig.scheduler.cancel(CommandId::new()));
        assert_eq!(rig.log.ends("a"), vec![false]);
    }

    #[test]
    fn test_cancel_before_first_cycle_skips_initialize() {
        let mut rig = Rig::new();
        let id = rig.schedule(rig.recorder("a").requiring(&rig.drive)).id().unwrap();

        assert!(rig.scheduler.cancel(id));
        assert_eq!(rig.log.calls("a"), vec![Call::End { interrupted: true }]);
        assert_eq!(rig.scheduler.requiring(&rig.drive), None);

        rig.tick();
        assert_eq!(rig.log.calls("a").len(), 1);
    }

    #[test]
    fn test_default_command_keeps_resource_against_cancel_incoming() {
        let mut rig = Rig::new();
        let x = rig.recorder("x").requiring(&rig.drive);
        rig.scheduler.set_default_command(&rig.drive, x).unwrap();
        rig.tick();

        let x_id = rig.scheduler.default_command(&rig.drive).unwrap();
        assert!(rig.scheduler.is_scheduled(x_id));

        let y = rig.recorder("y").requiring(&rig.drive).cancel_incoming();
        assert!(!rig.schedule(y).is_admitted());

        rig.ticks(3);
        assert!(rig.scheduler.is_scheduled(x_id));
        assert_eq!(rig.log.executes("x"), 4);
        assert!(rig.log.ends("x").is_empty());
    }

    #[test]
    fn test_default_command_returns_after_interruption() {
        let mut rig = Rig::new();
        rig.scheduler
            .set_default_command(&rig.drive, rig.recorder("idle").requiring(&rig.drive))
            .unwrap();
        rig.tick();

        rig.schedule(rig.recorder("auto").requiring(&rig.drive).finish_after(2));
        assert_eq!(rig.log.ends("idle"), vec![true]);

        rig.ticks(2);
        assert_eq!(rig.log.ends("auto"), vec![false]);
        assert_eq!(rig.log.initializes("idle"), 1);

        let report = rig.tick();
        assert_eq!(report.admitted_defaults, 1);
        assert_eq!(rig.log.initializes("idle"), 2);
    }

    #[test]
    fn test_default_must_require_resource() {
        let mut rig = Rig::new();
        let err = rig
            .scheduler
            .set_default_command(&rig.drive, rig.recorder("wrong").requiring(&rig.arm))
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::DefaultMissingRequirement {
                resource: "drive".to_string(),
                command: "wrong".to_string(),
            }
        );
    }

    #[test]
    fn test_replacing_default_interrupts_running_one() {
        let mut rig = Rig::new();
        rig.scheduler
            .set_default_command(&rig.drive, rig.recorder("old").requiring(&rig.drive))
            .unwrap();
        rig.tick();

        rig.scheduler
            .set_default_command(&rig.drive, rig.recorder("new").requiring(&rig.drive))
            .unwrap();
        assert_eq!(rig.log.ends("old"), vec![true]);

        rig.ticks(2);
        assert_eq!(rig.log.executes("old"), 1);
        assert_eq!(rig.log.executes("new"), 2);
    }

    #[test]
    fn test_remove_default_hands_it_back() {
        let mut rig = Rig::new();
        rig.scheduler
            .set_default_command(&rig.drive, rig.recorder("idle").requiring(&rig.drive))
            .unwrap();
        rig.tick();

        let removed = rig.scheduler.remove_default_command(&rig.drive).unwrap();
        assert_eq!(removed.name(), "idle");
        assert_eq!(rig.log.ends("idle"), vec![true]);

        let report = rig.tick();
        assert_eq!(report.active, 0);
    }

    #[test]
    fn test_timeout_interrupts_at_deadline_not_before() {
        let mut rig = Rig::new();
        let cmd = rig
            .recorder("x")
            .requiring(&rig.drive)
            .with_timeout(PERIOD * 2);
        let id = rig.schedule(cmd).id().unwrap();

        // Cycles at 0ms and 20ms
        rig.ticks(2);
        assert!(rig.scheduler.is_scheduled(id));
        assert!(rig.log.ends("x").is_empty());

        // Cycle at 40ms
        rig.tick();
        assert!(!rig.scheduler.is_scheduled(id));
        assert_eq!(rig.log.ends("x"), vec![true]);
    }

    #[test]
    fn test_execute_fault_is_isolated() {
        let mut rig = Rig::new();
        let bad = rig.recorder("bad").requiring(&rig.drive).fail_at(FailAt::Execute(2));
        let bad_id = rig.schedule(bad).id().unwrap();
        let good_id = rig.schedule(rig.recorder("good").requiring(&rig.arm)).id().unwrap();

        assert!(rig.tick().is_clean());
        let report = rig.tick();

        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].command, bad_id);
        assert_eq!(report.faults[0].phase, LifecyclePhase::Execute);
        assert!(!rig.scheduler.is_scheduled(bad_id));
        assert_eq!(rig.log.ends("bad"), vec![true]);
        assert_eq!(rig.scheduler.requiring(&rig.drive), None);

        rig.tick();
        assert!(rig.scheduler.is_scheduled(good_id));
        assert_eq!(rig.log.executes("good"), 3);
    }

    #[test]
    fn test_initialize_fault_skips_execute() {
        let mut rig = Rig::new();
        let bad = rig.recorder("bad").requiring(&rig.drive).fail_at(FailAt::Initialize);
        rig.schedule(bad);

        let report = rig.tick();
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].phase, LifecyclePhase::Initialize);
        assert_eq!(report.executed, 0);
        assert_eq!(
            rig.log.calls("bad"),
            vec![Call::Initialize, Call::End { interrupted: true }]
        );
    }

    #[test]
    fn test_end_fault_on_finish_reported() {
        let mut rig = Rig::new();
        let bad = rig.recorder("bad").requiring(&rig.drive).finish_after(1).fail_at(FailAt::End);
        rig.schedule(bad);

        let report = rig.tick();
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].phase, LifecyclePhase::End);
        assert_eq!(report.finished, 0);
        assert_eq!(rig.scheduler.requiring(&rig.drive), None);
    }

    #[test]
    fn test_end_fault_on_cancel_surfaces_next_cycle() {
        let mut rig = Rig::new();
        let id = rig.schedule(rig.recorder("bad").fail_at(FailAt::End)).id().unwrap();
        rig.tick();

        assert!(rig.scheduler.cancel(id));
        let report = rig.tick();
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].command, id);
        assert!(rig.tick().is_clean());
    }

    #[test]
    fn test_faulted_default_is_removed() {
        let mut rig = Rig::new();
        rig.scheduler
            .set_default_command(&rig.drive, rig.recorder("idle").requiring(&rig.drive).fail_at(FailAt::Execute(1)))
            .unwrap();

        assert_eq!(rig.tick().faults.len(), 1);
        assert_eq!(rig.scheduler.default_command(&rig.drive), None);
        assert_eq!(rig.tick().admitted_defaults, 0);
    }

    #[test]
    fn test_duplicate_requirement_claimed_once() {
        let mut rig = Rig::new();
        let twice = rig.recorder("twice").requiring(&rig.drive).requiring(&rig.drive);
        let id = rig.schedule(twice).id().unwrap();
        rig.tick();
        assert_eq!(rig.scheduler.requiring(&rig.drive), Some(id));

        let next = rig.recorder("next").requiring(&rig.drive);
        let next_id = rig.schedule(next).id().unwrap();
        assert_eq!(rig.log.ends("twice"), vec![true]);
        assert_eq!(rig.scheduler.requiring(&rig.drive), Some(next_id));

        rig.scheduler.cancel(next_id);
        assert_eq!(rig.scheduler.requiring(&rig.drive), None);
    }

    #[test]
    fn test_default_with_duplicate_requirement_admitted() {
        let mut rig = Rig::new();
        let idle = rig.recorder("idle").requiring(&rig.drive).requiring(&rig.drive);
        rig.scheduler.set_default_command(&rig.drive, idle).unwrap();

        let report = rig.tick();
        assert_eq!(report.admitted_defaults, 1);
        assert_eq!(rig.log.executes("idle"), 1);
    }

    #[test]
    fn test_sequence_child_end_fault_ends_child_once() {
        let mut rig = Rig::new();
        let seq = sequence([
            rig.recorder("a")
                .requiring(&rig.drive)
                .finish_after(1)
                .fail_at(FailAt::End)
                .into_ptr(),
            rig.recorder("b").requiring(&rig.drive).into_ptr(),
        ]);
        rig.schedule(seq);

        let report = rig.tick();
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].phase, LifecyclePhase::Execute);
        assert_eq!(rig.log.ends("a"), vec![false]);
        assert!(rig.log.calls("b").is_empty());
        assert_eq!(rig.scheduler.requiring(&rig.drive), None);
    }

    #[test]
    fn test_unknown_resource_is_error() {
        let mut rig = Rig::new();
        let ghost = Resource::new("ghost");
        let err = rig.scheduler.schedule(rig.recorder("a").requiring(&ghost)).unwrap_err();
        assert_eq!(err, SchedulerError::UnknownResource("ghost".to_string()));
    }

    #[test]
    fn test_rejected_command_can_be_rescheduled() {
        let mut rig = Rig::new();
        rig.schedule(rig.recorder("holder").requiring(&rig.drive).cancel_incoming().finish_after(1));

        let Admission::Rejected { command, .. } = rig.schedule(rig.recorder("waiting").requiring(&rig.drive)) else {
            panic!("expected rejection");
        };
        rig.tick();

        assert!(rig.schedule(command).is_admitted());
        rig.tick();
        assert_eq!(rig.log.executes("waiting"), 1);
    }

    #[test]
    fn test_disabled_scheduler_does_nothing() {
        let mut rig = Rig::new();
        rig.schedule(rig.recorder("a"));
        rig.scheduler.set_enabled(false);

        let report = rig.tick();
        assert!(report.skipped);
        assert!(rig.log.calls("a").is_empty());
        assert!(matches!(
            rig.schedule(rig.recorder("b")),
            Admission::Rejected {
                reason: RejectReason::Disabled,
                ..
            }
        ));

        rig.scheduler.set_enabled(true);
        rig.tick();
        assert_eq!(rig.log.executes("a"), 1);
    }

    #[test]
    fn test_periodic_hooks_run_before_commands() {
        let mut rig = Rig::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let seen = order.clone();
        rig.scheduler
            .register_periodic(&rig.drive, move |ctx| seen.borrow_mut().push(ctx.cycle))
            .unwrap();
        rig.schedule(rig.recorder("a"));

        rig.ticks(2);
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_listeners_see_every_event() {
        let mut rig = Rig::new();
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let sink = kinds.clone();
        rig.scheduler.on_event(move |event| sink.borrow_mut().push(event.kind.clone()));

        rig.schedule(rig.recorder("a").finish_after(1));
        rig.tick();

        assert_eq!(
            *kinds.borrow(),
            vec![
                EventKind::Scheduled { default: false },
                EventKind::Initialized,
                EventKind::Finished,
            ]
        );
        assert_eq!(rig.scheduler.event_log().len(), 3);
    }

    #[test]
    fn test_shutdown_interrupts_outstanding() {
        let mut rig = Rig::new();
        rig.schedule(rig.recorder("a").requiring(&rig.drive));
        rig.schedule(rig.recorder("b").fail_at(FailAt::End));
        rig.tick();

        let Rig { scheduler, log, .. } = rig;
        let faults = scheduler.shutdown();
        assert_eq!(log.ends("a"), vec![true]);
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].name, "b");
    }

    #[test]
    fn test_drop_interrupts_outstanding() {
        let log = CallLog::new();
        {
            let mut scheduler = Scheduler::new();
            scheduler.schedule(Recorder::new("a", &log)).unwrap();
            scheduler.run();
        }
        assert_eq!(log.ends("a"), vec![true]);
    }

    #[test]
    fn test_scheduled_ptr_keeps_id() {
        let mut rig = Rig::new();
        let ptr = rig.recorder("a").into_ptr();
        let id = ptr.id();
        assert_eq!(rig.schedule(ptr).id(), Some(id));
        assert_eq!(rig.scheduler.active(), vec![(id, "a")]);
    }
}
