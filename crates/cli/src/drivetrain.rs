//! Simulated differential drivetrain and the commands that drive it.

use cadence_core::{Command, CycleContext, Resource};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

/// Top speed at full output, in feet per second.
pub const MAX_SPEED_FPS: f64 = 10.0;

/// Turn rate at full differential output, in degrees per second.
pub const MAX_TURN_DPS: f64 = 180.0;

#[derive(Debug, Default)]
struct DriveState {
    left_output: f64,
    right_output: f64,
    left_distance: f64,
    right_distance: f64,
    heading: f64,
}

/// Two-sided drivetrain with encoders and a gyro, integrated in software.
///
/// Clones share the same hardware.
#[derive(Debug, Clone)]
pub struct DriveTrain {
    resource: Resource,
    state: Rc<RefCell<DriveState>>,
}

impl DriveTrain {
    /// Create a stopped drivetrain at the origin.
    pub fn new() -> Self {
        Self {
            resource: Resource::new("drivetrain"),
            state: Rc::new(RefCell::new(DriveState::default())),
        }
    }

    /// The resource commands claim to use the drivetrain.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Set both sides' outputs, clamped to [-1, 1].
    pub fn tank_drive(&self, left: f64, right: f64) {
        let mut state = self.state.borrow_mut();
        state.left_output = left.clamp(-1.0, 1.0);
        state.right_output = right.clamp(-1.0, 1.0);
    }

    /// Zero both outputs.
    pub fn stop(&self) {
        self.tank_drive(0.0, 0.0);
    }

    /// Current (left, right) outputs.
    pub fn outputs(&self) -> (f64, f64) {
        let state = self.state.borrow();
        (state.left_output, state.right_output)
    }

    /// Mean encoder distance in feet.
    pub fn distance(&self) -> f64 {
        let state = self.state.borrow();
        (state.left_distance + state.right_distance) / 2.0
    }

    /// Gyro heading in degrees.
    pub fn heading(&self) -> f64 {
        self.state.borrow().heading
    }

    /// Zero both encoders.
    pub fn reset_encoders(&self) {
        let mut state = self.state.borrow_mut();
        state.left_distance = 0.0;
        state.right_distance = 0.0;
    }

    /// Integrate the current outputs over `dt`.
    pub fn simulate(&self, dt: Duration) {
        let secs = dt.as_secs_f64();
        let mut state = self.state.borrow_mut();
        state.left_distance += state.left_output * MAX_SPEED_FPS * secs;
        state.right_distance += state.right_output * MAX_SPEED_FPS * secs;
        state.heading += (state.left_output - state.right_output) / 2.0 * MAX_TURN_DPS * secs;
    }
}

impl Default for DriveTrain {
    fn default() -> Self {
        Self::new()
    }
}

/// Scripted stand-in for a driver's joystick: a slow weave.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedJoystick;

impl ScriptedJoystick {
    /// (forward, turn) axes at time `now`.
    pub fn axes(&self, now: Duration) -> (f64, f64) {
        let t = now.as_secs_f64();
        (0.5, 0.3 * (t * std::f64::consts::PI / 2.0).sin())
    }
}

/// Arcade-drives from the joystick until interrupted. The drivetrain's
/// default command.
pub struct DriveWithJoystick {
    drive: DriveTrain,
    requirements: Vec<Resource>,
    joystick: ScriptedJoystick,
}

impl DriveWithJoystick {
    /// Create the command.
    pub fn new(drive: DriveTrain) -> Self {
        let requirements = vec![drive.resource().clone()];
        Self {
            drive,
            requirements,
            joystick: ScriptedJoystick,
        }
    }
}

impl Command for DriveWithJoystick {
    fn requirements(&self) -> &[Resource] {
        &self.requirements
    }

    fn execute(&mut self, ctx: &CycleContext) -> anyhow::Result<()> {
        let (forward, turn) = self.joystick.axes(ctx.now);
        self.drive.tank_drive(forward + turn, forward - turn);
        Ok(())
    }

    fn end(&mut self, _interrupted: bool, _ctx: &CycleContext) -> anyhow::Result<()> {
        self.drive.stop();
        Ok(())
    }
}

/// Drives straight until the encoders read `feet`.
pub struct DriveDistance {
    drive: DriveTrain,
    requirements: Vec<Resource>,
    feet: f64,
    speed: f64,
}

impl DriveDistance {
    /// Drive `feet` (negative for reverse) at `speed` in (0, 1].
    pub fn new(drive: DriveTrain, feet: f64, speed: f64) -> Self {
        let requirements = vec![drive.resource().clone()];
        Self {
            drive,
            requirements,
            feet,
            speed: speed.abs().min(1.0),
        }
    }
}

impl Command for DriveDistance {
    fn requirements(&self) -> &[Resource] {
        &self.requirements
    }

    fn initialize(&mut self, _ctx: &CycleContext) -> anyhow::Result<()> {
        if self.speed == 0.0 && self.feet != 0.0 {
            anyhow::bail!("cannot drive {} ft at zero speed", self.feet);
        }
        info!("Driving {:.1} ft at {:.0}%", self.feet, self.speed * 100.0);
        self.drive.reset_encoders();
        Ok(())
    }

    fn execute(&mut self, _ctx: &CycleContext) -> anyhow::Result<()> {
        let output = self.speed * self.feet.signum();
        self.drive.tank_drive(output, output);
        Ok(())
    }

    fn end(&mut self, interrupted: bool, _ctx: &CycleContext) -> anyhow::Result<()> {
        self.drive.stop();
        debug!(
            "Drive ended at {:.2} ft{}",
            self.drive.distance(),
            if interrupted { " (interrupted)" } else { "" }
        );
        Ok(())
    }

    fn is_finished(&mut self, _ctx: &CycleContext) -> bool {
        self.drive.distance().abs() >= self.feet.abs()
    }
}
