//! Cadence CLI - runs the command scheduler over a simulated drivetrain.

mod drivetrain;

use anyhow::{Context, Result};
use cadence_commands::{print, sequence, wait, CommandExt, FunctionalCommand};
use cadence_core::{Command, CommandPtr, InterruptBehavior};
use cadence_scheduler::{Admission, Scheduler, SchedulerConfig};
use clap::{Parser, Subcommand};
use drivetrain::{DriveDistance, DriveTrain, DriveWithJoystick};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Cycle at which the autonomous routine is scheduled.
const AUTONOMOUS_AT: u64 = 25;

/// Cycle at which the driver tries to take the drivetrain back.
const TAKEOVER_AT: u64 = 40;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Cooperative command scheduler demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulated drivetrain
    Run {
        /// Number of cycles to run
        #[arg(long, default_value = "150")]
        cycles: u64,
        /// Scheduler configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the event log to this file as JSON
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { cycles, config, events } => {
            let config = match config {
                Some(path) => SchedulerConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => SchedulerConfig::default(),
            };
            run(config, cycles, events).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&SchedulerConfig::default())?);
        }
    }

    Ok(())
}

/// Drive forward, pause, back up. Refuses to be interrupted by the driver.
fn autonomous(drive: &DriveTrain) -> CommandPtr {
    sequence([
        DriveDistance::new(drive.clone(), 4.0, 0.6).into_ptr(),
        wait(Duration::from_millis(250)),
        DriveDistance::new(drive.clone(), -2.0, 0.4).into_ptr(),
        print("Autonomous complete"),
    ])
    .with_timeout(Duration::from_secs(5))
    .with_interrupt_behavior(InterruptBehavior::CancelIncoming)
    .with_name("Autonomous")
}

async fn run(config: SchedulerConfig, cycles: u64, events: Option<PathBuf>) -> Result<()> {
    config.validate()?;
    let period = config.loop_period();
    let mut scheduler = Scheduler::new().with_config(config);

    let drive = DriveTrain::new();
    scheduler.register_resource(drive.resource().clone())?;
    let sim = drive.clone();
    scheduler.register_periodic(drive.resource(), move |_ctx| sim.simulate(period))?;
    scheduler.set_default_command(drive.resource(), DriveWithJoystick::new(drive.clone()))?;

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut faults = 0;

    info!("Running {} cycles at {:?}", cycles, period);
    for cycle in 1..=cycles {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted at cycle {}", cycle);
                break;
            }
        }

        match cycle {
            AUTONOMOUS_AT => submit(&mut scheduler, autonomous(&drive))?,
            TAKEOVER_AT => {
                let stop = drive.clone();
                let takeover = FunctionalCommand::instant(move || stop.stop())
                    .requiring(drive.resource())
                    .named("DriverStop");
                submit(&mut scheduler, takeover.into_ptr())?;
            }
            _ => {}
        }

        let report = scheduler.run();
        faults += report.faults.len();
    }

    info!(
        "Drove {:.2} ft since last reset, heading {:.1} deg, {} command(s) active",
        drive.distance(),
        drive.heading(),
        scheduler.active_count()
    );

    if let Some(path) = events {
        let json = scheduler.event_log().to_json()?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write events to {}", path.display()))?;
        info!("Wrote {} events to {}", scheduler.event_log().len(), path.display());
    }

    faults += scheduler.shutdown().len();
    if faults > 0 {
        warn!("{} command fault(s) during the run", faults);
    }
    Ok(())
}

fn submit(scheduler: &mut Scheduler, command: CommandPtr) -> Result<()> {
    match scheduler.schedule(command)? {
        Admission::Admitted(id) => info!("Admitted {}", id),
        Admission::Rejected { command, reason } => {
            warn!("'{}' was rejected: {:?}", command.name(), reason)
        }
    }
    Ok(())
}
