use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use rover_core::clock::Clock;
use rover_drive::OdometrySource;
use rover_sim::blackboard::{Blackboard, command_age, snapshot};
use rover_sim::teleop::teleop_task;
use rover_sim::{Simulation, Topics, load_config};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

#[derive(Debug, Parser)]
#[command(name = "rover-sim", about = "Headless differential-drive rover simulation")]
struct Cli {
    /// TOML file layered over config/default.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds of wall time instead of waiting for Ctrl-C.
    #[arg(short, long)]
    duration: Option<f64>,

    /// Overrides drive.odometry_source (ENCODER or GROUND_TRUTH).
    #[arg(long, value_parser = parse_odometry_source)]
    odometry: Option<OdometrySource>,
}

fn parse_odometry_source(s: &str) -> Result<OdometrySource, String> {
    match s.to_ascii_uppercase().as_str() {
        "ENCODER" => Ok(OdometrySource::Encoder),
        "GROUND_TRUTH" => Ok(OdometrySource::GroundTruth),
        other => Err(format!("unknown odometry source '{other}'")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_filter = init_tracing();

    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;
    if let Some(source) = cli.odometry {
        config.drive.odometry_source = source;
    }

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    if let Some(filter) = configured_filter(rust_log.as_deref(), &config.logging.level)
        .context("parsing logging.level")?
    {
        log_filter.reload(filter).context("applying logging.level")?;
        info!(level = %config.logging.level, "Log level set from configuration");
    }

    info!(
        odometry = ?config.drive.odometry_source,
        clock = ?config.clock.mode,
        "Rover simulation starting"
    );

    let bb: Blackboard = Arc::default();
    let topics = Topics::new(&config.topics);
    let clock = Clock::new(config.clock.mode);
    let sim = Simulation::new(&config, &topics, clock, bb.clone()).context("building simulation")?;

    let stop = Arc::new(AtomicBool::new(false));
    info!("Spawning sim thread...");
    let sim_thread = std::thread::Builder::new().name("sim".into()).spawn({
        let stop = Arc::clone(&stop);
        move || sim.run(&stop)
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async_runtime(bb, topics, config.teleop, cli.duration, Arc::clone(&stop)));

    stop.store(true, Ordering::Release);
    if sim_thread.join().is_err() {
        error!("Sim thread panicked");
    }
    result
}

/// Installs the global subscriber with `RUST_LOG`, or `info` when unset. The
/// returned handle swaps the filter once the configuration is known.
fn init_tracing() -> reload::Handle<EnvFilter, Registry> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
    handle
}

/// The filter for `logging.level`, or `None` when `RUST_LOG` takes precedence.
fn configured_filter(rust_log: Option<&str>, level: &str) -> Result<Option<EnvFilter>, ParseError> {
    match rust_log {
        Some(_) => Ok(None),
        None => EnvFilter::try_new(level).map(Some),
    }
}

async fn async_runtime(
    bb: Blackboard,
    topics: Topics,
    teleop: rover_sim::config::TeleopConfig,
    duration: Option<f64>,
    stop: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::try_join!(
        teleop_task(bb.clone(), teleop, topics.cmd_vel.clone(), shutdown_rx.clone()),
        monitor(bb, &topics, shutdown_rx),
        shutdown(duration, stop, shutdown_tx),
    )?;
    info!("Async runtime finished.");
    Ok(())
}

/// Waits for Ctrl-C or the configured duration, then stops every loop.
async fn shutdown(
    duration: Option<f64>,
    stop: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
) -> anyhow::Result<()> {
    match duration {
        Some(secs) => {
            let wait = Duration::try_from_secs_f64(secs).context("invalid --duration")?;
            tokio::select! {
                _ = tokio::time::sleep(wait) => info!(secs, "Run duration reached"),
                res = tokio::signal::ctrl_c() => {
                    res?;
                    info!("Ctrl-C received");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Ctrl-C received");
        }
    }
    stop.store(true, Ordering::Release);
    let _ = shutdown_tx.send(true);
    Ok(())
}

#[derive(Debug, Default)]
struct Counts {
    odom: u64,
    imu: u64,
    scan: u64,
    clock: u64,
}

/// Counts traffic on every output topic and logs a summary once a second.
async fn monitor(
    bb: Blackboard,
    topics: &Topics,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("Monitor task started.");
    let mut odom_rx = topics.odom.subscribe();
    let mut imu_rx = topics.imu.subscribe();
    let mut scan_rx = topics.scan.subscribe();
    let mut clock_rx = topics.clock.subscribe();
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let mut counts = Counts::default();
    let mut known_faults = 0;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let state = snapshot(&bb);
                info!(
                    x = state.pose.x,
                    y = state.pose.y,
                    theta = state.pose.theta,
                    v = state.twist.linear_x,
                    w = state.twist.angular_z,
                    sim_time = state.stamp.as_secs_f64(),
                    physics_ticks = state.physics_ticks,
                    frame_ticks = state.frame_ticks,
                    cmd_age = ?command_age(&state, Instant::now()),
                    ?counts,
                    "Status"
                );
                for fault in &state.faults[known_faults..] {
                    warn!(fault = %fault, "Component fault");
                }
                known_faults = state.faults.len();
                counts = Counts::default();
            }
            msg = odom_rx.recv() => count(msg, topics.odom.name(), &mut counts.odom),
            msg = imu_rx.recv() => count(msg, topics.imu.name(), &mut counts.imu),
            msg = scan_rx.recv() => {
                if let Ok(scan) = &msg {
                    tracing::debug!(
                        nearest = scan.ranges.iter().copied().fold(f32::INFINITY, f32::min),
                        "Scan"
                    );
                }
                count(msg, topics.scan.name(), &mut counts.scan)
            }
            msg = clock_rx.recv() => count(msg, topics.clock.name(), &mut counts.clock),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn count<T>(msg: Result<T, RecvError>, topic: &str, counter: &mut u64) {
    match msg {
        Ok(_) => *counter += 1,
        Err(RecvError::Lagged(skipped)) => {
            warn!(topic, skipped, "Monitor lagged behind");
            *counter += skipped;
        }
        // Publishers live as long as the topics bundle.
        Err(RecvError::Closed) => {}
    }
}
