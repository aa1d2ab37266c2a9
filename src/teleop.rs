use std::time::Duration;

use rover_core::bus::Topic;
use rover_core::messages::VelocityCommand;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::blackboard::{Blackboard, touch_cmd};
use crate::config::{TeleopConfig, TeleopStep};

/// Publishes the scripted drive on the command topic at `rate_hz` until the
/// script runs out or `shutdown` flips, then sends a final stop.
pub async fn teleop_task(
    bb: Blackboard,
    config: TeleopConfig,
    cmd_tx: Topic<VelocityCommand>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    if !(config.rate_hz > 0.0 && config.rate_hz.is_finite()) {
        anyhow::bail!("teleop rate must be positive, got {}", config.rate_hz);
    }
    tracing::info!(
        legs = config.script.len(),
        rate_hz = config.rate_hz,
        topic = cmd_tx.name(),
        "Teleop task started."
    );

    let mut ticker = time::interval(Duration::from_secs_f64(1.0 / config.rate_hz));
    let started = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let elapsed = started.elapsed().as_secs_f64();
                let Some(cmd) = command_at(&config.script, elapsed) else {
                    tracing::info!(elapsed, "Teleop script finished.");
                    break;
                };
                tracing::debug!(v = cmd.linear_forward, w = cmd.angular_yaw, "Teleop command");
                cmd_tx.publish(cmd);
                touch_cmd(&bb);
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    cmd_tx.publish(VelocityCommand::stop());
    touch_cmd(&bb);
    Ok(())
}

/// The command of the leg active `elapsed` seconds into the script, `None`
/// once every leg has run.
pub fn command_at(script: &[TeleopStep], elapsed: f64) -> Option<VelocityCommand> {
    let mut end = 0.0;
    script.iter().find_map(|step| {
        end += step.seconds.max(0.0);
        (elapsed < end).then_some(VelocityCommand {
            linear_forward: step.linear,
            angular_yaw: step.angular,
        })
    })
}
