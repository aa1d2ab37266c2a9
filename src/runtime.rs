//! Fixed-step scheduler driving the core against the kinematic world.
//!
//! Every frame latches the clock, runs as many physics steps as the elapsed
//! time covers (drive controller, then IMU, after the world has moved) and
//! finally ticks the range scanner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rover_core::clock::{Clock, ClockBroadcaster};
use rover_core::error::{Error, Result};
use rover_drive::DiffDriveController;
use rover_sensors::{ImuEmulator, RangeScanner};
use spin_sleep::SpinSleeper;
use tracing::{debug, error, info, warn};

use crate::blackboard::{Blackboard, raise_fault, record_odometry};
use crate::bus::Topics;
use crate::config::{AppConfig, SchedulerConfig};
use crate::sim::KinematicWorld;

pub struct Simulation {
    world: KinematicWorld,
    clock: ClockBroadcaster,
    controller: Option<DiffDriveController>,
    imu: Option<ImuEmulator>,
    scanner: Option<RangeScanner>,
    bb: Blackboard,
    physics_dt: f64,
    frame_period: Duration,
    max_steps: u32,
    accumulator: f64,
}

impl Simulation {
    /// Builds the world and every component.
    ///
    /// A broken world or scheduler section is fatal. A component that fails
    /// to initialize is reported on the blackboard and left out; the others
    /// keep running.
    pub fn new(config: &AppConfig, topics: &Topics, clock: Clock, bb: Blackboard) -> Result<Self> {
        let SchedulerConfig {
            physics_rate_hz,
            frame_rate_hz,
            max_physics_steps_per_frame,
        } = config.scheduler;
        if !(physics_rate_hz > 0.0 && physics_rate_hz.is_finite())
            || !(frame_rate_hz > 0.0 && frame_rate_hz.is_finite())
        {
            return Err(Error::config(format!(
                "scheduler rates must be positive, got physics {physics_rate_hz} Hz, frame {frame_rate_hz} Hz"
            )));
        }
        if max_physics_steps_per_frame == 0 {
            return Err(Error::config("max_physics_steps_per_frame must be at least 1"));
        }

        let world = KinematicWorld::new(config.world.clone())?;

        let controller = start(
            &bb,
            "drive",
            DiffDriveController::new(config.drive.clone(), clock.clone(), topics.odom.clone(), &world),
        )
        .map(|c| c.with_command_topic(&topics.cmd_vel));
        let imu = start(
            &bb,
            "imu",
            ImuEmulator::new(config.imu.clone(), clock.clone(), topics.imu.clone()),
        );
        let scanner = start(
            &bb,
            "scanner",
            RangeScanner::new(config.scanner.clone(), clock.clone(), topics.scan.clone()),
        );

        info!(
            physics_rate_hz,
            frame_rate_hz,
            drive = controller.is_some(),
            imu = imu.is_some(),
            scanner = scanner.is_some(),
            "Simulation ready"
        );

        Ok(Simulation {
            world,
            clock: ClockBroadcaster::new(clock, topics.clock.clone()),
            controller,
            imu,
            scanner,
            bb,
            physics_dt: 1.0 / physics_rate_hz,
            frame_period: Duration::from_secs_f64(1.0 / frame_rate_hz),
            max_steps: max_physics_steps_per_frame,
            accumulator: 0.0,
        })
    }

    pub fn world(&self) -> &KinematicWorld {
        &self.world
    }

    pub fn clock(&self) -> &Clock {
        self.clock.clock()
    }

    pub fn controller(&self) -> Option<&DiffDriveController> {
        self.controller.as_ref()
    }

    pub fn imu(&self) -> Option<&ImuEmulator> {
        self.imu.as_ref()
    }

    pub fn scanner(&self) -> Option<&RangeScanner> {
        self.scanner.as_ref()
    }

    pub fn physics_dt(&self) -> f64 {
        self.physics_dt
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    /// One frame covering `elapsed` seconds of simulated time.
    pub fn advance(&mut self, elapsed: f64) {
        self.clock.tick(elapsed);
        if elapsed > 0.0 && elapsed.is_finite() {
            self.accumulator += elapsed;
        }

        let mut steps = 0;
        while self.accumulator >= self.physics_dt && steps < self.max_steps {
            self.step_physics(self.physics_dt);
            self.accumulator -= self.physics_dt;
            steps += 1;
        }
        if self.accumulator >= self.physics_dt {
            warn!(
                backlog = self.accumulator,
                steps, "Physics fell behind, dropping backlog"
            );
            self.accumulator %= self.physics_dt;
        }

        if let Some(scanner) = self.scanner.as_mut() {
            if let Err(e) = scanner.tick(&self.world) {
                report(&self.bb, "scanner", &e);
            }
        }

        self.bb.write().frame_ticks += 1;
    }

    /// One fixed physics step of `dt` seconds.
    pub fn step_physics(&mut self, dt: f64) {
        self.world.step(dt);

        if let Some(controller) = self.controller.as_mut() {
            match controller.tick(dt, &mut self.world) {
                Ok(()) if controller.is_enabled() => record_odometry(
                    &self.bb,
                    controller.pose(),
                    controller.twist(),
                    self.clock.clock().now(),
                ),
                Ok(()) => {}
                Err(e) => report(&self.bb, "drive", &e),
            }
        }

        if let Some(imu) = self.imu.as_mut() {
            if let Err(e) = imu.tick(dt, &self.world) {
                report(&self.bb, "imu", &e);
            }
        }

        self.bb.write().physics_ticks += 1;
    }

    /// Runs frames at the configured rate on the calling thread until `stop`
    /// is set. Frames advance by the measured wall time since the previous
    /// frame.
    pub fn run(mut self, stop: &AtomicBool) {
        let sleeper = SpinSleeper::new(100_000);
        let mut last = Instant::now();
        info!(period_ms = self.frame_period.as_secs_f64() * 1e3, "Frame loop started");

        while !stop.load(Ordering::Acquire) {
            let frame_start = Instant::now();
            let elapsed = frame_start.duration_since(last).as_secs_f64();
            last = frame_start;

            self.advance(elapsed);

            match self.frame_period.checked_sub(frame_start.elapsed()) {
                Some(rest) => sleeper.sleep(rest),
                None => debug!(
                    overrun_ms = (frame_start.elapsed() - self.frame_period).as_secs_f64() * 1e3,
                    "Frame overran its period"
                ),
            }
        }

        info!(
            sim_time = self.clock().now_secs(),
            "Frame loop stopped"
        );
    }
}

fn start<T>(bb: &Blackboard, component: &str, built: Result<T>) -> Option<T> {
    match built {
        Ok(c) => Some(c),
        Err(e) => {
            error!(component, error = %e, "Component failed to start");
            raise_fault(bb, &format!("{component}: {e}"));
            None
        }
    }
}

fn report(bb: &Blackboard, component: &str, e: &Error) {
    error!(component, error = %e, "Component disabled");
    raise_fault(bb, &format!("{component}: {e}"));
}
