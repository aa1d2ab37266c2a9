//! Kinematic reference world.
//!
//! A planar rigid chassis that realizes wheel velocity drives and moves along
//! the exact arc those rates produce. It hosts the core in the binary and in
//! tests; it does not model contacts, inertia or suspension.

use std::collections::HashMap;

use nalgebra::{Unit, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rover_core::error::{Error, Result};
use rover_core::frames::{EnginePose, heading_direction, yaw_rotation};
use rover_core::world::{Actuator, JointDrive, Wheel, World};
use rover_kinematics::{DifferentialDrive, WheelRates};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A sensor link rigidly attached to the chassis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkMount {
    pub name: String,
    /// Offset in the chassis frame (m), engine axes.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Yaw relative to the chassis (rad).
    pub yaw: f64,
}

/// Vertical cylinder obstacle standing on the engine `x`/`z` plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pillar {
    pub x: f64,
    pub z: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Actual wheel radius of the simulated chassis (m).
    pub wheel_radius: f64,
    /// Actual wheel separation of the simulated chassis (m).
    pub wheel_separation: f64,
    /// Whether the chassis has rear wheel joints.
    pub rear_wheels: bool,
    pub chassis_link: String,
    pub start_x: f64,
    pub start_z: f64,
    pub start_yaw: f64,
    /// Fraction of wheel rotation lost to slip, in `[0, 1)`.
    pub slip: f64,
    /// Half-width of the uniform noise added to realized wheel rates (rad/s).
    pub rate_jitter: f64,
    pub seed: u64,
    pub links: Vec<LinkMount>,
    pub pillars: Vec<Pillar>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            wheel_radius: 0.098,
            wheel_separation: 0.37559,
            rear_wheels: true,
            chassis_link: "base_link".to_string(),
            start_x: 0.0,
            start_z: 0.0,
            start_yaw: 0.0,
            slip: 0.0,
            rate_jitter: 0.0,
            seed: 7,
            links: Vec::new(),
            pillars: Vec::new(),
        }
    }
}

pub struct KinematicWorld {
    config: WorldConfig,
    drive: DifferentialDrive,
    position: Vector3<f64>,
    yaw: f64,
    drives: HashMap<Wheel, JointDrive>,
    realized: HashMap<Wheel, f64>,
    rng: StdRng,
}

impl KinematicWorld {
    pub fn new(config: WorldConfig) -> Result<Self> {
        let drive = DifferentialDrive::new(config.wheel_radius, config.wheel_separation)?;
        if !(0.0..1.0).contains(&config.slip) {
            return Err(Error::config(format!("world slip must be in [0, 1), got {}", config.slip)));
        }
        if !(config.rate_jitter >= 0.0) || !config.rate_jitter.is_finite() {
            return Err(Error::config("world rate_jitter must be finite and non-negative"));
        }
        if config.pillars.iter().any(|p| !(p.radius > 0.0)) {
            return Err(Error::config("pillar radius must be positive"));
        }

        Ok(KinematicWorld {
            position: Vector3::new(config.start_x, 0.0, config.start_z),
            yaw: config.start_yaw,
            rng: StdRng::seed_from_u64(config.seed),
            drive,
            drives: HashMap::new(),
            realized: HashMap::new(),
            config,
        })
    }

    pub fn chassis_pose(&self) -> EnginePose {
        EnginePose::new(self.position, yaw_rotation(self.yaw))
    }

    /// Realizes the current drives for `dt` seconds and moves the chassis.
    pub fn step(&mut self, dt: f64) {
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }

        for wheel in Wheel::ALL {
            if !self.has_wheel(wheel) {
                continue;
            }
            let rate = self.realize(wheel);
            self.realized.insert(wheel, rate);
        }

        // Encoders see the realized rate, the ground only part of it.
        let grip = 1.0 - self.config.slip;
        let rates = WheelRates::new(
            self.realized_rate(Wheel::FrontLeft) * grip,
            self.realized_rate(Wheel::FrontRight) * grip,
        );
        let speeds = self.drive.forward_kinematics(rates);

        let turn = speeds.omega * dt;
        let chord = if turn.abs() < 1e-9 {
            speeds.v * dt
        } else {
            2.0 * speeds.v / speeds.omega * (turn / 2.0).sin()
        };
        let direction = heading_direction(self.yaw + turn / 2.0);
        self.position += direction.into_inner() * chord;
        self.yaw += turn;
        trace!(x = self.position.x, z = self.position.z, yaw = self.yaw, "chassis");
    }

    fn realize(&mut self, wheel: Wheel) -> f64 {
        // A velocity drive without damping does not track its target.
        let target = match self.drives.get(&wheel) {
            Some(drive) if drive.damping > 0.0 => drive.target_velocity,
            _ => return 0.0,
        };
        if self.config.rate_jitter > 0.0 {
            let jitter = self.config.rate_jitter;
            target + self.rng.random_range(-jitter..=jitter)
        } else {
            target
        }
    }

    fn realized_rate(&self, wheel: Wheel) -> f64 {
        self.realized.get(&wheel).copied().unwrap_or(0.0)
    }

    fn check_wheel(&self, wheel: Wheel) -> Result<()> {
        if self.has_wheel(wheel) {
            Ok(())
        } else {
            Err(Error::unavailable(format!("no joint for wheel {}", wheel)))
        }
    }
}

impl Actuator for KinematicWorld {
    fn has_wheel(&self, wheel: Wheel) -> bool {
        Wheel::FRONT.contains(&wheel) || self.config.rear_wheels
    }

    fn set_wheel_drive(&mut self, wheel: Wheel, drive: JointDrive) -> Result<()> {
        self.check_wheel(wheel)?;
        self.drives.insert(wheel, drive);
        Ok(())
    }

    fn wheel_velocity(&self, wheel: Wheel) -> Result<f64> {
        self.check_wheel(wheel)?;
        Ok(self.realized_rate(wheel))
    }
}

impl World for KinematicWorld {
    fn link_pose(&self, link: &str) -> Result<EnginePose> {
        let chassis = self.chassis_pose();
        if link == self.config.chassis_link {
            return Ok(chassis);
        }
        self.config
            .links
            .iter()
            .find(|mount| mount.name == link)
            .map(|mount| {
                let offset = Vector3::new(mount.x, mount.y, mount.z);
                EnginePose::new(
                    chassis.transform_point(&offset),
                    yaw_rotation(self.yaw + mount.yaw),
                )
            })
            .ok_or_else(|| Error::unavailable(format!("link '{}' not found", link)))
    }

    fn raycast(
        &self,
        origin: &Vector3<f64>,
        direction: &Unit<Vector3<f64>>,
        max_distance: f64,
    ) -> Option<f64> {
        // Pillars are infinitely tall, so only the horizontal part matters.
        let (ox, oz) = (origin.x, origin.z);
        let (dx, dz) = (direction.x, direction.z);
        let horizontal = dx * dx + dz * dz;
        if horizontal < 1e-12 {
            return None;
        }

        self.config
            .pillars
            .iter()
            .filter_map(|p| {
                let (fx, fz) = (ox - p.x, oz - p.z);
                let b = fx * dx + fz * dz;
                let c = fx * fx + fz * fz - p.radius * p.radius;
                let discriminant = b * b - horizontal * c;
                if discriminant < 0.0 {
                    return None;
                }
                let root = discriminant.sqrt();
                let near = (-b - root) / horizontal;
                let far = (-b + root) / horizontal;
                // Origin inside the pillar hits the far wall.
                let t = if near >= 0.0 { near } else { far };
                (t >= 0.0 && t <= max_distance).then_some(t)
            })
            .min_by(|a, b| a.total_cmp(b))
    }
}
