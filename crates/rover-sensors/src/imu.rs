//! Inertial sensor emulation.
//!
//! Angular velocity and linear acceleration are finite differences of the
//! mounting link's pose. Angular velocity is the body-frame relative rotation
//! `q_prev⁻¹ * q_now` as Euler angles over `dt`. Gravity is not added.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use rover_core::bus::Topic;
use rover_core::clock::Clock;
use rover_core::error::{Error, Result};
use rover_core::frames::{AxisRemap, FrameConvention};
use rover_core::messages::{Header, Imu, covariance3};
use rover_core::world::World;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    pub frame_id: String,
    /// World link the sensor is mounted on.
    pub link: String,
    pub convention: FrameConvention,
    pub emit_covariance: bool,
    pub covariance: f64,
}

impl Default for ImuConfig {
    fn default() -> Self {
        ImuConfig {
            frame_id: "base_link".to_string(),
            link: "base_link".to_string(),
            convention: FrameConvention::default(),
            emit_covariance: true,
            covariance: 1e-5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    orientation: UnitQuaternion<f64>,
    position: Vector3<f64>,
}

pub struct ImuEmulator {
    config: ImuConfig,
    remap: AxisRemap,
    clock: Clock,
    topic: Topic<Imu>,
    previous: Option<Sample>,
    previous_velocity: Option<Vector3<f64>>,
    enabled: bool,
}

impl ImuEmulator {
    pub fn new(config: ImuConfig, clock: Clock, topic: Topic<Imu>) -> Result<Self> {
        if config.emit_covariance && !(config.covariance >= 0.0 && config.covariance.is_finite()) {
            return Err(Error::config(format!(
                "imu covariance must be finite and non-negative, got {}",
                config.covariance
            )));
        }
        info!(link = %config.link, topic = topic.name(), convention = ?config.convention, "IMU ready");
        Ok(ImuEmulator {
            remap: config.convention.remap(),
            config,
            clock,
            topic,
            previous: None,
            previous_velocity: None,
            enabled: true,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Physics tick. Returns whether a sample was published.
    ///
    /// A zero, negative or non-finite `dt` skips the tick and keeps the
    /// history. A missing link disables the sensor and is returned once.
    pub fn tick(&mut self, dt: f64, world: &dyn World) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        if !(dt > 0.0) || !dt.is_finite() {
            debug!(dt, "Skipping IMU tick");
            return Ok(false);
        }

        let pose = match world.link_pose(&self.config.link) {
            Ok(pose) => pose,
            Err(e) => {
                self.enabled = false;
                error!(error = %e, "IMU disabled");
                return Err(e);
            }
        };
        let now = Sample {
            orientation: pose.rotation,
            position: pose.position,
        };

        let (angular_velocity, velocity) = match self.previous {
            Some(prev) => {
                let delta = prev.orientation.inverse() * now.orientation;
                let (roll, pitch, yaw) = delta.euler_angles();
                (
                    Vector3::new(roll, pitch, yaw) / dt,
                    Some((now.position - prev.position) / dt),
                )
            }
            None => (Vector3::zeros(), None),
        };
        let acceleration = match (velocity, self.previous_velocity) {
            (Some(v), Some(prev_v)) => (v - prev_v) / dt,
            _ => Vector3::zeros(),
        };

        let finite = |v: &Vector3<f64>| v.iter().all(|c| c.is_finite());
        if !finite(&angular_velocity) || !finite(&acceleration) {
            warn!(dt, "IMU derivative is not finite, holding previous sample");
            return Ok(false);
        }

        self.previous = Some(now);
        self.previous_velocity = velocity;

        let covariance = if self.config.emit_covariance {
            covariance3(self.config.covariance)
        } else {
            Matrix3::zeros()
        };
        self.topic.publish(Imu {
            header: Header::new(self.clock.now(), self.config.frame_id.as_str()),
            orientation: self.remap.rotation(&now.orientation),
            orientation_covariance: covariance,
            angular_velocity: self.remap.pseudovector(&angular_velocity),
            angular_velocity_covariance: covariance,
            linear_acceleration: self.remap.vector(&acceleration),
            linear_acceleration_covariance: covariance,
        });
        Ok(true)
    }
}
