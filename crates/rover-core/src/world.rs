//! Collaborator interfaces to the physics substrate.
//!
//! The core never owns the physics: it drives wheel joints through an
//! [`Actuator`] and queries body poses and ray hits through a [`World`]. Both
//! calls are synchronous and bounded, and an implementation reports a vanished
//! body or joint as [`Error::CollaboratorUnavailable`].

use std::fmt;

use nalgebra::{Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frames::EnginePose;

/// Wheel joints of a differential-drive chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    pub const FRONT: [Wheel; 2] = [Wheel::FrontLeft, Wheel::FrontRight];
    pub const REAR: [Wheel; 2] = [Wheel::RearLeft, Wheel::RearRight];
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearLeft,
        Wheel::RearRight,
    ];

    pub fn is_left(self) -> bool {
        matches!(self, Wheel::FrontLeft | Wheel::RearLeft)
    }
}

impl fmt::Display for Wheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Wheel::FrontLeft => "front_left",
            Wheel::FrontRight => "front_right",
            Wheel::RearLeft => "rear_left",
            Wheel::RearRight => "rear_right",
        };
        f.write_str(name)
    }
}

/// Velocity drive applied to a single wheel joint.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointDrive {
    /// rad/s
    pub target_velocity: f64,
    pub stiffness: f64,
    pub damping: f64,
}

/// Per-side wheel targets derived from one velocity command.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelTarget {
    pub left_rate: f64,
    pub right_rate: f64,
    pub stiffness: f64,
    pub damping: f64,
}

impl WheelTarget {
    /// Joint drive for `wheel`, picking the rate of its side.
    pub fn drive_for(&self, wheel: Wheel) -> JointDrive {
        JointDrive {
            target_velocity: if wheel.is_left() { self.left_rate } else { self.right_rate },
            stiffness: self.stiffness,
            damping: self.damping,
        }
    }
}

/// Wheel joint actuation.
pub trait Actuator {
    /// Whether a joint for `wheel` exists.
    fn has_wheel(&self, wheel: Wheel) -> bool;

    fn set_wheel_drive(&mut self, wheel: Wheel, drive: JointDrive) -> Result<()>;

    /// Realized angular velocity of `wheel` in rad/s.
    fn wheel_velocity(&self, wheel: Wheel) -> Result<f64>;
}

/// Body poses and ray queries in the engine frame.
pub trait World {
    /// Pose of the named link. Fails with `CollaboratorUnavailable` when the
    /// link does not exist.
    fn link_pose(&self, link: &str) -> Result<EnginePose>;

    /// Distance to the first hit along `direction` from `origin`, or `None`
    /// when nothing is hit within `max_distance`.
    fn raycast(
        &self,
        origin: &Vector3<f64>,
        direction: &Unit<Vector3<f64>>,
        max_distance: f64,
    ) -> Option<f64>;
}

/// Everything the drive controller talks to.
pub trait Hardware: Actuator + World {}

impl<T: Actuator + World + ?Sized> Hardware for T {}

/// Fails unless every wheel in `wheels` exists on `actuator`.
pub fn require_wheels<A: Actuator + ?Sized>(actuator: &A, wheels: &[Wheel]) -> Result<()> {
    let missing: Vec<String> = wheels
        .iter()
        .filter(|w| !actuator.has_wheel(**w))
        .map(|w| w.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::config(format!("missing wheel actuator: {}", missing.join(", "))))
    }
}
