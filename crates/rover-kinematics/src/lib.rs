#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for 2D differential-drive rover kinematics."]
#![doc = ""]
#![doc = "This crate provides the command-to-wheel mapping, encoder forward kinematics,"]
#![doc = "the midpoint dead-reckoning integrator and the pose/twist types they share."]

use core::f64::consts::PI;
use core::fmt;
use libm::{cos, round, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::KinematicsError;

/// A 2‑D pose `(x, y, θ)` in meters and radians, expressed in the odom frame
/// (origin at the robot's start pose).
///
/// `theta` is accumulated without wrapping; callers that need `[-PI, PI)` use
/// [`Pose2D::normalize_angle`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2D {
    /// Odom‑frame x position (m).
    pub x: f64,
    /// Odom‑frame y position (m).
    pub y: f64,
    /// Heading (rad).
    pub theta: f64,
}

impl Pose2D {
    /// Construct a new pose.
    ///
    /// # Arguments
    ///
    /// * `x`: Odom-frame x position in meters.
    /// * `y`: Odom-frame y position in meters.
    /// * `theta`: Heading in radians.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose2D { x, y, theta }
    }

    /// Normalize an angle to be within `[-PI, PI)`.
    ///
    /// Angles at `PI` will be normalized to `-PI`.
    ///
    /// # Arguments
    ///
    /// * `angle`: The angle in radians to normalize.
    ///
    /// # Returns
    ///
    /// The normalized angle in radians.
    pub fn normalize_angle(angle: f64) -> f64 {
        let a = angle % (2.0 * PI);
        if a >= PI {
            a - 2.0 * PI
        } else if a < -PI {
            a + 2.0 * PI
        } else {
            a
        }
    }

    /// Returns a copy of this pose with its heading normalized to `[-PI, PI)`.
    pub fn wrapped(self) -> Self {
        Pose2D {
            theta: Pose2D::normalize_angle(self.theta),
            ..self
        }
    }

    /// Returns `true` when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

impl fmt::Display for Pose2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.2} rad)", self.x, self.y, self.theta)
    }
}

/// An instantaneous planar twist expressed in the robot body frame.
///
/// `linear_y` is non-zero only when the chassis moves sideways, which a
/// differential drive can only do by slipping.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist2D {
    /// Forward velocity (m/s).
    pub linear_x: f64,
    /// Lateral velocity (m/s).
    pub linear_y: f64,
    /// Yaw rate (rad/s).
    pub angular_z: f64,
}

impl Twist2D {
    /// Construct a new twist.
    pub const fn new(linear_x: f64, linear_y: f64, angular_z: f64) -> Self {
        Twist2D {
            linear_x,
            linear_y,
            angular_z,
        }
    }

    /// Derives the body-frame twist that moved the robot from `previous` to
    /// `current` over `dt` seconds.
    ///
    /// The translation is rotated into the body frame at the midpoint heading,
    /// so a pose produced by [`DifferentialDrive::integrate_midpoint`] yields
    /// exactly the chassis speeds that were integrated.
    ///
    /// # Returns
    ///
    /// `None` if `dt` is not strictly positive or the result is not finite.
    pub fn from_pose_delta(previous: &Pose2D, current: &Pose2D, dt: f64) -> Option<Twist2D> {
        if !(dt > 0.0) || !dt.is_finite() {
            return None;
        }

        let dtheta = Pose2D::normalize_angle(current.theta - previous.theta);
        let heading = previous.theta + dtheta / 2.0;
        let dx = current.x - previous.x;
        let dy = current.y - previous.y;

        let (s, c) = (sin(heading), cos(heading));
        let twist = Twist2D {
            linear_x: (c * dx + s * dy) / dt,
            linear_y: (-s * dx + c * dy) / dt,
            angular_z: dtheta / dt,
        };

        if twist.linear_x.is_finite() && twist.linear_y.is_finite() && twist.angular_z.is_finite() {
            Some(twist)
        } else {
            None
        }
    }
}

impl fmt::Display for Twist2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(vx: {:.2} m/s, vy: {:.2} m/s, ωz: {:.2} rad/s)",
            self.linear_x, self.linear_y, self.angular_z
        )
    }
}

/// Left and right wheel angular rates.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelRates {
    /// Left wheel angular rate (rad/s).
    pub left: f64,
    /// Right wheel angular rate (rad/s).
    pub right: f64,
}

impl WheelRates {
    /// Construct wheel rates.
    ///
    /// # Arguments
    ///
    /// * `left`: Left wheel angular rate (rad/s).
    /// * `right`: Right wheel angular rate (rad/s).
    pub const fn new(left: f64, right: f64) -> Self {
        WheelRates { left, right }
    }

    /// Rounds both rates to `decimals` decimal digits.
    ///
    /// Used on encoder readings to suppress solver jitter before integration.
    pub fn quantized(self, decimals: u32) -> Self {
        WheelRates {
            left: round_to_decimals(self.left, decimals),
            right: round_to_decimals(self.right, decimals),
        }
    }
}

impl fmt::Display for WheelRates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ωL: {:.3} rad/s, ωR: {:.3} rad/s)", self.left, self.right)
    }
}

/// Rounds `value` to `decimals` decimal digits (half away from zero).
pub fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    let mut scale = 1.0;
    for _ in 0..decimals {
        scale *= 10.0;
    }
    round(value * scale) / scale
}

/// Linear and angular chassis velocities.
/// These represent the overall motion of the robot's chassis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Forward speed of the chassis center (m/s).
    pub v: f64,
    /// Yaw rate of the chassis (rad/s).
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    ///
    /// # Arguments
    ///
    /// * `v`: Forward speed of the chassis center (m/s).
    /// * `omega`: Yaw rate of the chassis (rad/s).
    pub const fn new(v: f64, omega: f64) -> Self {
        ChassisSpeeds { v, omega }
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.2} m/s, ω: {:.2} rad/s)", self.v, self.omega)
    }
}

/// Differential‑drive kinematics helper.
///
/// Holds the physical parameters of the drive (wheel radius and the
/// separation between the left and right wheels) and provides the mapping
/// between chassis speeds and wheel rates.
///
/// Sign convention: a positive yaw rate spins the left wheel faster than the
/// right one, and the encoder forward kinematics maps that back to a positive
/// yaw rate, so the pair is self-consistent.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDrive {
    /// Wheel radius (m).
    wheel_radius: f64,
    /// Distance between the left and right wheels (m).
    wheel_separation: f64,
}

impl DifferentialDrive {
    /// Construct a new differential‑drive kinematics helper.
    ///
    /// # Arguments
    ///
    /// * `wheel_radius`: The radius of the robot's wheels in meters.
    /// * `wheel_separation`: The distance between the left and right wheels in meters.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidWheelRadius)` if `wheel_radius` is not positive.
    /// Returns `Err(KinematicsError::InvalidWheelSeparation)` if `wheel_separation` is not positive.
    pub fn new(wheel_radius: f64, wheel_separation: f64) -> Result<Self, KinematicsError> {
        // Written as negated comparisons so NaN is rejected too.
        if !(wheel_radius > 0.0) || !wheel_radius.is_finite() {
            return Err(KinematicsError::InvalidWheelRadius("must be positive"));
        }
        if !(wheel_separation > 0.0) || !wheel_separation.is_finite() {
            return Err(KinematicsError::InvalidWheelSeparation("must be positive"));
        }
        Ok(DifferentialDrive {
            wheel_radius,
            wheel_separation,
        })
    }

    /// Returns the wheel radius.
    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Returns the wheel separation.
    pub fn wheel_separation(&self) -> f64 {
        self.wheel_separation
    }

    /// Converts a commanded forward rate and rotation rate into per-wheel
    /// angular rates. This is the inverse kinematics problem.
    ///
    /// ```text
    /// left  = ( separation * rotation + forward) / (2 * radius)
    /// right = (-separation * rotation + forward) / (2 * radius)
    /// ```
    ///
    /// # Arguments
    ///
    /// * `command`: The commanded forward rate and rotation rate.
    ///
    /// # Returns
    ///
    /// The target angular rates for the left and right wheels.
    pub fn inverse_kinematics(&self, command: ChassisSpeeds) -> WheelRates {
        let denominator = 2.0 * self.wheel_radius;
        let left = (self.wheel_separation * command.omega + command.v) / denominator;
        let right = (-self.wheel_separation * command.omega + command.v) / denominator;
        WheelRates::new(left, right)
    }

    /// Calculates the chassis speeds from measured wheel rates. This is the
    /// forward kinematics problem used by encoder odometry.
    ///
    /// ```text
    /// v     = radius * (left + right) / 2
    /// omega = radius * (left - right) / separation
    /// ```
    ///
    /// # Arguments
    ///
    /// * `rates`: The measured angular rates of the left and right wheels.
    ///
    /// # Returns
    ///
    /// The resulting forward speed and yaw rate of the chassis.
    pub fn forward_kinematics(&self, rates: WheelRates) -> ChassisSpeeds {
        let v = self.wheel_radius * (rates.left + rates.right) / 2.0;
        let omega = self.wheel_radius * (rates.left - rates.right) / self.wheel_separation;
        ChassisSpeeds::new(v, omega)
    }

    /// Integrates chassis speeds over `dt` using a midpoint heading update.
    ///
    /// The heading is advanced by half of the rotation, the translation is
    /// applied along that midpoint heading, and the second half of the
    /// rotation is applied afterwards. The heading is not normalized.
    ///
    /// # Arguments
    ///
    /// * `current_pose`: The robot's current pose `(x, y, theta)`.
    /// * `chassis_speeds`: The robot's forward speed and yaw rate.
    /// * `dt`: The time delta in seconds over which the speeds are applied.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidTimeDelta)` if `dt` is negative or not finite.
    /// A `dt` of exactly zero returns the pose unchanged.
    ///
    /// # Returns
    ///
    /// The robot's new estimated pose.
    pub fn integrate_midpoint(
        &self,
        current_pose: Pose2D,
        chassis_speeds: ChassisSpeeds,
        dt: f64,
    ) -> Result<Pose2D, KinematicsError> {
        if dt < 0.0 || !dt.is_finite() {
            return Err(KinematicsError::InvalidTimeDelta("must be finite and non-negative"));
        }
        if dt == 0.0 {
            return Ok(current_pose);
        }

        let half_turn = chassis_speeds.omega / 2.0 * dt;
        let heading = current_pose.theta + half_turn;

        Ok(Pose2D {
            x: current_pose.x + chassis_speeds.v * cos(heading) * dt,
            y: current_pose.y + chassis_speeds.v * sin(heading) * dt,
            theta: heading + half_turn,
        })
    }

    /// Convenience function to integrate directly from measured wheel rates.
    ///
    /// # Errors
    ///
    /// Propagates `KinematicsError::InvalidTimeDelta` from
    /// [`DifferentialDrive::integrate_midpoint`].
    pub fn integrate_wheel_rates(
        &self,
        current_pose: Pose2D,
        rates: WheelRates,
        dt: f64,
    ) -> Result<Pose2D, KinematicsError> {
        let chassis_speeds = self.forward_kinematics(rates);
        self.integrate_midpoint(current_pose, chassis_speeds, dt)
    }
}

impl fmt::Display for DifferentialDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DifferentialDrive (r: {:.3} m, L: {:.3} m)",
            self.wheel_radius, self.wheel_separation
        )
    }
}
