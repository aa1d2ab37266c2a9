//! Typed messages exchanged over the bus.
//!
//! Field layout follows the usual robotics message set (header, pose/twist
//! with covariance, inertial sample, planar range scan, clock). How these are
//! encoded on a wire is the transport's business; they only derive serde.

use nalgebra::{Matrix3, Matrix6, UnitQuaternion, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::clock::Time;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: Time, frame_id: impl Into<String>) -> Self {
        Header {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// Velocity command: forward speed and yaw rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear_forward: f64,
    pub angular_yaw: f64,
}

impl VelocityCommand {
    pub const fn new(linear_forward: f64, angular_yaw: f64) -> Self {
        VelocityCommand {
            linear_forward,
            angular_yaw,
        }
    }

    pub const fn stop() -> Self {
        VelocityCommand::new(0.0, 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// Row-major over `(x, y, z, roll, pitch, yaw)`.
    pub covariance: Matrix6<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwistWithCovariance {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
    pub covariance: Matrix6<f64>,
}

/// Pose and twist estimate. The pose is in `header.frame_id`, the twist in
/// `child_frame_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: PoseWithCovariance,
    pub twist: TwistWithCovariance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imu {
    pub header: Header,
    pub orientation: UnitQuaternion<f64>,
    pub orientation_covariance: Matrix3<f64>,
    pub angular_velocity: Vector3<f64>,
    pub angular_velocity_covariance: Matrix3<f64>,
    pub linear_acceleration: Vector3<f64>,
    pub linear_acceleration_covariance: Matrix3<f64>,
}

/// Planar range scan. Angles are counter-clockwise radians with
/// `angle_min < angle_max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    pub header: Header,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    pub time_increment: f32,
    pub scan_time: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
    pub intensities: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockMsg {
    pub clock: Time,
}

/// Builds a 6x6 covariance with `diagonal` on the diagonal and zeros elsewhere.
pub fn covariance6(diagonal: [f64; 6]) -> Matrix6<f64> {
    Matrix6::from_diagonal(&Vector6::from(diagonal))
}

/// Builds a 3x3 covariance with the same `variance` on every diagonal entry.
pub fn covariance3(variance: f64) -> Matrix3<f64> {
    Matrix3::from_diagonal_element(variance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covariance6_places_diagonal() {
        let cov = covariance6([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        for i in 0..6 {
            for j in 0..6 {
                let expected = if i == j { (i + 1) as f64 } else { 0.0 };
                assert_eq!(cov[(i, j)], expected);
            }
        }
    }

    #[test]
    fn test_covariance3() {
        let cov = covariance3(1e-5);
        assert!((cov.trace() - 3e-5).abs() < 1e-15);
        assert_eq!(cov[(0, 1)], 0.0);
    }

    #[test]
    fn test_stop_command() {
        assert_eq!(VelocityCommand::stop(), VelocityCommand::default());
    }
}
