//! Engine frame helpers and axis remaps.
//!
//! # Coordinate Systems
//!
//! - **Engine frame**: the simulation substrate's world frame. `y` is up, `z`
//!   is the chassis forward axis at yaw zero and `x` is the lateral axis.
//!   A positive yaw is a rotation about `+y` that turns `+z` towards `+x`.
//! - **Odom frame**: planar frame anchored at the start pose. `x_odom` follows
//!   engine `z`, `y_odom` follows engine `x` and `theta_odom` equals the
//!   engine yaw, so heading `theta` points along `(cos θ, sin θ)`.
//!
//! [`AxisRemap`] expresses engine-frame vectors, rotation rates and
//! orientations in a target convention. Remaps with a negative determinant
//! (reflections) flip the sign of axial quantities, which is what keeps
//! quaternions and angular velocities consistent with the remapped positions.

use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};
use rover_kinematics::Pose2D;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Engine-frame chassis forward axis.
pub fn engine_forward() -> Vector3<f64> {
    Vector3::z()
}

/// Rotation about the engine up axis by `yaw` radians.
pub fn yaw_rotation(yaw: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
}

/// Unit direction in the engine horizontal plane for heading `yaw`.
pub fn heading_direction(yaw: f64) -> Unit<Vector3<f64>> {
    Unit::new_normalize(Vector3::new(yaw.sin(), 0.0, yaw.cos()))
}

/// Position and orientation of a body in the engine frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnginePose {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl EnginePose {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        EnginePose { position, rotation }
    }

    pub fn identity() -> Self {
        EnginePose::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    /// Heading about the up axis in `(-PI, PI]`.
    pub fn yaw(&self) -> f64 {
        let forward = self.rotation * engine_forward();
        forward.x.atan2(forward.z)
    }

    /// Places a point given in this body's local frame into the engine frame.
    pub fn transform_point(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.position + self.rotation * local
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
    }
}

/// Anchors engine-frame poses to an odom frame fixed at a start pose.
///
/// The engine yaw is unwrapped across calls so the odom heading accumulates
/// like the encoder integrator does.
#[derive(Debug, Clone, Copy)]
pub struct OdomAnchor {
    origin: EnginePose,
    origin_yaw: f64,
    last_yaw: f64,
    unwrapped_yaw: f64,
}

impl OdomAnchor {
    pub fn new(origin: EnginePose) -> Self {
        let yaw = origin.yaw();
        OdomAnchor {
            origin,
            origin_yaw: yaw,
            last_yaw: yaw,
            unwrapped_yaw: yaw,
        }
    }

    pub fn origin(&self) -> &EnginePose {
        &self.origin
    }

    /// Expresses `current` in the odom frame: `x` from the engine `z` offset,
    /// `y` from the engine `x` offset, both rotated into the start heading.
    pub fn to_odom(&mut self, current: &EnginePose) -> Pose2D {
        let yaw = current.yaw();
        self.unwrapped_yaw += Pose2D::normalize_angle(yaw - self.last_yaw);
        self.last_yaw = yaw;

        let offset = current.position - self.origin.position;
        let (forward, lateral) = (offset.z, offset.x);
        let (s, c) = self.origin_yaw.sin_cos();

        Pose2D {
            x: c * forward + s * lateral,
            y: -s * forward + c * lateral,
            theta: self.unwrapped_yaw - self.origin_yaw,
        }
    }
}

/// A signed permutation of the three axes.
///
/// `target[i] = sign[i] * source[axis[i]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRemap {
    axis: [usize; 3],
    sign: [f64; 3],
}

impl AxisRemap {
    /// Engine to odom convention: `(x, y, z) <- (z, x, y)`. A proper rotation,
    /// consistent with the odometry mapping.
    pub const ENGINE_TO_ODOM: AxisRemap = AxisRemap {
        axis: [2, 0, 1],
        sign: [1.0, 1.0, 1.0],
    };

    /// Engine (left-handed, y up) to a right-handed x-forward/y-left/z-up frame:
    /// `(x, y, z) <- (z, -x, y)`.
    pub const ENGINE_TO_ROS: AxisRemap = AxisRemap {
        axis: [2, 0, 1],
        sign: [1.0, -1.0, 1.0],
    };

    pub fn new(axis: [usize; 3], sign: [f64; 3]) -> Result<Self> {
        let mut seen = [false; 3];
        for &a in &axis {
            if a > 2 || seen[a] {
                return Err(Error::config(format!("axis remap {:?} is not a permutation", axis)));
            }
            seen[a] = true;
        }
        if sign.iter().any(|s| *s != 1.0 && *s != -1.0) {
            return Err(Error::config(format!("axis remap signs {:?} must be ±1", sign)));
        }
        Ok(AxisRemap { axis, sign })
    }

    /// `+1` for rotations, `-1` for reflections.
    pub fn determinant(&self) -> f64 {
        let mut inversions = 0;
        for i in 0..3 {
            for j in (i + 1)..3 {
                if self.axis[i] > self.axis[j] {
                    inversions += 1;
                }
            }
        }
        let parity = if inversions % 2 == 0 { 1.0 } else { -1.0 };
        parity * self.sign.iter().product::<f64>()
    }

    /// Remaps a polar vector (position, velocity, acceleration).
    pub fn vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            self.sign[0] * v[self.axis[0]],
            self.sign[1] * v[self.axis[1]],
            self.sign[2] * v[self.axis[2]],
        )
    }

    /// Remaps an axial vector (angular velocity, rotation vector).
    pub fn pseudovector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.vector(v) * self.determinant()
    }

    /// Remaps an orientation so that it rotates remapped vectors the way the
    /// original rotates engine vectors.
    pub fn rotation(&self, q: &UnitQuaternion<f64>) -> UnitQuaternion<f64> {
        let imag = self.pseudovector(&q.imag());
        UnitQuaternion::new_unchecked(Quaternion::new(q.w, imag.x, imag.y, imag.z))
    }
}

/// Target convention for sensor outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameConvention {
    /// Same axes as the odometry output.
    #[default]
    Odom,
    /// Right-handed x-forward, y-left, z-up.
    Ros,
}

impl FrameConvention {
    pub fn remap(self) -> AxisRemap {
        match self {
            FrameConvention::Odom => AxisRemap::ENGINE_TO_ODOM,
            FrameConvention::Ros => AxisRemap::ENGINE_TO_ROS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_yaw_of_yaw_rotation() {
        for yaw in [-2.5, -0.3, 0.0, 0.4, 1.2, 3.0] {
            let pose = EnginePose::new(Vector3::zeros(), yaw_rotation(yaw));
            assert_abs_diff_eq!(pose.yaw(), yaw, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_heading_direction_matches_rotation() {
        let yaw = 0.8;
        let rotated = yaw_rotation(yaw) * engine_forward();
        assert_abs_diff_eq!(heading_direction(yaw).into_inner(), rotated, epsilon = 1e-12);
    }

    #[test]
    fn test_odom_axes() {
        let mut anchor = OdomAnchor::new(EnginePose::identity());
        let moved = EnginePose::new(Vector3::new(0.5, 0.0, 2.0), yaw_rotation(FRAC_PI_2));
        let odom = anchor.to_odom(&moved);
        assert_abs_diff_eq!(odom.x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(odom.y, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(odom.theta, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_odom_anchor_uses_start_heading() {
        let start = EnginePose::new(Vector3::new(1.0, 0.0, 1.0), yaw_rotation(FRAC_PI_2));
        let mut anchor = OdomAnchor::new(start);
        // One meter along the start heading (engine +x).
        let ahead = EnginePose::new(Vector3::new(2.0, 0.0, 1.0), yaw_rotation(FRAC_PI_2));
        let odom = anchor.to_odom(&ahead);
        assert_abs_diff_eq!(odom.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(odom.y, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(odom.theta, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_odom_anchor_unwraps_yaw() {
        let mut anchor = OdomAnchor::new(EnginePose::identity());
        let mut theta = 0.0;
        for step in 1..=40 {
            let yaw = step as f64 * 0.25;
            theta = anchor
                .to_odom(&EnginePose::new(Vector3::zeros(), yaw_rotation(yaw)))
                .theta;
        }
        assert_abs_diff_eq!(theta, 10.0, epsilon = 1e-9);
        assert!(theta > PI);
    }

    #[test]
    fn test_remap_validation() {
        assert!(AxisRemap::new([0, 0, 1], [1.0, 1.0, 1.0]).is_err());
        assert!(AxisRemap::new([0, 1, 3], [1.0, 1.0, 1.0]).is_err());
        assert!(AxisRemap::new([0, 1, 2], [1.0, 0.5, 1.0]).is_err());
        assert!(AxisRemap::new([2, 0, 1], [1.0, -1.0, 1.0]).is_ok());
    }

    #[test]
    fn test_determinants() {
        assert_eq!(AxisRemap::ENGINE_TO_ODOM.determinant(), 1.0);
        assert_eq!(AxisRemap::ENGINE_TO_ROS.determinant(), -1.0);
        assert_eq!(AxisRemap::new([1, 0, 2], [1.0, 1.0, 1.0]).unwrap().determinant(), -1.0);
    }

    #[test]
    fn test_vector_remap() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(AxisRemap::ENGINE_TO_ODOM.vector(&v), Vector3::new(3.0, 1.0, 2.0));
        assert_eq!(AxisRemap::ENGINE_TO_ROS.vector(&v), Vector3::new(3.0, -1.0, 2.0));
    }

    #[test]
    fn test_yaw_rotation_maps_to_odom_z() {
        let q = AxisRemap::ENGINE_TO_ODOM.rotation(&yaw_rotation(0.6));
        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.6);
        assert_abs_diff_eq!(q.coords, expected.coords, epsilon = 1e-12);
    }

    #[test]
    fn test_remapped_rotation_commutes_with_vectors() {
        let q = UnitQuaternion::from_euler_angles(0.3, -0.7, 1.1);
        let v = Vector3::new(0.2, -1.5, 0.9);
        for remap in [AxisRemap::ENGINE_TO_ODOM, AxisRemap::ENGINE_TO_ROS] {
            let lhs = remap.rotation(&q) * remap.vector(&v);
            let rhs = remap.vector(&(q * v));
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_ros_turn_right_is_negative_yaw_rate() {
        // Engine yaw turns +z towards +x, which is a right turn once +x maps to -y.
        let rate = AxisRemap::ENGINE_TO_ROS.pseudovector(&Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(rate, Vector3::new(0.0, 0.0, -1.0));
    }
}
