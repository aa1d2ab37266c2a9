//! Odometry strategies.
//!
//! Both strategies share the [`OdometryEstimator`] contract: given the tick's
//! `dt` and the hardware, return the new pose in the odom frame and the
//! instantaneous body twist. A `dt` of zero holds the previous estimate.

use rover_core::error::{Error, Result};
use rover_core::frames::OdomAnchor;
use rover_core::world::{Hardware, Wheel};
use rover_kinematics::{DifferentialDrive, Pose2D, Twist2D, WheelRates};
use tracing::{debug, trace};

use crate::config::{DriveConfig, HeadingMode, OdometrySource};

pub trait OdometryEstimator: Send {
    fn source(&self) -> OdometrySource;

    /// Latest pose estimate.
    fn pose(&self) -> Pose2D;

    /// Advances the estimate by `dt` seconds.
    ///
    /// # Errors
    ///
    /// `TransientNumeric` for a negative or non-finite `dt` or a non-finite
    /// result, in which case the previous estimate is kept.
    /// `CollaboratorUnavailable` when the hardware stops answering.
    fn estimate(&mut self, dt: f64, hw: &dyn Hardware) -> Result<(Pose2D, Twist2D)>;
}

/// Builds the strategy selected by `config.odometry_source`.
pub fn estimator_for(config: &DriveConfig, drive: DifferentialDrive) -> Box<dyn OdometryEstimator> {
    match config.odometry_source {
        OdometrySource::Encoder => Box::new(EncoderOdometry::new(
            drive,
            config.encoder_decimals,
            config.heading,
        )),
        OdometrySource::GroundTruth => Box::new(GroundTruthOdometry::new(
            config.chassis_link.clone(),
            config.heading,
        )),
    }
}

fn check_dt(dt: f64) -> Result<()> {
    if dt < 0.0 || !dt.is_finite() {
        return Err(Error::TransientNumeric("odometry dt must be finite and non-negative"));
    }
    Ok(())
}

fn apply_heading(pose: Pose2D, mode: HeadingMode) -> Pose2D {
    match mode {
        HeadingMode::Unbounded => pose,
        HeadingMode::Wrapped => pose.wrapped(),
    }
}

/// Dead reckoning from the realized front wheel rates.
#[derive(Debug, Clone)]
pub struct EncoderOdometry {
    drive: DifferentialDrive,
    decimals: u32,
    heading: HeadingMode,
    pose: Pose2D,
    twist: Twist2D,
}

impl EncoderOdometry {
    pub fn new(drive: DifferentialDrive, decimals: u32, heading: HeadingMode) -> Self {
        EncoderOdometry {
            drive,
            decimals,
            heading,
            pose: Pose2D::default(),
            twist: Twist2D::default(),
        }
    }

    fn measured_rates(&self, hw: &dyn Hardware) -> Result<WheelRates> {
        let left = hw.wheel_velocity(Wheel::FrontLeft)?;
        let right = hw.wheel_velocity(Wheel::FrontRight)?;
        Ok(WheelRates::new(left, right).quantized(self.decimals))
    }
}

impl OdometryEstimator for EncoderOdometry {
    fn source(&self) -> OdometrySource {
        OdometrySource::Encoder
    }

    fn pose(&self) -> Pose2D {
        self.pose
    }

    fn estimate(&mut self, dt: f64, hw: &dyn Hardware) -> Result<(Pose2D, Twist2D)> {
        check_dt(dt)?;
        if dt == 0.0 {
            return Ok((self.pose, self.twist));
        }

        let rates = self.measured_rates(hw)?;
        let next = self.drive.integrate_wheel_rates(self.pose, rates, dt)?;
        if !next.is_finite() {
            return Err(Error::TransientNumeric("encoder odometry produced a non-finite pose"));
        }
        let twist = Twist2D::from_pose_delta(&self.pose, &next, dt)
            .ok_or(Error::TransientNumeric("encoder odometry produced a non-finite twist"))?;

        trace!(left = rates.left, right = rates.right, "encoder rates");
        self.pose = apply_heading(next, self.heading);
        self.twist = twist;
        Ok((self.pose, self.twist))
    }
}

/// Odometry read from the chassis pose in the World, anchored at the first
/// pose observed.
#[derive(Debug, Clone)]
pub struct GroundTruthOdometry {
    link: String,
    heading: HeadingMode,
    anchor: Option<OdomAnchor>,
    pose: Pose2D,
    twist: Twist2D,
}

impl GroundTruthOdometry {
    pub fn new(link: impl Into<String>, heading: HeadingMode) -> Self {
        GroundTruthOdometry {
            link: link.into(),
            heading,
            anchor: None,
            pose: Pose2D::default(),
            twist: Twist2D::default(),
        }
    }
}

impl OdometryEstimator for GroundTruthOdometry {
    fn source(&self) -> OdometrySource {
        OdometrySource::GroundTruth
    }

    fn pose(&self) -> Pose2D {
        self.pose
    }

    fn estimate(&mut self, dt: f64, hw: &dyn Hardware) -> Result<(Pose2D, Twist2D)> {
        check_dt(dt)?;
        let current = hw.link_pose(&self.link)?;
        if !current.is_finite() {
            return Err(Error::TransientNumeric("ground truth pose is not finite"));
        }

        let link = &self.link;
        let anchor = self.anchor.get_or_insert_with(|| {
            debug!(link = %link, "Anchoring odom frame at start pose");
            OdomAnchor::new(current)
        });
        if dt == 0.0 {
            return Ok((self.pose, self.twist));
        }

        let next = anchor.to_odom(&current);
        let twist = Twist2D::from_pose_delta(&self.pose, &next, dt)
            .ok_or(Error::TransientNumeric("ground truth produced a non-finite twist"))?;

        self.pose = apply_heading(next, self.heading);
        self.twist = twist;
        Ok((self.pose, self.twist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHardware;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;
    use rover_core::frames::{EnginePose, yaw_rotation};
    use std::f64::consts::PI;

    fn drive() -> DifferentialDrive {
        DifferentialDrive::new(0.1, 0.5).unwrap()
    }

    #[test]
    fn test_factory_selects_strategy() {
        let mut config = DriveConfig::default();
        assert_eq!(estimator_for(&config, drive()).source(), OdometrySource::Encoder);
        config.odometry_source = OdometrySource::GroundTruth;
        assert_eq!(estimator_for(&config, drive()).source(), OdometrySource::GroundTruth);
    }

    #[test]
    fn test_encoder_straight_line() {
        let mut hw = MockHardware::two_wheel();
        hw.set_rates(10.0, 10.0);
        let mut odom = EncoderOdometry::new(drive(), 3, HeadingMode::Unbounded);

        let mut last_x = 0.0;
        for _ in 0..50 {
            let (pose, twist) = odom.estimate(0.02, &hw).unwrap();
            assert!(pose.x > last_x);
            assert_abs_diff_eq!(pose.y, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(pose.theta, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(twist.linear_x, 1.0, epsilon = 1e-9);
            last_x = pose.x;
        }
        assert_abs_diff_eq!(last_x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_encoder_quantizes_rates() {
        let mut hw = MockHardware::two_wheel();
        hw.set_rates(10.0004, 10.0004);
        let mut odom = EncoderOdometry::new(drive(), 3, HeadingMode::Unbounded);
        let (pose, _) = odom.estimate(1.0, &hw).unwrap();
        assert_abs_diff_eq!(pose.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_encoder_heading_modes() {
        let mut hw = MockHardware::two_wheel();
        // omega = 0.1 * (2.5 - -2.5) / 0.5 = 1 rad/s
        hw.set_rates(2.5, -2.5);

        let mut unbounded = EncoderOdometry::new(drive(), 3, HeadingMode::Unbounded);
        let mut wrapped = EncoderOdometry::new(drive(), 3, HeadingMode::Wrapped);
        for _ in 0..500 {
            unbounded.estimate(0.02, &hw).unwrap();
            wrapped.estimate(0.02, &hw).unwrap();
        }
        assert_abs_diff_eq!(unbounded.pose().theta, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(wrapped.pose().theta, 10.0 - 4.0 * PI, epsilon = 1e-9);
        assert!(wrapped.pose().theta >= -PI && wrapped.pose().theta < PI);
    }

    #[test]
    fn test_encoder_rejects_bad_dt_and_holds() {
        let mut hw = MockHardware::two_wheel();
        hw.set_rates(10.0, 10.0);
        let mut odom = EncoderOdometry::new(drive(), 3, HeadingMode::Unbounded);
        odom.estimate(0.1, &hw).unwrap();
        let before = odom.pose();

        assert_eq!(odom.estimate(0.0, &hw).unwrap().0, before);
        assert!(matches!(odom.estimate(-0.1, &hw), Err(Error::TransientNumeric(_))));
        assert!(matches!(odom.estimate(f64::NAN, &hw), Err(Error::TransientNumeric(_))));
        assert_eq!(odom.pose(), before);
    }

    #[test]
    fn test_encoder_missing_wheel_is_unavailable() {
        let mut hw = MockHardware::two_wheel();
        hw.fail_wheels = true;
        let mut odom = EncoderOdometry::new(drive(), 3, HeadingMode::Unbounded);
        assert!(matches!(
            odom.estimate(0.02, &hw),
            Err(Error::CollaboratorUnavailable(_))
        ));
    }

    #[test]
    fn test_ground_truth_anchors_at_start() {
        let mut hw = MockHardware::two_wheel();
        hw.chassis = EnginePose::new(Vector3::new(3.0, 0.0, -2.0), yaw_rotation(0.0));
        let mut odom = GroundTruthOdometry::new("base_link", HeadingMode::Unbounded);

        let (pose, _) = odom.estimate(0.02, &hw).unwrap();
        assert_eq!(pose, Pose2D::default());

        // 0.5 m forward (engine +z), 0.1 m to the side (engine +x).
        hw.chassis = EnginePose::new(Vector3::new(3.1, 0.0, -1.5), yaw_rotation(0.2));
        let (pose, twist) = odom.estimate(0.5, &hw).unwrap();
        assert_abs_diff_eq!(pose.x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.y, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(pose.theta, 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(twist.angular_z, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_ground_truth_straight_line() {
        let mut hw = MockHardware::two_wheel();
        let mut odom = GroundTruthOdometry::new("base_link", HeadingMode::Unbounded);
        let mut last_x = f64::NEG_INFINITY;

        for i in 0..50 {
            hw.chassis = EnginePose::new(Vector3::new(0.0, 0.0, 0.01 * i as f64), yaw_rotation(0.0));
            let (pose, twist) = odom.estimate(0.02, &hw).unwrap();
            assert!(pose.x > last_x, "x stalled at tick {i}: {pose:?}");
            assert_abs_diff_eq!(pose.y, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(pose.theta, 0.0, epsilon = 1e-12);
            if i > 0 {
                assert_abs_diff_eq!(twist.linear_x, 0.5, epsilon = 1e-9);
            }
            last_x = pose.x;
        }
        assert_abs_diff_eq!(last_x, 0.49, epsilon = 1e-12);
    }

    #[test]
    fn test_ground_truth_missing_link() {
        let hw = MockHardware::two_wheel();
        let mut odom = GroundTruthOdometry::new("chassis", HeadingMode::Unbounded);
        assert!(matches!(
            odom.estimate(0.02, &hw),
            Err(Error::CollaboratorUnavailable(_))
        ));
    }
}
