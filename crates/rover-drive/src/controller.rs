use nalgebra::{UnitQuaternion, Vector3};
use rover_core::bus::{Receiver, Topic, drain_latest};
use rover_core::clock::Clock;
use rover_core::error::{Error, Result};
use rover_core::messages::{
    Header, Odometry, PoseWithCovariance, TwistWithCovariance, VelocityCommand, covariance6,
};
use rover_core::world::{Hardware, Wheel, WheelTarget, require_wheels};
use rover_kinematics::{ChassisSpeeds, DifferentialDrive, Pose2D, Twist2D};
use tracing::{debug, error, info, warn};

use crate::config::{DriveConfig, OdometrySource};
use crate::odometry::{OdometryEstimator, estimator_for};

/// Pose and twist variances over `(x, y, z, roll, pitch, yaw)`. Axes a planar
/// drive cannot observe are marked with a huge variance.
pub const ODOMETRY_COVARIANCE: [f64; 6] = [1e-5, 1e-5, 1e12, 1e12, 1e12, 1e-3];

/// Turns velocity commands into wheel drives and publishes odometry.
pub struct DiffDriveController {
    config: DriveConfig,
    drive: DifferentialDrive,
    wheels: Vec<Wheel>,
    command: VelocityCommand,
    commands: Option<Receiver<VelocityCommand>>,
    estimator: Box<dyn OdometryEstimator>,
    clock: Clock,
    odom: Topic<Odometry>,
    target: WheelTarget,
    twist: Twist2D,
    enabled: bool,
}

impl DiffDriveController {
    /// Builds a controller for the wheels present on `hw`.
    ///
    /// # Errors
    ///
    /// `Configuration` if the wheel radius or separation is not positive, if
    /// a front wheel is missing, or if `four_wheel_drive` is set and a rear
    /// wheel is missing.
    pub fn new<H: Hardware + ?Sized>(
        config: DriveConfig,
        clock: Clock,
        odom: Topic<Odometry>,
        hw: &H,
    ) -> Result<Self> {
        let drive = DifferentialDrive::new(config.wheel_radius, config.wheel_separation)?;

        let mut wheels = Wheel::FRONT.to_vec();
        if config.four_wheel_drive {
            wheels.extend_from_slice(&Wheel::REAR);
        }
        require_wheels(hw, &wheels)?;

        let estimator = estimator_for(&config, drive);
        info!(
            %drive,
            four_wheel_drive = config.four_wheel_drive,
            odometry = ?config.odometry_source,
            "Drive controller ready"
        );

        Ok(DiffDriveController {
            target: WheelTarget {
                stiffness: config.stiffness,
                damping: config.damping,
                ..WheelTarget::default()
            },
            config,
            drive,
            wheels,
            command: VelocityCommand::stop(),
            commands: None,
            estimator,
            clock,
            odom,
            twist: Twist2D::default(),
            enabled: true,
        })
    }

    /// Receives commands from `topic`; the newest one queued is applied at
    /// the start of each tick.
    pub fn with_command_topic(mut self, topic: &Topic<VelocityCommand>) -> Self {
        self.commands = Some(topic.subscribe());
        self
    }

    /// Stores the command applied by the next tick. Last write wins.
    pub fn on_velocity_command(&mut self, cmd: VelocityCommand) {
        self.command = cmd;
    }

    /// Physics tick: drives the wheels, advances odometry and publishes it.
    ///
    /// A transient numeric failure skips the odometry update and returns
    /// `Ok`. Any other error disables the controller and is returned once;
    /// later ticks are no-ops.
    pub fn tick(&mut self, dt: f64, hw: &mut dyn Hardware) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(cmd) = self.commands.as_mut().and_then(drain_latest) {
            debug!(v = cmd.linear_forward, w = cmd.angular_yaw, "velocity command");
            self.command = *cmd;
        }

        let target = self.wheel_target();
        self.target = target;
        let failed = self
            .wheels
            .iter()
            .find_map(|&wheel| hw.set_wheel_drive(wheel, target.drive_for(wheel)).err());
        if let Some(e) = failed {
            return Err(self.disable(e));
        }

        match self.estimator.estimate(dt, &*hw) {
            Ok((pose, twist)) => {
                self.twist = twist;
                self.odom.publish(self.odometry_message(pose, twist));
                Ok(())
            }
            Err(Error::TransientNumeric(reason)) => {
                warn!(dt, reason, "Skipping odometry update");
                Ok(())
            }
            Err(e) => Err(self.disable(e)),
        }
    }

    fn wheel_target(&self) -> WheelTarget {
        let rates = self.drive.inverse_kinematics(ChassisSpeeds::new(
            self.command.linear_forward,
            self.command.angular_yaw,
        ));
        WheelTarget {
            left_rate: rates.left,
            right_rate: rates.right,
            stiffness: self.config.stiffness,
            damping: self.config.damping,
        }
    }

    fn odometry_message(&self, pose: Pose2D, twist: Twist2D) -> Odometry {
        let covariance = covariance6(ODOMETRY_COVARIANCE);
        Odometry {
            header: Header::new(self.clock.now(), self.config.frame_id.as_str()),
            child_frame_id: self.config.child_frame_id.clone(),
            pose: PoseWithCovariance {
                position: Vector3::new(pose.x, pose.y, 0.0),
                orientation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), pose.theta),
                covariance,
            },
            twist: TwistWithCovariance {
                linear: Vector3::new(twist.linear_x, twist.linear_y, 0.0),
                angular: Vector3::new(0.0, 0.0, twist.angular_z),
                covariance,
            },
        }
    }

    fn disable(&mut self, e: Error) -> Error {
        self.enabled = false;
        error!(error = %e, "Drive controller disabled");
        e
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn source(&self) -> OdometrySource {
        self.estimator.source()
    }

    pub fn command(&self) -> VelocityCommand {
        self.command
    }

    /// Wheel targets sent by the last tick.
    pub fn target(&self) -> WheelTarget {
        self.target
    }

    pub fn pose(&self) -> Pose2D {
        self.estimator.pose()
    }

    pub fn twist(&self) -> Twist2D {
        self.twist
    }
}
