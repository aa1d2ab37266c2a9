use serde::{Deserialize, Serialize};

/// Which odometry strategy a controller runs for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OdometrySource {
    /// Dead reckoning from realized wheel rates. Reflects wheel slip.
    #[default]
    Encoder,
    /// Chassis pose read from the World. Blind to wheel slip.
    GroundTruth,
}

/// How the published heading is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeadingMode {
    /// Accumulates across revolutions.
    #[default]
    Unbounded,
    /// Wrapped to `[-PI, PI)` after every update.
    Wrapped,
}

/// Kinematic parameters and odometry options of the drive controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Distance between the left and right wheels (m).
    pub wheel_separation: f64,
    /// Wheel radius (m).
    pub wheel_radius: f64,
    /// Mirror front wheel targets onto the rear wheels.
    pub four_wheel_drive: bool,
    pub odometry_source: OdometrySource,
    pub heading: HeadingMode,
    pub stiffness: f64,
    pub damping: f64,
    /// Decimal digits kept from measured wheel rates.
    pub encoder_decimals: u32,
    /// World link whose pose is the chassis ground truth.
    pub chassis_link: String,
    pub frame_id: String,
    pub child_frame_id: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        DriveConfig {
            wheel_separation: 0.37559,
            wheel_radius: 0.098,
            four_wheel_drive: false,
            odometry_source: OdometrySource::default(),
            heading: HeadingMode::default(),
            stiffness: 0.0,
            damping: 10.0,
            encoder_decimals: 3,
            chassis_link: "base_link".to_string(),
            frame_id: "odom".to_string(),
            child_frame_id: "base_link".to_string(),
        }
    }
}
