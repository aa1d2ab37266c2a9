use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use rover_core::clock::ClockMode;
use rover_drive::DriveConfig;
use rover_sensors::{ImuConfig, ScannerConfig};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::sim::WorldConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "ROVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub cmd_vel: String,
    pub odom: String,
    pub imu: String,
    pub scan: String,
    pub clock: String,
    /// Per-topic broadcast buffer.
    pub capacity: usize,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        TopicsConfig {
            cmd_vel: "/jackal_velocity_controller/cmd_vel".to_string(),
            odom: "odom".to_string(),
            imu: "imu/data".to_string(),
            scan: "scan".to_string(),
            clock: "clock".to_string(),
            capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub physics_rate_hz: f64,
    pub frame_rate_hz: f64,
    /// Cap on physics steps run to catch up within one frame.
    pub max_physics_steps_per_frame: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            physics_rate_hz: 50.0,
            frame_rate_hz: 60.0,
            max_physics_steps_per_frame: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub mode: ClockMode,
}

/// One leg of the scripted teleop drive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleopStep {
    pub seconds: f64,
    pub linear: f64,
    pub angular: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    pub rate_hz: f64,
    pub script: Vec<TeleopStep>,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        let step = |seconds, linear, angular| TeleopStep {
            seconds,
            linear,
            angular,
        };
        TeleopConfig {
            rate_hz: 10.0,
            script: vec![
                step(3.0, 1.0, 0.0),
                step(5.0, 0.5, 0.5),
                step(3.0, 0.0, 1.0),
                step(1.0, 0.0, 0.0),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub drive: DriveConfig,
    pub imu: ImuConfig,
    pub scanner: ScannerConfig,
    pub topics: TopicsConfig,
    pub scheduler: SchedulerConfig,
    pub clock: ClockConfig,
    pub teleop: TeleopConfig,
    pub world: WorldConfig,
    pub logging: LoggingConfig,
}

/// Loads `config/default.toml` when present, then `path` (required when
/// given), then `ROVER__SECTION__KEY` environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let mut builder = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(false));
    if let Some(path) = path {
        info!(path = %path.display(), "Adding configuration file");
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    match builder.build().and_then(|c| c.try_deserialize::<AppConfig>()) {
        Ok(config) => {
            info!("Successfully loaded configuration");
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}

/// Parses a TOML document layered over the defaults.
pub fn config_from_toml(toml: &str) -> Result<AppConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_core::frames::FrameConvention;
    use rover_drive::{HeadingMode, OdometrySource};

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = config_from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.drive.wheel_separation, 0.37559);
        assert_eq!(config.drive.wheel_radius, 0.098);
        assert_eq!(config.topics.cmd_vel, "/jackal_velocity_controller/cmd_vel");
        assert_eq!(config.scanner.measurements_per_scan, 20);
        assert_eq!(config.clock.mode, ClockMode::Simulated);
    }

    #[test]
    fn test_shipped_defaults_parse() {
        let config = config_from_toml(include_str!("../config/default.toml")).unwrap();
        assert_eq!(config.drive, DriveConfig::default());
        assert_eq!(config.teleop, TeleopConfig::default());
        assert_eq!(config.scanner.link, "laser");
        assert!(config.world.links.iter().any(|l| l.name == config.scanner.link));
        assert_eq!(config.world.pillars.len(), 2);
    }

    #[test]
    fn test_partial_override() {
        let config = config_from_toml(
            r#"
            [drive]
            odometry_source = "GROUND_TRUTH"
            heading = "WRAPPED"
            four_wheel_drive = true

            [imu]
            convention = "ROS"

            [scanner]
            range_max = 30.0

            [clock]
            mode = "MONOTONIC"
            "#,
        )
        .unwrap();
        assert_eq!(config.drive.odometry_source, OdometrySource::GroundTruth);
        assert_eq!(config.drive.heading, HeadingMode::Wrapped);
        assert!(config.drive.four_wheel_drive);
        assert_eq!(config.drive.wheel_radius, 0.098);
        assert_eq!(config.imu.convention, FrameConvention::Ros);
        assert_eq!(config.scanner.range_max, 30.0);
        assert_eq!(config.scanner.angle_min, -45.0);
        assert_eq!(config.clock.mode, ClockMode::Monotonic);
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        let result = config_from_toml(
            r#"
            [drive]
            odometry_source = "GPS"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_world_tables() {
        let config = config_from_toml(
            r#"
            [world]
            slip = 0.2

            [[world.pillars]]
            x = 0.0
            z = 5.0
            radius = 0.5

            [[world.links]]
            name = "laser"
            y = 0.3
            z = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.world.slip, 0.2);
        assert_eq!(config.world.pillars.len(), 1);
        assert_eq!(config.world.links[0].name, "laser");
        assert_eq!(config.world.links[0].z, 0.2);
        assert_eq!(config.world.links[0].yaw, 0.0);
    }
}
