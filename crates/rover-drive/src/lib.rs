//! Differential-drive control for the rover simulation core.
//!
//! [`DiffDriveController`] converts velocity commands into per-wheel drive
//! targets and keeps a dead-reckoned pose with one of two odometry
//! strategies (see [`OdometrySource`]).

pub mod config;
pub mod controller;
pub mod odometry;

#[cfg(test)]
mod testing;

pub use config::{DriveConfig, HeadingMode, OdometrySource};
pub use controller::{DiffDriveController, ODOMETRY_COVARIANCE};
pub use odometry::{EncoderOdometry, GroundTruthOdometry, OdometryEstimator, estimator_for};
