#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! This module defines error types that can occur while constructing a drive
//! model or integrating odometry.

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for invalid wheel radius.
    /// This variant is returned when a wheel radius is provided that is not positive.
    InvalidWheelRadius(&'static str),
    /// Error for invalid wheel separation.
    /// This variant is returned when the distance between the wheels is not positive.
    InvalidWheelSeparation(&'static str),
    /// Error for an unusable time delta.
    /// This variant is returned when `dt` is zero, negative or not finite.
    InvalidTimeDelta(&'static str),
}

impl core::fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidWheelRadius(msg) => write!(f, "Invalid wheel radius: {}", msg),
            KinematicsError::InvalidWheelSeparation(msg) => {
                write!(f, "Invalid wheel separation: {}", msg)
            }
            KinematicsError::InvalidTimeDelta(msg) => write!(f, "Invalid time delta: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
