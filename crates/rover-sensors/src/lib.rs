//! Sensor emulators for the rover simulation core: an inertial unit that
//! finite-differences its mounting link's pose, and a planar range scanner
//! that sweeps rays through the World on a clock-gated cadence.

pub mod imu;
pub mod laser_scan;

#[cfg(test)]
mod testing;

pub use imu::{ImuConfig, ImuEmulator};
pub use laser_scan::{RangeMeasurement, RangeScanner, ScanState, ScannerConfig};
