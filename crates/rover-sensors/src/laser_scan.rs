//! Planar range scanner emulation.
//!
//! The scanner idles until the clock reaches `next_scan_time`, then sweeps
//! `measurements_per_scan` rays across its angle window within the same tick
//! and publishes one [`LaserScan`]. Angles in the configuration are degrees
//! about the engine up axis, relative to the mounting link's heading.
//!
//! Rays always sweep `[angle_min, angle_max]`. `angle_increment` only turns
//! the window reported in the published message.

use nalgebra::Vector3;
use rover_core::bus::Topic;
use rover_core::clock::Clock;
use rover_core::error::{Error, Result};
use rover_core::frames::{EnginePose, heading_direction};
use rover_core::messages::{Header, LaserScan};
use rover_core::world::World;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub frame_id: String,
    /// World link the scanner is mounted on.
    pub link: String,
    /// Start of the sweep (deg).
    pub angle_min: f64,
    /// End of the sweep (deg).
    pub angle_max: f64,
    /// Distance from the link origin where rays start (m).
    pub range_min: f64,
    pub range_max: f64,
    pub measurements_per_scan: u32,
    /// Seconds between scan starts.
    pub time_between_scans: f64,
    /// Degrees the sweep window turns after every scan.
    pub angle_increment: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            frame_id: "base_link".to_string(),
            link: "base_link".to_string(),
            angle_min: -45.0,
            angle_max: 45.0,
            range_min: 0.0,
            range_max: 1000.0,
            measurements_per_scan: 20,
            time_between_scans: 0.1,
            angle_increment: 0.0,
        }
    }
}

impl ScannerConfig {
    fn validate(&self) -> Result<()> {
        if self.measurements_per_scan == 0 {
            return Err(Error::config("measurements_per_scan must be at least 1"));
        }
        if !(self.range_min >= 0.0) || !(self.range_max > self.range_min) || !self.range_max.is_finite() {
            return Err(Error::config(format!(
                "scanner ranges must satisfy 0 <= range_min < range_max, got [{}, {}]",
                self.range_min, self.range_max
            )));
        }
        if !(self.time_between_scans >= 0.0) || !self.time_between_scans.is_finite() {
            return Err(Error::config(format!(
                "time_between_scans must be finite and non-negative, got {}",
                self.time_between_scans
            )));
        }
        let angles = [self.angle_min, self.angle_max, self.angle_increment];
        if angles.iter().any(|a| !a.is_finite()) {
            return Err(Error::config("scanner angles must be finite"));
        }
        Ok(())
    }
}

/// Mutable state of one scan cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanState {
    pub is_scanning: bool,
    pub ranges: Vec<f32>,
    pub measurements_taken: u32,
    /// Clock time (s) at which the next scan may start.
    pub next_scan_time: f64,
    /// Window `[start, end]` (deg) reported by the next scan.
    pub angle_window: [f64; 2],
    /// Rays of the current, or last finished, scan that hit something.
    pub hits: u32,
}

/// Result of one ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMeasurement {
    pub distance: f32,
    pub hit: bool,
}

pub struct RangeScanner {
    config: ScannerConfig,
    clock: Clock,
    topic: Topic<LaserScan>,
    state: ScanState,
    enabled: bool,
}

impl RangeScanner {
    /// The first scan starts on the first tick at or after the clock's
    /// current time.
    ///
    /// # Errors
    ///
    /// `Configuration` for a zero measurement count, an empty or negative
    /// range interval, or a negative scan period.
    pub fn new(config: ScannerConfig, clock: Clock, topic: Topic<LaserScan>) -> Result<Self> {
        config.validate()?;
        let state = ScanState {
            is_scanning: false,
            ranges: Vec::with_capacity(config.measurements_per_scan as usize),
            measurements_taken: 0,
            next_scan_time: clock.now_secs(),
            angle_window: [config.angle_min, config.angle_max],
            hits: 0,
        };
        info!(
            link = %config.link,
            topic = topic.name(),
            measurements = config.measurements_per_scan,
            period = config.time_between_scans,
            "Range scanner ready"
        );
        Ok(RangeScanner {
            config,
            clock,
            topic,
            state,
            enabled: true,
        })
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Frame tick. Returns whether a scan was published.
    pub fn tick(&mut self, world: &dyn World) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }

        let now = self.clock.now_secs();
        if !self.state.is_scanning {
            if now < self.state.next_scan_time {
                return Ok(false);
            }
            self.state.is_scanning = true;
            self.state.measurements_taken = 0;
            self.state.hits = 0;
            self.state.next_scan_time += self.config.time_between_scans;
        }

        let base = match world.link_pose(&self.config.link) {
            Ok(pose) => pose,
            Err(e) => {
                self.enabled = false;
                error!(error = %e, "Range scanner disabled");
                return Err(e);
            }
        };

        while self.state.measurements_taken < self.config.measurements_per_scan {
            let measurement = self.measure(world, &base, self.state.measurements_taken);
            self.state.ranges.push(measurement.distance);
            self.state.hits += u32::from(measurement.hit);
            self.state.measurements_taken += 1;
        }

        self.publish();

        self.state.ranges.clear();
        self.state.measurements_taken = 0;
        self.state.is_scanning = false;
        if now > self.state.next_scan_time {
            self.state.next_scan_time = now;
        }
        self.advance_window();
        Ok(true)
    }

    fn measure(&self, world: &dyn World, base: &EnginePose, index: u32) -> RangeMeasurement {
        let t = index as f64 / self.config.measurements_per_scan as f64;
        let (start, end) = (self.config.angle_min, self.config.angle_max);
        let sensor_yaw = (start + (end - start) * t).to_radians();

        let direction = heading_direction(base.yaw() + sensor_yaw);
        let origin: Vector3<f64> = base.position + direction.into_inner() * self.config.range_min;
        match world.raycast(&origin, &direction, self.config.range_max) {
            Some(distance) if distance.is_finite() && distance <= self.config.range_max => {
                RangeMeasurement {
                    distance: distance as f32,
                    hit: true,
                }
            }
            _ => RangeMeasurement {
                distance: self.config.range_max as f32,
                hit: false,
            },
        }
    }

    fn publish(&mut self) {
        // Engine yaw turns clockwise seen from above.
        let [start, end] = self.state.angle_window;
        let mut angle_start = -start.to_radians();
        let mut angle_end = -end.to_radians();
        let mut ranges = std::mem::take(&mut self.state.ranges);

        if angle_start > angle_end {
            debug!(angle_start, angle_end, "Clockwise sweep, flipping ranges");
            std::mem::swap(&mut angle_start, &mut angle_end);
            ranges.reverse();
        }

        let n = self.config.measurements_per_scan as f64;
        trace!(count = ranges.len(), hits = self.state.hits, "scan");
        self.topic.publish(LaserScan {
            header: Header::new(self.clock.now(), self.config.frame_id.as_str()),
            angle_min: angle_start as f32,
            angle_max: angle_end as f32,
            angle_increment: ((angle_end - angle_start) / n) as f32,
            time_increment: 0.0,
            scan_time: self.config.time_between_scans as f32,
            range_min: self.config.range_min as f32,
            range_max: self.config.range_max as f32,
            intensities: vec![0.0; ranges.len()],
            ranges,
        });
    }

    fn advance_window(&mut self) {
        let [start, end] = &mut self.state.angle_window;
        *start += self.config.angle_increment;
        *end += self.config.angle_increment;
        if *start > 360.0 || *end > 360.0 {
            *start -= 360.0;
            *end -= 360.0;
        } else if *start < -360.0 || *end < -360.0 {
            *start += 360.0;
            *end += 360.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockWorld, Rays};
    use approx::assert_abs_diff_eq;
    use rover_core::bus::Receiver;
    use rover_core::frames::yaw_rotation;
    use std::cell::Cell;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn scanner(config: ScannerConfig, clock: &Clock) -> (RangeScanner, Receiver<LaserScan>) {
        let topic = Topic::new("scan", 64);
        let rx = topic.subscribe();
        (RangeScanner::new(config, clock.clone(), topic).unwrap(), rx)
    }

    fn short_range() -> ScannerConfig {
        ScannerConfig {
            range_max: 10.0,
            ..ScannerConfig::default()
        }
    }

    #[test]
    fn test_rejects_bad_config() {
        let bad = [
            ScannerConfig {
                measurements_per_scan: 0,
                ..ScannerConfig::default()
            },
            ScannerConfig {
                range_min: 5.0,
                range_max: 5.0,
                ..ScannerConfig::default()
            },
            ScannerConfig {
                time_between_scans: -0.1,
                ..ScannerConfig::default()
            },
        ];
        for config in bad {
            let result = RangeScanner::new(config, Clock::simulated(), Topic::new("scan", 4));
            assert!(matches!(result, Err(Error::Configuration(_))));
        }
    }

    #[test]
    fn test_empty_world_returns_range_max() {
        let clock = Clock::simulated();
        let (mut scanner, mut rx) = scanner(short_range(), &clock);
        let world = MockWorld::new(Rays::Miss);

        assert!(scanner.tick(&world).unwrap());
        let scan = rx.try_recv().unwrap();
        assert_eq!(scan.ranges, vec![10.0f32; 20]);
        assert_eq!(scan.intensities, vec![0.0f32; 20]);
        assert_abs_diff_eq!(scan.angle_increment, (FRAC_PI_2 / 20.0) as f32, epsilon = 1e-6);
        assert_abs_diff_eq!(scan.angle_min, -FRAC_PI_4 as f32, epsilon = 1e-6);
        assert_abs_diff_eq!(scan.angle_max, FRAC_PI_4 as f32, epsilon = 1e-6);
        assert_eq!(scan.time_increment, 0.0);
        assert_abs_diff_eq!(scan.scan_time, 0.1f32);
        assert_eq!(scan.range_max, 10.0);
        assert_eq!(scan.header.frame_id, "base_link");
        assert!(scanner.state().ranges.is_empty());
        assert_eq!(scanner.state().measurements_taken, 0);
    }

    #[test]
    fn test_default_window_is_flipped() {
        let clock = Clock::simulated();
        let (mut scanner, mut rx) = scanner(short_range(), &clock);
        let world = MockWorld::new(Rays::Counting(Cell::new(0)));
        scanner.tick(&world).unwrap();

        // The first ray (engine -45 deg) lands last in the published scan.
        let scan = rx.try_recv().unwrap();
        let expected: Vec<f32> = (1..=20).rev().map(|d| d as f32).collect();
        assert_eq!(scan.ranges[0], 20.0);
        assert_eq!(scan.ranges, expected);
        assert!(scan.angle_min < scan.angle_max);
        assert_abs_diff_eq!(scan.angle_min, -FRAC_PI_4 as f32, epsilon = 1e-6);
        assert!(scan.angle_increment > 0.0);
        assert_eq!(scanner.state().hits, 20);
    }

    #[test]
    fn test_reversed_window_keeps_order() {
        let clock = Clock::simulated();
        let config = ScannerConfig {
            angle_min: 45.0,
            angle_max: -45.0,
            ..short_range()
        };
        let (mut scanner, mut rx) = scanner(config, &clock);
        let world = MockWorld::new(Rays::Counting(Cell::new(0)));
        scanner.tick(&world).unwrap();

        let scan = rx.try_recv().unwrap();
        let expected: Vec<f32> = (1..=20).map(|d| d as f32).collect();
        assert_eq!(scan.ranges, expected);
        assert_abs_diff_eq!(scan.angle_min, -FRAC_PI_4 as f32, epsilon = 1e-6);
        assert_abs_diff_eq!(scan.angle_max, FRAC_PI_4 as f32, epsilon = 1e-6);
    }

    #[test]
    fn test_hits_count_only_returns() {
        let clock = Clock::simulated();
        let (mut scanner, _rx) = scanner(short_range(), &clock);
        scanner.tick(&MockWorld::new(Rays::Miss)).unwrap();
        assert_eq!(scanner.state().hits, 0);

        // Returns beyond range_max count as misses.
        clock.tick(0.2);
        assert!(scanner.tick(&MockWorld::new(Rays::Counting(Cell::new(5)))).unwrap());
        assert_eq!(scanner.state().hits, 5);
    }

    #[test]
    fn test_rays_follow_link_heading() {
        let clock = Clock::simulated();
        let config = ScannerConfig {
            angle_min: 0.0,
            angle_max: 0.0,
            measurements_per_scan: 1,
            range_min: 0.5,
            ..short_range()
        };
        let (mut scanner, _rx) = scanner(config, &clock);
        let mut world = MockWorld::new(Rays::Miss);
        world.set_pose(EnginePose::new(Vector3::new(1.0, 0.2, 1.0), yaw_rotation(FRAC_PI_2)));
        scanner.tick(&world).unwrap();

        let casts = world.casts.borrow();
        assert_eq!(casts.len(), 1);
        let (origin, direction, max) = casts[0];
        assert_abs_diff_eq!(direction, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_abs_diff_eq!(origin, Vector3::new(1.5, 0.2, 1.0), epsilon = 1e-12);
        assert_eq!(max, 10.0);
    }

    #[test]
    fn test_cadence() {
        let clock = Clock::simulated();
        let (mut scanner, _rx) = scanner(short_range(), &clock);
        let world = MockWorld::new(Rays::Miss);

        assert!(scanner.tick(&world).unwrap());
        clock.tick(0.05);
        assert!(!scanner.tick(&world).unwrap());
        clock.tick(0.06);
        assert!(scanner.tick(&world).unwrap());
        clock.tick(0.04);
        assert!(!scanner.tick(&world).unwrap());
    }

    #[test]
    fn test_backlog_snaps_to_now() {
        let clock = Clock::simulated();
        let (mut scanner, mut rx) = scanner(short_range(), &clock);
        let world = MockWorld::new(Rays::Miss);

        assert!(scanner.tick(&world).unwrap());
        clock.tick(1.0);
        assert!(scanner.tick(&world).unwrap());
        assert_abs_diff_eq!(scanner.state().next_scan_time, 1.0, epsilon = 1e-9);

        // Snapped to now, so the next frame scans once more and the
        // cadence resumes from there instead of replaying the backlog.
        assert!(scanner.tick(&world).unwrap());
        clock.tick(0.05);
        assert!(!scanner.tick(&world).unwrap());
        assert_abs_diff_eq!(scanner.state().next_scan_time, 1.1, epsilon = 1e-9);

        let mut published = 0;
        while rx.try_recv().is_ok() {
            published += 1;
        }
        assert_eq!(published, 3);
    }

    #[test]
    fn test_window_rotates_and_wraps() {
        let clock = Clock::simulated();
        let config = ScannerConfig {
            angle_increment: 200.0,
            time_between_scans: 0.0,
            ..short_range()
        };
        let (mut scanner, _rx) = scanner(config, &clock);
        let world = MockWorld::new(Rays::Miss);

        scanner.tick(&world).unwrap();
        assert_eq!(scanner.state().angle_window, [155.0, 245.0]);
        scanner.tick(&world).unwrap();
        assert_eq!(scanner.state().angle_window, [-5.0, 85.0]);
    }

    #[test]
    fn test_rays_stay_on_configured_span_while_window_turns() {
        let clock = Clock::simulated();
        let config = ScannerConfig {
            angle_min: 0.0,
            angle_max: 0.0,
            angle_increment: 90.0,
            time_between_scans: 0.0,
            measurements_per_scan: 1,
            ..short_range()
        };
        let (mut scanner, mut rx) = scanner(config, &clock);
        let world = MockWorld::new(Rays::Miss);

        scanner.tick(&world).unwrap();
        scanner.tick(&world).unwrap();
        assert_eq!(scanner.state().angle_window, [180.0, 180.0]);

        let casts = world.casts.borrow();
        assert_eq!(casts.len(), 2);
        for (_, direction, _) in casts.iter() {
            assert_abs_diff_eq!(*direction, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
        }

        // Only the reported window turns.
        rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_abs_diff_eq!(second.angle_min, -FRAC_PI_2 as f32, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_link_disables() {
        let clock = Clock::simulated();
        let config = ScannerConfig {
            link: "laser".to_string(),
            ..short_range()
        };
        let (mut scanner, _rx) = scanner(config, &clock);
        let world = MockWorld::new(Rays::Miss);
        assert!(matches!(
            scanner.tick(&world),
            Err(Error::CollaboratorUnavailable(_))
        ));
        assert!(!scanner.is_enabled());
        assert!(!scanner.tick(&world).unwrap());
    }
}
