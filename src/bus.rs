use rover_core::bus::Topic;
use rover_core::messages::{ClockMsg, Imu, LaserScan, Odometry, VelocityCommand};

use crate::config::TopicsConfig;

/// Every topic the simulation reads or writes, created once at startup.
#[derive(Debug, Clone)]
pub struct Topics {
    pub cmd_vel: Topic<VelocityCommand>,
    pub odom: Topic<Odometry>,
    pub imu: Topic<Imu>,
    pub scan: Topic<LaserScan>,
    pub clock: Topic<ClockMsg>,
}

impl Topics {
    pub fn new(config: &TopicsConfig) -> Self {
        Topics {
            cmd_vel: Topic::new(config.cmd_vel.as_str(), config.capacity),
            odom: Topic::new(config.odom.as_str(), config.capacity),
            imu: Topic::new(config.imu.as_str(), config.capacity),
            scan: Topic::new(config.scan.as_str(), config.capacity),
            clock: Topic::new(config.clock.as_str(), config.capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_take_configured_names() {
        let topics = Topics::new(&TopicsConfig::default());
        assert_eq!(topics.cmd_vel.name(), "/jackal_velocity_controller/cmd_vel");
        assert_eq!(topics.imu.name(), "imu/data");
        assert_eq!(topics.scan.name(), "scan");

        let mut rx = topics.clock.subscribe();
        topics.clock.publish(ClockMsg::default());
        assert!(rx.try_recv().is_ok());
    }
}
