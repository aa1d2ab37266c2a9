use std::collections::HashMap;

use nalgebra::{Unit, Vector3};
use rover_core::error::{Error, Result};
use rover_core::frames::EnginePose;
use rover_core::world::{Actuator, JointDrive, Wheel, World};

/// Hardware whose wheels track their targets exactly unless rates are forced.
pub(crate) struct MockHardware {
    pub wheels: Vec<Wheel>,
    pub drives: HashMap<Wheel, JointDrive>,
    pub measured: Option<(f64, f64)>,
    pub chassis: EnginePose,
    pub fail_wheels: bool,
}

impl MockHardware {
    pub fn with_wheels(wheels: &[Wheel]) -> Self {
        MockHardware {
            wheels: wheels.to_vec(),
            drives: HashMap::new(),
            measured: None,
            chassis: EnginePose::identity(),
            fail_wheels: false,
        }
    }

    pub fn two_wheel() -> Self {
        MockHardware::with_wheels(&Wheel::FRONT)
    }

    pub fn set_rates(&mut self, left: f64, right: f64) {
        self.measured = Some((left, right));
    }

    fn check(&self, wheel: Wheel) -> Result<()> {
        if self.fail_wheels || !self.wheels.contains(&wheel) {
            return Err(Error::unavailable(format!("wheel {} not responding", wheel)));
        }
        Ok(())
    }
}

impl Actuator for MockHardware {
    fn has_wheel(&self, wheel: Wheel) -> bool {
        self.wheels.contains(&wheel)
    }

    fn set_wheel_drive(&mut self, wheel: Wheel, drive: JointDrive) -> Result<()> {
        self.check(wheel)?;
        self.drives.insert(wheel, drive);
        Ok(())
    }

    fn wheel_velocity(&self, wheel: Wheel) -> Result<f64> {
        self.check(wheel)?;
        if let Some((left, right)) = self.measured {
            return Ok(if wheel.is_left() { left } else { right });
        }
        Ok(self.drives.get(&wheel).map_or(0.0, |d| d.target_velocity))
    }
}

impl World for MockHardware {
    fn link_pose(&self, link: &str) -> Result<EnginePose> {
        if link == "base_link" {
            Ok(self.chassis)
        } else {
            Err(Error::unavailable(format!("link '{}' not found", link)))
        }
    }

    fn raycast(&self, _: &Vector3<f64>, _: &Unit<Vector3<f64>>, _: f64) -> Option<f64> {
        None
    }
}
