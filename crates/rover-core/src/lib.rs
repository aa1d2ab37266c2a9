//! Shared plumbing for the rover simulation core: the process clock, typed
//! bus topics and messages, engine-frame conventions and the collaborator
//! traits implemented by the physics substrate.

pub mod bus;
pub mod clock;
pub mod error;
pub mod frames;
pub mod messages;
pub mod world;

pub use bus::{Receiver, Topic, drain_latest};
pub use clock::{Clock, ClockBroadcaster, ClockMode, Time};
pub use error::{Error, Result};
pub use frames::{AxisRemap, EnginePose, FrameConvention, OdomAnchor};
pub use world::{Actuator, Hardware, JointDrive, Wheel, WheelTarget, World};
