//! Host side of the rover simulation: configuration, the kinematic reference
//! world, the frame scheduler and the scripted teleop driver.

pub mod blackboard;
pub mod bus;
pub mod config;
pub mod runtime;
pub mod sim;
pub mod teleop;

pub use bus::Topics;
pub use config::{AppConfig, load_config};
pub use runtime::Simulation;
pub use sim::{KinematicWorld, WorldConfig};
