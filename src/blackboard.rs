use parking_lot::RwLock;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use rover_core::clock::Time;
use rover_kinematics::{Pose2D, Twist2D};

/// Latest state shared between the tick thread and the async tasks.
#[derive(Clone, Debug, Default)]
pub struct State {
    pub pose: Pose2D,
    pub twist: Twist2D,
    pub stamp: Time,
    pub physics_ticks: u64,
    pub frame_ticks: u64,
    pub last_cmd_ts: Option<Instant>,
    pub faults: Vec<String>,
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn touch_cmd(bb: &Blackboard) {
    bb.write().last_cmd_ts = Some(Instant::now());
}

/// Time since the last published command as of `now`, `None` before the
/// first one.
pub fn command_age(state: &State, now: Instant) -> Option<Duration> {
    state.last_cmd_ts.map(|ts| now.saturating_duration_since(ts))
}

pub fn record_odometry(bb: &Blackboard, pose: Pose2D, twist: Twist2D, stamp: Time) {
    let mut g = bb.write();
    g.pose = pose;
    g.twist = twist;
    g.stamp = stamp;
}

/// Adds `msg` to the fault list unless it is already there.
pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}
