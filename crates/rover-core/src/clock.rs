//! Process-wide time source.
//!
//! A single [`Clock`] is built at startup and a cheap handle is cloned into
//! every component that stamps messages. The clock is latched once per frame
//! tick, so every message produced during one frame carries the same stamp,
//! and the latched value never goes backwards. Stamps are cut from the
//! clock's seconds with [`Time::from_secs_f64`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::bus::Topic;
use crate::messages::ClockMsg;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A `{sec, nanosec}` timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Time {
    pub sec: u32,
    pub nanosec: u32,
}

impl Time {
    pub fn from_nanos(nanos: u64) -> Self {
        Time {
            sec: (nanos / NANOS_PER_SEC).min(u32::MAX as u64) as u32,
            nanosec: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    /// `sec = floor(t)`, `nanosec = floor(frac(t) * 1e9)`. Negative and
    /// non-finite inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !(secs > 0.0) || !secs.is_finite() {
            return Time::default();
        }
        let whole = secs.floor();
        let nanosec = ((secs - whole) * 1e9).floor().min(999_999_999.0) as u32;
        Time {
            sec: whole.min(u32::MAX as f64) as u32,
            nanosec,
        }
    }

    pub fn as_nanos(&self) -> u64 {
        self.sec as u64 * NANOS_PER_SEC + self.nanosec as u64
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

/// Where the clock gets its time from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClockMode {
    /// Advanced explicitly by the frame tick's elapsed time.
    #[default]
    Simulated,
    /// Sampled from a process-start `Instant` on every frame tick.
    Monotonic,
}

#[derive(Debug)]
struct ClockInner {
    mode: ClockMode,
    origin: Instant,
    /// `f64` seconds, stored as bits.
    simulated_secs: AtomicU64,
    latched_nanos: AtomicU64,
}

/// Shared handle to the process clock.
#[derive(Debug, Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

impl Clock {
    pub fn new(mode: ClockMode) -> Self {
        Clock {
            inner: Arc::new(ClockInner {
                mode,
                origin: Instant::now(),
                simulated_secs: AtomicU64::new(0f64.to_bits()),
                latched_nanos: AtomicU64::new(0),
            }),
        }
    }

    pub fn simulated() -> Self {
        Clock::new(ClockMode::Simulated)
    }

    pub fn monotonic() -> Self {
        Clock::new(ClockMode::Monotonic)
    }

    pub fn mode(&self) -> ClockMode {
        self.inner.mode
    }

    /// Frame tick. Advances the simulated time by `dt` seconds (ignored in
    /// monotonic mode), latches the new value and returns it.
    ///
    /// A negative or non-finite `dt` does not move the clock.
    pub fn tick(&self, dt: f64) -> Time {
        let secs = match self.inner.mode {
            ClockMode::Simulated => {
                let step = if dt > 0.0 && dt.is_finite() {
                    dt
                } else {
                    if dt != 0.0 {
                        warn!(dt, "Ignoring unusable clock step");
                    }
                    0.0
                };
                let advance = |bits| Some((f64::from_bits(bits) + step).to_bits());
                let (Ok(prev) | Err(prev)) =
                    self.inner.simulated_secs.fetch_update(Ordering::AcqRel, Ordering::Acquire, advance);
                f64::from_bits(prev) + step
            }
            ClockMode::Monotonic => self.inner.origin.elapsed().as_secs_f64(),
        };
        let candidate = Time::from_secs_f64(secs).as_nanos();

        let previous = self.inner.latched_nanos.fetch_max(candidate, Ordering::AcqRel);
        Time::from_nanos(previous.max(candidate))
    }

    /// The stamp latched by the most recent frame tick.
    pub fn now(&self) -> Time {
        Time::from_nanos(self.inner.latched_nanos.load(Ordering::Acquire))
    }

    pub fn now_secs(&self) -> f64 {
        self.now().as_secs_f64()
    }
}

/// Publishes the clock on every frame tick.
#[derive(Debug, Clone)]
pub struct ClockBroadcaster {
    clock: Clock,
    topic: Topic<ClockMsg>,
}

impl ClockBroadcaster {
    pub fn new(clock: Clock, topic: Topic<ClockMsg>) -> Self {
        ClockBroadcaster { clock, topic }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn tick(&self, dt: f64) -> Time {
        let stamp = self.clock.tick(dt);
        trace!(sec = stamp.sec, nanosec = stamp.nanosec, "clock");
        self.topic.publish(ClockMsg { clock: stamp });
        stamp
    }
}
