//! Physical time effect
//!
//! `time-before` caveats are evaluated against whatever clock the gateway is
//! handed. Production uses [`SystemClock`]; tests pin the time with
//! [`FixedClock`].

use chrono::{DateTime, Utc};

/// Wall-clock time source
pub trait PhysicalClock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Operating system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl PhysicalClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    /// Freeze time at `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl PhysicalClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
