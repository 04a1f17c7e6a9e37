//! Wall clock and blocking wait, behind a trait so the rate-limit wait can be tested
use std::time::Duration;

use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::automock;
#[cfg_attr(test, automock)]
pub trait ClockTrait {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl ClockTrait for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
