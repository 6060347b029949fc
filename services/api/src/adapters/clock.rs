//! services/api/src/adapters/clock.rs
//!
//! The wall clock used for slot generation. The clinic works in the server's
//! local time zone.

use booking_core::Clock;
use chrono::{Local, NaiveDateTime};

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
