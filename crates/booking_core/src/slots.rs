//! crates/booking_core/src/slots.rs
//!
//! Generates the bookable time slots for a date.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::cmp::max;

use crate::error::{BookingError, BookingResult};

/// Business hours and slot granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    open: NaiveTime,
    close: NaiveTime,
    step_minutes: u32,
}

impl SlotPolicy {
    pub fn new(open: NaiveTime, close: NaiveTime, step_minutes: u32) -> BookingResult<Self> {
        if step_minutes == 0 || step_minutes > 24 * 60 {
            return Err(BookingError::InvalidPolicy(format!(
                "slot step must be between 1 and 1440 minutes, got {}",
                step_minutes
            )));
        }
        if open > close {
            return Err(BookingError::InvalidPolicy(format!(
                "opening time {} is after closing time {}",
                open.format("%H:%M"),
                close.format("%H:%M")
            )));
        }
        Ok(Self { open, close, step_minutes })
    }

    pub fn open(&self) -> NaiveTime {
        self.open
    }

    pub fn close(&self) -> NaiveTime {
        self.close
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    fn step_seconds(&self) -> u32 {
        self.step_minutes * 60
    }
}

impl Default for SlotPolicy {
    /// 09:00 to 17:00 in half-hour steps.
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            step_minutes: 30,
        }
    }
}

/// Returns every slot of `date` that can still be booked at
/// `reference_now`, from the earliest allowed slot through closing time.
///
/// Slots are whole steps after opening time. For today the earliest slot is
/// `reference_now` rounded up to the next slot (a time exactly on a slot is
/// kept), but never before opening.
/// Future dates start at opening time. Past dates have no slots.
pub fn generate(date: NaiveDate, reference_now: NaiveDateTime, policy: &SlotPolicy) -> Vec<NaiveTime> {
    let today = reference_now.date();
    if date < today {
        return Vec::new();
    }

    let floor = if date == today {
        max(reference_now.time(), policy.open)
    } else {
        policy.open
    };

    let step = policy.step_seconds();
    let first = ceil_to_step(floor, policy.open, step);
    let close = policy.close.num_seconds_from_midnight();

    (first..=close)
        .step_by(step as usize)
        .filter_map(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
        .collect()
}

/// Seconds since midnight of `time`, rounded up to the next slot counted in
/// whole steps from `open`. `time` must not be before `open`.
/// Any sub-second remainder counts as being past the boundary.
fn ceil_to_step(time: NaiveTime, open: NaiveTime, step: u32) -> u32 {
    let secs = time.num_seconds_from_midnight();
    let rem = (secs - open.num_seconds_from_midnight()) % step;
    if rem == 0 && time.nanosecond() <= open.nanosecond() {
        secs
    } else {
        secs - rem + step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, s).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    }

    #[test]
    fn future_dates_cover_business_hours() {
        let slots = generate(today().succ_opt().unwrap(), at(today(), 10, 5, 0), &SlotPolicy::default());
        assert_eq!(slots.len(), 17);
        assert_eq!(slots.first(), Some(&hm(9, 0)));
        assert_eq!(slots.last(), Some(&hm(17, 0)));
        assert!(slots.windows(2).all(|w| w[1] - w[0] == chrono::Duration::minutes(30)));
    }

    #[test]
    fn today_rounds_up_to_next_half_hour() {
        let slots = generate(today(), at(today(), 10, 5, 0), &SlotPolicy::default());
        assert_eq!(slots.first(), Some(&hm(10, 30)));
        assert_eq!(slots.last(), Some(&hm(17, 0)));
        assert_eq!(slots.len(), 14);
    }

    #[test]
    fn boundary_is_kept() {
        let slots = generate(today(), at(today(), 10, 30, 0), &SlotPolicy::default());
        assert_eq!(slots.first(), Some(&hm(10, 30)));
    }

    #[test]
    fn seconds_past_boundary_move_to_next_slot() {
        let slots = generate(today(), at(today(), 10, 30, 15), &SlotPolicy::default());
        assert_eq!(slots.first(), Some(&hm(11, 0)));
    }

    #[test]
    fn after_closing_is_empty() {
        assert!(generate(today(), at(today(), 17, 1, 0), &SlotPolicy::default()).is_empty());
        assert!(generate(today(), at(today(), 23, 59, 59), &SlotPolicy::default()).is_empty());
    }

    #[test]
    fn closing_time_itself_is_bookable() {
        assert_eq!(
            generate(today(), at(today(), 16, 45, 0), &SlotPolicy::default()),
            vec![hm(17, 0)]
        );
    }

    #[test]
    fn early_morning_starts_at_opening() {
        let slots = generate(today(), at(today(), 7, 10, 0), &SlotPolicy::default());
        assert_eq!(slots.first(), Some(&hm(9, 0)));
        assert_eq!(slots.len(), 17);
    }

    #[test]
    fn past_dates_have_no_slots() {
        let yesterday = today().pred_opt().unwrap();
        assert!(generate(yesterday, at(today(), 8, 0, 0), &SlotPolicy::default()).is_empty());
    }

    #[test]
    fn generation_is_idempotent() {
        let now = at(today(), 12, 44, 0);
        let policy = SlotPolicy::default();
        assert_eq!(generate(today(), now, &policy), generate(today(), now, &policy));
    }

    #[test]
    fn custom_policy_uses_its_own_step() {
        let policy = SlotPolicy::new(hm(8, 0), hm(9, 0), 15).unwrap();
        let slots = generate(today().succ_opt().unwrap(), at(today(), 0, 0, 0), &policy);
        assert_eq!(slots, vec![hm(8, 0), hm(8, 15), hm(8, 30), hm(8, 45), hm(9, 0)]);
    }

    #[test]
    fn unaligned_opening_time_anchors_the_slots() {
        let policy = SlotPolicy::new(hm(9, 10), hm(10, 30), 30).unwrap();

        let slots = generate(today().succ_opt().unwrap(), at(today(), 8, 0, 0), &policy);
        assert_eq!(slots, vec![hm(9, 10), hm(9, 40), hm(10, 10)]);

        let slots = generate(today(), at(today(), 9, 25, 0), &policy);
        assert_eq!(slots, vec![hm(9, 40), hm(10, 10)]);

        let slots = generate(today(), at(today(), 9, 40, 0), &policy);
        assert_eq!(slots.first(), Some(&hm(9, 40)));
    }

    #[test]
    fn invalid_policies_are_rejected() {
        assert!(SlotPolicy::new(hm(9, 0), hm(17, 0), 0).is_err());
        assert!(SlotPolicy::new(hm(18, 0), hm(17, 0), 30).is_err());
    }
}
