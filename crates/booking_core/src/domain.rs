//! crates/booking_core/src/domain.rs
//!
//! Defines the pure, core data structures for appointment booking.
//! These structs are independent of any transport or serialization format.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

pub type DoctorId = i64;
pub type AppointmentId = i64;

/// The form state of one in-progress booking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingSelection {
    pub speciality: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub doctor_id: Option<DoctorId>,
    pub reason: String,
}

impl BookingSelection {
    /// The instant described by `date` and `time`, when both are set.
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        match (self.date, self.time) {
            (Some(date), Some(time)) => Some(date.and_time(time)),
            _ => None,
        }
    }

    /// Pre-populates a selection from an existing appointment.
    ///
    /// The doctor is left unset: it only becomes the selection once an
    /// availability lookup confirms it is still free.
    pub fn from_appointment(appointment: &Appointment) -> Self {
        Self {
            speciality: None,
            date: Some(appointment.scheduled_at.date()),
            time: Some(appointment.scheduled_at.time()),
            doctor_id: None,
            reason: appointment.reason.clone(),
        }
    }
}

/// A doctor that the directory reports as free at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableDoctor {
    pub id: DoctorId,
    pub full_name: String,
    pub speciality_name: String,
    pub department_name: String,
    pub profile_image: Option<String>,
    pub working_days: Vec<String>,
}

/// The fee charged for an appointment with a given doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Charge(pub u64);

impl Charge {
    pub fn amount(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Charge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// An appointment as stored by the persistence service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: AppointmentId,
    pub doctor_id: DoctorId,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    pub status: AppointmentStatus,
    pub charges: Option<Charge>,
}

/// The payload sent to create or update an appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentDraft {
    pub doctor_id: DoctorId,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
}
