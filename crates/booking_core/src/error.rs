//! crates/booking_core/src/error.rs
//!
//! Error kinds raised by the resolvers and the booking session.

use crate::{domain::DoctorId, ports::PortError, session::BookingState};
use std::fmt;

/// A field of the booking form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Speciality,
    Date,
    Time,
    Doctor,
    Reason,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Speciality => "speciality",
            Field::Date => "date",
            Field::Time => "time",
            Field::Doctor => "doctor",
            Field::Reason => "reason",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// A resolver or submission was requested before the form was complete.
    #[error("Missing {0} in the booking selection")]
    MissingSelection(Field),

    #[error("Doctor {0} is not in the current list of available doctors")]
    UnknownDoctor(DoctorId),

    #[error("{0} is not a bookable time for the selected date")]
    UnavailableTime(chrono::NaiveTime),

    #[error("The booking cannot accept this while {0:?}")]
    NotReady(BookingState),

    #[error("A submission is already in flight")]
    SubmissionInFlight,

    #[error("Invalid slot policy: {0}")]
    InvalidPolicy(String),

    /// A directory lookup failed; recoverable by re-triggering the same change.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] PortError),

    #[error("Submission failed: {0}")]
    Submission(PortError),
}

impl BookingError {
    /// Whether the error comes from the caller rather than the backend.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, BookingError::Fetch(_) | BookingError::Submission(_))
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
