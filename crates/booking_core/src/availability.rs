//! crates/booking_core/src/availability.rs
//!
//! Resolves which doctors of a speciality are free at a selected date and time,
//! and whether a previously chosen doctor survives the new lookup.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use tracing::debug;

use crate::{
    domain::{AvailableDoctor, BookingSelection, DoctorId},
    error::{BookingError, BookingResult, Field},
    ports::DirectoryService,
};

/// A complete availability lookup: one speciality at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub speciality: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl AvailabilityQuery {
    pub fn new(speciality: Option<&str>, date: Option<NaiveDate>, time: Option<NaiveTime>) -> BookingResult<Self> {
        let speciality = speciality
            .filter(|s| !s.trim().is_empty())
            .ok_or(BookingError::MissingSelection(Field::Speciality))?;
        let date = date.ok_or(BookingError::MissingSelection(Field::Date))?;
        let time = time.ok_or(BookingError::MissingSelection(Field::Time))?;
        Ok(Self { speciality: speciality.to_string(), date, time })
    }

    pub fn from_selection(selection: &BookingSelection) -> BookingResult<Self> {
        Self::new(selection.speciality.as_deref(), selection.date, selection.time)
    }

    pub fn at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// The outcome of an availability lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Availability {
    pub doctors: Vec<AvailableDoctor>,
    /// The previous doctor, if they are still among `doctors`.
    pub retained_doctor_id: Option<DoctorId>,
}

impl Availability {
    /// Keeps `previous` only when it appears among the candidates.
    pub fn reconcile(doctors: Vec<AvailableDoctor>, previous: Option<DoctorId>) -> Self {
        let retained_doctor_id = previous.filter(|id| doctors.iter().any(|d| d.id == *id));
        Self { doctors, retained_doctor_id }
    }

    pub fn contains(&self, doctor_id: DoctorId) -> bool {
        self.doctors.iter().any(|d| d.id == doctor_id)
    }
}

#[derive(Clone)]
pub struct AvailabilityResolver {
    directory: Arc<dyn DirectoryService>,
}

impl AvailabilityResolver {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }

    /// Queries the directory for `query` and reconciles the candidates with
    /// `previous_doctor_id`. A directory failure surfaces as `BookingError::Fetch`.
    pub async fn resolve(
        &self,
        query: &AvailabilityQuery,
        previous_doctor_id: Option<DoctorId>,
    ) -> BookingResult<Availability> {
        debug!(
            "Looking up {} doctors available at {}",
            query.speciality,
            query.at()
        );
        let doctors = self
            .directory
            .list_available_doctors(&query.speciality, query.at())
            .await?;
        Ok(Availability::reconcile(doctors, previous_doctor_id))
    }
}
