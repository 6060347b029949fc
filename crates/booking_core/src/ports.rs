//! crates/booking_core/src/ports.rs
//!
//! Defines the service contracts (traits) the booking core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! core independent of the hospital backend, the transport and the clock.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::domain::{Appointment, AppointmentDraft, AppointmentId, AvailableDoctor, Charge, DoctorId};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, backend).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Lists the names of all medical specialities.
    async fn list_specialities(&self) -> PortResult<Vec<String>>;

    /// Lists the doctors of `speciality` with no conflicting appointment at `at`.
    async fn list_available_doctors(
        &self,
        speciality: &str,
        at: NaiveDateTime,
    ) -> PortResult<Vec<AvailableDoctor>>;

    async fn get_doctor_charge(&self, doctor_id: DoctorId) -> PortResult<Charge>;
}

#[async_trait]
pub trait AppointmentService: Send + Sync {
    async fn get(&self, id: AppointmentId) -> PortResult<Appointment>;

    async fn create(&self, draft: &AppointmentDraft) -> PortResult<Appointment>;

    async fn update(&self, id: AppointmentId, draft: &AppointmentDraft) -> PortResult<Appointment>;
}

/// The severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// A fire-and-forget presentation channel for notices.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Supplies the wall-clock time used for slot generation.
pub trait Clock: Send + Sync {
    /// The current local time. Read on every call, never cached.
    fn now(&self) -> NaiveDateTime;
}
