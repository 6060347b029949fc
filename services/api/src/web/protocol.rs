//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the booking form in the
//! browser and the gateway. Times travel as `HH:MM`, dates as `YYYY-MM-DD`.

use booking_core::{
    Appointment, AppointmentStatus, AvailableDoctor, BookingMode, BookingSession, BookingState,
    Notice, NoticeLevel,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const TIME_FORMAT: &str = "%H:%M";

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the booking form. This must be the first message sent on the connection.
    /// With an `appointment_id` the form edits that appointment.
    Init {
        #[serde(default)]
        appointment_id: Option<i64>,
    },

    SelectSpeciality { speciality: Option<String> },

    /// Selecting a date always clears the selected time.
    SelectDate { date: Option<NaiveDate> },

    SelectTime { time: Option<NaiveTime> },

    SelectDoctor { doctor_id: Option<i64> },

    SetReason { reason: String },

    Submit,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the form is open and lists the specialities to choose from.
    SessionInitialized {
        editing: Option<i64>,
        specialities: Vec<String>,
        booking: BookingSnapshot,
    },

    /// The form changed; the client re-renders from this snapshot.
    BookingUpdated { booking: BookingSnapshot },

    /// A toast for the user.
    Notice { level: NoticeLevelView, message: String },

    /// A rejected message or a fatal error.
    Error { message: String },

    /// The appointment was saved; the form should close.
    Closed { appointment: AppointmentView },
}

//=========================================================================================
// Views
//=========================================================================================

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevelView {
    Success,
    Error,
}

impl From<&Notice> for ServerMessage {
    fn from(notice: &Notice) -> Self {
        let level = match notice.level {
            NoticeLevel::Success => NoticeLevelView::Success,
            NoticeLevel::Error => NoticeLevelView::Error,
        };
        ServerMessage::Notice { level, message: notice.message.clone() }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct DoctorView {
    pub id: i64,
    pub full_name: String,
    pub speciality: String,
    pub department: String,
    pub profile_image: Option<String>,
    pub working_days: Vec<String>,
}

impl From<&AvailableDoctor> for DoctorView {
    fn from(doctor: &AvailableDoctor) -> Self {
        Self {
            id: doctor.id,
            full_name: doctor.full_name.clone(),
            speciality: doctor.speciality_name.clone(),
            department: doctor.department_name.clone(),
            profile_image: doctor.profile_image.clone(),
            working_days: doctor.working_days.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AppointmentView {
    pub id: i64,
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub time: String,
    pub reason: String,
    pub status: &'static str,
    pub charges: Option<u64>,
}

impl From<&Appointment> for AppointmentView {
    fn from(appointment: &Appointment) -> Self {
        let status = match appointment.status {
            AppointmentStatus::Scheduled => "Scheduled",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        };
        Self {
            id: appointment.id,
            doctor_id: appointment.doctor_id,
            date: appointment.scheduled_at.date(),
            time: appointment.scheduled_at.format(TIME_FORMAT).to_string(),
            reason: appointment.reason.clone(),
            status,
            charges: appointment.charges.map(|c| c.amount()),
        }
    }
}

/// Everything the form needs to render.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BookingSnapshot {
    pub state: &'static str,
    pub speciality: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub doctor_id: Option<i64>,
    pub reason: String,
    pub slots: Vec<String>,
    pub doctors: Vec<DoctorView>,
    pub loading_doctors: bool,
    pub charge: Option<u64>,
}

impl From<&BookingSession> for BookingSnapshot {
    fn from(session: &BookingSession) -> Self {
        let selection = session.selection();
        Self {
            state: state_name(session.state()),
            speciality: selection.speciality.clone(),
            date: selection.date,
            time: selection.time.map(|t| t.format(TIME_FORMAT).to_string()),
            doctor_id: selection.doctor_id,
            reason: selection.reason.clone(),
            slots: session
                .slots()
                .iter()
                .map(|t| t.format(TIME_FORMAT).to_string())
                .collect(),
            doctors: session.doctors().iter().map(DoctorView::from).collect(),
            loading_doctors: session.state() == BookingState::DoctorListLoading,
            charge: session.charge().map(|c| c.amount()),
        }
    }
}

pub fn editing(session: &BookingSession) -> Option<i64> {
    match session.mode() {
        BookingMode::Edit { appointment_id, .. } => Some(appointment_id),
        BookingMode::New => None,
    }
}

fn state_name(state: BookingState) -> &'static str {
    match state {
        BookingState::Empty => "empty",
        BookingState::SpecialitySelected => "speciality_selected",
        BookingState::DateTimeSelected => "date_time_selected",
        BookingState::DoctorListLoading => "doctor_list_loading",
        BookingState::DoctorListReady => "doctor_list_ready",
        BookingState::DoctorSelected => "doctor_selected",
        BookingState::Submitting => "submitting",
        BookingState::Success => "success",
        BookingState::Failed => "failed",
    }
}
