//! crates/booking_core/src/session.rs
//!
//! The booking session state machine.
//!
//! A `BookingSession` owns one in-progress appointment form. Every user edit and
//! every resolver result is fed to [`BookingSession::handle`], which updates the
//! selection and returns the side effects the caller must perform as
//! [`Command`]s. Lookups carry a [`RequestToken`]; a result is applied only if
//! its token is the latest one issued for that resolver.

use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    availability::{Availability, AvailabilityQuery},
    domain::{
        Appointment, AppointmentDraft, AppointmentId, AvailableDoctor, BookingSelection, Charge,
        DoctorId,
    },
    error::{BookingError, BookingResult, Field},
    ports::{Clock, Notice, PortResult},
    slots::{self, SlotPolicy},
};

//=========================================================================================
// Request Sequencing
//=========================================================================================

/// Identifies one issued lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// Issues tokens for one resolver and recognises the authoritative one.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: u64,
    pending: bool,
}

impl RequestSequence {
    /// Issues a new token, superseding every earlier one.
    pub fn issue(&mut self) -> RequestToken {
        self.latest += 1;
        self.pending = true;
        RequestToken(self.latest)
    }

    /// Supersedes every issued token without issuing a new one.
    pub fn invalidate(&mut self) {
        self.latest += 1;
        self.pending = false;
    }

    /// Returns true, at most once, for the latest issued token.
    pub fn accept(&mut self, token: RequestToken) -> bool {
        if self.pending && token.0 == self.latest {
            self.pending = false;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

//=========================================================================================
// States, Events and Commands
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    Empty,
    SpecialitySelected,
    DateTimeSelected,
    DoctorListLoading,
    DoctorListReady,
    DoctorSelected,
    Submitting,
    Success,
    Failed,
}

/// Whether the session creates a new appointment or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingMode {
    New,
    Edit {
        appointment_id: AppointmentId,
        original_doctor_id: DoctorId,
    },
}

#[derive(Debug, Clone)]
pub enum BookingEvent {
    SpecialityChanged(Option<String>),
    DateChanged(Option<NaiveDate>),
    TimeChanged(Option<NaiveTime>),
    DoctorChosen(Option<DoctorId>),
    ReasonChanged(String),
    Submit,
    DoctorsResolved {
        token: RequestToken,
        result: BookingResult<Availability>,
    },
    ChargeResolved {
        token: RequestToken,
        result: BookingResult<Charge>,
    },
    SubmissionFinished(PortResult<Appointment>),
}

/// A side effect requested by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ResolveDoctors {
        token: RequestToken,
        query: AvailabilityQuery,
        previous_doctor_id: Option<DoctorId>,
    },
    ResolveCharge {
        token: RequestToken,
        doctor_id: DoctorId,
    },
    Create(AppointmentDraft),
    Update {
        id: AppointmentId,
        draft: AppointmentDraft,
    },
    Notify(Notice),
    /// The booking succeeded; the form should close.
    Close(Appointment),
}

//=========================================================================================
// The Session
//=========================================================================================

pub struct BookingSession {
    mode: BookingMode,
    selection: BookingSelection,
    state: BookingState,
    policy: SlotPolicy,
    clock: Arc<dyn Clock>,
    doctors: Vec<AvailableDoctor>,
    charge: Option<Charge>,
    doctor_requests: RequestSequence,
    charge_requests: RequestSequence,
}

impl BookingSession {
    /// Opens an empty session for a new appointment.
    pub fn new(policy: SlotPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            mode: BookingMode::New,
            selection: BookingSelection::default(),
            state: BookingState::Empty,
            policy,
            clock,
            doctors: Vec::new(),
            charge: None,
            doctor_requests: RequestSequence::default(),
            charge_requests: RequestSequence::default(),
        }
    }

    /// Opens a session that edits `appointment`. Its doctor is kept if still
    /// available once a speciality is chosen.
    pub fn for_appointment(appointment: &Appointment, policy: SlotPolicy, clock: Arc<dyn Clock>) -> Self {
        let mut session = Self::new(policy, clock);
        session.mode = BookingMode::Edit {
            appointment_id: appointment.id,
            original_doctor_id: appointment.doctor_id,
        };
        session.selection = BookingSelection::from_appointment(appointment);
        session.state = session.settled_state();
        session
    }

    pub fn mode(&self) -> BookingMode {
        self.mode
    }

    pub fn state(&self) -> BookingState {
        self.state
    }

    pub fn selection(&self) -> &BookingSelection {
        &self.selection
    }

    pub fn doctors(&self) -> &[AvailableDoctor] {
        &self.doctors
    }

    pub fn charge(&self) -> Option<Charge> {
        self.charge
    }

    pub fn policy(&self) -> &SlotPolicy {
        &self.policy
    }

    /// The bookable slots for the selected date, computed against the clock.
    pub fn slots(&self) -> Vec<NaiveTime> {
        match self.selection.date {
            Some(date) => slots::generate(date, self.clock.now(), &self.policy),
            None => Vec::new(),
        }
    }

    /// Applies `event` and returns the commands to execute.
    ///
    /// Precondition violations are returned as errors and leave the session
    /// untouched. Fetch and submission failures are absorbed into the state
    /// and reported through `Command::Notify`.
    pub fn handle(&mut self, event: BookingEvent) -> BookingResult<Vec<Command>> {
        match event {
            BookingEvent::SpecialityChanged(speciality) => {
                self.ensure_editable()?;
                let speciality = speciality.filter(|s| !s.trim().is_empty());
                if speciality == self.selection.speciality {
                    return Ok(Vec::new());
                }
                self.selection.speciality = speciality;
                let mut commands = Vec::new();
                self.clear_doctor();
                self.refresh_doctors(&mut commands);
                Ok(commands)
            }
            BookingEvent::DateChanged(date) => {
                self.ensure_editable()?;
                self.selection.date = date;
                self.selection.time = None;
                let mut commands = Vec::new();
                self.refresh_doctors(&mut commands);
                Ok(commands)
            }
            BookingEvent::TimeChanged(time) => {
                self.ensure_editable()?;
                if let Some(time) = time {
                    if self.selection.date.is_none() {
                        return Err(BookingError::MissingSelection(Field::Date));
                    }
                    if !self.slots().contains(&time) {
                        return Err(BookingError::UnavailableTime(time));
                    }
                }
                self.selection.time = time;
                let mut commands = Vec::new();
                self.refresh_doctors(&mut commands);
                Ok(commands)
            }
            BookingEvent::DoctorChosen(doctor_id) => self.choose_doctor(doctor_id),
            BookingEvent::ReasonChanged(reason) => {
                self.ensure_editable()?;
                self.selection.reason = reason;
                Ok(Vec::new())
            }
            BookingEvent::Submit => self.submit(),
            BookingEvent::DoctorsResolved { token, result } => Ok(self.apply_doctors(token, result)),
            BookingEvent::ChargeResolved { token, result } => Ok(self.apply_charge(token, result)),
            BookingEvent::SubmissionFinished(result) => Ok(self.apply_submission(result)),
        }
    }

    fn ensure_editable(&self) -> BookingResult<()> {
        match self.state {
            BookingState::Submitting => Err(BookingError::SubmissionInFlight),
            BookingState::Success => Err(BookingError::NotReady(BookingState::Success)),
            _ => Ok(()),
        }
    }

    /// Issues an availability lookup when the selection is complete, otherwise
    /// drops the doctor list and any lookup still in flight.
    fn refresh_doctors(&mut self, commands: &mut Vec<Command>) {
        match AvailabilityQuery::from_selection(&self.selection) {
            Ok(query) => {
                let token = self.doctor_requests.issue();
                let previous_doctor_id = self.selection.doctor_id.or(match self.mode {
                    BookingMode::Edit { original_doctor_id, .. } => Some(original_doctor_id),
                    BookingMode::New => None,
                });
                debug!("Issuing availability lookup {:?} for {:?}", token, query);
                self.state = BookingState::DoctorListLoading;
                commands.push(Command::ResolveDoctors { token, query, previous_doctor_id });
            }
            Err(_) => {
                self.doctor_requests.invalidate();
                self.doctors.clear();
                self.clear_doctor();
                self.state = self.settled_state();
            }
        }
    }

    fn settled_state(&self) -> BookingState {
        let selection = &self.selection;
        let has_date_time = selection.date.is_some() && selection.time.is_some();
        match (selection.speciality.is_some(), has_date_time) {
            (true, _) => BookingState::SpecialitySelected,
            (false, true) => BookingState::DateTimeSelected,
            (false, false) => BookingState::Empty,
        }
    }

    fn clear_doctor(&mut self) {
        self.selection.doctor_id = None;
        self.charge = None;
        self.charge_requests.invalidate();
    }

    fn select_doctor(&mut self, doctor_id: DoctorId, commands: &mut Vec<Command>) {
        let unchanged = self.selection.doctor_id == Some(doctor_id);
        self.state = BookingState::DoctorSelected;
        if unchanged && (self.charge.is_some() || self.charge_requests.is_pending()) {
            return;
        }
        self.selection.doctor_id = Some(doctor_id);
        self.charge = None;
        let token = self.charge_requests.issue();
        commands.push(Command::ResolveCharge { token, doctor_id });
    }

    fn choose_doctor(&mut self, doctor_id: Option<DoctorId>) -> BookingResult<Vec<Command>> {
        self.ensure_editable()?;
        match self.state {
            BookingState::DoctorListReady | BookingState::DoctorSelected | BookingState::Failed => {}
            state => return Err(BookingError::NotReady(state)),
        }
        let mut commands = Vec::new();
        match doctor_id {
            Some(id) => {
                if !self.doctors.iter().any(|d| d.id == id) {
                    return Err(BookingError::UnknownDoctor(id));
                }
                self.select_doctor(id, &mut commands);
            }
            None => {
                self.clear_doctor();
                self.state = BookingState::DoctorListReady;
            }
        }
        Ok(commands)
    }

    fn submit(&mut self) -> BookingResult<Vec<Command>> {
        self.ensure_editable()?;
        let doctor_id = self
            .selection
            .doctor_id
            .ok_or(BookingError::MissingSelection(Field::Doctor))?;
        let date = self.selection.date.ok_or(BookingError::MissingSelection(Field::Date))?;
        let time = self.selection.time.ok_or(BookingError::MissingSelection(Field::Time))?;
        if self.selection.reason.trim().is_empty() {
            return Err(BookingError::MissingSelection(Field::Reason));
        }
        match self.state {
            BookingState::DoctorSelected | BookingState::Failed => {}
            state => return Err(BookingError::NotReady(state)),
        }

        let draft = AppointmentDraft {
            doctor_id,
            scheduled_at: date.and_time(time),
            reason: self.selection.reason.trim().to_string(),
        };
        self.state = BookingState::Submitting;
        let command = match self.mode {
            BookingMode::New => Command::Create(draft),
            BookingMode::Edit { appointment_id, .. } => Command::Update { id: appointment_id, draft },
        };
        Ok(vec![command])
    }

    fn apply_doctors(&mut self, token: RequestToken, result: BookingResult<Availability>) -> Vec<Command> {
        if self.state == BookingState::Success || !self.doctor_requests.accept(token) {
            debug!("Discarding stale availability result {:?}", token);
            return Vec::new();
        }
        let mut commands = Vec::new();
        match result {
            Ok(availability) => {
                self.doctors = availability.doctors;
                match availability.retained_doctor_id {
                    Some(id) => self.select_doctor(id, &mut commands),
                    None => {
                        self.clear_doctor();
                        self.state = BookingState::DoctorListReady;
                    }
                }
            }
            Err(e) => {
                warn!("Availability lookup failed: {}", e);
                self.doctors.clear();
                self.clear_doctor();
                self.state = BookingState::DoctorListReady;
                commands.push(Command::Notify(Notice::error("Failed to load available doctors")));
            }
        }
        commands
    }

    fn apply_charge(&mut self, token: RequestToken, result: BookingResult<Charge>) -> Vec<Command> {
        if !self.charge_requests.accept(token) {
            debug!("Discarding stale charge result {:?}", token);
            return Vec::new();
        }
        match result {
            Ok(charge) => {
                self.charge = Some(charge);
                Vec::new()
            }
            Err(e) => {
                warn!("Charge lookup failed: {}", e);
                self.charge = None;
                vec![Command::Notify(Notice::error("Failed to load appointment charges"))]
            }
        }
    }

    fn apply_submission(&mut self, result: PortResult<Appointment>) -> Vec<Command> {
        if self.state != BookingState::Submitting {
            debug!("Ignoring submission result outside of Submitting");
            return Vec::new();
        }
        match result {
            Ok(appointment) => {
                self.state = BookingState::Success;
                let message = match self.mode {
                    BookingMode::New => "Appointment created successfully",
                    BookingMode::Edit { .. } => "Appointment updated successfully",
                };
                vec![Command::Notify(Notice::success(message)), Command::Close(appointment)]
            }
            Err(e) => {
                warn!("Appointment submission failed: {}", e);
                self.state = BookingState::Failed;
                vec![Command::Notify(Notice::error(BookingError::Submission(e).to_string()))]
            }
        }
    }
}
