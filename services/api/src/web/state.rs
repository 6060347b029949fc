//! services/api/src/web/state.rs
//!
//! Defines the application's shared and connection-specific states.

use crate::{adapters::HospitalApiAdapter, config::Config};
use booking_core::{
    AppointmentId, AppointmentService, AvailabilityResolver, BookingSession, ChargeResolver, Clock,
    DirectoryService, Notice, PortResult,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

//=========================================================================================
// Backend Access
//=========================================================================================

/// Hands out backend ports that act on behalf of one caller.
pub trait BackendConnector: Send + Sync {
    fn directory(&self, token: Option<String>) -> Arc<dyn DirectoryService>;
    fn appointments(&self, token: Option<String>) -> Arc<dyn AppointmentService>;
}

impl BackendConnector for HospitalApiAdapter {
    fn directory(&self, token: Option<String>) -> Arc<dyn DirectoryService> {
        Arc::new(self.authorized(token))
    }

    fn appointments(&self, token: Option<String>) -> Arc<dyn AppointmentService> {
        Arc::new(self.authorized(token))
    }
}

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn BackendConnector>,
    pub clock: Arc<dyn Clock>,
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single booking form, owned by its WebSocket connection.
pub struct SessionState {
    pub booking: BookingSession,
    pub specialities: Vec<String>,
    pub availability: AvailabilityResolver,
    pub charges: ChargeResolver,
    pub appointments: Arc<dyn AppointmentService>,
    /// Cancels every lookup still in flight when the connection ends.
    pub cancellation_token: CancellationToken,
}

impl SessionState {
    /// Opens a booking form for the caller holding `token`, editing
    /// `appointment_id` when one is given.
    ///
    /// Failing to load the specialities is reported as a notice; failing to
    /// load the appointment being edited is an error.
    pub async fn new(
        app_state: &AppState,
        token: Option<String>,
        appointment_id: Option<AppointmentId>,
    ) -> PortResult<(Self, Vec<Notice>)> {
        let directory = app_state.backend.directory(token.clone());
        let appointments = app_state.backend.appointments(token);
        let policy = app_state.config.slot_policy;

        let booking = match appointment_id {
            Some(id) => {
                let appointment = appointments.get(id).await?;
                BookingSession::for_appointment(&appointment, policy, app_state.clock.clone())
            }
            None => BookingSession::new(policy, app_state.clock.clone()),
        };

        let mut notices = Vec::new();
        let specialities = match directory.list_specialities().await {
            Ok(specialities) => specialities,
            Err(e) => {
                warn!("Failed to load specialities: {}", e);
                notices.push(Notice::error("Failed to load specialities"));
                Vec::new()
            }
        };

        Ok((
            Self {
                booking,
                specialities,
                availability: AvailabilityResolver::new(directory.clone()),
                charges: ChargeResolver::new(directory),
                appointments,
                cancellation_token: CancellationToken::new(),
            },
            notices,
        ))
    }
}
