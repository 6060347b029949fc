//! services/api/src/web/booking_task.rs
//!
//! Executes the commands a booking session emits. Lookups and submissions run
//! as spawned tasks whose results are fed back to the connection loop as
//! `BookingEvent`s; notices go straight to the client.

use crate::web::{
    protocol::{AppointmentView, ServerMessage},
    state::SessionState,
};
use booking_core::{BookingEvent, Command, Notice, NotificationSink};
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Channel of messages waiting to be written to the socket.
pub type Outbox = UnboundedSender<ServerMessage>;

/// A `NotificationSink` that delivers notices over the connection's outbox.
#[derive(Clone)]
pub struct WsNotifier {
    outbox: Outbox,
}

impl WsNotifier {
    pub fn new(outbox: Outbox) -> Self {
        Self { outbox }
    }
}

impl NotificationSink for WsNotifier {
    fn notify(&self, notice: Notice) {
        if self.outbox.send(ServerMessage::from(&notice)).is_err() {
            debug!("Dropping notice for closed connection: {}", notice.message);
        }
    }
}

/// What the connection loop should do after a batch of commands.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Runs `commands` for `session`. Results of asynchronous work arrive later on `events`.
pub fn execute(
    commands: Vec<Command>,
    session: &SessionState,
    events: &UnboundedSender<BookingEvent>,
    notifier: &dyn NotificationSink,
    outbox: &Outbox,
) -> Flow {
    let mut flow = Flow::Continue;
    for command in commands {
        match command {
            Command::ResolveDoctors { token, query, previous_doctor_id } => {
                let resolver = session.availability.clone();
                spawn_until_cancelled(&session.cancellation_token, events.clone(), async move {
                    let result = resolver.resolve(&query, previous_doctor_id).await;
                    BookingEvent::DoctorsResolved { token, result }
                });
            }
            Command::ResolveCharge { token, doctor_id } => {
                let resolver = session.charges.clone();
                spawn_until_cancelled(&session.cancellation_token, events.clone(), async move {
                    let result = resolver.resolve(doctor_id).await;
                    BookingEvent::ChargeResolved { token, result }
                });
            }
            Command::Create(draft) => {
                info!("Submitting new appointment with doctor {}", draft.doctor_id);
                let appointments = session.appointments.clone();
                spawn_until_cancelled(&session.cancellation_token, events.clone(), async move {
                    BookingEvent::SubmissionFinished(appointments.create(&draft).await)
                });
            }
            Command::Update { id, draft } => {
                info!("Submitting changes to appointment {}", id);
                let appointments = session.appointments.clone();
                spawn_until_cancelled(&session.cancellation_token, events.clone(), async move {
                    BookingEvent::SubmissionFinished(appointments.update(id, &draft).await)
                });
            }
            Command::Notify(notice) => notifier.notify(notice),
            Command::Close(appointment) => {
                info!("Appointment {} saved. Closing booking form.", appointment.id);
                let closed = ServerMessage::Closed { appointment: AppointmentView::from(&appointment) };
                if outbox.send(closed).is_err() {
                    warn!("Connection closed before the Closed message was sent.");
                }
                flow = Flow::Close;
            }
        }
    }
    flow
}

/// Spawns `work` and forwards its event unless the connection is cancelled first.
fn spawn_until_cancelled<F>(cancellation_token: &CancellationToken, events: UnboundedSender<BookingEvent>, work: F)
where
    F: Future<Output = BookingEvent> + Send + 'static,
{
    let token = cancellation_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Booking task cancelled.");
            }
            event = work => {
                if events.send(event).is_err() {
                    debug!("Booking connection gone; dropping result.");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        web::{
            protocol::NoticeLevelView,
            state::{AppState, BackendConnector},
        },
    };
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use booking_core::{
        Appointment, AppointmentDraft, AppointmentId, AppointmentService, AppointmentStatus,
        AvailableDoctor, BookingState, Charge, Clock, DirectoryService, DoctorId, PortError,
        PortResult,
    };
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
    use std::{collections::HashMap, sync::Arc};
    use tokio::sync::{
        mpsc::{self, UnboundedReceiver},
        Notify,
    };

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    /// A hospital backend whose lookups for `held_time` wait until `release` is notified.
    /// Doctor ids encode the looked-up time, e.g. 930 for 09:30.
    #[derive(Default)]
    struct FakeHospital {
        held_time: Option<NaiveTime>,
        release: Notify,
    }

    impl FakeHospital {
        fn holding(time: NaiveTime) -> Self {
            Self { held_time: Some(time), release: Notify::new() }
        }
    }

    #[async_trait]
    impl DirectoryService for FakeHospital {
        async fn list_specialities(&self) -> PortResult<Vec<String>> {
            Ok(vec!["Cardiology".to_string()])
        }

        async fn list_available_doctors(&self, speciality: &str, at: NaiveDateTime) -> PortResult<Vec<AvailableDoctor>> {
            if self.held_time == Some(at.time()) {
                self.release.notified().await;
            }
            let id = DoctorId::from(at.hour() * 100 + at.minute());
            Ok(vec![AvailableDoctor {
                id,
                full_name: format!("Dr. {}", id),
                speciality_name: speciality.to_string(),
                department_name: "Heart Centre".to_string(),
                profile_image: None,
                working_days: Vec::new(),
            }])
        }

        async fn get_doctor_charge(&self, _doctor_id: DoctorId) -> PortResult<Charge> {
            Ok(Charge(1500))
        }
    }

    #[async_trait]
    impl AppointmentService for FakeHospital {
        async fn get(&self, id: AppointmentId) -> PortResult<Appointment> {
            Err(PortError::NotFound(format!("appointment {}", id)))
        }

        async fn create(&self, draft: &AppointmentDraft) -> PortResult<Appointment> {
            self.update(42, draft).await
        }

        async fn update(&self, id: AppointmentId, draft: &AppointmentDraft) -> PortResult<Appointment> {
            Ok(Appointment {
                id,
                doctor_id: draft.doctor_id,
                scheduled_at: draft.scheduled_at,
                reason: draft.reason.clone(),
                status: AppointmentStatus::Scheduled,
                charges: Some(Charge(1500)),
            })
        }
    }

    struct FakeBackend(Arc<FakeHospital>);

    impl BackendConnector for FakeBackend {
        fn directory(&self, _token: Option<String>) -> Arc<dyn DirectoryService> {
            self.0.clone()
        }

        fn appointments(&self, _token: Option<String>) -> Arc<dyn AppointmentService> {
            self.0.clone()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()
    }

    fn tomorrow() -> NaiveDate {
        today().succ_opt().unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    /// The pieces of one booking connection, without the socket.
    struct Connection {
        session: SessionState,
        events_tx: UnboundedSender<BookingEvent>,
        events_rx: UnboundedReceiver<BookingEvent>,
        outbox: Outbox,
        outbox_rx: UnboundedReceiver<ServerMessage>,
    }

    impl Connection {
        async fn open(hospital: Arc<FakeHospital>) -> Self {
            let vars = HashMap::from([("HOSPITAL_API_URL", "http://hospital.test".to_string())]);
            let config = Config::from_vars(|name| vars.get(name).cloned()).unwrap();
            let app_state = AppState {
                config: Arc::new(config),
                backend: Arc::new(FakeBackend(hospital)),
                clock: Arc::new(FixedClock(today().and_hms_opt(10, 5, 0).unwrap())),
            };
            let (session, notices) = SessionState::new(&app_state, Some("token".to_string()), None)
                .await
                .unwrap();
            assert!(notices.is_empty());

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let (outbox, outbox_rx) = mpsc::unbounded_channel();
            Self { session, events_tx, events_rx, outbox, outbox_rx }
        }

        fn handle(&mut self, event: BookingEvent) -> Flow {
            let commands = self.session.booking.handle(event).unwrap();
            let notifier = WsNotifier::new(self.outbox.clone());
            execute(commands, &self.session, &self.events_tx, &notifier, &self.outbox)
        }

        async fn next_result(&mut self) -> Flow {
            let event = self.events_rx.recv().await.unwrap();
            self.handle(event)
        }

        fn doctor_ids(&self) -> Vec<DoctorId> {
            self.session.booking.doctors().iter().map(|d| d.id).collect()
        }
    }

    #[tokio::test]
    async fn saved_booking_notifies_before_closing() {
        let mut conn = Connection::open(Arc::new(FakeHospital::default())).await;

        conn.handle(BookingEvent::SpecialityChanged(Some("Cardiology".to_string())));
        conn.handle(BookingEvent::DateChanged(Some(tomorrow())));
        assert_eq!(conn.handle(BookingEvent::TimeChanged(Some(hm(10, 0)))), Flow::Continue);
        conn.next_result().await;
        assert_eq!(conn.session.booking.state(), BookingState::DoctorListReady);

        conn.handle(BookingEvent::DoctorChosen(Some(1000)));
        conn.next_result().await;
        assert_eq!(conn.session.booking.charge(), Some(Charge(1500)));

        conn.handle(BookingEvent::ReasonChanged("Checkup".to_string()));
        conn.handle(BookingEvent::Submit);
        assert_eq!(conn.next_result().await, Flow::Close);

        let mut sent = Vec::new();
        while let Ok(message) = conn.outbox_rx.try_recv() {
            sent.push(message);
        }
        assert_matches!(
            sent.as_slice(),
            [
                ServerMessage::Notice { level: NoticeLevelView::Success, message },
                ServerMessage::Closed { appointment },
            ] if message == "Appointment created successfully"
                && appointment.id == 42
                && appointment.doctor_id == 1000
        );
    }

    #[tokio::test]
    async fn late_lookup_from_superseded_time_is_discarded() {
        let hospital = Arc::new(FakeHospital::holding(hm(9, 0)));
        let mut conn = Connection::open(hospital.clone()).await;

        conn.handle(BookingEvent::SpecialityChanged(Some("Cardiology".to_string())));
        conn.handle(BookingEvent::DateChanged(Some(tomorrow())));
        conn.handle(BookingEvent::TimeChanged(Some(hm(9, 0))));
        conn.handle(BookingEvent::TimeChanged(Some(hm(9, 30))));

        conn.next_result().await;
        assert_eq!(conn.doctor_ids(), vec![930]);
        assert_eq!(conn.session.booking.state(), BookingState::DoctorListReady);

        hospital.release.notify_one();
        let late = conn.events_rx.recv().await.unwrap();
        assert_matches!(late, BookingEvent::DoctorsResolved { .. });
        let commands = conn.session.booking.handle(late).unwrap();
        assert!(commands.is_empty());
        assert_eq!(conn.doctor_ids(), vec![930]);
        assert_eq!(conn.session.booking.selection().time, Some(hm(9, 30)));
    }

    #[tokio::test]
    async fn closing_the_connection_drops_lookups_in_flight() {
        let mut conn = Connection::open(Arc::new(FakeHospital::holding(hm(9, 0)))).await;

        conn.handle(BookingEvent::SpecialityChanged(Some("Cardiology".to_string())));
        conn.handle(BookingEvent::DateChanged(Some(tomorrow())));
        conn.handle(BookingEvent::TimeChanged(Some(hm(9, 0))));

        conn.session.cancellation_token.cancel();
        drop(conn.events_tx);

        assert!(conn.events_rx.recv().await.is_none());
    }

    #[test]
    fn notices_reach_the_outbox() {
        let (outbox, mut outbox_rx) = mpsc::unbounded_channel();
        WsNotifier::new(outbox).notify(Notice::error("Failed to load appointment charges"));
        assert_matches!(
            outbox_rx.try_recv(),
            Ok(ServerMessage::Notice { level: NoticeLevelView::Error, message })
                if message == "Failed to load appointment charges"
        );
    }
}
