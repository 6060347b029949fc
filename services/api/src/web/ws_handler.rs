//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a booking connection.
//! The loop owns the booking session: client edits and resolver results are
//! both fed through it, one at a time.

use crate::web::{
    booking_task::{execute, Flow, Outbox, WsNotifier},
    middleware::AuthToken,
    protocol::{editing, BookingSnapshot, ClientMessage, ServerMessage},
    state::{AppState, SessionState},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use booking_core::{BookingEvent, NotificationSink};
use futures::{
    stream::{SplitStream, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(token): Extension<AuthToken>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, token))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, token: AuthToken) {
    info!("New booking connection established.");

    // Outgoing messages are queued on the outbox and written by a dedicated task.
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                error!("Failed to send message to client.");
                return;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    // --- 1. Initialization Phase ---
    let Some(mut session) = init_session(&mut receiver, &app_state, token, &outbox).await else {
        drop(outbox);
        let _ = writer.await;
        return;
    };

    // --- 2. Main Message Loop ---
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<BookingEvent>();
    let notifier = WsNotifier::new(outbox.clone());
    let mut last_snapshot = BookingSnapshot::from(&session.booking);

    loop {
        let event = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match to_booking_event(&text) {
                    Ok(Some(event)) => event,
                    Ok(None) => continue,
                    Err(message) => {
                        warn!("Failed to deserialize client message: {}", message);
                        send(&outbox, ServerMessage::Error { message });
                        continue;
                    }
                },
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
            Some(event) = events_rx.recv() => event,
        };

        match session.booking.handle(event) {
            Ok(commands) => {
                let snapshot = BookingSnapshot::from(&session.booking);
                if snapshot != last_snapshot {
                    send(&outbox, ServerMessage::BookingUpdated { booking: snapshot.clone() });
                    last_snapshot = snapshot;
                }
                if execute(commands, &session, &events_tx, &notifier, &outbox) == Flow::Close {
                    break;
                }
            }
            Err(e) => {
                warn!("Rejected booking event: {}", e);
                send(&outbox, ServerMessage::Error { message: e.to_string() });
            }
        }
    }

    // --- 3. Cleanup ---
    session.cancellation_token.cancel();
    drop(notifier);
    drop(outbox);
    let _ = writer.await;
    info!("Booking connection closed.");
}

/// Waits for the `Init` message and opens the booking form it asks for.
async fn init_session(
    receiver: &mut SplitStream<WebSocket>,
    app_state: &AppState,
    token: AuthToken,
    outbox: &Outbox,
) -> Option<SessionState> {
    let appointment_id = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => match serde_json::from_str::<ClientMessage>(&init_json) {
            Ok(ClientMessage::Init { appointment_id }) => appointment_id,
            _ => {
                error!("First message was not a valid Init message.");
                send(outbox, ServerMessage::Error {
                    message: "The first message must be an init message.".to_string(),
                });
                return None;
            }
        },
        _ => {
            error!("Client disconnected before sending Init message.");
            return None;
        }
    };

    info!("Opening booking form (editing: {:?})", appointment_id);
    match SessionState::new(app_state, Some(token.0), appointment_id).await {
        Ok((session, notices)) => {
            send(outbox, ServerMessage::SessionInitialized {
                editing: editing(&session.booking),
                specialities: session.specialities.clone(),
                booking: BookingSnapshot::from(&session.booking),
            });
            let notifier = WsNotifier::new(outbox.clone());
            for notice in notices {
                notifier.notify(notice);
            }
            Some(session)
        }
        Err(e) => {
            error!("Failed to open booking form: {}", e);
            send(outbox, ServerMessage::Error {
                message: "Failed to load the appointment.".to_string(),
            });
            None
        }
    }
}

/// Translates a client message into a booking event. `Ok(None)` means the
/// message is valid but has no effect on the form.
fn to_booking_event(text: &str) -> Result<Option<BookingEvent>, String> {
    let message = serde_json::from_str::<ClientMessage>(text).map_err(|e| e.to_string())?;
    let event = match message {
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
            return Ok(None);
        }
        ClientMessage::SelectSpeciality { speciality } => BookingEvent::SpecialityChanged(speciality),
        ClientMessage::SelectDate { date } => BookingEvent::DateChanged(date),
        ClientMessage::SelectTime { time } => BookingEvent::TimeChanged(time),
        ClientMessage::SelectDoctor { doctor_id } => BookingEvent::DoctorChosen(doctor_id),
        ClientMessage::SetReason { reason } => BookingEvent::ReasonChanged(reason),
        ClientMessage::Submit => BookingEvent::Submit,
    };
    Ok(Some(event))
}

fn send(outbox: &Outbox, message: ServerMessage) {
    if outbox.send(message).is_err() {
        warn!("Outbox closed; dropping message.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn client_messages_map_to_events() {
        assert_matches!(
            to_booking_event(r#"{"type":"select_speciality","speciality":"Cardiology"}"#),
            Ok(Some(BookingEvent::SpecialityChanged(Some(s)))) if s == "Cardiology"
        );
        assert_matches!(to_booking_event(r#"{"type":"submit"}"#), Ok(Some(BookingEvent::Submit)));
        assert_matches!(to_booking_event(r#"{"type":"init"}"#), Ok(None));
        assert_matches!(to_booking_event(r#"{"type":"select_time","time":"noon"}"#), Err(_));
    }
}
