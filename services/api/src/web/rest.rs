//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{middleware::bearer_token, protocol::{DoctorView, TIME_FORMAT}, state::AppState};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use booking_core::{
    slots, AvailabilityQuery, AvailabilityResolver, BookingError, ChargeResolver, PortError,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        slots_handler,
        specialities_handler,
        available_doctors_handler,
        doctor_charge_handler,
    ),
    components(
        schemas(SlotsResponse, DoctorView, ChargeResponse)
    ),
    tags(
        (name = "Booking Gateway API", description = "Slot, availability and charge lookups for the appointment form.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotsParams {
    /// The day to list slots for, `YYYY-MM-DD`.
    date: NaiveDate,
}

/// The bookable times of one day.
#[derive(Serialize, ToSchema)]
pub struct SlotsResponse {
    date: NaiveDate,
    /// Times as `HH:MM`; empty when nothing is left to book.
    slots: Vec<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityParams {
    speciality: Option<String>,
    date: Option<NaiveDate>,
    /// `HH:MM`
    time: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ChargeResponse {
    doctor_id: i64,
    appointment_charges: u64,
}

type HandlerError = (StatusCode, String);

fn port_failure(e: &PortError) -> HandlerError {
    match e {
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what.clone()),
        PortError::Unexpected(_) => (
            StatusCode::BAD_GATEWAY,
            "The hospital service is unavailable".to_string(),
        ),
    }
}

fn booking_failure(e: BookingError) -> HandlerError {
    match e {
        BookingError::Fetch(ref port) | BookingError::Submission(ref port) => {
            error!("Backend lookup failed: {}", port);
            port_failure(port)
        }
        precondition => (StatusCode::BAD_REQUEST, precondition.to_string()),
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the bookable time slots for a date.
#[utoipa::path(
    get,
    path = "/slots",
    params(SlotsParams),
    responses(
        (status = 200, description = "Slots for the date, possibly empty", body = SlotsResponse)
    )
)]
pub async fn slots_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<SlotsParams>,
) -> Json<SlotsResponse> {
    let slots = slots::generate(params.date, app_state.clock.now(), &app_state.config.slot_policy)
        .iter()
        .map(|t| t.format(TIME_FORMAT).to_string())
        .collect();
    Json(SlotsResponse { date: params.date, slots })
}

/// List all medical specialities.
#[utoipa::path(
    get,
    path = "/specialities",
    responses(
        (status = 200, description = "Speciality names", body = [String]),
        (status = 502, description = "Hospital service unavailable")
    )
)]
pub async fn specialities_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let directory = app_state.backend.directory(bearer_token(&headers));
    let specialities = directory.list_specialities().await.map_err(|e| {
        error!("Failed to list specialities: {}", e);
        port_failure(&e)
    })?;
    Ok(Json(specialities))
}

/// List the doctors of a speciality who are free at a date and time.
#[utoipa::path(
    get,
    path = "/doctors",
    params(AvailabilityParams),
    responses(
        (status = 200, description = "Available doctors", body = [DoctorView]),
        (status = 400, description = "Missing or invalid speciality, date or time"),
        (status = 502, description = "Hospital service unavailable")
    )
)]
pub async fn available_doctors_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<AvailabilityParams>,
) -> Result<impl IntoResponse, HandlerError> {
    let time = params
        .time
        .as_deref()
        .map(|raw| {
            NaiveTime::parse_from_str(raw, TIME_FORMAT)
                .map_err(|_| (StatusCode::BAD_REQUEST, format!("Invalid time '{}'", raw)))
        })
        .transpose()?;
    let query = AvailabilityQuery::new(params.speciality.as_deref(), params.date, time)
        .map_err(booking_failure)?;

    let resolver = AvailabilityResolver::new(app_state.backend.directory(bearer_token(&headers)));
    let availability = resolver.resolve(&query, None).await.map_err(booking_failure)?;
    let doctors: Vec<DoctorView> = availability.doctors.iter().map(DoctorView::from).collect();
    Ok(Json(doctors))
}

/// Get the appointment charge of a doctor.
#[utoipa::path(
    get,
    path = "/doctors/{id}/charge",
    params(
        ("id" = i64, Path, description = "The doctor's id.")
    ),
    responses(
        (status = 200, description = "The doctor's appointment charge", body = ChargeResponse),
        (status = 404, description = "Unknown doctor"),
        (status = 502, description = "Hospital service unavailable")
    )
)]
pub async fn doctor_charge_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(doctor_id): Path<i64>,
) -> Result<impl IntoResponse, HandlerError> {
    let resolver = ChargeResolver::new(app_state.backend.directory(bearer_token(&headers)));
    let charge = resolver.resolve(doctor_id).await.map_err(booking_failure)?;
    Ok(Json(ChargeResponse { doctor_id, appointment_charges: charge.amount() }))
}
