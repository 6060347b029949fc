//! services/api/src/adapters/hospital.rs
//!
//! This module contains the adapter for the hospital REST backend.
//! It implements the `DirectoryService` and `AppointmentService` ports from the
//! `core` crate on top of `reqwest`, forwarding the caller's bearer token.

use async_trait::async_trait;
use booking_core::{
    Appointment, AppointmentDraft, AppointmentId, AppointmentService, AppointmentStatus,
    AvailableDoctor, Charge, DirectoryService, DoctorId, PortError, PortResult,
};
use chrono::NaiveDateTime;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// The datetime format the backend accepts in the `at` query parameter and in
/// appointment payloads.
const BACKEND_DATETIME: &str = "%Y-%m-%dT%H:%M";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the directory and appointment ports against the
/// hospital REST API.
#[derive(Clone)]
pub struct HospitalApiAdapter {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HospitalApiAdapter {
    /// Creates a new `HospitalApiAdapter` with its own HTTP client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Returns a copy that authenticates as the holder of `token`.
    /// The underlying connection pool is shared.
    pub fn authorized(&self, token: Option<String>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> PortResult<T> {
        let response = builder.send().await.map_err(|e| {
            error!("Hospital backend unreachable: {}", e);
            PortError::Unexpected(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Hospital backend error ({}): {}", status, body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
                StatusCode::NOT_FOUND => PortError::NotFound(detail_or(body, status)),
                _ => PortError::Unexpected(detail_or(body, status)),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed backend response: {}", e)))
    }
}

/// Extracts the backend's `detail` message when it sends one.
fn detail_or(body: String, status: StatusCode) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: String,
    }
    match serde_json::from_str::<Detail>(&body) {
        Ok(d) => d.detail,
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body,
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct DoctorRecord {
    id: DoctorId,
    fullname: String,
    speciality: String,
    profile: Option<String>,
    #[serde(default)]
    working_days: Vec<String>,
    department_name: String,
}
impl DoctorRecord {
    fn to_domain(self) -> AvailableDoctor {
        AvailableDoctor {
            id: self.id,
            full_name: self.fullname,
            speciality_name: self.speciality,
            department_name: self.department_name,
            profile_image: self.profile,
            working_days: self.working_days,
        }
    }
}

#[derive(Deserialize)]
struct DoctorDetailsRecord {
    speciality: SpecialityRecord,
}

#[derive(Deserialize)]
struct SpecialityRecord {
    #[serde(deserialize_with = "amount")]
    appointment_charges: u64,
}

#[derive(Deserialize)]
struct AppointmentRecord {
    id: AppointmentId,
    doctor_id: DoctorId,
    #[serde(deserialize_with = "backend_datetime")]
    appointment_datetime: NaiveDateTime,
    #[serde(default)]
    reason: String,
    status: String,
    #[serde(default, deserialize_with = "optional_amount")]
    appointment_charges: Option<u64>,
}
impl AppointmentRecord {
    fn to_domain(self) -> Appointment {
        let status = match self.status.as_str() {
            "Completed" => AppointmentStatus::Completed,
            "Cancelled" => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Scheduled,
        };
        Appointment {
            id: self.id,
            doctor_id: self.doctor_id,
            scheduled_at: self.appointment_datetime,
            reason: self.reason,
            status,
            charges: self.appointment_charges.map(Charge),
        }
    }
}

#[derive(Serialize)]
struct AppointmentPayload<'a> {
    doctor_id: DoctorId,
    appointment_datetime: String,
    reason: &'a str,
}
impl<'a> From<&'a AppointmentDraft> for AppointmentPayload<'a> {
    fn from(draft: &'a AppointmentDraft) -> Self {
        Self {
            doctor_id: draft.doctor_id,
            appointment_datetime: draft.scheduled_at.format(BACKEND_DATETIME).to_string(),
            reason: &draft.reason,
        }
    }
}

/// Amounts arrive as integers, floats or decimal strings depending on the backend.
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }
    let value = match Raw::deserialize(deserializer)? {
        Raw::Int(n) => return Ok(n),
        Raw::Float(f) => f,
        Raw::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom)?,
    };
    if value.is_finite() && value >= 0.0 {
        Ok(value.round() as u64)
    } else {
        Err(serde::de::Error::custom(format!("invalid amount {}", value)))
    }
}

fn optional_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "amount")] u64);
    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(n)| n))
}

/// Accepts `YYYY-MM-DDTHH:MM[:SS[.f]]`, with or without a UTC offset.
fn backend_datetime<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, BACKEND_DATETIME))
        .map_err(serde::de::Error::custom)
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl DirectoryService for HospitalApiAdapter {
    async fn list_specialities(&self) -> PortResult<Vec<String>> {
        self.send(self.request(Method::GET, "/specialities")).await
    }

    async fn list_available_doctors(
        &self,
        speciality: &str,
        at: NaiveDateTime,
    ) -> PortResult<Vec<AvailableDoctor>> {
        let at = at.format(BACKEND_DATETIME).to_string();
        let records: Vec<DoctorRecord> = self
            .send(
                self.request(Method::GET, "/doctors")
                    .query(&[("speciality_name", speciality), ("at", at.as_str())]),
            )
            .await?;
        Ok(records.into_iter().map(DoctorRecord::to_domain).collect())
    }

    async fn get_doctor_charge(&self, doctor_id: DoctorId) -> PortResult<Charge> {
        let details: DoctorDetailsRecord = self
            .send(self.request(Method::GET, &format!("/doctor/{}", doctor_id)))
            .await?;
        Ok(Charge(details.speciality.appointment_charges))
    }
}

#[async_trait]
impl AppointmentService for HospitalApiAdapter {
    async fn get(&self, id: AppointmentId) -> PortResult<Appointment> {
        let record: AppointmentRecord = self
            .send(self.request(Method::GET, &format!("/appointment/{}", id)))
            .await?;
        Ok(record.to_domain())
    }

    async fn create(&self, draft: &AppointmentDraft) -> PortResult<Appointment> {
        let record: AppointmentRecord = self
            .send(
                self.request(Method::POST, "/appointment")
                    .json(&AppointmentPayload::from(draft)),
            )
            .await?;
        Ok(record.to_domain())
    }

    async fn update(&self, id: AppointmentId, draft: &AppointmentDraft) -> PortResult<Appointment> {
        let record: AppointmentRecord = self
            .send(
                self.request(Method::PATCH, &format!("/appointment/{}", id))
                    .json(&AppointmentPayload::from(draft)),
            )
            .await?;
        Ok(record.to_domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_backend_variants() {
        let parse = |json: &str| serde_json::from_str::<SpecialityRecord>(json).map(|s| s.appointment_charges);
        assert_eq!(parse(r#"{"appointment_charges": 1500}"#).unwrap(), 1500);
        assert_eq!(parse(r#"{"appointment_charges": 1500.0}"#).unwrap(), 1500);
        assert_eq!(parse(r#"{"appointment_charges": "1500.00"}"#).unwrap(), 1500);
        assert!(parse(r#"{"appointment_charges": -3}"#).is_err());
    }

    #[test]
    fn appointment_datetimes_accept_backend_variants() {
        let parse = |dt: &str| {
            serde_json::from_value::<AppointmentRecord>(serde_json::json!({
                "id": 1,
                "doctor_id": 2,
                "appointment_datetime": dt,
                "reason": "r",
                "status": "Scheduled",
            }))
            .map(|r| r.appointment_datetime.to_string())
        };
        assert_eq!(parse("2024-03-12T10:00").unwrap(), "2024-03-12 10:00:00");
        assert_eq!(parse("2024-03-12T10:00:00").unwrap(), "2024-03-12 10:00:00");
        assert_eq!(parse("2024-03-12T10:00:00+03:00").unwrap(), "2024-03-12 10:00:00");
        assert!(parse("tomorrow").is_err());
    }

    #[test]
    fn detail_message_is_preferred() {
        assert_eq!(
            detail_or(r#"{"detail":"Doctor is busy"}"#.to_string(), StatusCode::BAD_REQUEST),
            "Doctor is busy"
        );
        assert_eq!(detail_or(String::new(), StatusCode::BAD_GATEWAY), "502 Bad Gateway");
    }
}
