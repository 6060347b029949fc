//! crates/booking_core/src/charge.rs
//!
//! Fetches the appointment charge for the selected doctor.

use std::sync::Arc;
use tracing::debug;

use crate::{
    domain::{Charge, DoctorId},
    error::BookingResult,
    ports::DirectoryService,
};

#[derive(Clone)]
pub struct ChargeResolver {
    directory: Arc<dyn DirectoryService>,
}

impl ChargeResolver {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }

    pub async fn resolve(&self, doctor_id: DoctorId) -> BookingResult<Charge> {
        debug!("Fetching appointment charge for doctor {}", doctor_id);
        Ok(self.directory.get_doctor_charge(doctor_id).await?)
    }
}
