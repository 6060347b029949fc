//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{HospitalApiAdapter, SystemClock},
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Hospital Backend Adapter ---
    info!("Using hospital backend at {}", config.hospital_api_url);
    let backend = Arc::new(HospitalApiAdapter::new(
        config.hospital_api_url.clone(),
        config.backend_timeout,
    )?);
    info!(
        "Clinic hours {}-{} in {}-minute slots",
        config.slot_policy.open(),
        config.slot_policy.close(),
        config.slot_policy.step_minutes()
    );

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        backend,
        clock: Arc::new(SystemClock),
    });

    // --- 4. Create the Web Router ---
    let app = build_router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
