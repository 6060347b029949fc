//! services/api/src/web/router.rs
//!
//! Assembles the gateway's routes, middleware and Swagger UI into one router.

use crate::{
    error::ApiError,
    web::{
        middleware::require_auth,
        rest::{
            available_doctors_handler, doctor_charge_handler, slots_handler, specialities_handler,
            ApiDoc,
        },
        state::AppState,
        ws_handler::ws_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the complete application router for `app_state`.
pub fn build_router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid ALLOWED_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Lookups forward whatever token the caller sent; the backend decides.
    let public_routes = Router::new()
        .route("/slots", get(slots_handler))
        .route("/specialities", get(specialities_handler))
        .route("/doctors", get(available_doctors_handler))
        .route("/doctors/{id}/charge", get(doctor_charge_handler));

    // The booking form acts for one user for its whole lifetime.
    let protected_routes = Router::new()
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn(require_auth));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
