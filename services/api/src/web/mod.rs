pub mod booking_task;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod router;
pub mod state;
pub mod ws_handler;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use ws_handler::ws_handler;
pub use rest::{available_doctors_handler, doctor_charge_handler, slots_handler, specialities_handler};
pub use middleware::require_auth;
pub use router::build_router;
