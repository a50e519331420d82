use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentChangeFeed};
use doctor_cell::doctor_routes;
use patient_cell::patient_routes;
use shared_config::AppConfig;
use verification_cell::verification_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    // One feed per process so every counts socket sees every write.
    let feed = AppointmentChangeFeed::default();

    Router::new()
        .route("/", get(|| async { "Telemed API is running!" }))
        .nest("/appointments", appointment_routes(state.clone(), feed))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/api/public/doctors", doctor_routes(state.clone()))
        .merge(verification_routes(state))
}
