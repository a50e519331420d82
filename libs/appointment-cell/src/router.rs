// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::AppointmentChangeFeed;

#[derive(Clone, FromRef)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub feed: AppointmentChangeFeed,
}

pub fn appointment_routes(config: Arc<AppConfig>, feed: AppointmentChangeFeed) -> Router {
    let state = AppointmentState {
        config: config.clone(),
        feed,
    };

    let protected_routes = Router::new()
        .route("/", post(handlers::schedule_appointment))
        .route("/consultation/start", post(handlers::start_consultation))
        .route("/active", get(handlers::get_active_consultation))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route("/doctor/{doctor_id}", get(handlers::list_doctor_appointments))
        .route("/doctor/{doctor_id}/counts", get(handlers::get_today_counts))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    // Browsers cannot send headers on a socket upgrade; the handler
    // authenticates from the query string.
    let public_routes = Router::new()
        .route("/live/counts", get(handlers::live_counts_ws));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
}
