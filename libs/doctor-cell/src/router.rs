use std::sync::Arc;

use axum::{routing::get, Router};

use shared_config::AppConfig;

use crate::handlers;

/// Public doctor directory. No authentication.
pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_public_doctors))
        .with_state(state)
}
