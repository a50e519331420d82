use std::sync::Arc;

use axum::{middleware, routing::{get, post}, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn patient_routes(config: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/offline", get(list_offline_patients))
        .route("/offline/quick-register", post(quick_register))
        .route("/offline/{id}", get(get_offline_patient))
        .route("/quick-register/prefill", get(quick_register_prefill))
        .route("/cedula/{cedula}", get(lookup_cedula))
        .route("/medications/search", get(search_medications))
        .route("/consultations", post(save_consultation))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    // Token arrives as `access_token` in the query string.
    let socket_routes = Router::new()
        .route("/intake/ws", get(intake_ws));

    Router::new()
        .merge(protected_routes)
        .merge(socket_routes)
        .with_state(config)
}
