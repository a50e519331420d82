// libs/verification-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::post, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Routes carry their full `/api/...` paths and are merged at the root.
pub fn verification_routes(config: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/api/didit/create-session", post(handlers::create_didit_session))
        .route("/api/didit/sync-status", post(handlers::sync_didit_status))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    // Used during sign-up, before the user has a session.
    let public_routes = Router::new()
        .route("/api/validate-cedula", post(handlers::validate_cedula))
        .route("/api/verify-cedula-photo", post(handlers::verify_cedula_photo));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(config)
}
