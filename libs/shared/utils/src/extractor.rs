use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub async fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

/// Browsers cannot set headers on a WebSocket upgrade, so socket routes carry
/// the Supabase access token as a query parameter instead.
pub fn user_from_access_token(config: &AppConfig, access_token: Option<&str>) -> Result<User, AppError> {
    let token = access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Auth("Missing access token".to_string()))?;

    validate_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)
}

pub fn require_doctor(user: &User) -> Result<(), AppError> {
    if user.is_doctor() || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only doctors can perform this action".to_string()))
    }
}
