// libs/verification-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    cedula_digits, CedulaValidation, SyncStatusRequest, ValidateCedulaRequest, VerificationError,
    VerifyPhotoRequest,
};
use crate::services::{
    CedulaRegistry, CedulaRegistryClient, PhotoVerifier, ProfileVerificationService, SacsClient,
};

const MIN_CEDULA_DIGITS: usize = 6;

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::NotConfigured(what) => {
                AppError::Unavailable(format!("{} is not available", what))
            }
            VerificationError::InvalidInput(msg) => AppError::BadRequest(msg),
            VerificationError::SessionMismatch => AppError::Forbidden(err.to_string()),
            VerificationError::Upstream { status, .. } => match status {
                401 | 403 => AppError::Forbidden("Verification provider refused the request".to_string()),
                404 => AppError::NotFound("Verification record not found".to_string()),
                409 => AppError::Conflict("Verification already in progress".to_string()),
                _ => AppError::BadRequest("Verification request rejected".to_string()),
            },
            // Upstream details stay in the logs.
            VerificationError::Unavailable(_) => AppError::Internal("Verification service error".to_string()),
            VerificationError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn create_didit_session(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = ProfileVerificationService::new(&config)?;
    let session = service.start_verification(&user.id, auth.token()).await?;

    Ok(Json(json!({
        "session_id": session.session_id,
        "url": session.url,
    })))
}

#[axum::debug_handler]
pub async fn sync_didit_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SyncStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ProfileVerificationService::new(&config)?;
    let status = service.sync_status(&user.id, &request.session_id, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "verification_status": status,
    })))
}

#[axum::debug_handler]
pub async fn validate_cedula(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<ValidateCedulaRequest>,
) -> Result<Json<Value>, AppError> {
    let digits = cedula_digits(&request.cedula);
    if digits.len() < MIN_CEDULA_DIGITS {
        return Err(AppError::BadRequest("Cédula must have at least 6 digits".to_string()));
    }

    let registry = CedulaRegistryClient::new(&config)?;
    let person = registry.lookup(&request.nacionalidad, &digits).await?;

    let is_doctor = request
        .tipo_usuario
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("medico") || t.eq_ignore_ascii_case("médico"));

    let sacs = match (&person, is_doctor) {
        (Some(_), true) if config.is_sacs_configured() => Some(SacsClient::new(&config)?.lookup(&digits).await?),
        (Some(_), true) => {
            warn!("SACS registry not configured, skipping professional check for {}", digits);
            None
        }
        _ => None,
    };

    let valid = person.is_some() && sacs.as_ref().map_or(true, |record| record.found);
    debug!("Cédula {} validation result: {}", digits, valid);

    let validation = CedulaValidation {
        valid,
        cedula: digits,
        nacionalidad: request.nacionalidad,
        nombre_completo: person.as_ref().map(|p| p.full_name()),
        fecha_nacimiento: person.and_then(|p| p.fecha_nac),
        sacs,
    };

    Ok(Json(json!(validation)))
}

#[axum::debug_handler]
pub async fn verify_cedula_photo(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<VerifyPhotoRequest>,
) -> Result<Json<Value>, AppError> {
    let verifier = PhotoVerifier::new(&config)?;
    let result = verifier.verify(&request).await?;

    Ok(Json(json!(result)))
}
