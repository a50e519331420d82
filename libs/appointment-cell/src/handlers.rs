// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query, State,
    },
    response::Response,
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_doctor, user_from_access_token};

use crate::models::{
    ActiveConsultationQuery, AppointmentError, AppointmentRangeQuery, PatientRef,
    ScheduleAppointmentRequest, StartConsultationRequest, UpdateStatusRequest,
};
use crate::router::AppointmentState;
use crate::services::{AppointmentService, ConsultationService};

// ==============================================================================
// HELPERS
// ==============================================================================

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::InvalidPatientReference(msg) => AppError::BadRequest(msg),
            AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::Unauthorized => {
                AppError::Forbidden("Not authorized to access this appointment".to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

/// Doctor the request acts for. Admins may name any doctor; doctors only
/// themselves.
pub fn resolve_doctor(user: &User, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    require_doctor(user)?;
    let own_id = user_uuid(user)?;

    match requested {
        Some(doctor_id) if user.is_admin() => Ok(doctor_id),
        Some(doctor_id) if doctor_id != own_id => Err(AppError::Forbidden(
            "Doctors can only act on their own appointments".to_string(),
        )),
        _ if user.is_admin() && !user.is_doctor() => Err(AppError::BadRequest(
            "medico_id is required".to_string(),
        )),
        _ => Ok(own_id),
    }
}

// ==============================================================================
// CONSULTATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn start_consultation(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<StartConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_doctor(&user, request.medico_id)?;
    let patient = PatientRef::from_ids(request.paciente_id, request.offline_patient_id)?;

    let service = ConsultationService::new(&state.config, state.feed.clone());
    let response = service.start_or_resume(doctor_id, patient, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": response.appointment,
        "created": response.created,
        "redirect_to": response.redirect_to,
    })))
}

#[axum::debug_handler]
pub async fn get_active_consultation(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<ActiveConsultationQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_doctor(&user, query.medico_id)?;
    let patient = PatientRef::from_ids(query.paciente_id, query.offline_patient_id)?;

    let service = ConsultationService::new(&state.config, state.feed.clone());
    let active = service.find_active(doctor_id, patient, auth.token()).await;

    Ok(Json(json!({ "appointment": active })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn schedule_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ScheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_doctor(&user, request.medico_id)?;

    let service = AppointmentService::new(&state.config, state.feed.clone());
    let appointment = service.schedule(doctor_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state.config, state.feed.clone());
    let appointment = service.get_appointment(appointment_id, auth.token()).await?;

    let caller = user_uuid(&user)?;
    let is_participant = appointment.doctor_id == caller || appointment.patient_id == Some(caller);
    if !is_participant && !user.is_admin() {
        return Err(AppointmentError::Unauthorized.into());
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state.config, state.feed.clone());
    let current = service.get_appointment(appointment_id, auth.token()).await?;
    resolve_doctor(&user, Some(current.doctor_id))?;

    let updated = service.update_status(appointment_id, request, auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Query(range): Query<AppointmentRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_doctor(&user, Some(doctor_id))?;

    let service = AppointmentService::new(&state.config, state.feed.clone());
    let appointments = service.list_for_doctor(doctor_id, range, auth.token()).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_today_counts(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = resolve_doctor(&user, Some(doctor_id))?;

    let service = AppointmentService::new(&state.config, state.feed.clone());
    let counts = service.counts_for_day(doctor_id, Utc::now(), auth.token()).await?;

    Ok(Json(json!(counts)))
}

// ==============================================================================
// LIVE COUNTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct LiveCountsQuery {
    pub doctor_id: Uuid,
    pub access_token: Option<String>,
}

pub async fn live_counts_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppointmentState>,
    Query(query): Query<LiveCountsQuery>,
) -> Result<Response, AppError> {
    let user = user_from_access_token(&state.config, query.access_token.as_deref())?;
    let doctor_id = resolve_doctor(&user, Some(query.doctor_id))?;
    let token = query.access_token.unwrap_or_default();

    info!("Live counts subscription opened for doctor {}", doctor_id);
    Ok(ws.on_upgrade(move |socket| stream_counts(socket, state, doctor_id, token)))
}

async fn stream_counts(socket: WebSocket, state: AppointmentState, doctor_id: Uuid, token: String) {
    let (mut sink, mut stream) = socket.split();
    let mut changes = state.feed.subscribe_doctor(doctor_id);
    let service = AppointmentService::new(&state.config, state.feed.clone());

    loop {
        let payload = match service.counts_for_day(doctor_id, Utc::now(), &token).await {
            Ok(counts) => json!({ "type": "counts", "counts": counts }),
            Err(e) => {
                warn!("Failed to refresh counts for doctor {}: {}", doctor_id, e);
                json!({ "type": "error", "message": "No se pudieron cargar las citas" })
            }
        };

        if sink.send(Message::Text(payload.to_string().into())).await.is_err() {
            break;
        }

        tokio::select! {
            change = changes.next_change() => {
                if change.is_none() {
                    break;
                }
                debug!("Appointment change for doctor {}, refreshing counts", doctor_id);
            }
            incoming = wait_for_close(&mut stream) => {
                if incoming {
                    break;
                }
            }
        }
    }

    info!("Live counts subscription closed for doctor {}", doctor_id);
}

/// Drains client frames until the socket closes. Returns `true` on close.
async fn wait_for_close<S>(stream: &mut S) -> bool
where
    S: futures::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return true,
            Some(Ok(_)) => continue,
        }
    }
}
