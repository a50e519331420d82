use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query, State,
    },
    response::Response,
    Json,
};
use axum_extra::TypedHeader;
use futures::{SinkExt, StreamExt};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_doctor, user_from_access_token};

use crate::models::{
    ConsultationSaveRequest, IntakeClientMessage, IntakeServerMessage, IntakeSocketQuery,
    MedicationSearchQuery, OfflinePatientDetails, PatientError, PrefillQuery, QuickRegistrationPrefill,
};
use crate::services::{
    CedulaIntakeService, ConsultationRecordService, DoctorRoster, IntakeSession, MedicationCatalog,
    OfflinePatientService,
};

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
            PatientError::DuplicateCedula { .. } => AppError::Conflict(err.to_string()),
            PatientError::Unauthorized => AppError::Forbidden(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

fn doctor_id(user: &User) -> Result<Uuid, AppError> {
    require_doctor(user)?;
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

pub async fn quick_register_prefill(
    Extension(user): Extension<User>,
    Query(query): Query<PrefillQuery>,
) -> Result<Json<Value>, AppError> {
    doctor_id(&user)?;
    Ok(Json(json!(QuickRegistrationPrefill::from(query))))
}

#[axum::debug_handler]
pub async fn quick_register(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<OfflinePatientDetails>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_id(&user)?;
    let service = OfflinePatientService::new(&config);

    let patient = service.create(doctor_id, request, Map::new(), auth.token()).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "redirect_to": crate::services::consultation_record::offline_patient_path(patient.id),
    })))
}

#[axum::debug_handler]
pub async fn list_offline_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_id(&user)?;
    let patients = OfflinePatientService::new(&config)
        .list_for_doctor(doctor_id, auth.token())
        .await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_offline_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_id(&user)?;
    let patient = OfflinePatientService::new(&config)
        .get(doctor_id, patient_id, auth.token())
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn lookup_cedula(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(cedula): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_id(&user)?;
    let roster = DoctorRoster::new(Arc::new(SupabaseClient::new(&config)))
        .load(doctor_id, auth.token())
        .await?;

    let outcome = CedulaIntakeService::from_config(&config).lookup(&roster, &cedula).await;
    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn search_medications(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<MedicationSearchQuery>,
) -> Result<Json<Value>, AppError> {
    doctor_id(&user)?;
    let results = MedicationCatalog::new(Arc::new(SupabaseClient::new(&config)))
        .search(&query.q, auth.token())
        .await?;

    Ok(Json(json!({ "results": results })))
}

#[axum::debug_handler]
pub async fn save_consultation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ConsultationSaveRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_id(&user)?;
    let saved = ConsultationRecordService::new(&config)
        .save(doctor_id, request, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "patient_id": saved.patient_id,
        "offline": saved.offline,
        "created": saved.created,
        "medical_record_id": saved.medical_record_id,
        "redirect_to": saved.redirect_to,
    })))
}

// ==============================================================================
// INTAKE SOCKET
// ==============================================================================

pub async fn intake_ws(
    ws: WebSocketUpgrade,
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<IntakeSocketQuery>,
) -> Result<Response, AppError> {
    let user = user_from_access_token(&config, query.access_token.as_deref())?;
    let doctor_id = doctor_id(&user)?;
    let token = query.access_token.unwrap_or_default();

    let supabase = Arc::new(SupabaseClient::new(&config));
    let roster = DoctorRoster::new(Arc::clone(&supabase)).load(doctor_id, &token).await?;

    let session_parts = (
        CedulaIntakeService::from_config(&config),
        MedicationCatalog::new(supabase),
        roster,
    );

    info!("Intake session opened for doctor {}", doctor_id);
    Ok(ws.on_upgrade(move |socket| run_intake(socket, session_parts, token, doctor_id)))
}

async fn run_intake(
    socket: WebSocket,
    (intake, medications, roster): (CedulaIntakeService, MedicationCatalog, Vec<crate::models::PatientSummary>),
    token: String,
    doctor_id: Uuid,
) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<IntakeServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = IntakeSession::new(intake, medications, roster, &token, outbox.clone());

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<IntakeClientMessage>(text.as_str()) {
                Ok(message) => session.handle(message),
                Err(e) => {
                    debug!("Ignoring malformed intake message: {}", e);
                    let _ = outbox.send(IntakeServerMessage::Error {
                        message: "Mensaje no reconocido".to_string(),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Intake socket error for doctor {}: {}", doctor_id, e);
                break;
            }
        }
    }

    // Cancels any search still waiting on its debounce timer.
    drop(session);
    writer.abort();
    info!("Intake session closed for doctor {}", doctor_id);
}
