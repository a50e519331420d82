use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{DirectoryError, DirectoryFilter, DirectoryQuery};
use crate::services::DoctorDirectoryService;

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn list_public_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = DirectoryFilter::from(query);
    let doctors = DoctorDirectoryService::new(&state).list(&filter).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len(),
        "limit": filter.limit,
    })))
}
