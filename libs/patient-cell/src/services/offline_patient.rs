use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};
use verification_cell::cedula_digits;

use crate::models::{OfflinePatient, OfflinePatientDetails, PatientError};

const MIN_CEDULA_DIGITS: usize = 6;

pub struct OfflinePatientService {
    supabase: Arc<SupabaseClient>,
}

impl OfflinePatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<OfflinePatient>, PatientError> {
        let query = PostgrestQuery::table("offline_patients")
            .select("*")
            .eq("doctor_id", doctor_id)
            .order("nombre_completo", true);

        Ok(self.supabase.select(&query, Some(auth_token)).await?)
    }

    pub async fn get(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<OfflinePatient, PatientError> {
        let query = PostgrestQuery::table("offline_patients")
            .select("*")
            .eq("id", patient_id)
            .limit(1);

        let rows: Vec<OfflinePatient> = self.supabase.select(&query, Some(auth_token)).await?;
        let patient = rows.into_iter().next().ok_or(PatientError::NotFound)?;

        if patient.doctor_id != doctor_id {
            return Err(PatientError::Unauthorized);
        }
        Ok(patient)
    }

    pub async fn find_by_cedula(
        &self,
        doctor_id: Uuid,
        cedula: &str,
        auth_token: &str,
    ) -> Result<Option<OfflinePatient>, PatientError> {
        let query = PostgrestQuery::table("offline_patients")
            .select("*")
            .eq("doctor_id", doctor_id)
            .eq("cedula", cedula)
            .limit(1);

        let rows: Vec<OfflinePatient> = self.supabase.select(&query, Some(auth_token)).await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts a new offline patient for the doctor. `clinical` carries any
    /// extra columns (lists, notes) written in the same insert.
    pub async fn create(
        &self,
        doctor_id: Uuid,
        details: OfflinePatientDetails,
        clinical: Map<String, Value>,
        auth_token: &str,
    ) -> Result<OfflinePatient, PatientError> {
        let cedula = cedula_digits(&details.cedula);
        let nombre = details.nombre_completo.trim().to_string();

        if cedula.len() < MIN_CEDULA_DIGITS {
            return Err(PatientError::ValidationError("Cédula must have at least 6 digits".to_string()));
        }
        if nombre.is_empty() {
            return Err(PatientError::ValidationError("nombre_completo is required".to_string()));
        }

        if self.find_by_cedula(doctor_id, &cedula, auth_token).await?.is_some() {
            return Err(PatientError::DuplicateCedula { cedula });
        }

        let mut row = json!({
            "doctor_id": doctor_id,
            "cedula": cedula,
            "nombre_completo": nombre,
            "edad": details.edad,
            "fecha_nacimiento": details.fecha_nacimiento,
            "genero": details.genero,
            "telefono": details.telefono,
            "email": details.email,
            "direccion": details.direccion,
        });
        if let Some(object) = row.as_object_mut() {
            object.extend(clinical);
        }

        debug!("Creating offline patient {} for doctor {}", cedula, doctor_id);

        let rows: Vec<OfflinePatient> = self.supabase
            .insert("offline_patients", row, Some(auth_token))
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    PatientError::DuplicateCedula { cedula: cedula.clone() }
                } else {
                    e.into()
                }
            })?;

        let patient = rows
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Insert returned no rows".to_string()))?;

        info!("Offline patient {} created for doctor {}", patient.id, doctor_id);
        Ok(patient)
    }

    /// Updates the doctor's own offline patient.
    pub async fn update(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        mut changes: Map<String, Value>,
        auth_token: &str,
    ) -> Result<OfflinePatient, PatientError> {
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let query = PostgrestQuery::table("offline_patients")
            .eq("id", patient_id)
            .eq("doctor_id", doctor_id);

        let rows: Vec<OfflinePatient> = self.supabase
            .update(&query, Value::Object(changes), Some(auth_token))
            .await?;

        rows.into_iter().next().ok_or(PatientError::NotFound)
    }
}
