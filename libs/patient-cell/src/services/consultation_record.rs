use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{ConsultationSaveRequest, ConsultationSaveResponse, PatientError};
use crate::services::consultation_notes::{compose_notes, normalize_list};
use crate::services::offline_patient::OfflinePatientService;

pub fn offline_patient_path(patient_id: Uuid) -> String {
    format!("/dashboard/medico/pacientes/offline/{}", patient_id)
}

pub fn registered_patient_path(patient_id: Uuid) -> String {
    format!("/dashboard/medico/pacientes/{}", patient_id)
}

/// Clinical columns shared by `offline_patients` and `medical_records`.
struct ClinicalFields {
    alergias: Option<Vec<String>>,
    condiciones_cronicas: Option<Vec<String>>,
    medicamentos_actuales: Option<Vec<String>>,
    notas: Option<String>,
}

impl ClinicalFields {
    fn from_request(request: &ConsultationSaveRequest) -> Self {
        Self {
            alergias: normalize_list(request.alergias.as_ref()),
            condiciones_cronicas: normalize_list(request.condiciones_cronicas.as_ref()),
            medicamentos_actuales: normalize_list(request.medicamentos_actuales.as_ref()),
            notas: compose_notes(request.notas.as_deref(), &request.diagnosticos),
        }
    }

    fn offline_columns(self) -> Map<String, Value> {
        let mut columns = Map::new();
        columns.insert("alergias".to_string(), json!(self.alergias));
        columns.insert("condiciones_cronicas".to_string(), json!(self.condiciones_cronicas));
        columns.insert("medicamentos_actuales".to_string(), json!(self.medicamentos_actuales));
        columns.insert("notas_medicas".to_string(), json!(self.notas));
        columns
    }
}

#[derive(Deserialize)]
struct MedicalRecordRow {
    id: Uuid,
}

/// Persists the consultation form. Appointment status is not touched here.
pub struct ConsultationRecordService {
    supabase: Arc<SupabaseClient>,
    offline_patients: OfflinePatientService,
}

impl ConsultationRecordService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            offline_patients: OfflinePatientService::with_client(Arc::clone(&supabase)),
            supabase,
        }
    }

    pub async fn save(
        &self,
        doctor_id: Uuid,
        request: ConsultationSaveRequest,
        auth_token: &str,
    ) -> Result<ConsultationSaveResponse, PatientError> {
        if request.paciente_id.is_some() && request.offline_patient_id.is_some() {
            return Err(PatientError::ValidationError(
                "Provide either paciente_id or offline_patient_id, not both".to_string(),
            ));
        }

        let fields = ClinicalFields::from_request(&request);

        if let Some(paciente_id) = request.paciente_id {
            return self.save_registered(doctor_id, paciente_id, request.appointment_id, fields, auth_token).await;
        }

        match request.offline_patient_id {
            Some(patient_id) => {
                let patient = self.offline_patients
                    .update(doctor_id, patient_id, fields.offline_columns(), auth_token)
                    .await?;
                info!("Consultation saved on offline patient {}", patient.id);

                Ok(ConsultationSaveResponse {
                    patient_id: patient.id,
                    offline: true,
                    created: false,
                    medical_record_id: None,
                    redirect_to: offline_patient_path(patient.id),
                })
            }
            None => {
                let details = request.patient.ok_or_else(|| {
                    PatientError::ValidationError("Patient details are required for a new patient".to_string())
                })?;
                let patient = self.offline_patients
                    .create(doctor_id, details, fields.offline_columns(), auth_token)
                    .await?;
                info!("Consultation saved with new offline patient {}", patient.id);

                Ok(ConsultationSaveResponse {
                    patient_id: patient.id,
                    offline: true,
                    created: true,
                    medical_record_id: None,
                    redirect_to: offline_patient_path(patient.id),
                })
            }
        }
    }

    async fn save_registered(
        &self,
        doctor_id: Uuid,
        paciente_id: Uuid,
        appointment_id: Option<Uuid>,
        fields: ClinicalFields,
        auth_token: &str,
    ) -> Result<ConsultationSaveResponse, PatientError> {
        let row = json!({
            "paciente_id": paciente_id,
            "medico_id": doctor_id,
            "appointment_id": appointment_id,
            "tipo": "consulta",
            "alergias": fields.alergias,
            "condiciones_cronicas": fields.condiciones_cronicas,
            "medicamentos_actuales": fields.medicamentos_actuales,
            "notas": fields.notas,
        });

        let rows: Vec<MedicalRecordRow> = self.supabase
            .insert("medical_records", row, Some(auth_token))
            .await?;
        let record = rows
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Insert returned no rows".to_string()))?;

        info!("Medical record {} saved for patient {}", record.id, paciente_id);
        Ok(ConsultationSaveResponse {
            patient_id: paciente_id,
            offline: false,
            created: true,
            medical_record_id: Some(record.id),
            redirect_to: registered_patient_path(paciente_id),
        })
    }
}
