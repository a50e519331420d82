use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::SupabaseError;

// ==============================================================================
// OFFLINE PATIENTS
// ==============================================================================

/// Row of `offline_patients`: a patient created by a doctor without a
/// platform account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfflinePatient {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub cedula: String,
    pub nombre_completo: String,
    #[serde(default)]
    pub edad: Option<u32>,
    #[serde(default)]
    pub fecha_nacimiento: Option<NaiveDate>,
    #[serde(default)]
    pub genero: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub alergias: Option<Vec<String>>,
    #[serde(default)]
    pub condiciones_cronicas: Option<Vec<String>>,
    #[serde(default)]
    pub medicamentos_actuales: Option<Vec<String>>,
    #[serde(default)]
    pub notas_medicas: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Demographics for a new offline patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflinePatientDetails {
    pub cedula: String,
    pub nombre_completo: String,
    #[serde(default)]
    pub edad: Option<u32>,
    #[serde(default)]
    pub fecha_nacimiento: Option<NaiveDate>,
    #[serde(default)]
    pub genero: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub direccion: Option<String>,
}

// ==============================================================================
// QUICK REGISTRATION
// ==============================================================================

/// Query string of the quick-registration screen. Every field is optional
/// and untrusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrefillQuery {
    pub cedula: Option<String>,
    pub nombre: Option<String>,
    pub edad: Option<String>,
    pub genero: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuickRegistrationPrefill {
    pub cedula: String,
    pub nombre_completo: String,
    pub edad: Option<u32>,
    pub genero: Option<String>,
}

/// Age from a query value. Any non-negative number counts, a fractional part
/// is dropped (`35.5` is 35); anything else is no age.
pub fn parse_age(raw: Option<&str>) -> Option<u32> {
    let value = raw?.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty()
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    whole.parse::<u32>().ok()
}

impl From<PrefillQuery> for QuickRegistrationPrefill {
    fn from(query: PrefillQuery) -> Self {
        Self {
            cedula: query.cedula.as_deref().map(verification_cell::cedula_digits).unwrap_or_default(),
            nombre_completo: query.nombre.map(|n| n.trim().to_string()).unwrap_or_default(),
            edad: parse_age(query.edad.as_deref()),
            genero: query.genero.map(|g| g.trim().to_string()).filter(|g| !g.is_empty()),
        }
    }
}

// ==============================================================================
// CONSULTATION SAVE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnosis {
    #[serde(default, alias = "codigo", alias = "code_icd")]
    pub code: Option<String>,
    #[serde(alias = "descripcion")]
    pub description: String,
}

/// A clinical list as the form sends it: an array, or free text separated
/// by commas or newlines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ClinicalListInput {
    List(Vec<String>),
    Text(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultationSaveRequest {
    #[serde(default)]
    pub paciente_id: Option<Uuid>,
    #[serde(default)]
    pub offline_patient_id: Option<Uuid>,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    /// Required when saving a first-time offline patient.
    #[serde(default)]
    pub patient: Option<OfflinePatientDetails>,
    #[serde(default)]
    pub alergias: Option<ClinicalListInput>,
    #[serde(default)]
    pub condiciones_cronicas: Option<ClinicalListInput>,
    #[serde(default)]
    pub medicamentos_actuales: Option<ClinicalListInput>,
    #[serde(default)]
    pub notas: Option<String>,
    #[serde(default)]
    pub diagnosticos: Vec<Diagnosis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationSaveResponse {
    pub patient_id: Uuid,
    pub offline: bool,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_record_id: Option<Uuid>,
    pub redirect_to: String,
}

// ==============================================================================
// INTAKE
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatientKind {
    Offline,
    Registered,
}

/// Patient in a doctor's roster, either kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    pub id: Uuid,
    pub kind: PatientKind,
    pub cedula: Option<String>,
    pub nombre_completo: String,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CedulaLookupOutcome {
    TooShort,
    LocalMatch {
        patient: PatientSummary,
    },
    RegistryMatch {
        cedula: String,
        nombre: String,
        quick_registration_path: String,
    },
    NotFound {
        cedula: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: Uuid,
    pub nombre: String,
    #[serde(default)]
    pub principio_activo: Option<String>,
    #[serde(default)]
    pub presentacion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedicationSearchQuery {
    pub q: String,
}

/// Messages the intake screen sends over its socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntakeClientMessage {
    CedulaInput { value: String },
    MedicationInput { value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntakeServerMessage {
    CedulaResult { input: String, outcome: CedulaLookupOutcome },
    MedicationResults { query: String, results: Vec<Medication> },
    Error { message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntakeSocketQuery {
    pub access_token: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("A patient with cédula {cedula} is already registered")]
    DuplicateCedula { cedula: String },

    #[error("Unauthorized access to patient data")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<SupabaseError> for PatientError {
    fn from(err: SupabaseError) -> Self {
        PatientError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn age_parses_only_plain_integers() {
        assert_eq!(parse_age(Some("35")), Some(35));
        assert_eq!(parse_age(Some(" 7 ")), Some(7));
        assert_eq!(parse_age(Some("abc")), None);
        assert_eq!(parse_age(Some("-3")), None);
        assert_eq!(parse_age(Some("35.5")), Some(35));
        assert_eq!(parse_age(Some("200")), Some(200));
        assert_eq!(parse_age(Some("3.5.1")), None);
        assert_eq!(parse_age(Some(".5")), None);
        assert_eq!(parse_age(Some("")), None);
        assert_eq!(parse_age(None), None);
    }

    #[test]
    fn prefill_normalises_query() {
        let prefill = QuickRegistrationPrefill::from(PrefillQuery {
            cedula: Some("V-12.345.678".to_string()),
            nombre: Some("  Ana Gómez ".to_string()),
            edad: Some("abc".to_string()),
            genero: Some("".to_string()),
        });

        assert_eq!(prefill.cedula, "12345678");
        assert_eq!(prefill.nombre_completo, "Ana Gómez");
        assert_eq!(prefill.edad, None);
        assert_eq!(prefill.genero, None);
    }

    #[test]
    fn clinical_list_accepts_array_or_text() {
        let list: ClinicalListInput = serde_json::from_value(json!(["Penicilina"])).unwrap();
        assert_eq!(list, ClinicalListInput::List(vec!["Penicilina".to_string()]));

        let text: ClinicalListInput = serde_json::from_value(json!("Penicilina, Polen")).unwrap();
        assert_eq!(text, ClinicalListInput::Text("Penicilina, Polen".to_string()));
    }

    #[test]
    fn lookup_outcome_is_tagged_by_status() {
        let outcome = CedulaLookupOutcome::NotFound { cedula: "12345678".to_string() };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "status": "not_found", "cedula": "12345678" })
        );
        assert_eq!(serde_json::to_value(CedulaLookupOutcome::TooShort).unwrap(), json!({ "status": "too_short" }));
    }

    #[test]
    fn client_messages_parse() {
        let msg: IntakeClientMessage =
            serde_json::from_str(r#"{"type":"cedula_input","value":"1234"}"#).unwrap();
        assert_eq!(msg, IntakeClientMessage::CedulaInput { value: "1234".to_string() });
    }
}
