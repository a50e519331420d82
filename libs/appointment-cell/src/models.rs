// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

fn default_duration() -> i32 {
    ConsultationDefaults::default().duration_minutes
}

/// Row of the `appointments` table. Column names follow the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    #[serde(rename = "paciente_id", default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub offline_patient_id: Option<Uuid>,
    #[serde(rename = "medico_id")]
    pub doctor_id: Uuid,
    #[serde(rename = "fecha_hora")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(rename = "duracion_minutos", default = "default_duration")]
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    #[serde(rename = "tipo_cita", default)]
    pub visit_type: VisitType,
    #[serde(rename = "motivo", default)]
    pub reason: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn patient_ref(&self) -> Option<PatientRef> {
        match (self.patient_id, self.offline_patient_id) {
            (Some(id), None) => Some(PatientRef::Registered(id)),
            (None, Some(id)) => Some(PatientRef::Offline(id)),
            _ => None,
        }
    }

    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InConsultation,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InConsultation,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Statuses that end an appointment's life.
    pub const TERMINAL: [AppointmentStatus; 2] = [
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InConsultation => "in_consultation",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    #[default]
    #[serde(alias = "in_person")]
    Presencial,
    #[serde(alias = "telehealth", alias = "virtual")]
    Telemedicina,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::Presencial => "presencial",
            VisitType::Telemedicina => "telemedicina",
        }
    }
}

/// Who the appointment is for: a platform account or a doctor-created
/// offline patient. The two live in different columns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PatientRef {
    Registered(Uuid),
    Offline(Uuid),
}

impl PatientRef {
    pub fn from_ids(
        paciente_id: Option<Uuid>,
        offline_patient_id: Option<Uuid>,
    ) -> Result<Self, AppointmentError> {
        match (paciente_id, offline_patient_id) {
            (Some(id), None) => Ok(PatientRef::Registered(id)),
            (None, Some(id)) => Ok(PatientRef::Offline(id)),
            (Some(_), Some(_)) => Err(AppointmentError::InvalidPatientReference(
                "Provide either paciente_id or offline_patient_id, not both".to_string(),
            )),
            (None, None) => Err(AppointmentError::InvalidPatientReference(
                "paciente_id or offline_patient_id is required".to_string(),
            )),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            PatientRef::Registered(id) | PatientRef::Offline(id) => *id,
        }
    }

    /// Column holding this kind of reference; also the query parameter name
    /// used by the consultation screen.
    pub fn column(&self) -> &'static str {
        match self {
            PatientRef::Registered(_) => "paciente_id",
            PatientRef::Offline(_) => "offline_patient_id",
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConsultationRequest {
    pub paciente_id: Option<Uuid>,
    pub offline_patient_id: Option<Uuid>,
    /// Only honoured for admins; doctors always start their own consultations.
    pub medico_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConsultationResponse {
    pub appointment: Appointment,
    pub created: bool,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveConsultationQuery {
    pub paciente_id: Option<Uuid>,
    pub offline_patient_id: Option<Uuid>,
    pub medico_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAppointmentRequest {
    pub medico_id: Option<Uuid>,
    pub paciente_id: Option<Uuid>,
    pub offline_patient_id: Option<Uuid>,
    pub fecha_hora: DateTime<Utc>,
    pub duracion_minutos: Option<i32>,
    pub tipo_cita: Option<VisitType>,
    pub motivo: Option<String>,
    pub notas: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub notas: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
}

/// Today's appointment counts per status, as shown on the dashboard widget.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppointmentCounts {
    pub pending: u32,
    pub confirmed: u32,
    pub in_consultation: u32,
    pub completed: u32,
    pub cancelled: u32,
    pub total: u32,
}

impl AppointmentCounts {
    pub fn tally<I: IntoIterator<Item = AppointmentStatus>>(statuses: I) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                AppointmentStatus::Pending => counts.pending += 1,
                AppointmentStatus::Confirmed => counts.confirmed += 1,
                AppointmentStatus::InConsultation => counts.in_consultation += 1,
                AppointmentStatus::Completed => counts.completed += 1,
                AppointmentStatus::Cancelled => counts.cancelled += 1,
            }
            counts.total += 1;
        }
        counts
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid patient reference: {0}")]
    InvalidPatientReference(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<shared_database::SupabaseError> for AppointmentError {
    fn from(err: shared_database::SupabaseError) -> Self {
        if err.is_conflict() {
            AppointmentError::Conflict(err.to_string())
        } else {
            AppointmentError::DatabaseError(err.to_string())
        }
    }
}

// ==============================================================================
// DEFAULTS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct ConsultationDefaults {
    pub duration_minutes: i32,
    pub reason: String,
    pub visit_type: VisitType,
    /// How far back an unfinished appointment still counts as the current one.
    pub lookback_hours: i64,
    pub min_duration_minutes: i32,
    pub max_duration_minutes: i32,
}

impl Default for ConsultationDefaults {
    fn default() -> Self {
        Self {
            duration_minutes: 30,
            reason: "Consulta médica".to_string(),
            visit_type: VisitType::Presencial,
            lookback_hours: 24,
            min_duration_minutes: 5,
            max_duration_minutes: 240,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_database_row() {
        let id = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let patient = Uuid::new_v4();
        let row = json!({
            "id": id,
            "paciente_id": patient,
            "offline_patient_id": null,
            "medico_id": doctor,
            "fecha_hora": "2026-10-18T14:00:00Z",
            "duracion_minutos": 45,
            "status": "in_consultation",
            "tipo_cita": "telemedicina",
            "motivo": "Control",
            "notas": null
        });

        let appointment: Appointment = serde_json::from_value(row).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::InConsultation);
        assert_eq!(appointment.visit_type, VisitType::Telemedicina);
        assert_eq!(appointment.patient_ref(), Some(PatientRef::Registered(patient)));
        assert_eq!(appointment.duration_minutes, 45);
        assert!(appointment.is_active());
    }

    #[test]
    fn missing_optional_columns_use_defaults() {
        let row = json!({
            "id": Uuid::new_v4(),
            "offline_patient_id": Uuid::new_v4(),
            "medico_id": Uuid::new_v4(),
            "fecha_hora": "2026-10-18T14:00:00Z",
            "status": "completed"
        });

        let appointment: Appointment = serde_json::from_value(row).unwrap();
        assert_eq!(appointment.duration_minutes, 30);
        assert_eq!(appointment.visit_type, VisitType::Presencial);
        assert!(!appointment.is_active());
        assert!(matches!(appointment.patient_ref(), Some(PatientRef::Offline(_))));
    }

    #[test]
    fn patient_reference_requires_exactly_one_id() {
        let id = Uuid::new_v4();
        assert_eq!(PatientRef::from_ids(Some(id), None).unwrap().column(), "paciente_id");
        assert_eq!(PatientRef::from_ids(None, Some(id)).unwrap().column(), "offline_patient_id");
        assert!(PatientRef::from_ids(Some(id), Some(id)).is_err());
        assert!(PatientRef::from_ids(None, None).is_err());
    }

    #[test]
    fn counts_tally_every_status() {
        let counts = AppointmentCounts::tally(vec![
            AppointmentStatus::Pending,
            AppointmentStatus::Pending,
            AppointmentStatus::InConsultation,
            AppointmentStatus::Cancelled,
        ]);

        assert_eq!(counts.pending, 2);
        assert_eq!(counts.in_consultation, 1);
        assert_eq!(counts.cancelled, 1);
        assert_eq!(counts.completed, 0);
        assert_eq!(counts.total, 4);
    }
}
