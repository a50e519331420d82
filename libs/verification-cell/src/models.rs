// libs/verification-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shared_database::SupabaseError;

/// Digits of a cédula as typed (`V-12.345.678` -> `12345678`).
pub fn cedula_digits(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ==============================================================================
// DIDIT
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DiditSessionRequest {
    pub workflow_id: String,
    pub vendor_data: String,
    pub callback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiditSession {
    pub session_id: String,
    pub url: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatusRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiditIdVerification {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub personal_number: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
}

impl DiditIdVerification {
    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = self.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return Some(full.to_string());
        }

        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        (!parts.is_empty()).then(|| parts.join(" "))
    }

    /// Cédula number without the nationality prefix.
    pub fn cedula(&self) -> Option<String> {
        let raw = self.document_number.as_deref().or(self.personal_number.as_deref())?;
        let trimmed = raw.trim();
        let unprefixed = trimmed
            .strip_prefix("V-")
            .or_else(|| trimmed.strip_prefix("E-"))
            .unwrap_or(trimmed);
        let digits = cedula_digits(unprefixed);
        (!digits.is_empty()).then_some(digits)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiditDecision {
    pub session_id: String,
    pub status: String,
    #[serde(default)]
    pub vendor_data: Option<String>,
    #[serde(default)]
    pub id_verification: Option<DiditIdVerification>,
}

/// Value of `profiles.verification_status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    InReview,
    Verified,
    Rejected,
    Expired,
}

impl VerificationStatus {
    pub fn from_didit(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "approved" => VerificationStatus::Verified,
            "declined" => VerificationStatus::Rejected,
            "in review" | "in_review" => VerificationStatus::InReview,
            "abandoned" | "expired" => VerificationStatus::Expired,
            _ => VerificationStatus::Pending,
        }
    }
}

// ==============================================================================
// CEDULA REGISTRY / SACS
// ==============================================================================

fn default_nacionalidad() -> String {
    "V".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateCedulaRequest {
    pub cedula: String,
    #[serde(default = "default_nacionalidad")]
    pub nacionalidad: String,
    #[serde(default)]
    pub tipo_usuario: Option<String>,
}

/// Person as returned by the national cédula registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistryPerson {
    #[serde(default)]
    pub nacionalidad: Option<String>,
    pub cedula: serde_json::Value,
    #[serde(default)]
    pub primer_nombre: Option<String>,
    #[serde(default)]
    pub segundo_nombre: Option<String>,
    #[serde(default)]
    pub primer_apellido: Option<String>,
    #[serde(default)]
    pub segundo_apellido: Option<String>,
    #[serde(default)]
    pub fecha_nac: Option<String>,
}

impl RegistryPerson {
    pub fn full_name(&self) -> String {
        [
            self.primer_nombre.as_deref(),
            self.segundo_nombre.as_deref(),
            self.primer_apellido.as_deref(),
            self.segundo_apellido.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn cedula_string(&self) -> String {
        match &self.cedula {
            serde_json::Value::String(s) => cedula_digits(s),
            other => cedula_digits(&other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CedulaApiResponse {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub error_str: Option<String>,
    #[serde(default)]
    pub data: Option<RegistryPerson>,
}

/// Health-professional registry entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SacsRecord {
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub profesion: Option<String>,
    #[serde(default)]
    pub matricula: Option<String>,
    #[serde(default)]
    pub especialidades: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CedulaValidation {
    pub valid: bool,
    pub cedula: String,
    pub nacionalidad: String,
    pub nombre_completo: Option<String>,
    pub fecha_nacimiento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sacs: Option<SacsRecord>,
}

// ==============================================================================
// PHOTO VERIFICATION
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPhotoRequest {
    pub image_base64: String,
    pub cedula: String,
    #[serde(default)]
    pub nombre: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PhotoVerification {
    pub verified: bool,
    pub cedula_match: bool,
    pub name_match: Option<bool>,
    pub extracted_cedula: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Verification session does not belong to this user")]
    SessionMismatch,

    #[error("Upstream rejected the request ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<reqwest::Error> for VerificationError {
    fn from(err: reqwest::Error) -> Self {
        VerificationError::Unavailable(err.to_string())
    }
}

impl From<SupabaseError> for VerificationError {
    fn from(err: SupabaseError) -> Self {
        VerificationError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn didit_statuses_map_to_profile_statuses() {
        assert_eq!(VerificationStatus::from_didit("Approved"), VerificationStatus::Verified);
        assert_eq!(VerificationStatus::from_didit("Declined"), VerificationStatus::Rejected);
        assert_eq!(VerificationStatus::from_didit("In Review"), VerificationStatus::InReview);
        assert_eq!(VerificationStatus::from_didit("Abandoned"), VerificationStatus::Expired);
        assert_eq!(VerificationStatus::from_didit("Not Started"), VerificationStatus::Pending);
    }

    #[test]
    fn document_number_loses_nationality_prefix() {
        let id = DiditIdVerification {
            document_number: Some("V-12.345.678".to_string()),
            ..Default::default()
        };
        assert_eq!(id.cedula().as_deref(), Some("12345678"));
    }

    #[test]
    fn display_name_prefers_full_name() {
        let id = DiditIdVerification {
            full_name: Some("María José Pérez".to_string()),
            first_name: Some("María".to_string()),
            ..Default::default()
        };
        assert_eq!(id.display_name().as_deref(), Some("María José Pérez"));

        let id = DiditIdVerification {
            first_name: Some("Luis".to_string()),
            last_name: Some("Rivas".to_string()),
            ..Default::default()
        };
        assert_eq!(id.display_name().as_deref(), Some("Luis Rivas"));
    }

    #[test]
    fn registry_person_joins_name_parts() {
        let person: RegistryPerson = serde_json::from_value(json!({
            "nacionalidad": "V",
            "cedula": 12345678,
            "primer_nombre": "ANA",
            "segundo_nombre": "",
            "primer_apellido": "GOMEZ",
            "segundo_apellido": "RUIZ"
        }))
        .unwrap();

        assert_eq!(person.full_name(), "ANA GOMEZ RUIZ");
        assert_eq!(person.cedula_string(), "12345678");
    }
}
