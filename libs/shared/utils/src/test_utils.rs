use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub vendor_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            vendor_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    /// Points Supabase and every vendor client at the same mock server.
    pub fn with_mock_server(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            vendor_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            supabase_service_role_key: String::new(),
            didit_api_key: "test-didit-key".to_string(),
            didit_base_url: self.vendor_url.clone(),
            didit_workflow_id: "test-workflow".to_string(),
            didit_callback_url: "https://app.example.com/verificacion".to_string(),
            cedula_api_url: format!("{}/cedula", self.vendor_url),
            cedula_api_app_id: "test-app".to_string(),
            cedula_api_token: "test-token".to_string(),
            sacs_api_url: format!("{}/sacs", self.vendor_url),
            ocr_api_url: format!("{}/ocr", self.vendor_url),
            ocr_api_key: "test-ocr-key".to_string(),
            doctor_directory_schema: "doctor_details".to_string(),
            clinic_utc_offset_minutes: -240,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "paciente".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "medico")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "paciente")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).unwrap_or_default()
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some("authenticated".to_string()),
            app_metadata: Some(json!({ "role": self.role })),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": { "role": user.role },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_response(
        appointment_id: &str,
        doctor_id: &str,
        patient_id: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "paciente_id": patient_id,
            "offline_patient_id": null,
            "medico_id": doctor_id,
            "fecha_hora": Utc::now().to_rfc3339(),
            "duracion_minutos": 30,
            "status": status,
            "tipo_cita": "presencial",
            "motivo": "Consulta médica",
            "notas": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn offline_patient_response(patient_id: &str, doctor_id: &str, cedula: &str, name: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "doctor_id": doctor_id,
            "cedula": cedula,
            "nombre_completo": name,
            "edad": null,
            "fecha_nacimiento": null,
            "genero": null,
            "telefono": null,
            "email": null,
            "direccion": null,
            "alergias": null,
            "condiciones_cronicas": null,
            "medicamentos_actuales": null,
            "notas_medicas": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn profile_response(user_id: &str, cedula: &str, name: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "cedula": cedula,
            "nombre_completo": name,
            "email": "paciente@example.com",
            "telefono": null,
            "fecha_nacimiento": "1990-01-01",
            "genero": "F"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::UserRole;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(app_config.is_didit_configured());
        assert!(app_config.is_cedula_registry_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.role, "medico");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.app_role(), Some(UserRole::Medico));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
