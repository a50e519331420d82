use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub didit_api_key: String,
    pub didit_base_url: String,
    pub didit_workflow_id: String,
    pub didit_callback_url: String,
    pub cedula_api_url: String,
    pub cedula_api_app_id: String,
    pub cedula_api_token: String,
    pub sacs_api_url: String,
    pub ocr_api_url: String,
    pub ocr_api_key: String,
    pub doctor_directory_schema: String,
    /// Offset of the clinic's wall clock from UTC, used for "end of today".
    pub clinic_utc_offset_minutes: i32,
    pub port: u16,
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn with_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

impl AppConfig {
    pub fn from_env() -> Self {
        let clinic_utc_offset_minutes = env::var("CLINIC_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| {
                warn!("CLINIC_UTC_OFFSET_MINUTES not set or invalid, using -240 (America/Caracas)");
                -240
            });

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            didit_api_key: required("DIDIT_API_KEY"),
            didit_base_url: with_default("DIDIT_BASE_URL", "https://verification.didit.me"),
            didit_workflow_id: required("DIDIT_WORKFLOW_ID"),
            didit_callback_url: required("DIDIT_CALLBACK_URL"),
            cedula_api_url: with_default("CEDULA_API_URL", "https://api.cedula.com.ve/api/v1"),
            cedula_api_app_id: required("CEDULA_API_APP_ID"),
            cedula_api_token: required("CEDULA_API_TOKEN"),
            sacs_api_url: required("SACS_API_URL"),
            ocr_api_url: required("OCR_API_URL"),
            ocr_api_key: required("OCR_API_KEY"),
            doctor_directory_schema: with_default("DOCTOR_DIRECTORY_SCHEMA", "doctor_details"),
            clinic_utc_offset_minutes,
            port,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_didit_configured(&self) -> bool {
        !self.didit_api_key.is_empty()
            && !self.didit_base_url.is_empty()
            && !self.didit_workflow_id.is_empty()
    }

    pub fn is_cedula_registry_configured(&self) -> bool {
        !self.cedula_api_url.is_empty()
            && !self.cedula_api_app_id.is_empty()
            && !self.cedula_api_token.is_empty()
    }

    pub fn is_sacs_configured(&self) -> bool {
        !self.sacs_api_url.is_empty()
    }

    pub fn is_ocr_configured(&self) -> bool {
        !self.ocr_api_url.is_empty() && !self.ocr_api_key.is_empty()
    }

    /// Key used for server-side reads that do not run on behalf of a user
    /// (public directory, vendor sync writes). Falls back to the anon key.
    pub fn server_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> AppConfig {
        AppConfig {
            supabase_url: String::new(),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: String::new(),
            supabase_service_role_key: String::new(),
            didit_api_key: String::new(),
            didit_base_url: String::new(),
            didit_workflow_id: String::new(),
            didit_callback_url: String::new(),
            cedula_api_url: String::new(),
            cedula_api_app_id: String::new(),
            cedula_api_token: String::new(),
            sacs_api_url: String::new(),
            ocr_api_url: String::new(),
            ocr_api_key: String::new(),
            doctor_directory_schema: "doctor_details".to_string(),
            clinic_utc_offset_minutes: -240,
            port: 3000,
        }
    }

    #[test]
    fn server_key_falls_back_to_anon_key() {
        let mut config = blank();
        assert_eq!(config.server_key(), "anon");

        config.supabase_service_role_key = "service".to_string();
        assert_eq!(config.server_key(), "service");
    }

    #[test]
    fn vendor_predicates_require_credentials() {
        let mut config = blank();
        assert!(!config.is_configured());
        assert!(!config.is_didit_configured());
        assert!(!config.is_ocr_configured());

        config.didit_api_key = "key".to_string();
        config.didit_base_url = "https://verification.didit.me".to_string();
        config.didit_workflow_id = "wf".to_string();
        assert!(config.is_didit_configured());
    }
}
