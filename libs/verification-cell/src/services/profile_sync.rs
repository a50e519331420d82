// libs/verification-cell/src/services/profile_sync.rs
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{DiditDecision, DiditSession, VerificationError, VerificationStatus};
use crate::services::DiditClient;

/// Columns written onto `profiles` for a Didit decision.
pub fn profile_update(decision: &DiditDecision) -> Map<String, Value> {
    let status = VerificationStatus::from_didit(&decision.status);

    let mut update = Map::new();
    update.insert("verification_status".to_string(), json!(status));
    update.insert("didit_session_id".to_string(), json!(decision.session_id));

    if status == VerificationStatus::Verified {
        if let Some(id) = &decision.id_verification {
            if let Some(cedula) = id.cedula() {
                update.insert("cedula".to_string(), json!(cedula));
            }
            if let Some(name) = id.display_name() {
                update.insert("nombre_completo".to_string(), json!(name));
            }
            if let Some(dob) = id.date_of_birth {
                update.insert("fecha_nacimiento".to_string(), json!(dob));
            }
            if let Some(nationality) = &id.nationality {
                update.insert("nacionalidad".to_string(), json!(nationality));
            }
        }
        update.insert("verified_at".to_string(), json!(Utc::now().to_rfc3339()));
    }

    update
}

pub struct ProfileVerificationService {
    didit: DiditClient,
    supabase: SupabaseClient,
}

impl ProfileVerificationService {
    pub fn new(config: &AppConfig) -> Result<Self, VerificationError> {
        Ok(Self {
            didit: DiditClient::new(config)?,
            supabase: SupabaseClient::new(config),
        })
    }

    pub async fn start_verification(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<DiditSession, VerificationError> {
        let session = self.didit.create_session(user_id).await?;

        let query = PostgrestQuery::table("profiles").eq("id", user_id);
        let _: Vec<Value> = self.supabase
            .update(
                &query,
                json!({
                    "didit_session_id": session.session_id,
                    "verification_status": VerificationStatus::Pending,
                }),
                Some(auth_token),
            )
            .await?;

        Ok(session)
    }

    pub async fn sync_status(
        &self,
        user_id: &str,
        session_id: &str,
        auth_token: &str,
    ) -> Result<VerificationStatus, VerificationError> {
        let decision = self.didit.get_decision(session_id).await?;

        if decision.vendor_data.as_deref() != Some(user_id) {
            warn!("User {} tried to sync Didit session {} owned by someone else", user_id, session_id);
            return Err(VerificationError::SessionMismatch);
        }

        let update = profile_update(&decision);
        let query = PostgrestQuery::table("profiles").eq("id", user_id);
        let _: Vec<Value> = self.supabase
            .update(&query, Value::Object(update), Some(auth_token))
            .await?;

        let status = VerificationStatus::from_didit(&decision.status);
        info!("Verification status for user {} is now {:?}", user_id, status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiditIdVerification;

    #[test]
    fn approved_decision_copies_identity_fields() {
        let decision = DiditDecision {
            session_id: "abc".to_string(),
            status: "Approved".to_string(),
            vendor_data: None,
            id_verification: Some(DiditIdVerification {
                document_number: Some("V-9876543".to_string()),
                first_name: Some("Ana".to_string()),
                last_name: Some("Gómez".to_string()),
                nationality: Some("VEN".to_string()),
                ..Default::default()
            }),
        };

        let update = profile_update(&decision);
        assert_eq!(update["verification_status"], "verified");
        assert_eq!(update["cedula"], "9876543");
        assert_eq!(update["nombre_completo"], "Ana Gómez");
        assert_eq!(update["nacionalidad"], "VEN");
        assert!(update.contains_key("verified_at"));
    }

    #[test]
    fn declined_decision_only_records_status() {
        let decision = DiditDecision {
            session_id: "abc".to_string(),
            status: "Declined".to_string(),
            vendor_data: None,
            id_verification: Some(DiditIdVerification {
                document_number: Some("V-9876543".to_string()),
                ..Default::default()
            }),
        };

        let update = profile_update(&decision);
        assert_eq!(update["verification_status"], "rejected");
        assert!(!update.contains_key("cedula"));
        assert!(!update.contains_key("verified_at"));
    }
}
