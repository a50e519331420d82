// libs/verification-cell/src/services/didit.rs
use reqwest::Client;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::models::{DiditDecision, DiditSession, DiditSessionRequest, VerificationError};
use crate::services::read_vendor_json;

/// Didit identity verification API (v2 sessions).
pub struct DiditClient {
    client: Client,
    base_url: String,
    api_key: String,
    workflow_id: String,
    callback_url: String,
}

impl DiditClient {
    pub fn new(config: &AppConfig) -> Result<Self, VerificationError> {
        if !config.is_didit_configured() {
            return Err(VerificationError::NotConfigured("Didit"));
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.didit_base_url.trim_end_matches('/').to_string(),
            api_key: config.didit_api_key.clone(),
            workflow_id: config.didit_workflow_id.clone(),
            callback_url: config.didit_callback_url.clone(),
        })
    }

    /// POST /v2/session/
    pub async fn create_session(&self, vendor_data: &str) -> Result<DiditSession, VerificationError> {
        let url = format!("{}/v2/session/", self.base_url);
        debug!("Creating Didit session for {}", vendor_data);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&DiditSessionRequest {
                workflow_id: self.workflow_id.clone(),
                vendor_data: vendor_data.to_string(),
                callback: self.callback_url.clone(),
            })
            .send()
            .await?;

        let session: DiditSession = read_vendor_json("Didit", response).await?;
        info!("Didit session {} created", session.session_id);
        Ok(session)
    }

    /// GET /v2/session/{id}/decision/
    pub async fn get_decision(&self, session_id: &str) -> Result<DiditDecision, VerificationError> {
        if session_id.trim().is_empty() || !session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(VerificationError::InvalidInput("Invalid session id".to_string()));
        }

        let url = format!("{}/v2/session/{}/decision/", self.base_url, session_id);
        debug!("Fetching Didit decision for session {}", session_id);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        read_vendor_json("Didit", response).await
    }
}
