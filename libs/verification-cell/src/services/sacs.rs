// libs/verification-cell/src/services/sacs.rs
use reqwest::Client;
use tracing::debug;

use shared_config::AppConfig;

use crate::models::{cedula_digits, SacsRecord, VerificationError};
use crate::services::read_vendor_json;

/// Health-professional registry (SACS) lookup for doctors.
pub struct SacsClient {
    client: Client,
    url: String,
}

impl SacsClient {
    pub fn new(config: &AppConfig) -> Result<Self, VerificationError> {
        if !config.is_sacs_configured() {
            return Err(VerificationError::NotConfigured("SACS registry"));
        }

        Ok(Self {
            client: Client::new(),
            url: config.sacs_api_url.clone(),
        })
    }

    pub async fn lookup(&self, cedula: &str) -> Result<SacsRecord, VerificationError> {
        let digits = cedula_digits(cedula);
        debug!("Looking up cédula {} in SACS", digits);

        let response = self
            .client
            .get(&self.url)
            .query(&[("cedula", digits.as_str())])
            .send()
            .await?;

        read_vendor_json("SACS", response).await
    }
}
