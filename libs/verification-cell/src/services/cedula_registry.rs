// libs/verification-cell/src/services/cedula_registry.rs
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{cedula_digits, CedulaApiResponse, RegistryPerson, VerificationError};
use crate::services::read_vendor_json;

/// National identity registry lookup.
#[async_trait]
pub trait CedulaRegistry: Send + Sync {
    /// `Ok(None)` when the registry has no record for the number.
    async fn lookup(&self, nacionalidad: &str, cedula: &str) -> Result<Option<RegistryPerson>, VerificationError>;
}

pub struct CedulaRegistryClient {
    client: Client,
    url: String,
    app_id: String,
    token: String,
}

impl CedulaRegistryClient {
    pub fn new(config: &AppConfig) -> Result<Self, VerificationError> {
        if !config.is_cedula_registry_configured() {
            return Err(VerificationError::NotConfigured("Cedula registry"));
        }

        Ok(Self {
            client: Client::new(),
            url: config.cedula_api_url.clone(),
            app_id: config.cedula_api_app_id.clone(),
            token: config.cedula_api_token.clone(),
        })
    }
}

#[async_trait]
impl CedulaRegistry for CedulaRegistryClient {
    async fn lookup(&self, nacionalidad: &str, cedula: &str) -> Result<Option<RegistryPerson>, VerificationError> {
        let digits = cedula_digits(cedula);
        if digits.is_empty() {
            return Err(VerificationError::InvalidInput("Cédula must contain digits".to_string()));
        }

        let nacionalidad = match nacionalidad.trim().to_ascii_uppercase().as_str() {
            "E" => "E",
            _ => "V",
        };

        debug!("Looking up cédula {}-{} in national registry", nacionalidad, digits);

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("app_id", self.app_id.as_str()),
                ("token", self.token.as_str()),
                ("nacionalidad", nacionalidad),
                ("cedula", digits.as_str()),
            ])
            .send()
            .await?;

        let body: CedulaApiResponse = read_vendor_json("Cedula registry", response).await?;

        if body.error {
            // The registry reports unknown numbers as an error payload.
            warn!("Cedula registry error for {}: {}", digits, body.error_str.unwrap_or_default());
            return Ok(None);
        }

        Ok(body.data.filter(|person| !person.full_name().is_empty()))
    }
}
