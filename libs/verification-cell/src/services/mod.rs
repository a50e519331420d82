pub mod cedula_registry;
pub mod didit;
pub mod photo;
pub mod profile_sync;
pub mod sacs;

pub use cedula_registry::{CedulaRegistry, CedulaRegistryClient};
pub use didit::DiditClient;
pub use photo::PhotoVerifier;
pub use profile_sync::ProfileVerificationService;
pub use sacs::SacsClient;

use serde::de::DeserializeOwned;
use tracing::error;

use crate::models::VerificationError;

/// Decodes a vendor response, keeping 4xx and 5xx apart.
pub(crate) async fn read_vendor_json<T: DeserializeOwned>(
    vendor: &str,
    response: reqwest::Response,
) -> Result<T, VerificationError> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_client_error() {
        error!("{} rejected request: {} - {}", vendor, status, text);
        return Err(VerificationError::Upstream {
            status: status.as_u16(),
            message: text,
        });
    }
    if !status.is_success() {
        error!("{} failed: {} - {}", vendor, status, text);
        return Err(VerificationError::Unavailable(format!("{} returned {}", vendor, status)));
    }

    serde_json::from_str(&text).map_err(|e| {
        error!("Failed to parse {} response: {}", vendor, e);
        VerificationError::Unavailable(format!("Invalid {} response", vendor))
    })
}
