use std::sync::Arc;

use tracing::{debug, warn};

use shared_config::AppConfig;
use verification_cell::{cedula_digits, CedulaRegistry, CedulaRegistryClient};

use crate::models::{CedulaLookupOutcome, PatientSummary};
use crate::services::roster::find_in_roster;

pub const MIN_CEDULA_DIGITS: usize = 6;
const QUICK_REGISTRATION_PATH: &str = "/dashboard/medico/pacientes/registro-rapido";

pub fn quick_registration_path(cedula: &str, nombre: &str) -> String {
    format!(
        "{}?cedula={}&nombre={}",
        QUICK_REGISTRATION_PATH,
        urlencoding::encode(cedula),
        urlencoding::encode(nombre)
    )
}

/// Resolves a typed cédula: the doctor's roster first, then the national
/// registry.
#[derive(Clone)]
pub struct CedulaIntakeService {
    registry: Option<Arc<dyn CedulaRegistry>>,
}

impl CedulaIntakeService {
    pub fn new(registry: Option<Arc<dyn CedulaRegistry>>) -> Self {
        Self { registry }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let registry = match CedulaRegistryClient::new(config) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn CedulaRegistry>),
            Err(e) => {
                warn!("Registry lookups disabled: {}", e);
                None
            }
        };
        Self::new(registry)
    }

    pub async fn lookup(&self, roster: &[PatientSummary], input: &str) -> CedulaLookupOutcome {
        let digits = cedula_digits(input);
        if digits.len() < MIN_CEDULA_DIGITS {
            return CedulaLookupOutcome::TooShort;
        }

        if let Some(patient) = find_in_roster(roster, &digits) {
            debug!("Cédula {} matched local patient {}", digits, patient.id);
            return CedulaLookupOutcome::LocalMatch { patient: patient.clone() };
        }

        let Some(registry) = &self.registry else {
            return CedulaLookupOutcome::NotFound { cedula: digits };
        };

        match registry.lookup("V", &digits).await {
            Ok(Some(person)) => {
                let nombre = person.full_name();
                CedulaLookupOutcome::RegistryMatch {
                    quick_registration_path: quick_registration_path(&digits, &nombre),
                    cedula: digits,
                    nombre,
                }
            }
            Ok(None) => CedulaLookupOutcome::NotFound { cedula: digits },
            Err(e) => {
                warn!("Registry lookup for {} failed, reporting not found: {}", digits, e);
                CedulaLookupOutcome::NotFound { cedula: digits }
            }
        }
    }
}
