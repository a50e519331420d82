use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use shared_utils::debounce::Debouncer;
use verification_cell::cedula_digits;

use crate::models::{CedulaLookupOutcome, IntakeClientMessage, IntakeServerMessage, PatientSummary};
use crate::services::intake::{CedulaIntakeService, MIN_CEDULA_DIGITS};
use crate::services::medications::MedicationCatalog;

pub const CEDULA_DEBOUNCE_MS: u64 = 800;
pub const MEDICATION_DEBOUNCE_MS: u64 = 150;

/// State of one intake socket. Keystrokes are debounced; dropping the
/// session cancels any search still waiting to run.
pub struct IntakeSession {
    intake: CedulaIntakeService,
    medications: MedicationCatalog,
    roster: Arc<Vec<PatientSummary>>,
    auth_token: Arc<str>,
    outbox: mpsc::UnboundedSender<IntakeServerMessage>,
    cedula_search: Debouncer,
    medication_search: Debouncer,
}

impl IntakeSession {
    pub fn new(
        intake: CedulaIntakeService,
        medications: MedicationCatalog,
        roster: Vec<PatientSummary>,
        auth_token: &str,
        outbox: mpsc::UnboundedSender<IntakeServerMessage>,
    ) -> Self {
        Self {
            intake,
            medications,
            roster: Arc::new(roster),
            auth_token: Arc::from(auth_token),
            outbox,
            cedula_search: Debouncer::from_millis(CEDULA_DEBOUNCE_MS),
            medication_search: Debouncer::from_millis(MEDICATION_DEBOUNCE_MS),
        }
    }

    pub fn handle(&mut self, message: IntakeClientMessage) {
        match message {
            IntakeClientMessage::CedulaInput { value } => self.on_cedula_input(value),
            IntakeClientMessage::MedicationInput { value } => self.on_medication_input(value),
        }
    }

    fn on_cedula_input(&mut self, value: String) {
        if cedula_digits(&value).len() < MIN_CEDULA_DIGITS {
            self.cedula_search.cancel();
            let _ = self.outbox.send(IntakeServerMessage::CedulaResult {
                input: value,
                outcome: CedulaLookupOutcome::TooShort,
            });
            return;
        }

        let intake = self.intake.clone();
        let roster = Arc::clone(&self.roster);
        let outbox = self.outbox.clone();

        self.cedula_search.call(async move {
            debug!("Running debounced cédula search");
            let outcome = intake.lookup(&roster, &value).await;
            let _ = outbox.send(IntakeServerMessage::CedulaResult { input: value, outcome });
        });
    }

    fn on_medication_input(&mut self, value: String) {
        let catalog = self.medications.clone();
        let token = Arc::clone(&self.auth_token);
        let outbox = self.outbox.clone();

        self.medication_search.call(async move {
            let message = match catalog.search(&value, &token).await {
                Ok(results) => IntakeServerMessage::MedicationResults { query: value, results },
                Err(e) => {
                    warn!("Medication search failed: {}", e);
                    IntakeServerMessage::Error { message: "No se pudo buscar medicamentos".to_string() }
                }
            };
            let _ = outbox.send(message);
        });
    }

    pub fn has_pending_search(&self) -> bool {
        self.cedula_search.is_pending() || self.medication_search.is_pending()
    }
}
