use std::sync::Arc;

use tracing::debug;

use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{Medication, PatientError};

const MIN_TERM_CHARS: usize = 2;
const MAX_RESULTS: usize = 10;

/// Name search over the `medications` catalog.
#[derive(Clone)]
pub struct MedicationCatalog {
    supabase: Arc<SupabaseClient>,
}

impl MedicationCatalog {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn search(&self, term: &str, auth_token: &str) -> Result<Vec<Medication>, PatientError> {
        let term = term.trim();
        if term.chars().count() < MIN_TERM_CHARS {
            return Ok(Vec::new());
        }

        debug!("Searching medications for '{}'", term);
        let query = PostgrestQuery::table("medications")
            .select("id,nombre,principio_activo,presentacion")
            .ilike("nombre", term)
            .order("nombre", true)
            .limit(MAX_RESULTS);

        Ok(self.supabase.select(&query, Some(auth_token)).await?)
    }
}
