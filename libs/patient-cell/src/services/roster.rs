use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_database::{PostgrestQuery, SupabaseClient};
use verification_cell::cedula_digits;

use crate::models::{PatientError, PatientKind, PatientSummary};
use crate::services::offline_patient::OfflinePatientService;

#[derive(Deserialize)]
struct SeenPatientRow {
    paciente_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct ProfileRow {
    id: Uuid,
    #[serde(default)]
    cedula: Option<String>,
    #[serde(default)]
    nombre_completo: Option<String>,
    #[serde(default)]
    telefono: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Patients a doctor already knows: their offline patients plus registered
/// patients they have had appointments with.
pub struct DoctorRoster {
    supabase: Arc<SupabaseClient>,
}

impl DoctorRoster {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn load(&self, doctor_id: Uuid, auth_token: &str) -> Result<Vec<PatientSummary>, PatientError> {
        let offline = OfflinePatientService::with_client(Arc::clone(&self.supabase))
            .list_for_doctor(doctor_id, auth_token)
            .await?;

        let mut roster: Vec<PatientSummary> = offline
            .into_iter()
            .map(|p| PatientSummary {
                id: p.id,
                kind: PatientKind::Offline,
                cedula: Some(p.cedula),
                nombre_completo: p.nombre_completo,
                telefono: p.telefono,
                email: p.email,
            })
            .collect();

        roster.extend(self.registered_patients(doctor_id, auth_token).await?);
        debug!("Loaded roster of {} patients for doctor {}", roster.len(), doctor_id);
        Ok(roster)
    }

    async fn registered_patients(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<PatientSummary>, PatientError> {
        let seen_query = PostgrestQuery::table("appointments")
            .select("paciente_id")
            .eq("medico_id", doctor_id);
        let seen: Vec<SeenPatientRow> = self.supabase.select(&seen_query, Some(auth_token)).await?;

        let mut unique = HashSet::new();
        let ids: Vec<Uuid> = seen
            .into_iter()
            .filter_map(|row| row.paciente_id)
            .filter(|id| unique.insert(*id))
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let profiles_query = PostgrestQuery::table("profiles")
            .select("id,cedula,nombre_completo,telefono,email")
            .in_list("id", &ids);
        let profiles: Vec<ProfileRow> = self.supabase.select(&profiles_query, Some(auth_token)).await?;

        Ok(profiles
            .into_iter()
            .map(|p| PatientSummary {
                id: p.id,
                kind: PatientKind::Registered,
                cedula: p.cedula,
                nombre_completo: p.nombre_completo.unwrap_or_default(),
                telefono: p.telefono,
                email: p.email,
            })
            .collect())
    }
}

/// Exact cédula match in an already loaded roster.
pub fn find_in_roster<'a>(roster: &'a [PatientSummary], digits: &str) -> Option<&'a PatientSummary> {
    roster.iter().find(|patient| {
        patient
            .cedula
            .as_deref()
            .is_some_and(|cedula| cedula_digits(cedula) == digits)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(cedula: Option<&str>, kind: PatientKind) -> PatientSummary {
        PatientSummary {
            id: Uuid::new_v4(),
            kind,
            cedula: cedula.map(str::to_string),
            nombre_completo: "Paciente".to_string(),
            telefono: None,
            email: None,
        }
    }

    #[test]
    fn roster_match_ignores_formatting() {
        let roster = vec![
            summary(None, PatientKind::Registered),
            summary(Some("V-12.345.678"), PatientKind::Registered),
        ];

        let found = find_in_roster(&roster, "12345678").unwrap();
        assert_eq!(found.kind, PatientKind::Registered);
        assert!(find_in_roster(&roster, "1234567").is_none());
    }
}
