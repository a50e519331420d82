// libs/appointment-cell/src/services/consultation.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    AppointmentError, AppointmentStatus, ConsultationDefaults, PatientRef, StartConsultationResponse,
};
use crate::services::lookup::ActiveAppointmentLookup;
use crate::services::realtime::AppointmentChangeFeed;
use crate::services::scheduling::{AppointmentService, NewAppointment};

const CONSULTATION_PATH: &str = "/dashboard/medico/pacientes/consulta";

/// Consultation screen URL for an appointment.
pub fn consultation_redirect(appointment_id: Uuid, patient: PatientRef) -> String {
    format!(
        "{}?appointment_id={}&{}={}",
        CONSULTATION_PATH,
        appointment_id,
        patient.column(),
        patient.id()
    )
}

/// Opens the consultation for a doctor and patient, reusing the one that is
/// already underway when there is one.
pub struct ConsultationService {
    lookup: ActiveAppointmentLookup,
    appointments: AppointmentService,
    defaults: ConsultationDefaults,
}

impl ConsultationService {
    pub fn new(config: &AppConfig, feed: AppointmentChangeFeed) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let defaults = ConsultationDefaults::default();

        Self {
            lookup: ActiveAppointmentLookup::new(
                Arc::clone(&supabase),
                config.clinic_utc_offset_minutes,
                &defaults,
            ),
            appointments: AppointmentService::with_client(supabase, config.clinic_utc_offset_minutes, feed),
            defaults,
        }
    }

    pub async fn find_active(
        &self,
        doctor_id: Uuid,
        patient: PatientRef,
        auth_token: &str,
    ) -> Option<crate::models::Appointment> {
        self.lookup.find_active_or_none(doctor_id, patient, Utc::now(), auth_token).await
    }

    pub async fn start_or_resume(
        &self,
        doctor_id: Uuid,
        patient: PatientRef,
        auth_token: &str,
    ) -> Result<StartConsultationResponse, AppointmentError> {
        self.start_or_resume_at(doctor_id, patient, Utc::now(), auth_token).await
    }

    pub async fn start_or_resume_at(
        &self,
        doctor_id: Uuid,
        patient: PatientRef,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<StartConsultationResponse, AppointmentError> {
        if let Some(existing) = self.lookup.find_active_or_none(doctor_id, patient, now, auth_token).await {
            info!("Resuming appointment {} for doctor {}", existing.id, doctor_id);
            return Ok(StartConsultationResponse {
                redirect_to: consultation_redirect(existing.id, patient),
                appointment: existing,
                created: false,
            });
        }

        let new_row = NewAppointment {
            doctor_id,
            patient,
            scheduled_at: now,
            duration_minutes: self.defaults.duration_minutes,
            status: AppointmentStatus::InConsultation,
            visit_type: self.defaults.visit_type,
            reason: &self.defaults.reason,
            notes: None,
        };

        match self.appointments.insert(new_row, auth_token).await {
            Ok(created) => {
                info!("Started consultation {} for doctor {}", created.id, doctor_id);
                Ok(StartConsultationResponse {
                    redirect_to: consultation_redirect(created.id, patient),
                    appointment: created,
                    created: true,
                })
            }
            Err(e) if e.is_conflict() => {
                // The slot is held by a consultation the windowed lookup did not see:
                // a concurrent start or one left open on an earlier day.
                warn!("Concurrent consultation start for doctor {}, resuming existing row", doctor_id);
                let existing = self.lookup
                    .find_in_consultation(doctor_id, patient, auth_token)
                    .await?
                    .ok_or_else(|| AppointmentError::Conflict(
                        "A consultation is already underway for this patient".to_string(),
                    ))?;

                Ok(StartConsultationResponse {
                    redirect_to: consultation_redirect(existing.id, patient),
                    appointment: existing,
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_for_registered_patient() {
        let appointment = Uuid::new_v4();
        let patient = Uuid::new_v4();

        assert_eq!(
            consultation_redirect(appointment, PatientRef::Registered(patient)),
            format!("/dashboard/medico/pacientes/consulta?appointment_id={}&paciente_id={}", appointment, patient)
        );
    }

    #[test]
    fn redirect_for_offline_patient() {
        let appointment = Uuid::new_v4();
        let patient = Uuid::new_v4();

        let url = consultation_redirect(appointment, PatientRef::Offline(patient));
        assert!(url.ends_with(&format!("offline_patient_id={}", patient)));
    }
}
