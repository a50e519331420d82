// libs/appointment-cell/src/services/scheduling.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{
    Appointment, AppointmentCounts, AppointmentError, AppointmentRangeQuery, AppointmentStatus,
    ConsultationDefaults, PatientRef, ScheduleAppointmentRequest, UpdateStatusRequest, VisitType,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::lookup::local_day_bounds;
use crate::services::realtime::{AppointmentChange, AppointmentChangeFeed, ChangeKind};

/// Fields of a new `appointments` row.
pub(crate) struct NewAppointment<'a> {
    pub doctor_id: Uuid,
    pub patient: PatientRef,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub visit_type: VisitType,
    pub reason: &'a str,
    pub notes: Option<&'a str>,
}

impl NewAppointment<'_> {
    pub(crate) fn to_row(&self) -> Value {
        let (paciente_id, offline_patient_id) = match self.patient {
            PatientRef::Registered(id) => (Some(id), None),
            PatientRef::Offline(id) => (None, Some(id)),
        };

        json!({
            "medico_id": self.doctor_id,
            "paciente_id": paciente_id,
            "offline_patient_id": offline_patient_id,
            "fecha_hora": self.scheduled_at.to_rfc3339(),
            "duracion_minutos": self.duration_minutes,
            "status": self.status,
            "tipo_cita": self.visit_type,
            "motivo": self.reason,
            "notas": self.notes,
        })
    }
}

#[derive(Deserialize)]
struct StatusRow {
    status: AppointmentStatus,
}

pub struct AppointmentService {
    supabase: Arc<SupabaseClient>,
    feed: AppointmentChangeFeed,
    lifecycle: AppointmentLifecycleService,
    defaults: ConsultationDefaults,
    utc_offset_minutes: i32,
}

impl AppointmentService {
    pub fn new(config: &AppConfig, feed: AppointmentChangeFeed) -> Self {
        Self::with_client(
            Arc::new(SupabaseClient::new(config)),
            config.clinic_utc_offset_minutes,
            feed,
        )
    }

    pub fn with_client(
        supabase: Arc<SupabaseClient>,
        utc_offset_minutes: i32,
        feed: AppointmentChangeFeed,
    ) -> Self {
        Self {
            supabase,
            feed,
            lifecycle: AppointmentLifecycleService::new(),
            defaults: ConsultationDefaults::default(),
            utc_offset_minutes,
        }
    }

    pub(crate) async fn insert(
        &self,
        appointment: NewAppointment<'_>,
        auth_token: &str,
    ) -> Result<Appointment, shared_database::SupabaseError> {
        let rows: Vec<Appointment> = self.supabase
            .insert("appointments", appointment.to_row(), Some(auth_token))
            .await?;

        let created = rows.into_iter().next().ok_or_else(|| {
            shared_database::SupabaseError::Api {
                status: 500,
                message: "Insert returned no rows".to_string(),
            }
        })?;

        self.feed.publish(AppointmentChange::from_appointment(&created, ChangeKind::Inserted));
        Ok(created)
    }

    pub async fn schedule(
        &self,
        doctor_id: Uuid,
        request: ScheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let patient = PatientRef::from_ids(request.paciente_id, request.offline_patient_id)?;
        let duration = request.duracion_minutos.unwrap_or(self.defaults.duration_minutes);

        if duration < self.defaults.min_duration_minutes || duration > self.defaults.max_duration_minutes {
            return Err(AppointmentError::ValidationError(format!(
                "Duration must be between {} and {} minutes",
                self.defaults.min_duration_minutes, self.defaults.max_duration_minutes
            )));
        }

        debug!("Scheduling appointment for doctor {} and {:?} at {}", doctor_id, patient, request.fecha_hora);

        let reason = request.motivo.as_deref().unwrap_or(&self.defaults.reason);
        let appointment = self.insert(
            NewAppointment {
                doctor_id,
                patient,
                scheduled_at: request.fecha_hora,
                duration_minutes: duration,
                status: AppointmentStatus::Pending,
                visit_type: request.tipo_cita.unwrap_or(self.defaults.visit_type),
                reason,
                notes: request.notas.as_deref(),
            },
            auth_token,
        ).await?;

        info!("Appointment {} scheduled for doctor {}", appointment.id, doctor_id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let query = PostgrestQuery::table("appointments")
            .select("*")
            .eq("id", appointment_id)
            .limit(1);

        let rows: Vec<Appointment> = self.supabase.select(&query, Some(auth_token)).await?;
        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        range: AppointmentRangeQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query = PostgrestQuery::table("appointments")
            .select("*")
            .eq("medico_id", doctor_id);

        if let Some(from) = range.from {
            query = query.gte("fecha_hora", from.to_rfc3339());
        }
        if let Some(to) = range.to {
            query = query.lte("fecha_hora", to.to_rfc3339());
        }
        if let Some(status) = range.status {
            query = query.eq("status", status);
        }

        let rows = self.supabase.select(&query.order("fecha_hora", true), Some(auth_token)).await?;
        Ok(rows)
    }

    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.validate_status_transition(current.status, request.status)?;

        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(request.status));
        if let Some(notes) = request.notas {
            update.insert("notas".to_string(), json!(notes));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        // Guard on the status we validated against so a concurrent change
        // surfaces as "not found" instead of being overwritten.
        let query = PostgrestQuery::table("appointments")
            .eq("id", appointment_id)
            .eq("status", current.status);

        let rows: Vec<Appointment> = self.supabase
            .update(&query, Value::Object(update), Some(auth_token))
            .await?;

        let updated = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        self.feed.publish(AppointmentChange::from_appointment(&updated, ChangeKind::Updated));

        info!("Appointment {} moved from {} to {}", appointment_id, current.status, updated.status);
        Ok(updated)
    }

    pub async fn counts_for_day(
        &self,
        doctor_id: Uuid,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<AppointmentCounts, AppointmentError> {
        let (start, end) = local_day_bounds(now, self.utc_offset_minutes);

        let query = PostgrestQuery::table("appointments")
            .select("status")
            .eq("medico_id", doctor_id)
            .gte("fecha_hora", start.to_rfc3339())
            .lte("fecha_hora", end.to_rfc3339());

        let rows: Vec<StatusRow> = self.supabase.select(&query, Some(auth_token)).await?;
        Ok(AppointmentCounts::tally(rows.into_iter().map(|row| row.status)))
    }
}
