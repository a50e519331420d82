// libs/appointment-cell/src/services/lookup.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{PostgrestQuery, SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentStatus, ConsultationDefaults, PatientRef};

/// Bounds of the clinic's local day containing `now`, in UTC.
pub fn local_day_bounds(now: DateTime<Utc>, utc_offset_minutes: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
    let local_date = now.with_timezone(&offset).date_naive();

    let to_utc = |time: NaiveTime| {
        local_date
            .and_time(time)
            .and_local_timezone(offset)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    };

    let start = NaiveTime::from_hms_opt(0, 0, 0)
        .and_then(to_utc)
        .unwrap_or(now);
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        .and_then(to_utc)
        .unwrap_or(now);

    (start, end)
}

/// Window an unfinished appointment must fall in to count as the current
/// consultation: from `lookback_hours` ago to the end of the local day.
pub fn active_window(
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
    lookback_hours: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let (_, end_of_day) = local_day_bounds(now, utc_offset_minutes);
    (now - Duration::hours(lookback_hours), end_of_day)
}

pub fn active_query(
    doctor_id: Uuid,
    patient: PatientRef,
    window: (DateTime<Utc>, DateTime<Utc>),
) -> PostgrestQuery {
    let terminal: Vec<&str> = AppointmentStatus::TERMINAL.iter().map(|s| s.as_str()).collect();

    PostgrestQuery::table("appointments")
        .select("*")
        .eq("medico_id", doctor_id)
        .eq(patient.column(), patient.id())
        .not_in("status", &terminal)
        .gte("fecha_hora", window.0.to_rfc3339())
        .lte("fecha_hora", window.1.to_rfc3339())
        .order("fecha_hora", false)
        .limit(1)
}

/// Rows holding the one-consultation-per-patient slot, whatever their date.
pub fn in_consultation_query(doctor_id: Uuid, patient: PatientRef) -> PostgrestQuery {
    PostgrestQuery::table("appointments")
        .select("*")
        .eq("medico_id", doctor_id)
        .eq(patient.column(), patient.id())
        .eq("status", AppointmentStatus::InConsultation.as_str())
        .order("fecha_hora", false)
        .limit(1)
}

/// Latest active row among `rows`. The database already filters, this keeps
/// the guarantee even when it hands back more than asked for.
pub fn pick_active(rows: Vec<Appointment>) -> Option<Appointment> {
    rows.into_iter()
        .filter(|appointment| appointment.is_active())
        .max_by_key(|appointment| appointment.scheduled_at)
}

pub struct ActiveAppointmentLookup {
    supabase: Arc<SupabaseClient>,
    utc_offset_minutes: i32,
    lookback_hours: i64,
}

impl ActiveAppointmentLookup {
    pub fn new(supabase: Arc<SupabaseClient>, utc_offset_minutes: i32, defaults: &ConsultationDefaults) -> Self {
        Self {
            supabase,
            utc_offset_minutes,
            lookback_hours: defaults.lookback_hours,
        }
    }

    pub async fn find_active(
        &self,
        doctor_id: Uuid,
        patient: PatientRef,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Option<Appointment>, SupabaseError> {
        let window = active_window(now, self.utc_offset_minutes, self.lookback_hours);
        debug!("Looking up active appointment for doctor {} and {:?} between {} and {}",
               doctor_id, patient, window.0, window.1);

        let query = active_query(doctor_id, patient, window);
        let rows: Vec<Appointment> = self.supabase.select(&query, Some(auth_token)).await?;

        Ok(pick_active(rows))
    }

    /// The consultation already underway for the pair, with no time window.
    /// Used after the unique index rejects an insert.
    pub async fn find_in_consultation(
        &self,
        doctor_id: Uuid,
        patient: PatientRef,
        auth_token: &str,
    ) -> Result<Option<Appointment>, SupabaseError> {
        let query = in_consultation_query(doctor_id, patient);
        let rows: Vec<Appointment> = self.supabase.select(&query, Some(auth_token)).await?;

        Ok(rows.into_iter().next())
    }

    /// Same as [`find_active`](Self::find_active) but a failed query counts
    /// as "no active appointment".
    pub async fn find_active_or_none(
        &self,
        doctor_id: Uuid,
        patient: PatientRef,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Option<Appointment> {
        match self.find_active(doctor_id, patient, now, auth_token).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Active appointment lookup failed for doctor {}, continuing without one: {}",
                      doctor_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn appointment(status: AppointmentStatus, scheduled_at: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Some(Uuid::new_v4()),
            offline_patient_id: None,
            doctor_id: Uuid::new_v4(),
            scheduled_at,
            duration_minutes: 30,
            status,
            visit_type: Default::default(),
            reason: None,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn end_of_day_uses_clinic_offset() {
        // 02:00 UTC on the 19th is still the 18th in Caracas (UTC-4).
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 2, 0, 0).unwrap();
        let (start, end) = local_day_bounds(now, -240);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 18, 4, 0, 0).unwrap());
        assert_eq!(end.to_rfc3339(), "2026-10-19T03:59:59.999+00:00");
    }

    #[test]
    fn window_reaches_back_a_full_day() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 15, 30, 0).unwrap();
        let (from, to) = active_window(now, -240, 24);

        assert_eq!(from, Utc.with_ymd_and_hms(2026, 10, 17, 15, 30, 0).unwrap());
        assert!(to > now);
    }

    #[test]
    fn query_excludes_terminal_statuses_and_limits_to_one() {
        let doctor = Uuid::new_v4();
        let patient = Uuid::new_v4();
        let now = Utc::now();
        let path = active_query(doctor, PatientRef::Offline(patient), active_window(now, 0, 24)).to_path();

        assert!(path.contains(&format!("medico_id=eq.{}", doctor)));
        assert!(path.contains(&format!("offline_patient_id=eq.{}", patient)));
        assert!(path.contains("status=not.in.(completed,cancelled)"));
        assert!(path.contains("order=fecha_hora.desc"));
        assert!(path.ends_with("limit=1"));
    }

    #[test]
    fn pick_active_skips_completed_and_cancelled() {
        let now = Utc::now();
        let rows = vec![
            appointment(AppointmentStatus::Completed, now),
            appointment(AppointmentStatus::Cancelled, now + Duration::minutes(5)),
        ];
        assert!(pick_active(rows).is_none());
    }

    #[test]
    fn pick_active_returns_single_latest_row() {
        let now = Utc::now();
        let older = appointment(AppointmentStatus::Pending, now - Duration::hours(3));
        let newer = appointment(AppointmentStatus::InConsultation, now);
        let newest_but_done = appointment(AppointmentStatus::Completed, now + Duration::hours(1));

        let picked = pick_active(vec![older, newer.clone(), newest_but_done]).unwrap();
        assert_eq!(picked.id, newer.id);
    }
}
