// libs/appointment-cell/src/services/realtime.rs
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
}

/// Notification that an appointment row changed. Subscribers treat it as a
/// signal to re-read; the payload is informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentChange {
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub status: AppointmentStatus,
    pub kind: ChangeKind,
}

impl AppointmentChange {
    pub fn from_appointment(appointment: &Appointment, kind: ChangeKind) -> Self {
        Self {
            appointment_id: appointment.id,
            doctor_id: appointment.doctor_id,
            status: appointment.status,
            kind,
        }
    }
}

/// In-process change feed for appointment writes made by this service.
#[derive(Clone)]
pub struct AppointmentChangeFeed {
    sender: broadcast::Sender<AppointmentChange>,
}

impl AppointmentChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, change: AppointmentChange) {
        // No receivers is the common case outside dashboard hours.
        match self.sender.send(change) {
            Ok(receivers) => debug!("Appointment change delivered to {} subscribers", receivers),
            Err(_) => debug!("Appointment change dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppointmentChange> {
        self.sender.subscribe()
    }

    pub fn subscribe_doctor(&self, doctor_id: Uuid) -> DoctorChanges {
        DoctorChanges {
            doctor_id,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AppointmentChangeFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Changes for one doctor's appointments.
pub struct DoctorChanges {
    doctor_id: Uuid,
    receiver: broadcast::Receiver<AppointmentChange>,
}

impl DoctorChanges {
    /// Waits for the next change affecting this doctor. Returns `None` once
    /// the feed is gone. A lagged receiver yields immediately so the caller
    /// re-reads instead of missing an update.
    pub async fn next_change(&mut self) -> Option<()> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.doctor_id == self.doctor_id => return Some(()),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Change subscriber for doctor {} lagged by {} events", self.doctor_id, skipped);
                    return Some(());
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn change(doctor_id: Uuid) -> AppointmentChange {
        AppointmentChange {
            appointment_id: Uuid::new_v4(),
            doctor_id,
            status: AppointmentStatus::InConsultation,
            kind: ChangeKind::Inserted,
        }
    }

    #[tokio::test]
    async fn subscriber_only_wakes_for_its_doctor() {
        let feed = AppointmentChangeFeed::new(16);
        let doctor = Uuid::new_v4();
        let mut changes = feed.subscribe_doctor(doctor);

        feed.publish(change(Uuid::new_v4()));
        let woke = timeout(Duration::from_millis(50), changes.next_change()).await;
        assert!(woke.is_err(), "other doctors' changes must not wake the subscriber");

        feed.publish(change(doctor));
        let woke = timeout(Duration::from_millis(50), changes.next_change()).await;
        assert_eq!(woke.unwrap(), Some(()));
    }

    #[tokio::test]
    async fn lagged_subscriber_is_told_to_resync() {
        let feed = AppointmentChangeFeed::new(2);
        let doctor = Uuid::new_v4();
        let mut changes = feed.subscribe_doctor(doctor);

        for _ in 0..5 {
            feed.publish(change(Uuid::new_v4()));
        }

        assert_eq!(changes.next_change().await, Some(()));
    }

    #[tokio::test]
    async fn closed_feed_ends_the_subscription() {
        let feed = AppointmentChangeFeed::new(4);
        let mut changes = feed.subscribe_doctor(Uuid::new_v4());
        drop(feed);

        assert_eq!(changes.next_change().await, None);
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let feed = AppointmentChangeFeed::default();
        feed.publish(change(Uuid::new_v4()));
        assert_eq!(feed.subscriber_count(), 0);
    }
}
