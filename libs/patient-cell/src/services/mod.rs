pub mod consultation_notes;
pub mod consultation_record;
pub mod intake;
pub mod intake_session;
pub mod medications;
pub mod offline_patient;
pub mod roster;

pub use consultation_record::ConsultationRecordService;
pub use intake::CedulaIntakeService;
pub use intake_session::IntakeSession;
pub use medications::MedicationCatalog;
pub use offline_patient::OfflinePatientService;
pub use roster::DoctorRoster;
