pub mod consultation;
pub mod lifecycle;
pub mod lookup;
pub mod realtime;
pub mod scheduling;

pub use consultation::ConsultationService;
pub use lifecycle::AppointmentLifecycleService;
pub use lookup::ActiveAppointmentLookup;
pub use realtime::{AppointmentChange, AppointmentChangeFeed, ChangeKind, DoctorChanges};
pub use scheduling::AppointmentService;
