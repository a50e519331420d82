pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{cedula_digits, RegistryPerson, VerificationError};
pub use router::verification_routes;
pub use services::{CedulaRegistry, CedulaRegistryClient};
