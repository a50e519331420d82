use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::SupabaseError;

pub const DEFAULT_DIRECTORY_LIMIT: usize = 12;
pub const MAX_DIRECTORY_LIMIT: usize = 24;

/// The two generations of the doctor table. Both hold the same facts under
/// different names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoctorDirectorySchema {
    #[default]
    DoctorDetails,
    DoctorProfiles,
}

/// Column names of one schema generation.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryColumns {
    pub table: &'static str,
    pub profile_fk: &'static str,
    pub specialty_fk: &'static str,
    pub verified: &'static str,
    pub featured: &'static str,
    pub years_experience: &'static str,
    pub bio: &'static str,
    pub fee: &'static str,
}

impl DoctorDirectorySchema {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "doctor_details" => Some(Self::DoctorDetails),
            "doctor_profiles" => Some(Self::DoctorProfiles),
            _ => None,
        }
    }

    pub fn columns(&self) -> DirectoryColumns {
        match self {
            Self::DoctorDetails => DirectoryColumns {
                table: "doctor_details",
                profile_fk: "profile_id",
                specialty_fk: "especialidad_id",
                verified: "verified",
                featured: "featured",
                years_experience: "anos_experiencia",
                bio: "biografia",
                fee: "tarifa_consulta",
            },
            Self::DoctorProfiles => DirectoryColumns {
                table: "doctor_profiles",
                profile_fk: "user_id",
                specialty_fk: "specialty_id",
                verified: "is_verified",
                featured: "is_featured",
                years_experience: "years_experience",
                bio: "bio",
                fee: "consultation_fee",
            },
        }
    }
}

/// Raw query string of the public directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryQuery {
    #[serde(rename = "specialtyId")]
    pub specialty_id: Option<String>,
    pub featured: Option<String>,
    pub limit: Option<String>,
}

/// Limit from the query string: 12 when absent or unreadable, otherwise
/// clamped to 1..=24.
pub fn clamp_limit(raw: Option<&str>) -> usize {
    match raw.map(str::trim).and_then(|v| v.parse::<i64>().ok()) {
        Some(value) => value.clamp(1, MAX_DIRECTORY_LIMIT as i64) as usize,
        None => DEFAULT_DIRECTORY_LIMIT,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryFilter {
    pub specialty_id: Option<Uuid>,
    pub featured_only: bool,
    pub limit: usize,
}

impl From<DirectoryQuery> for DirectoryFilter {
    fn from(query: DirectoryQuery) -> Self {
        Self {
            specialty_id: query.specialty_id.as_deref().and_then(|raw| Uuid::parse_str(raw.trim()).ok()),
            featured_only: query.featured.as_deref().is_some_and(|f| f.eq_ignore_ascii_case("true") || f == "1"),
            limit: clamp_limit(query.limit.as_deref()),
        }
    }
}

/// Directory entry, identical for both schema generations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicDoctor {
    pub id: Uuid,
    pub profile_id: Option<Uuid>,
    pub nombre_completo: String,
    pub avatar_url: Option<String>,
    pub ciudad: Option<String>,
    pub specialty_id: Option<Uuid>,
    pub specialty_name: Option<String>,
    pub years_experience: Option<i64>,
    pub bio: Option<String>,
    pub consultation_fee: Option<f64>,
    pub featured: bool,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<SupabaseError> for DirectoryError {
    fn from(err: SupabaseError) -> Self {
        DirectoryError::DatabaseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(clamp_limit(None), 12);
        assert_eq!(clamp_limit(Some("abc")), 12);
        assert_eq!(clamp_limit(Some("0")), 1);
        assert_eq!(clamp_limit(Some("-5")), 1);
        assert_eq!(clamp_limit(Some("8")), 8);
        assert_eq!(clamp_limit(Some("100")), 24);
    }

    #[test]
    fn schema_names_parse() {
        assert_eq!(DoctorDirectorySchema::parse("doctor_profiles"), Some(DoctorDirectorySchema::DoctorProfiles));
        assert_eq!(DoctorDirectorySchema::parse("doctor_details"), Some(DoctorDirectorySchema::DoctorDetails));
        assert_eq!(DoctorDirectorySchema::parse("doctors"), None);
    }

    #[test]
    fn featured_flag_reads_true_or_one() {
        let filter = DirectoryFilter::from(DirectoryQuery {
            featured: Some("TRUE".to_string()),
            ..Default::default()
        });
        assert!(filter.featured_only);

        let filter = DirectoryFilter::from(DirectoryQuery {
            featured: Some("no".to_string()),
            ..Default::default()
        });
        assert!(!filter.featured_only);
    }

    #[test]
    fn unreadable_specialty_is_ignored() {
        for raw in ["", "  ", "cardiologia"] {
            let filter = DirectoryFilter::from(DirectoryQuery {
                specialty_id: Some(raw.to_string()),
                ..Default::default()
            });
            assert_eq!(filter.specialty_id, None);
        }

        let id = Uuid::new_v4();
        let filter = DirectoryFilter::from(DirectoryQuery {
            specialty_id: Some(id.to_string()),
            ..Default::default()
        });
        assert_eq!(filter.specialty_id, Some(id));
    }
}
