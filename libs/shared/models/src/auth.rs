use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Dashboard the account belongs to, stored as `role` in the Supabase
/// app/user metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Paciente,
    Medico,
    Clinica,
    Farmacia,
    Admin,
}

impl UserRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "paciente" | "patient" => Some(UserRole::Paciente),
            "medico" | "médico" | "doctor" => Some(UserRole::Medico),
            "clinica" | "clínica" | "clinic" => Some(UserRole::Clinica),
            "farmacia" | "pharmacy" => Some(UserRole::Farmacia),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Paciente => write!(f, "paciente"),
            UserRole::Medico => write!(f, "medico"),
            UserRole::Clinica => write!(f, "clinica"),
            UserRole::Farmacia => write!(f, "farmacia"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Application role: `app_metadata.role` wins over `user_metadata.role`;
    /// the JWT `role` claim (usually `authenticated`) is the last resort.
    pub fn app_role(&self) -> Option<UserRole> {
        let from_metadata = |value: &Option<serde_json::Value>| {
            value
                .as_ref()
                .and_then(|m| m.get("role"))
                .and_then(|r| r.as_str())
                .and_then(UserRole::parse)
        };

        from_metadata(&self.app_metadata)
            .or_else(|| from_metadata(&self.metadata))
            .or_else(|| self.role.as_deref().and_then(UserRole::parse))
    }

    pub fn is_doctor(&self) -> bool {
        self.app_role() == Some(UserRole::Medico)
    }

    pub fn is_admin(&self) -> bool {
        self.app_role() == Some(UserRole::Admin)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(role: Option<&str>, app: Option<serde_json::Value>, meta: Option<serde_json::Value>) -> User {
        User {
            id: "u-1".to_string(),
            email: None,
            role: role.map(str::to_string),
            app_metadata: app,
            metadata: meta,
            created_at: None,
        }
    }

    #[test]
    fn app_metadata_role_takes_precedence() {
        let u = user(
            Some("authenticated"),
            Some(json!({ "role": "medico" })),
            Some(json!({ "role": "paciente" })),
        );
        assert_eq!(u.app_role(), Some(UserRole::Medico));
        assert!(u.is_doctor());
    }

    #[test]
    fn falls_back_to_user_metadata_then_claim() {
        let u = user(Some("authenticated"), None, Some(json!({ "role": "farmacia" })));
        assert_eq!(u.app_role(), Some(UserRole::Farmacia));

        let u = user(Some("admin"), None, None);
        assert!(u.is_admin());

        let u = user(Some("authenticated"), None, None);
        assert_eq!(u.app_role(), None);
    }
}
