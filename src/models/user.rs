use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TokenResponse;

// ==================================================================================================
// Roles
// ==================================================================================================

/// Access role granted by the backend. Unknown values are kept rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Superuser,
    Admin,
    Moderator,
    Member,
    User,
    #[serde(untagged)]
    Other(String),
}

// ==================================================================================================
// Users
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub access_roles: Vec<AccessRole>,
    #[serde(default)]
    pub cooperative_roles: Vec<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn full_name(&self) -> String {
        [
            Some(self.first_name.as_str()),
            self.middle_name.as_deref(),
            Some(self.last_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Whether the admin screens apply to this user
    pub fn is_admin(&self) -> bool {
        self.access_roles
            .iter()
            .any(|role| matches!(role, AccessRole::Admin | AccessRole::Superuser))
    }

    pub fn has_cooperative_role(&self, role: &str) -> bool {
        self.cooperative_roles
            .iter()
            .any(|r| r.eq_ignore_ascii_case(role))
    }
}

/// Successful sign-in: tokens plus the signed-in user
#[derive(Debug, Clone, Deserialize)]
pub struct LoginSuccess {
    pub token: TokenResponse,
    pub user: User,
}

/// Registration payload
#[derive(Debug, Clone, Serialize)]
pub struct NewMember {
    pub email: String,
    pub password: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub phone: String,
}

/// Partial profile update; only set fields are sent
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Admin role assignment for another member
#[derive(Debug, Clone, Serialize)]
pub struct RoleAssignment {
    pub access_roles: Vec<AccessRole>,
    pub cooperative_roles: Vec<String>,
}
