use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Instructor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Instructor => "instructor",
            UserRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "student" => Ok(UserRole::Student),
            "instructor" => Ok(UserRole::Instructor),
            "admin" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

/// Local mirror of a provider-managed identity.
///
/// `external_id` is the provider's subject id and the stable join key for
/// every write - exactly one row exists per external id. `event_ts` holds the
/// provider-side event time of the last applied write and guards against
/// out-of-order deliveries overwriting newer state.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    /// Soft-delete flag. `user.deleted` archives, never removes, so that
    /// memberships and enrollments keep valid references.
    pub archived: bool,
    pub event_ts: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Normalized user fields extracted from a provider event, used as upsert
/// input. A None field means the provider did not send it; the upsert keeps
/// the stored value in that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertUser {
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}
