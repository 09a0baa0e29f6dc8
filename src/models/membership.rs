use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Admin,
    Member,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Admin => "admin",
            MembershipRole::Member => "member",
        }
    }
}

impl std::str::FromStr for MembershipRole {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(MembershipRole::Admin),
            "member" => Ok(MembershipRole::Member),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Inactive,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "inactive" => Ok(MembershipStatus::Inactive),
            _ => Err(()),
        }
    }
}

/// Links a user to an organization. Read by the dashboard layer to resolve a
/// user's active tenant context; written when an organization is created.
#[derive(Debug, Clone, Serialize)]
pub struct OrgMembership {
    pub id: String,
    pub user_id: String,
    pub org_id: String,
    pub role: MembershipRole,
    pub status: MembershipStatus,
    pub created_at: i64,
}
