use serde::Serialize;

/// Normalized organization fields extracted from a provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrganization {
    pub external_id: String,
    pub name: String,
    /// External id of the inviting user, who receives the initial admin
    /// membership.
    pub created_by: Option<String>,
}

/// Local mirror of a provider-managed organization (tenant).
#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub id: String,
    pub external_id: String,
    pub name: String,
    pub event_ts: i64,
    pub created_at: i64,
    pub updated_at: i64,
}
