use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named subdivision of an organisation, e.g. a class or a house.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganisationGroup {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub name: String,
    pub group_type: String,
    pub created_by_user_id: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Links a group to an OrganisationMember, not directly to a user: group
/// membership requires org membership first.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganisationGroupMember {
    pub id: Uuid,
    pub organisation_group_id: Uuid,
    pub organisation_member_id: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
