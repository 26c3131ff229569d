use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::SubscriptionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organisation {
    pub id: Uuid,
    pub name: String,
    pub status: SubscriptionStatus,
    pub seat_capacity: i32,
    pub created_at: DateTime<Utc>,
}

/// Role within one organisation. Scoped: an OWNER of org A holds no grants in
/// org B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "org_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgRole {
    Owner,
    Admin,
    Teacher,
    BillingAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    Active,
    Pending,
    Inactive,
    Suspended,
}

/// Join row between a user and an organisation. Never hard-deleted: removal
/// sets `deleted_at`, flips status to INACTIVE and releases the seat, so
/// billing and audit history survive.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganisationMember {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub user_id: Uuid,
    pub role: OrgRole,
    pub status: MemberStatus,
    pub seat_assigned_at: Option<DateTime<Utc>>,
    pub seat_released_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OrganisationMember {
    /// A member holds a seat while assigned and not yet released.
    pub fn holds_seat(&self) -> bool {
        self.seat_assigned_at.is_some() && self.seat_released_at.is_none()
    }
}
