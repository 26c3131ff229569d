use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    MemberAdded,
    MemberRemoved,
    MemberRoleChanged,
    GroupCreated,
    GroupMemberAdded,
    LeaderboardCreated,
    LeaderboardJoined,
    LeaderboardLeft,
    LeaderboardMuted,
}

/// Append-only audit record. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrganisationActivity {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub actor_user_id: Uuid,
    pub activity_type: ActivityType,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl OrganisationActivity {
    pub fn new(
        organisation_id: Uuid,
        actor_user_id: Uuid,
        activity_type: ActivityType,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organisation_id,
            actor_user_id,
            activity_type,
            metadata,
            created_at: Utc::now(),
        }
    }
}
