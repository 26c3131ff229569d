use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scope rule governing who may discover and join a leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "leaderboard_visibility", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaderboardVisibility {
    OrgWide,
    Group,
    AdHoc,
}

/// Invariants: GROUP visibility requires `organisation_group_id`; AD_HOC
/// boards carry no `organisation_id` and are joined via invite code only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Leaderboard {
    pub id: Uuid,
    pub name: String,
    pub visibility: LeaderboardVisibility,
    pub organisation_id: Option<Uuid>,
    pub organisation_group_id: Option<Uuid>,
    pub created_by_user_id: Uuid,
    pub invite_code: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Join row between a leaderboard and a user. At most one row per
/// (leaderboard_id, user_id); leaving sets `left_at`, rejoining clears it on
/// the same row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardMember {
    pub id: Uuid,
    pub leaderboard_id: Uuid,
    pub user_id: Uuid,
    pub organisation_member_id: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub muted: bool,
}

impl LeaderboardMember {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}
