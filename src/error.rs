use uuid::Uuid;

use crate::services::visibility::DenialReason;

/// Error kinds surfaced to the calling layer. The HTTP layer (out of scope
/// here) maps these to status codes; every variant carries enough ids to
/// render an actionable message without re-querying state.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("permission denied: missing grant for '{action}'")]
    PermissionDenied { action: String },

    #[error("subscription blocks writes for organisation {organisation_id}")]
    SubscriptionExpired { organisation_id: Uuid },

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: Uuid },

    #[error("forbidden: {reason}")]
    Forbidden { reason: DenialReason },

    #[error("user {user_id} is already an active member of leaderboard {leaderboard_id}")]
    AlreadyMember { leaderboard_id: Uuid, user_id: Uuid },

    #[error("user {user_id} is not an active member of leaderboard {leaderboard_id}")]
    NotMember { leaderboard_id: Uuid, user_id: Uuid },

    #[error("seat capacity reached for organisation {organisation_id}")]
    SeatLimitReached { organisation_id: Uuid },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
