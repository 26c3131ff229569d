//! Storage collaborator boundary.
//!
//! Each trait method is one atomic unit: the guarantees the lifecycle logic
//! relies on (upsert on the natural unique keys, capacity checked inside the
//! invite write, soft-delete + seat release in one write, owner-guard
//! re-checked inside the role-update transaction) live behind this seam, so
//! no caller ever composes a racy read-then-write.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::context::AccessContext;
use crate::error::CoreResult;
use crate::models::{
    Leaderboard, LeaderboardMember, OrganisationActivity, OrganisationGroup,
    OrganisationGroupMember, OrganisationMember, OrgRole, User,
};

pub use memory::MemStore;
pub use postgres::PgStore;

/// Result of the capacity-guarded member upsert. The capacity check runs
/// inside the same write (the organisation row is locked for its duration),
/// so two concurrent invites cannot both squeeze into the last seat.
#[derive(Debug)]
pub enum MemberUpsertOutcome {
    Member(OrganisationMember),
    /// Seats held by other members are already at the organisation's
    /// capacity.
    SeatLimitReached,
    /// The organisation row does not exist.
    OrgNotFound,
}

/// Result of the guarded member-removal write. The store reports what it
/// observed inside the write; the service layer maps that to error kinds.
#[derive(Debug)]
pub enum RemoveOutcome {
    Removed(OrganisationMember),
    /// Target's current role is OWNER; owners never go through this path.
    OwnerProtected,
    NotFound,
}

/// Result of the guarded role-update write. The current role is re-read
/// inside the same transaction as the update, so two concurrent requests
/// cannot both observe "not owner" and proceed.
#[derive(Debug)]
pub enum RoleUpdateOutcome {
    Updated {
        member: OrganisationMember,
        previous_role: OrgRole,
    },
    /// Target is OWNER and the actor is not.
    OwnerProtected,
    /// Target is the only live OWNER and the new role would demote them.
    SoleOwnerDemotion,
    NotFound,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- users / organisations ---
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    /// Membership + subscription state for (organisation, user) in one
    /// logical lookup. `None` when no live (non-deleted) member row exists.
    async fn load_access(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<AccessContext>>;

    // --- organisation members ---
    async fn get_member(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
    ) -> CoreResult<Option<OrganisationMember>>;
    async fn find_member_by_user(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<OrganisationMember>>;

    /// Count of members currently holding a seat.
    async fn active_seat_count(&self, organisation_id: Uuid) -> CoreResult<i64>;

    /// Insert-or-reactivate on (organisation_id, user_id): a soft-deleted row
    /// comes back on the same id with a fresh seat assignment. The seat
    /// capacity check happens inside the write, against seats held by users
    /// other than the target, so invites serialise on the organisation.
    async fn upsert_member(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
        now: DateTime<Utc>,
    ) -> CoreResult<MemberUpsertOutcome>;

    /// Soft-delete + status INACTIVE + seat release, all in one atomic write.
    /// Refuses OWNER targets.
    async fn remove_member(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<RemoveOutcome>;

    /// Role update with the owner guard evaluated inside the transaction.
    /// `actor_is_owner` widens the guard for owner-to-owner reassignment.
    async fn update_member_role(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
        new_role: OrgRole,
        actor_is_owner: bool,
    ) -> CoreResult<RoleUpdateOutcome>;

    // --- groups ---
    async fn get_group(&self, id: Uuid) -> CoreResult<Option<OrganisationGroup>>;
    async fn insert_group(&self, group: &OrganisationGroup) -> CoreResult<()>;
    async fn insert_group_member(&self, link: &OrganisationGroupMember) -> CoreResult<()>;

    /// True when the user reaches the group via a live group link over a live
    /// ACTIVE organisation membership.
    async fn is_active_group_member(
        &self,
        organisation_group_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<bool>;

    // --- leaderboards ---
    async fn get_leaderboard(&self, id: Uuid) -> CoreResult<Option<Leaderboard>>;
    async fn insert_leaderboard(&self, board: &Leaderboard) -> CoreResult<()>;
    async fn find_leaderboard_member(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<LeaderboardMember>>;

    /// Upsert keyed on (leaderboard_id, user_id): concurrent joins converge
    /// on one row, a rejoin clears `left_at` and keeps the row id.
    async fn upsert_leaderboard_member(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        organisation_member_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> CoreResult<LeaderboardMember>;

    /// Sets `left_at` on the active row. Returns the updated row, or `None`
    /// when no active row existed.
    async fn mark_left(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<LeaderboardMember>>;

    /// Sets `muted` on the active row without touching `left_at`.
    async fn set_muted(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        muted: bool,
    ) -> CoreResult<Option<LeaderboardMember>>;

    // --- audit ---
    async fn append_activity(&self, activity: &OrganisationActivity) -> CoreResult<()>;
    async fn list_activities(
        &self,
        organisation_id: Uuid,
    ) -> CoreResult<Vec<OrganisationActivity>>;
}

/// Invite-by-code collaborator: resolves a code to the leaderboard it opens.
/// The sole join mechanism for AD_HOC boards.
#[async_trait]
pub trait InviteCodes: Send + Sync {
    async fn resolve(&self, code: &str) -> CoreResult<Option<Uuid>>;
}
