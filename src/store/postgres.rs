//! Postgres-backed store. Relies on unique constraints on
//! (organisation_id, user_id) for organisation_members and on
//! (leaderboard_id, user_id) for leaderboard_members; upserts target those
//! keys so concurrent writers converge instead of racing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::authz::context::AccessContext;
use crate::config::Config;
use crate::error::CoreResult;
use crate::models::{
    Leaderboard, LeaderboardMember, OrganisationActivity, OrganisationGroup,
    OrganisationGroupMember, OrganisationMember, OrgRole, User,
};
use crate::store::{InviteCodes, MemberUpsertOutcome, RemoveOutcome, RoleUpdateOutcome, Store};

const MEMBER_COLS: &str = "id, organisation_id, user_id, role, status, \
     seat_assigned_at, seat_released_at, deleted_at, created_at";
const BOARD_MEMBER_COLS: &str =
    "id, leaderboard_id, user_id, organisation_member_id, joined_at, left_at, muted";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(config.db.pool_min)
            .max_connections(config.db.pool_max)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(&config.database_url())
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let user: Option<User> = sqlx::query_as(
            "SELECT id, subscription_tier, subscription_status, trial_ends_at, platform_role, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn load_access(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<AccessContext>> {
        let ctx: Option<AccessContext> = sqlx::query_as(
            r#"SELECT om.id AS member_id, om.organisation_id, om.user_id, om.role,
                om.status AS member_status, o.status AS organisation_status,
                u.subscription_status
            FROM organisation_members om
            JOIN organisations o ON o.id = om.organisation_id
            JOIN users u ON u.id = om.user_id
            WHERE om.organisation_id = $1 AND om.user_id = $2 AND om.deleted_at IS NULL"#,
        )
        .bind(organisation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ctx)
    }

    async fn get_member(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
    ) -> CoreResult<Option<OrganisationMember>> {
        let member: Option<OrganisationMember> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLS} FROM organisation_members \
             WHERE id = $1 AND organisation_id = $2"
        ))
        .bind(member_id)
        .bind(organisation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn find_member_by_user(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<OrganisationMember>> {
        let member: Option<OrganisationMember> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLS} FROM organisation_members \
             WHERE organisation_id = $1 AND user_id = $2 AND deleted_at IS NULL"
        ))
        .bind(organisation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn active_seat_count(&self, organisation_id: Uuid) -> CoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM organisation_members \
             WHERE organisation_id = $1 AND deleted_at IS NULL \
               AND seat_assigned_at IS NOT NULL AND seat_released_at IS NULL",
        )
        .bind(organisation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn upsert_member(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
        now: DateTime<Utc>,
    ) -> CoreResult<MemberUpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        // Lock the organisation row so concurrent invites serialise on the
        // capacity check; the count and the insert then see the same seats.
        let capacity: Option<i32> = sqlx::query_scalar(
            "SELECT seat_capacity FROM organisations WHERE id = $1 FOR UPDATE",
        )
        .bind(organisation_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(capacity) = capacity else {
            return Ok(MemberUpsertOutcome::OrgNotFound);
        };

        // Seats held by everyone but the target: re-inviting a current seat
        // holder must not count their own seat twice.
        let seats_held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM organisation_members \
             WHERE organisation_id = $1 AND user_id <> $2 AND deleted_at IS NULL \
               AND seat_assigned_at IS NOT NULL AND seat_released_at IS NULL",
        )
        .bind(organisation_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if seats_held >= capacity as i64 {
            return Ok(MemberUpsertOutcome::SeatLimitReached);
        }

        let member: OrganisationMember = sqlx::query_as(&format!(
            "INSERT INTO organisation_members \
                (id, organisation_id, user_id, role, status, seat_assigned_at, created_at) \
             VALUES ($1, $2, $3, $4, 'ACTIVE', $5, $5) \
             ON CONFLICT (organisation_id, user_id) DO UPDATE SET \
                role = EXCLUDED.role, status = 'ACTIVE', deleted_at = NULL, \
                seat_assigned_at = EXCLUDED.seat_assigned_at, seat_released_at = NULL \
             RETURNING {MEMBER_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(organisation_id)
        .bind(user_id)
        .bind(role)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(MemberUpsertOutcome::Member(member))
    }

    async fn remove_member(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<RemoveOutcome> {
        // Single conditional UPDATE: the soft delete and the seat release
        // cannot be split by a crash, and the OWNER guard is evaluated by the
        // same statement that writes.
        let removed: Option<OrganisationMember> = sqlx::query_as(&format!(
            "UPDATE organisation_members SET \
                deleted_at = $3, status = 'INACTIVE', \
                seat_released_at = CASE \
                    WHEN seat_assigned_at IS NOT NULL AND seat_released_at IS NULL THEN $3 \
                    ELSE seat_released_at END \
             WHERE id = $1 AND organisation_id = $2 AND deleted_at IS NULL AND role <> 'OWNER' \
             RETURNING {MEMBER_COLS}"
        ))
        .bind(member_id)
        .bind(organisation_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(member) = removed {
            return Ok(RemoveOutcome::Removed(member));
        }
        // Distinguish "owner-protected" from "gone" for the caller.
        match self.get_member(organisation_id, member_id).await? {
            Some(m) if m.deleted_at.is_none() && m.role == OrgRole::Owner => {
                Ok(RemoveOutcome::OwnerProtected)
            }
            _ => Ok(RemoveOutcome::NotFound),
        }
    }

    async fn update_member_role(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
        new_role: OrgRole,
        actor_is_owner: bool,
    ) -> CoreResult<RoleUpdateOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row-locked re-read: the guard and the update see the same role.
        let current: Option<OrganisationMember> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLS} FROM organisation_members \
             WHERE id = $1 AND organisation_id = $2 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(member_id)
        .bind(organisation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            return Ok(RoleUpdateOutcome::NotFound);
        };

        if current.role == OrgRole::Owner {
            if !actor_is_owner {
                return Ok(RoleUpdateOutcome::OwnerProtected);
            }
            if new_role != OrgRole::Owner {
                let other_owners: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*)::bigint FROM organisation_members \
                     WHERE organisation_id = $1 AND role = 'OWNER' \
                       AND deleted_at IS NULL AND id <> $2",
                )
                .bind(organisation_id)
                .bind(member_id)
                .fetch_one(&mut *tx)
                .await?;
                if other_owners == 0 {
                    return Ok(RoleUpdateOutcome::SoleOwnerDemotion);
                }
            }
        }

        let updated: OrganisationMember = sqlx::query_as(&format!(
            "UPDATE organisation_members SET role = $1 WHERE id = $2 RETURNING {MEMBER_COLS}"
        ))
        .bind(new_role)
        .bind(member_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RoleUpdateOutcome::Updated {
            member: updated,
            previous_role: current.role,
        })
    }

    async fn get_group(&self, id: Uuid) -> CoreResult<Option<OrganisationGroup>> {
        let group: Option<OrganisationGroup> = sqlx::query_as(
            "SELECT id, organisation_id, name, group_type, created_by_user_id, deleted_at, created_at \
             FROM organisation_groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn insert_group(&self, group: &OrganisationGroup) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO organisation_groups \
                (id, organisation_id, name, group_type, created_by_user_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(group.id)
        .bind(group.organisation_id)
        .bind(&group.name)
        .bind(&group.group_type)
        .bind(group.created_by_user_id)
        .bind(group.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_group_member(&self, link: &OrganisationGroupMember) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO organisation_group_members \
                (id, organisation_group_id, organisation_member_id, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (organisation_group_id, organisation_member_id) \
             DO UPDATE SET deleted_at = NULL",
        )
        .bind(link.id)
        .bind(link.organisation_group_id)
        .bind(link.organisation_member_id)
        .bind(link.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_active_group_member(
        &self,
        organisation_group_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<bool> {
        let linked: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (
                SELECT 1 FROM organisation_group_members gm
                JOIN organisation_members om ON om.id = gm.organisation_member_id
                WHERE gm.organisation_group_id = $1 AND gm.deleted_at IS NULL
                  AND om.user_id = $2 AND om.deleted_at IS NULL AND om.status = 'ACTIVE'
            )"#,
        )
        .bind(organisation_group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(linked)
    }

    async fn get_leaderboard(&self, id: Uuid) -> CoreResult<Option<Leaderboard>> {
        let board: Option<Leaderboard> = sqlx::query_as(
            "SELECT id, name, visibility, organisation_id, organisation_group_id, \
                created_by_user_id, invite_code, deleted_at, created_at \
             FROM leaderboards WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(board)
    }

    async fn insert_leaderboard(&self, board: &Leaderboard) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO leaderboards \
                (id, name, visibility, organisation_id, organisation_group_id, \
                 created_by_user_id, invite_code, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(board.id)
        .bind(&board.name)
        .bind(board.visibility)
        .bind(board.organisation_id)
        .bind(board.organisation_group_id)
        .bind(board.created_by_user_id)
        .bind(&board.invite_code)
        .bind(board.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_leaderboard_member(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<LeaderboardMember>> {
        let member: Option<LeaderboardMember> = sqlx::query_as(&format!(
            "SELECT {BOARD_MEMBER_COLS} FROM leaderboard_members \
             WHERE leaderboard_id = $1 AND user_id = $2"
        ))
        .bind(leaderboard_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn upsert_leaderboard_member(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        organisation_member_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> CoreResult<LeaderboardMember> {
        // ON CONFLICT keeps the existing row id, so a leave/rejoin cycle
        // reuses the row instead of creating a duplicate.
        let member: LeaderboardMember = sqlx::query_as(&format!(
            "INSERT INTO leaderboard_members \
                (id, leaderboard_id, user_id, organisation_member_id, joined_at, muted) \
             VALUES ($1, $2, $3, $4, $5, FALSE) \
             ON CONFLICT (leaderboard_id, user_id) DO UPDATE SET \
                left_at = NULL, muted = FALSE, \
                organisation_member_id = EXCLUDED.organisation_member_id \
             RETURNING {BOARD_MEMBER_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(leaderboard_id)
        .bind(user_id)
        .bind(organisation_member_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    async fn mark_left(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<LeaderboardMember>> {
        let member: Option<LeaderboardMember> = sqlx::query_as(&format!(
            "UPDATE leaderboard_members SET left_at = $3 \
             WHERE leaderboard_id = $1 AND user_id = $2 AND left_at IS NULL \
             RETURNING {BOARD_MEMBER_COLS}"
        ))
        .bind(leaderboard_id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn set_muted(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        muted: bool,
    ) -> CoreResult<Option<LeaderboardMember>> {
        let member: Option<LeaderboardMember> = sqlx::query_as(&format!(
            "UPDATE leaderboard_members SET muted = $3 \
             WHERE leaderboard_id = $1 AND user_id = $2 AND left_at IS NULL \
             RETURNING {BOARD_MEMBER_COLS}"
        ))
        .bind(leaderboard_id)
        .bind(user_id)
        .bind(muted)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn append_activity(&self, activity: &OrganisationActivity) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO organisation_activity \
                (id, organisation_id, actor_user_id, activity_type, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(activity.id)
        .bind(activity.organisation_id)
        .bind(activity.actor_user_id)
        .bind(activity.activity_type)
        .bind(&activity.metadata)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_activities(
        &self,
        organisation_id: Uuid,
    ) -> CoreResult<Vec<OrganisationActivity>> {
        let rows: Vec<OrganisationActivity> = sqlx::query_as(
            "SELECT id, organisation_id, actor_user_id, activity_type, metadata, created_at \
             FROM organisation_activity WHERE organisation_id = $1 ORDER BY created_at",
        )
        .bind(organisation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl InviteCodes for PgStore {
    async fn resolve(&self, code: &str) -> CoreResult<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM leaderboards WHERE invite_code = $1 AND deleted_at IS NULL",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }
}
