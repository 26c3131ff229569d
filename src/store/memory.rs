//! In-process store used by the test suite. Mirrors the Postgres store's
//! atomic units: every trait method takes the single state lock once, so the
//! same interleavings the database constraints rule out are ruled out here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::authz::context::AccessContext;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Leaderboard, LeaderboardMember, MemberStatus, Organisation, OrganisationActivity,
    OrganisationGroup, OrganisationGroupMember, OrganisationMember, OrgRole, User,
};
use crate::store::{InviteCodes, MemberUpsertOutcome, RemoveOutcome, RoleUpdateOutcome, Store};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    organisations: HashMap<Uuid, Organisation>,
    members: Vec<OrganisationMember>,
    groups: HashMap<Uuid, OrganisationGroup>,
    group_members: Vec<OrganisationGroupMember>,
    leaderboards: HashMap<Uuid, Leaderboard>,
    board_members: Vec<LeaderboardMember>,
    activities: Vec<OrganisationActivity>,
}

#[derive(Default)]
pub struct MemStore {
    state: Mutex<State>,
    /// When set, `append_activity` fails. Lets tests assert that audit
    /// failures are swallowed and never surface as the primary error.
    fail_activity_writes: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_activity_writes(&self, fail: bool) {
        self.fail_activity_writes.store(fail, Ordering::SeqCst);
    }

    // --- seeding helpers for tests ---

    pub async fn put_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn put_organisation(&self, org: Organisation) {
        self.state.lock().await.organisations.insert(org.id, org);
    }

    pub async fn set_organisation_status(
        &self,
        id: Uuid,
        status: crate::models::SubscriptionStatus,
    ) {
        if let Some(org) = self.state.lock().await.organisations.get_mut(&id) {
            org.status = status;
        }
    }

    pub async fn put_member(&self, member: OrganisationMember) {
        self.state.lock().await.members.push(member);
    }

    pub async fn put_group(&self, group: OrganisationGroup) {
        self.state.lock().await.groups.insert(group.id, group);
    }

    pub async fn put_group_member(&self, link: OrganisationGroupMember) {
        self.state.lock().await.group_members.push(link);
    }

    pub async fn put_leaderboard(&self, board: Leaderboard) {
        self.state.lock().await.leaderboards.insert(board.id, board);
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn load_access(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<AccessContext>> {
        let state = self.state.lock().await;
        let Some(member) = state
            .members
            .iter()
            .find(|m| {
                m.organisation_id == organisation_id
                    && m.user_id == user_id
                    && m.deleted_at.is_none()
            })
            .cloned()
        else {
            return Ok(None);
        };
        let Some(org) = state.organisations.get(&organisation_id) else {
            return Ok(None);
        };
        let Some(user) = state.users.get(&user_id) else {
            return Ok(None);
        };
        Ok(Some(AccessContext {
            member_id: member.id,
            organisation_id,
            user_id,
            role: member.role,
            member_status: member.status,
            organisation_status: org.status,
            subscription_status: user.subscription_status,
        }))
    }

    async fn get_member(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
    ) -> CoreResult<Option<OrganisationMember>> {
        Ok(self
            .state
            .lock()
            .await
            .members
            .iter()
            .find(|m| m.id == member_id && m.organisation_id == organisation_id)
            .cloned())
    }

    async fn find_member_by_user(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<OrganisationMember>> {
        Ok(self
            .state
            .lock()
            .await
            .members
            .iter()
            .find(|m| {
                m.organisation_id == organisation_id
                    && m.user_id == user_id
                    && m.deleted_at.is_none()
            })
            .cloned())
    }

    async fn active_seat_count(&self, organisation_id: Uuid) -> CoreResult<i64> {
        Ok(self
            .state
            .lock()
            .await
            .members
            .iter()
            .filter(|m| {
                m.organisation_id == organisation_id && m.deleted_at.is_none() && m.holds_seat()
            })
            .count() as i64)
    }

    async fn upsert_member(
        &self,
        organisation_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
        now: DateTime<Utc>,
    ) -> CoreResult<MemberUpsertOutcome> {
        // Capacity check and write under the same lock acquisition, matching
        // the Postgres store's transaction.
        let mut state = self.state.lock().await;
        let Some(capacity) = state.organisations.get(&organisation_id).map(|o| o.seat_capacity)
        else {
            return Ok(MemberUpsertOutcome::OrgNotFound);
        };
        let seats_held = state
            .members
            .iter()
            .filter(|m| {
                m.organisation_id == organisation_id
                    && m.user_id != user_id
                    && m.deleted_at.is_none()
                    && m.holds_seat()
            })
            .count();
        if seats_held >= capacity as usize {
            return Ok(MemberUpsertOutcome::SeatLimitReached);
        }
        if let Some(existing) = state
            .members
            .iter_mut()
            .find(|m| m.organisation_id == organisation_id && m.user_id == user_id)
        {
            existing.role = role;
            existing.status = MemberStatus::Active;
            existing.deleted_at = None;
            existing.seat_assigned_at = Some(now);
            existing.seat_released_at = None;
            return Ok(MemberUpsertOutcome::Member(existing.clone()));
        }
        let member = OrganisationMember {
            id: Uuid::new_v4(),
            organisation_id,
            user_id,
            role,
            status: MemberStatus::Active,
            seat_assigned_at: Some(now),
            seat_released_at: None,
            deleted_at: None,
            created_at: now,
        };
        state.members.push(member.clone());
        Ok(MemberUpsertOutcome::Member(member))
    }

    async fn remove_member(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<RemoveOutcome> {
        let mut state = self.state.lock().await;
        let Some(member) = state
            .members
            .iter_mut()
            .find(|m| {
                m.id == member_id && m.organisation_id == organisation_id && m.deleted_at.is_none()
            })
        else {
            return Ok(RemoveOutcome::NotFound);
        };
        if member.role == OrgRole::Owner {
            return Ok(RemoveOutcome::OwnerProtected);
        }
        member.deleted_at = Some(now);
        member.status = MemberStatus::Inactive;
        if member.holds_seat() {
            member.seat_released_at = Some(now);
        }
        Ok(RemoveOutcome::Removed(member.clone()))
    }

    async fn update_member_role(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
        new_role: OrgRole,
        actor_is_owner: bool,
    ) -> CoreResult<RoleUpdateOutcome> {
        let mut state = self.state.lock().await;
        let Some(idx) = state.members.iter().position(|m| {
            m.id == member_id && m.organisation_id == organisation_id && m.deleted_at.is_none()
        }) else {
            return Ok(RoleUpdateOutcome::NotFound);
        };
        let current_role = state.members[idx].role;
        if current_role == OrgRole::Owner {
            if !actor_is_owner {
                return Ok(RoleUpdateOutcome::OwnerProtected);
            }
            if new_role != OrgRole::Owner {
                let other_owners = state
                    .members
                    .iter()
                    .filter(|m| {
                        m.organisation_id == organisation_id
                            && m.role == OrgRole::Owner
                            && m.deleted_at.is_none()
                            && m.id != member_id
                    })
                    .count();
                if other_owners == 0 {
                    return Ok(RoleUpdateOutcome::SoleOwnerDemotion);
                }
            }
        }
        state.members[idx].role = new_role;
        Ok(RoleUpdateOutcome::Updated {
            member: state.members[idx].clone(),
            previous_role: current_role,
        })
    }

    async fn get_group(&self, id: Uuid) -> CoreResult<Option<OrganisationGroup>> {
        Ok(self.state.lock().await.groups.get(&id).cloned())
    }

    async fn insert_group(&self, group: &OrganisationGroup) -> CoreResult<()> {
        self.state
            .lock()
            .await
            .groups
            .insert(group.id, group.clone());
        Ok(())
    }

    async fn insert_group_member(&self, link: &OrganisationGroupMember) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.group_members.iter_mut().find(|gm| {
            gm.organisation_group_id == link.organisation_group_id
                && gm.organisation_member_id == link.organisation_member_id
        }) {
            existing.deleted_at = None;
            return Ok(());
        }
        state.group_members.push(link.clone());
        Ok(())
    }

    async fn is_active_group_member(
        &self,
        organisation_group_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state.group_members.iter().any(|gm| {
            gm.organisation_group_id == organisation_group_id
                && gm.deleted_at.is_none()
                && state.members.iter().any(|m| {
                    m.id == gm.organisation_member_id
                        && m.user_id == user_id
                        && m.deleted_at.is_none()
                        && m.status == MemberStatus::Active
                })
        }))
    }

    async fn get_leaderboard(&self, id: Uuid) -> CoreResult<Option<Leaderboard>> {
        Ok(self.state.lock().await.leaderboards.get(&id).cloned())
    }

    async fn insert_leaderboard(&self, board: &Leaderboard) -> CoreResult<()> {
        self.state
            .lock()
            .await
            .leaderboards
            .insert(board.id, board.clone());
        Ok(())
    }

    async fn find_leaderboard_member(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Option<LeaderboardMember>> {
        Ok(self
            .state
            .lock()
            .await
            .board_members
            .iter()
            .find(|m| m.leaderboard_id == leaderboard_id && m.user_id == user_id)
            .cloned())
    }

    async fn upsert_leaderboard_member(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        organisation_member_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> CoreResult<LeaderboardMember> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .board_members
            .iter_mut()
            .find(|m| m.leaderboard_id == leaderboard_id && m.user_id == user_id)
        {
            existing.left_at = None;
            existing.muted = false;
            existing.organisation_member_id = organisation_member_id;
            return Ok(existing.clone());
        }
        let member = LeaderboardMember {
            id: Uuid::new_v4(),
            leaderboard_id,
            user_id,
            organisation_member_id,
            joined_at: now,
            left_at: None,
            muted: false,
        };
        state.board_members.push(member.clone());
        Ok(member)
    }

    async fn mark_left(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<LeaderboardMember>> {
        let mut state = self.state.lock().await;
        let Some(member) = state.board_members.iter_mut().find(|m| {
            m.leaderboard_id == leaderboard_id && m.user_id == user_id && m.left_at.is_none()
        }) else {
            return Ok(None);
        };
        member.left_at = Some(now);
        Ok(Some(member.clone()))
    }

    async fn set_muted(
        &self,
        leaderboard_id: Uuid,
        user_id: Uuid,
        muted: bool,
    ) -> CoreResult<Option<LeaderboardMember>> {
        let mut state = self.state.lock().await;
        let Some(member) = state.board_members.iter_mut().find(|m| {
            m.leaderboard_id == leaderboard_id && m.user_id == user_id && m.left_at.is_none()
        }) else {
            return Ok(None);
        };
        member.muted = muted;
        Ok(Some(member.clone()))
    }

    async fn append_activity(&self, activity: &OrganisationActivity) -> CoreResult<()> {
        if self.fail_activity_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Database(sqlx::Error::PoolClosed));
        }
        self.state.lock().await.activities.push(activity.clone());
        Ok(())
    }

    async fn list_activities(
        &self,
        organisation_id: Uuid,
    ) -> CoreResult<Vec<OrganisationActivity>> {
        Ok(self
            .state
            .lock()
            .await
            .activities
            .iter()
            .filter(|a| a.organisation_id == organisation_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InviteCodes for MemStore {
    async fn resolve(&self, code: &str) -> CoreResult<Option<Uuid>> {
        Ok(self
            .state
            .lock()
            .await
            .leaderboards
            .values()
            .find(|b| b.deleted_at.is_none() && b.invite_code.as_deref() == Some(code))
            .map(|b| b.id))
    }
}
