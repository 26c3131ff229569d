#![allow(dead_code)]

use chrono::Utc;
use uuid::Uuid;

use quizhall_core::authz::{self, AccessContext};
use quizhall_core::models::*;
use quizhall_core::store::MemStore;

pub fn user(platform_role: Option<PlatformRole>) -> User {
    User {
        id: Uuid::new_v4(),
        subscription_tier: SubscriptionTier::Premium,
        subscription_status: SubscriptionStatus::Active,
        trial_ends_at: None,
        platform_role,
        created_at: Utc::now(),
    }
}

pub fn organisation(status: SubscriptionStatus, seat_capacity: i32) -> Organisation {
    Organisation {
        id: Uuid::new_v4(),
        name: "Ada Lovelace Academy".into(),
        status,
        seat_capacity,
        created_at: Utc::now(),
    }
}

pub fn member(organisation_id: Uuid, user_id: Uuid, role: OrgRole) -> OrganisationMember {
    let now = Utc::now();
    OrganisationMember {
        id: Uuid::new_v4(),
        organisation_id,
        user_id,
        role,
        status: MemberStatus::Active,
        seat_assigned_at: Some(now),
        seat_released_at: None,
        deleted_at: None,
        created_at: now,
    }
}

pub fn org_board(organisation_id: Uuid, created_by: Uuid) -> Leaderboard {
    Leaderboard {
        id: Uuid::new_v4(),
        name: "Term 1 Quiz Cup".into(),
        visibility: LeaderboardVisibility::OrgWide,
        organisation_id: Some(organisation_id),
        organisation_group_id: None,
        created_by_user_id: created_by,
        invite_code: None,
        deleted_at: None,
        created_at: Utc::now(),
    }
}

pub fn group_board(
    organisation_id: Uuid,
    organisation_group_id: Uuid,
    created_by: Uuid,
) -> Leaderboard {
    Leaderboard {
        organisation_group_id: Some(organisation_group_id),
        visibility: LeaderboardVisibility::Group,
        ..org_board(organisation_id, created_by)
    }
}

pub fn ad_hoc_board(created_by: Uuid, invite_code: &str) -> Leaderboard {
    Leaderboard {
        id: Uuid::new_v4(),
        name: "Friday Night Trivia".into(),
        visibility: LeaderboardVisibility::AdHoc,
        organisation_id: None,
        organisation_group_id: None,
        created_by_user_id: created_by,
        invite_code: Some(invite_code.to_string()),
        deleted_at: None,
        created_at: Utc::now(),
    }
}

/// An active organisation with an OWNER and a TEACHER, the base of most
/// scenarios.
pub struct Fixture {
    pub store: MemStore,
    pub org: Organisation,
    pub owner: User,
    pub owner_member: OrganisationMember,
    pub teacher: User,
    pub teacher_member: OrganisationMember,
}

/// Routes `tracing` output (e.g. the swallowed audit-failure warnings) into
/// the captured test output. Repeat calls after the first are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn fixture() -> Fixture {
    init_tracing();
    let store = MemStore::new();
    let org = organisation(SubscriptionStatus::Active, 10);
    let owner = user(Some(PlatformRole::OrgAdmin));
    let teacher = user(Some(PlatformRole::Teacher));
    let owner_member = member(org.id, owner.id, OrgRole::Owner);
    let teacher_member = member(org.id, teacher.id, OrgRole::Teacher);

    store.put_organisation(org.clone()).await;
    store.put_user(owner.clone()).await;
    store.put_user(teacher.clone()).await;
    store.put_member(owner_member.clone()).await;
    store.put_member(teacher_member.clone()).await;

    Fixture {
        store,
        org,
        owner,
        owner_member,
        teacher,
        teacher_member,
    }
}

impl Fixture {
    pub async fn ctx_of(&self, user_id: Uuid) -> AccessContext {
        authz::resolve(&self.store, user_id, self.org.id)
            .await
            .expect("resolve failed")
            .expect("no membership for user")
    }
}
