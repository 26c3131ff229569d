//! Exhaustive grant-table and gate matrices. Adding an action or a role
//! without extending these tables is a test failure, not a silent default.

mod common;

use quizhall_core::authz::grants::{actions, org_role_allows};
use quizhall_core::authz::{can_read, can_write, require_permission, require_writable};
use quizhall_core::models::{OrgRole, SubscriptionStatus};
use quizhall_core::CoreError;

const ALL_ROLES: [OrgRole; 4] = [
    OrgRole::Owner,
    OrgRole::Admin,
    OrgRole::Teacher,
    OrgRole::BillingAdmin,
];

const ALL_ACTIONS: [&str; 9] = [
    actions::ORG_LEADERBOARDS_CREATE,
    actions::ORG_LEADERBOARDS_MANAGE,
    actions::ORG_MEMBERS_INVITE,
    actions::ORG_MEMBERS_REMOVE,
    actions::ORG_MEMBERS_UPDATE_ROLE,
    actions::ORG_MEMBERS_MANAGE,
    actions::ORG_GROUPS_CREATE,
    actions::ORG_GROUPS_MANAGE,
    actions::ORG_BILLING_MANAGE,
];

/// The documented boolean for every (role, action) pair. A change here must
/// be deliberate.
fn expected(role: OrgRole, action: &str) -> bool {
    use OrgRole::*;
    match (role, action) {
        (Owner, _) => true,
        // Admin holds the member verbs individually, not the covering
        // org:members:manage grant, and never billing.
        (Admin, a) => a != actions::ORG_BILLING_MANAGE && a != actions::ORG_MEMBERS_MANAGE,
        (Teacher, a) => {
            a == actions::ORG_LEADERBOARDS_CREATE || a == actions::ORG_GROUPS_CREATE
        }
        (BillingAdmin, a) => a == actions::ORG_BILLING_MANAGE,
    }
}

#[test]
fn role_grant_matrix_is_fixed() {
    for role in ALL_ROLES {
        for action in ALL_ACTIONS {
            assert_eq!(
                org_role_allows(role, action),
                expected(role, action),
                "grant regressed for ({role:?}, {action})"
            );
        }
    }
}

#[tokio::test]
async fn require_permission_matches_the_table() {
    let fix = common::fixture().await;
    let owner_ctx = fix.ctx_of(fix.owner.id).await;
    let teacher_ctx = fix.ctx_of(fix.teacher.id).await;

    for action in ALL_ACTIONS {
        assert!(require_permission(Some(&owner_ctx), action).is_ok());
        assert_eq!(
            require_permission(Some(&teacher_ctx), action).is_ok(),
            expected(OrgRole::Teacher, action),
            "teacher grant mismatch for {action}"
        );
    }
}

#[tokio::test]
async fn subscription_gates_writes_independent_of_role() {
    // An OWNER of an EXPIRED org keeps the role grant but cannot write.
    let fix = common::fixture().await;
    fix.store
        .set_organisation_status(fix.org.id, SubscriptionStatus::Expired)
        .await;
    let ctx = fix.ctx_of(fix.owner.id).await;

    assert!(require_permission(Some(&ctx), actions::ORG_LEADERBOARDS_CREATE).is_ok());
    assert!(!can_write(&ctx));
    assert!(matches!(
        require_writable(Some(&ctx), actions::ORG_LEADERBOARDS_CREATE),
        Err(CoreError::SubscriptionExpired { organisation_id }) if organisation_id == fix.org.id
    ));
}

#[tokio::test]
async fn write_gate_per_organisation_status() {
    let cases = [
        (SubscriptionStatus::Active, true),
        (SubscriptionStatus::Trialing, true),
        (SubscriptionStatus::FreeTrial, true),
        (SubscriptionStatus::PastDue, false),
        (SubscriptionStatus::Cancelled, false),
        (SubscriptionStatus::Expired, false),
    ];
    for (status, writable) in cases {
        let fix = common::fixture().await;
        fix.store.set_organisation_status(fix.org.id, status).await;
        let ctx = fix.ctx_of(fix.owner.id).await;
        assert_eq!(can_write(&ctx), writable, "status {status:?}");
        // Reads survive every billing state for an ACTIVE member.
        assert!(can_read(&ctx), "status {status:?}");
    }
}

#[tokio::test]
async fn resolve_returns_none_for_non_members_and_removed_members() {
    let fix = common::fixture().await;
    let stranger = common::user(None);
    fix.store.put_user(stranger.clone()).await;

    assert!(quizhall_core::resolve(&fix.store, stranger.id, fix.org.id)
        .await
        .unwrap()
        .is_none());

    // Soft-deleted membership resolves to None too.
    let removed = fix.ctx_of(fix.teacher.id).await;
    let actor = fix.ctx_of(fix.owner.id).await;
    quizhall_core::services::members::remove_member(
        &fix.store,
        fix.org.id,
        removed.member_id,
        &actor,
    )
    .await
    .unwrap();
    assert!(quizhall_core::resolve(&fix.store, fix.teacher.id, fix.org.id)
        .await
        .unwrap()
        .is_none());
}
