//! Visibility tiers and their denial reasons, plus leaderboard creation
//! invariants.

mod common;

use chrono::Utc;
use uuid::Uuid;

use quizhall_core::check_visibility;
use quizhall_core::models::*;
use quizhall_core::services::{boards, members};
use quizhall_core::store::Store;
use quizhall_core::{Access, CoreError, DenialReason};

fn group(organisation_id: Uuid, created_by: Uuid) -> OrganisationGroup {
    OrganisationGroup {
        id: Uuid::new_v4(),
        organisation_id,
        name: "Year 7 Red".into(),
        group_type: "class".into(),
        created_by_user_id: created_by,
        deleted_at: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn org_role_does_not_open_group_boards() {
    // An org ADMIN outside group G cannot see or join G's board, even
    // with an active subscription.
    let fix = common::fixture().await;
    let admin = common::user(None);
    fix.store.put_user(admin.clone()).await;
    fix.store
        .put_member(common::member(fix.org.id, admin.id, OrgRole::Admin))
        .await;

    let g = group(fix.org.id, fix.owner.id);
    fix.store.put_group(g.clone()).await;
    let board = common::group_board(fix.org.id, g.id, fix.owner.id);
    fix.store.put_leaderboard(board.clone()).await;

    let access = check_visibility(&fix.store, &fix.store, board.id, admin.id, None)
        .await
        .unwrap();
    assert_eq!(access, Access::Denied(DenialReason::NotGroupMember));

    let res = boards::join(&fix.store, &fix.store, board.id, admin.id, None).await;
    assert!(matches!(
        res,
        Err(CoreError::Forbidden {
            reason: DenialReason::NotGroupMember
        })
    ));
}

#[tokio::test]
async fn group_member_reaches_the_group_board() {
    let fix = common::fixture().await;
    let g = group(fix.org.id, fix.owner.id);
    fix.store.put_group(g.clone()).await;
    let board = common::group_board(fix.org.id, g.id, fix.owner.id);
    fix.store.put_leaderboard(board.clone()).await;

    let actor = fix.ctx_of(fix.owner.id).await;
    members::add_group_member(&fix.store, g.id, fix.teacher_member.id, &actor)
        .await
        .unwrap();

    let access = check_visibility(&fix.store, &fix.store, board.id, fix.teacher.id, None)
        .await
        .unwrap();
    assert_eq!(access, Access::Allowed);

    let joined = boards::join(&fix.store, &fix.store, board.id, fix.teacher.id, None)
        .await
        .unwrap();
    assert_eq!(joined.organisation_member_id, Some(fix.teacher_member.id));
}

#[tokio::test]
async fn removed_org_membership_closes_group_boards() {
    let fix = common::fixture().await;
    let g = group(fix.org.id, fix.owner.id);
    fix.store.put_group(g.clone()).await;
    let board = common::group_board(fix.org.id, g.id, fix.owner.id);
    fix.store.put_leaderboard(board.clone()).await;

    let actor = fix.ctx_of(fix.owner.id).await;
    members::add_group_member(&fix.store, g.id, fix.teacher_member.id, &actor)
        .await
        .unwrap();
    members::remove_member(&fix.store, fix.org.id, fix.teacher_member.id, &actor)
        .await
        .unwrap();

    let access = check_visibility(&fix.store, &fix.store, board.id, fix.teacher.id, None)
        .await
        .unwrap();
    assert_eq!(access, Access::Denied(DenialReason::NotGroupMember));
}

#[tokio::test]
async fn org_wide_requires_org_membership() {
    let fix = common::fixture().await;
    let board = common::org_board(fix.org.id, fix.owner.id);
    fix.store.put_leaderboard(board.clone()).await;

    let stranger = common::user(None);
    fix.store.put_user(stranger.clone()).await;

    let access = check_visibility(&fix.store, &fix.store, board.id, stranger.id, None)
        .await
        .unwrap();
    assert_eq!(access, Access::Denied(DenialReason::NotOrgMember));

    let access = check_visibility(&fix.store, &fix.store, board.id, fix.teacher.id, None)
        .await
        .unwrap();
    assert_eq!(access, Access::Allowed);
}

#[tokio::test]
async fn suspended_member_loses_org_wide_boards() {
    let fix = common::fixture().await;
    let board = common::org_board(fix.org.id, fix.owner.id);
    fix.store.put_leaderboard(board.clone()).await;

    let mut suspended = common::member(fix.org.id, common::user(None).id, OrgRole::Teacher);
    suspended.status = MemberStatus::Suspended;
    let user = common::user(None);
    suspended.user_id = user.id;
    fix.store.put_user(user.clone()).await;
    fix.store.put_member(suspended.clone()).await;

    let access = check_visibility(&fix.store, &fix.store, board.id, user.id, None)
        .await
        .unwrap();
    assert_eq!(access, Access::Denied(DenialReason::NotOrgMember));
}

#[tokio::test]
async fn ad_hoc_requires_the_right_invite_code() {
    let fix = common::fixture().await;
    let board = common::ad_hoc_board(fix.owner.id, "QUIZNITE");
    fix.store.put_leaderboard(board.clone()).await;
    let guest = common::user(None);
    fix.store.put_user(guest.clone()).await;

    // No code, wrong code, right code.
    let access = check_visibility(&fix.store, &fix.store, board.id, guest.id, None)
        .await
        .unwrap();
    assert_eq!(access, Access::Denied(DenialReason::NotInvited));

    let access = check_visibility(&fix.store, &fix.store, board.id, guest.id, Some("WRONG"))
        .await
        .unwrap();
    assert_eq!(access, Access::Denied(DenialReason::NotInvited));

    let access = check_visibility(&fix.store, &fix.store, board.id, guest.id, Some("QUIZNITE"))
        .await
        .unwrap();
    assert_eq!(access, Access::Allowed);
}

#[tokio::test]
async fn ad_hoc_rejoin_needs_no_code_once_a_row_exists() {
    let fix = common::fixture().await;
    let board = common::ad_hoc_board(fix.owner.id, "QUIZNITE");
    fix.store.put_leaderboard(board.clone()).await;
    let guest = common::user(None);
    fix.store.put_user(guest.clone()).await;

    boards::join(&fix.store, &fix.store, board.id, guest.id, Some("QUIZNITE"))
        .await
        .unwrap();
    boards::leave(&fix.store, board.id, guest.id, false)
        .await
        .unwrap();

    // The old row grants the way back in.
    let rejoined = boards::join(&fix.store, &fix.store, board.id, guest.id, None)
        .await
        .unwrap();
    assert!(rejoined.is_active());
}

#[tokio::test]
async fn missing_or_deleted_boards_are_not_found() {
    let fix = common::fixture().await;

    let access = check_visibility(&fix.store, &fix.store, Uuid::new_v4(), fix.teacher.id, None)
        .await
        .unwrap();
    assert_eq!(access, Access::Denied(DenialReason::NotFound));

    let mut board = common::org_board(fix.org.id, fix.owner.id);
    board.deleted_at = Some(Utc::now());
    fix.store.put_leaderboard(board.clone()).await;

    let res = boards::join(&fix.store, &fix.store, board.id, fix.teacher.id, None).await;
    assert!(matches!(res, Err(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn create_org_wide_board_links_and_audits() {
    let fix = common::fixture().await;
    let board = boards::create_leaderboard(
        &fix.store,
        fix.teacher.id,
        boards::NewLeaderboard {
            name: "Science Sprint".into(),
            visibility: LeaderboardVisibility::OrgWide,
            organisation_id: Some(fix.org.id),
            organisation_group_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(board.organisation_id, Some(fix.org.id));
    assert!(board.invite_code.is_none());

    let audits = fix.store.list_activities(fix.org.id).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].activity_type, ActivityType::LeaderboardCreated);
}

#[tokio::test]
async fn group_board_must_name_a_group_in_the_same_org() {
    let fix = common::fixture().await;

    let res = boards::create_leaderboard(
        &fix.store,
        fix.owner.id,
        boards::NewLeaderboard {
            name: "No Group".into(),
            visibility: LeaderboardVisibility::Group,
            organisation_id: Some(fix.org.id),
            organisation_group_id: None,
        },
    )
    .await;
    assert!(matches!(res, Err(CoreError::InvariantViolation(_))));

    // A group from another organisation is rejected too.
    let other_org = common::organisation(SubscriptionStatus::Active, 5);
    fix.store.put_organisation(other_org.clone()).await;
    let foreign = group(other_org.id, fix.owner.id);
    fix.store.put_group(foreign.clone()).await;

    let res = boards::create_leaderboard(
        &fix.store,
        fix.owner.id,
        boards::NewLeaderboard {
            name: "Wrong Org".into(),
            visibility: LeaderboardVisibility::Group,
            organisation_id: Some(fix.org.id),
            organisation_group_id: Some(foreign.id),
        },
    )
    .await;
    assert!(matches!(res, Err(CoreError::InvariantViolation(_))));
}

#[tokio::test]
async fn ad_hoc_creation_needs_platform_grant_and_paid_tier() {
    let fix = common::fixture().await;

    // A premium teacher can mint an ad-hoc board with an invite code.
    let board = boards::create_leaderboard(
        &fix.store,
        fix.teacher.id,
        boards::NewLeaderboard {
            name: "Weekend League".into(),
            visibility: LeaderboardVisibility::AdHoc,
            organisation_id: None,
            organisation_group_id: None,
        },
    )
    .await
    .unwrap();
    assert!(board.organisation_id.is_none());
    let code = board.invite_code.clone().expect("invite code minted");

    // The code is the way in for anyone.
    let guest = common::user(None);
    fix.store.put_user(guest.clone()).await;
    boards::join(&fix.store, &fix.store, board.id, guest.id, Some(&code))
        .await
        .unwrap();

    // A student lacks the platform grant.
    let student = common::user(Some(PlatformRole::Student));
    fix.store.put_user(student.clone()).await;
    let res = boards::create_leaderboard(
        &fix.store,
        student.id,
        boards::NewLeaderboard {
            name: "Nope".into(),
            visibility: LeaderboardVisibility::AdHoc,
            organisation_id: None,
            organisation_group_id: None,
        },
    )
    .await;
    assert!(matches!(res, Err(CoreError::PermissionDenied { .. })));

    // A visitor-tier teacher is blocked as well.
    let mut visitor = common::user(Some(PlatformRole::Teacher));
    visitor.subscription_tier = SubscriptionTier::Visitor;
    fix.store.put_user(visitor.clone()).await;
    let res = boards::create_leaderboard(
        &fix.store,
        visitor.id,
        boards::NewLeaderboard {
            name: "Nope".into(),
            visibility: LeaderboardVisibility::AdHoc,
            organisation_id: None,
            organisation_group_id: None,
        },
    )
    .await;
    assert!(matches!(res, Err(CoreError::PermissionDenied { .. })));
}
