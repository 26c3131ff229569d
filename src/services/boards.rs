//! Leaderboard creation and the per-(board, user) membership state machine:
//! Unjoined → Active → {Muted, Left}. Muted exists only for ORG_WIDE boards,
//! where a true leave would be misleading (the member stays counted but is
//! suppressed from display). Left is reversible: rejoining reuses the row.

use chrono::Utc;
use rand::Rng;
use serde_json::json;
use uuid::Uuid;

use crate::authz::{self, gate, grants, grants::actions};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    ActivityType, Leaderboard, LeaderboardMember, LeaderboardVisibility, SubscriptionTier,
};
use crate::services::audit;
use crate::services::visibility::{self, Access, DenialReason};
use crate::store::{InviteCodes, Store};

const INVITE_CODE_LEN: usize = 8;
// No 0/O/1/I/L: codes get read out loud in classrooms.
const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_ALPHABET[rng.gen_range(0..INVITE_CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone)]
pub struct NewLeaderboard {
    pub name: String,
    pub visibility: LeaderboardVisibility,
    pub organisation_id: Option<Uuid>,
    pub organisation_group_id: Option<Uuid>,
}

/// Creates a leaderboard.
///
/// Org-scoped boards (ORG_WIDE, GROUP) require `org:leaderboards:create` and
/// a writable subscription; a role that would qualify but is blocked by
/// billing gets `SubscriptionExpired`. AD_HOC boards are organisation-free:
/// they require the platform grant `leaderboards:create_ad_hoc` and a
/// non-visitor tier, and are minted with an invite code, the sole way in.
pub async fn create_leaderboard(
    store: &dyn Store,
    actor_user_id: Uuid,
    spec: NewLeaderboard,
) -> CoreResult<Leaderboard> {
    let now = Utc::now();
    let board = match spec.visibility {
        LeaderboardVisibility::AdHoc => {
            if spec.organisation_id.is_some() || spec.organisation_group_id.is_some() {
                return Err(CoreError::InvariantViolation(
                    "ad-hoc leaderboards carry no organisation or group".into(),
                ));
            }
            let user = store.get_user(actor_user_id).await?.ok_or(CoreError::NotFound {
                resource: "user",
                id: actor_user_id,
            })?;
            let platform_ok = user
                .platform_role
                .map(|r| grants::platform_role_allows(r, actions::LEADERBOARDS_CREATE_AD_HOC))
                .unwrap_or(false);
            if !platform_ok || user.subscription_tier == SubscriptionTier::Visitor {
                return Err(CoreError::PermissionDenied {
                    action: actions::LEADERBOARDS_CREATE_AD_HOC.to_string(),
                });
            }
            Leaderboard {
                id: Uuid::new_v4(),
                name: spec.name,
                visibility: LeaderboardVisibility::AdHoc,
                organisation_id: None,
                organisation_group_id: None,
                created_by_user_id: actor_user_id,
                invite_code: Some(generate_invite_code()),
                deleted_at: None,
                created_at: now,
            }
        }
        LeaderboardVisibility::OrgWide | LeaderboardVisibility::Group => {
            let organisation_id = spec.organisation_id.ok_or_else(|| {
                CoreError::InvariantViolation(
                    "org-scoped leaderboards require an organisation".into(),
                )
            })?;
            let ctx = authz::resolve(store, actor_user_id, organisation_id).await?;
            gate::require_writable(ctx.as_ref(), actions::ORG_LEADERBOARDS_CREATE)?;

            let group_id = match spec.visibility {
                LeaderboardVisibility::Group => {
                    let group_id = spec.organisation_group_id.ok_or_else(|| {
                        CoreError::InvariantViolation(
                            "GROUP visibility requires an organisation group".into(),
                        )
                    })?;
                    let group =
                        store
                            .get_group(group_id)
                            .await?
                            .ok_or(CoreError::NotFound {
                                resource: "organisation group",
                                id: group_id,
                            })?;
                    if group.deleted_at.is_some() {
                        return Err(CoreError::NotFound {
                            resource: "organisation group",
                            id: group_id,
                        });
                    }
                    if group.organisation_id != organisation_id {
                        return Err(CoreError::InvariantViolation(
                            "group belongs to a different organisation".into(),
                        ));
                    }
                    Some(group_id)
                }
                _ => None,
            };

            Leaderboard {
                id: Uuid::new_v4(),
                name: spec.name,
                visibility: spec.visibility,
                organisation_id: Some(organisation_id),
                organisation_group_id: group_id,
                created_by_user_id: actor_user_id,
                invite_code: None,
                deleted_at: None,
                created_at: now,
            }
        }
    };

    store.insert_leaderboard(&board).await?;

    if let Some(organisation_id) = board.organisation_id {
        audit::record(
            store,
            organisation_id,
            actor_user_id,
            ActivityType::LeaderboardCreated,
            json!({ "leaderboardId": board.id, "visibility": board.visibility, "name": board.name }),
        )
        .await;
    }
    Ok(board)
}

/// Joins a leaderboard. Visibility runs first; an active row is
/// `AlreadyMember`; otherwise the row is upserted on (leaderboard_id,
/// user_id), which makes concurrent joins converge on one active row and
/// makes a rejoin after leaving reuse the original row.
pub async fn join(
    store: &dyn Store,
    codes: &dyn InviteCodes,
    leaderboard_id: Uuid,
    user_id: Uuid,
    invite_code: Option<&str>,
) -> CoreResult<LeaderboardMember> {
    match visibility::check_visibility(store, codes, leaderboard_id, user_id, invite_code).await? {
        Access::Allowed => {}
        Access::Denied(DenialReason::NotFound) => {
            return Err(CoreError::NotFound {
                resource: "leaderboard",
                id: leaderboard_id,
            })
        }
        Access::Denied(reason) => return Err(CoreError::Forbidden { reason }),
    }

    if let Some(existing) = store.find_leaderboard_member(leaderboard_id, user_id).await? {
        if existing.is_active() {
            return Err(CoreError::AlreadyMember {
                leaderboard_id,
                user_id,
            });
        }
    }

    // Visibility passed, so the board exists.
    let board = store
        .get_leaderboard(leaderboard_id)
        .await?
        .ok_or(CoreError::NotFound {
            resource: "leaderboard",
            id: leaderboard_id,
        })?;

    // Link org-scoped joins to the membership row for seat/audit history.
    let organisation_member_id = match board.organisation_id {
        Some(organisation_id) => store
            .find_member_by_user(organisation_id, user_id)
            .await?
            .map(|m| m.id),
        None => None,
    };

    let member = store
        .upsert_leaderboard_member(leaderboard_id, user_id, organisation_member_id, Utc::now())
        .await?;

    if let Some(organisation_id) = board.organisation_id {
        audit::record(
            store,
            organisation_id,
            user_id,
            ActivityType::LeaderboardJoined,
            json!({ "leaderboardId": leaderboard_id, "memberRowId": member.id }),
        )
        .await;
    }
    Ok(member)
}

/// Leaves a leaderboard. With `mute` on an ORG_WIDE board the row stays
/// active (`left_at` null) and is only suppressed from display; everywhere
/// else `left_at` is set. No active row is `NotMember`.
pub async fn leave(
    store: &dyn Store,
    leaderboard_id: Uuid,
    user_id: Uuid,
    mute: bool,
) -> CoreResult<LeaderboardMember> {
    let board = store
        .get_leaderboard(leaderboard_id)
        .await?
        .ok_or(CoreError::NotFound {
            resource: "leaderboard",
            id: leaderboard_id,
        })?;

    let as_mute = mute && board.visibility == LeaderboardVisibility::OrgWide;
    let updated = if as_mute {
        store.set_muted(leaderboard_id, user_id, true).await?
    } else {
        store.mark_left(leaderboard_id, user_id, Utc::now()).await?
    };
    let member = updated.ok_or(CoreError::NotMember {
        leaderboard_id,
        user_id,
    })?;

    if let Some(organisation_id) = board.organisation_id {
        let activity_type = if as_mute {
            ActivityType::LeaderboardMuted
        } else {
            ActivityType::LeaderboardLeft
        };
        audit::record(
            store,
            organisation_id,
            user_id,
            activity_type,
            json!({ "leaderboardId": leaderboard_id }),
        )
        .await;
    }
    Ok(member)
}
