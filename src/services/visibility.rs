//! Reachability of a leaderboard for a user, independent of org-level role.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authz::{self, gate};
use crate::error::CoreResult;
use crate::models::LeaderboardVisibility;
use crate::store::{InviteCodes, Store};

/// Why a leaderboard is not reachable. Returned alongside the denial so the
/// caller can render an accurate message instead of a generic 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    NotOrgMember,
    NotGroupMember,
    NotInvited,
    NotFound,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotOrgMember => "NOT_ORG_MEMBER",
            Self::NotGroupMember => "NOT_GROUP_MEMBER",
            Self::NotInvited => "NOT_INVITED",
            Self::NotFound => "NOT_FOUND",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied(DenialReason),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }
}

/// Per-tier reachability:
/// - ORG_WIDE: a readable membership in the board's organisation.
/// - GROUP: a live group link over a live ACTIVE org membership.
/// - AD_HOC: an existing member row (left rows count, they can rejoin) or an
///   invite code resolving to this board. No organisation check, and no
///   open-to-anyone fallback.
pub async fn check_visibility(
    store: &dyn Store,
    codes: &dyn InviteCodes,
    leaderboard_id: Uuid,
    user_id: Uuid,
    invite_code: Option<&str>,
) -> CoreResult<Access> {
    let Some(board) = store.get_leaderboard(leaderboard_id).await? else {
        return Ok(Access::Denied(DenialReason::NotFound));
    };
    if board.deleted_at.is_some() {
        return Ok(Access::Denied(DenialReason::NotFound));
    }

    match board.visibility {
        LeaderboardVisibility::OrgWide => {
            let Some(organisation_id) = board.organisation_id else {
                // ORG_WIDE without an organisation is corrupt data; nobody
                // reaches it.
                return Ok(Access::Denied(DenialReason::NotFound));
            };
            let ctx = authz::resolve(store, user_id, organisation_id).await?;
            match ctx {
                Some(ref ctx) if gate::can_read(ctx) => Ok(Access::Allowed),
                _ => Ok(Access::Denied(DenialReason::NotOrgMember)),
            }
        }
        LeaderboardVisibility::Group => {
            let Some(group_id) = board.organisation_group_id else {
                return Ok(Access::Denied(DenialReason::NotFound));
            };
            if store.is_active_group_member(group_id, user_id).await? {
                Ok(Access::Allowed)
            } else {
                Ok(Access::Denied(DenialReason::NotGroupMember))
            }
        }
        LeaderboardVisibility::AdHoc => {
            if store
                .find_leaderboard_member(leaderboard_id, user_id)
                .await?
                .is_some()
            {
                return Ok(Access::Allowed);
            }
            if let Some(code) = invite_code {
                if codes.resolve(code).await? == Some(leaderboard_id) {
                    return Ok(Access::Allowed);
                }
            }
            Ok(Access::Denied(DenialReason::NotInvited))
        }
    }
}
