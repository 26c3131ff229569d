//! Organisation member and group lifecycle: invite acceptance with seat
//! accounting, role changes with the owner guard, guarded removal. All
//! precondition checks run before any write; the write itself is one atomic
//! store call; the audit record comes last and is allowed to fail.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::authz::context::AccessContext;
use crate::authz::gate;
use crate::authz::grants::actions;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    ActivityType, OrganisationGroup, OrganisationGroupMember, OrganisationMember, OrgRole,
};
use crate::services::audit;
use crate::store::{MemberUpsertOutcome, RemoveOutcome, RoleUpdateOutcome, Store};

/// An AccessContext speaks for exactly one organisation; reject a context
/// presented against a different org before any grant lookup.
fn require_same_org(actor: &AccessContext, organisation_id: Uuid, action: &str) -> CoreResult<()> {
    if actor.organisation_id != organisation_id {
        return Err(CoreError::PermissionDenied {
            action: action.to_string(),
        });
    }
    Ok(())
}

/// Invite acceptance: creates (or reactivates) the member row and assigns a
/// seat. Requires `org:members:invite` and a writable subscription. The seat
/// capacity check runs inside the storage write, so two concurrent invites
/// cannot both take the last seat. OWNER is never minted here; ownership
/// moves only through `update_role`.
pub async fn add_member(
    store: &dyn Store,
    organisation_id: Uuid,
    user_id: Uuid,
    role: OrgRole,
    actor: &AccessContext,
) -> CoreResult<OrganisationMember> {
    require_same_org(actor, organisation_id, actions::ORG_MEMBERS_INVITE)?;
    gate::require_writable(Some(actor), actions::ORG_MEMBERS_INVITE)?;

    if role == OrgRole::Owner {
        return Err(CoreError::InvariantViolation(
            "an organisation has exactly one owner; ownership moves via role update".into(),
        ));
    }

    if let Some(existing) = store.find_member_by_user(organisation_id, user_id).await? {
        if existing.holds_seat() {
            return Err(CoreError::InvariantViolation(format!(
                "user {user_id} already holds a seat in organisation {organisation_id}"
            )));
        }
    }

    let member = match store
        .upsert_member(organisation_id, user_id, role, Utc::now())
        .await?
    {
        MemberUpsertOutcome::Member(member) => member,
        MemberUpsertOutcome::SeatLimitReached => {
            return Err(CoreError::SeatLimitReached { organisation_id })
        }
        MemberUpsertOutcome::OrgNotFound => {
            return Err(CoreError::NotFound {
                resource: "organisation",
                id: organisation_id,
            })
        }
    };

    audit::record(
        store,
        organisation_id,
        actor.user_id,
        ActivityType::MemberAdded,
        json!({ "memberId": member.id, "userId": user_id, "role": role }),
    )
    .await;
    Ok(member)
}

/// Soft-deletes a member and releases their seat in the same atomic write, so
/// a removal can never leave a seat stuck assigned. OWNER targets always fail
/// with `InvariantViolation`: owners leave only by handing ownership over
/// first.
pub async fn remove_member(
    store: &dyn Store,
    organisation_id: Uuid,
    member_id: Uuid,
    actor: &AccessContext,
) -> CoreResult<OrganisationMember> {
    require_same_org(actor, organisation_id, actions::ORG_MEMBERS_REMOVE)?;
    // Role check only: removals shrink seat usage, so a past-due org may
    // still prune members.
    gate::require_permission(Some(actor), actions::ORG_MEMBERS_REMOVE)?;

    match store
        .remove_member(organisation_id, member_id, Utc::now())
        .await?
    {
        RemoveOutcome::Removed(member) => {
            audit::record(
                store,
                organisation_id,
                actor.user_id,
                ActivityType::MemberRemoved,
                json!({ "memberId": member.id, "userId": member.user_id, "role": member.role }),
            )
            .await;
            Ok(member)
        }
        RemoveOutcome::OwnerProtected => Err(CoreError::InvariantViolation(format!(
            "member {member_id} is the organisation owner and cannot be removed"
        ))),
        RemoveOutcome::NotFound => Err(CoreError::NotFound {
            resource: "organisation member",
            id: member_id,
        }),
    }
}

/// Changes a member's role. Requires `org:members:update_role`; only an OWNER
/// may touch an OWNER or grant OWNER. The owner guard is re-evaluated inside
/// the storage transaction, so two concurrent updates cannot both slip past
/// it. Demoting the sole owner is an `InvariantViolation`.
pub async fn update_role(
    store: &dyn Store,
    organisation_id: Uuid,
    member_id: Uuid,
    new_role: OrgRole,
    actor: &AccessContext,
) -> CoreResult<OrganisationMember> {
    require_same_org(actor, organisation_id, actions::ORG_MEMBERS_UPDATE_ROLE)?;
    gate::require_permission(Some(actor), actions::ORG_MEMBERS_UPDATE_ROLE)?;

    let actor_is_owner = actor.role == OrgRole::Owner;
    if new_role == OrgRole::Owner && !actor_is_owner {
        return Err(CoreError::PermissionDenied {
            action: actions::ORG_MEMBERS_UPDATE_ROLE.to_string(),
        });
    }

    match store
        .update_member_role(organisation_id, member_id, new_role, actor_is_owner)
        .await?
    {
        RoleUpdateOutcome::Updated {
            member,
            previous_role,
        } => {
            audit::record(
                store,
                organisation_id,
                actor.user_id,
                ActivityType::MemberRoleChanged,
                json!({
                    "memberId": member.id,
                    "userId": member.user_id,
                    "from": previous_role,
                    "to": member.role,
                }),
            )
            .await;
            Ok(member)
        }
        RoleUpdateOutcome::OwnerProtected => Err(CoreError::PermissionDenied {
            action: actions::ORG_MEMBERS_UPDATE_ROLE.to_string(),
        }),
        RoleUpdateOutcome::SoleOwnerDemotion => Err(CoreError::InvariantViolation(format!(
            "member {member_id} is the sole owner of organisation {organisation_id}"
        ))),
        RoleUpdateOutcome::NotFound => Err(CoreError::NotFound {
            resource: "organisation member",
            id: member_id,
        }),
    }
}

/// Creates a group (class, house, ...). Requires `org:groups:create` and a
/// writable subscription.
pub async fn create_group(
    store: &dyn Store,
    organisation_id: Uuid,
    name: String,
    group_type: String,
    actor: &AccessContext,
) -> CoreResult<OrganisationGroup> {
    require_same_org(actor, organisation_id, actions::ORG_GROUPS_CREATE)?;
    gate::require_writable(Some(actor), actions::ORG_GROUPS_CREATE)?;

    let group = OrganisationGroup {
        id: Uuid::new_v4(),
        organisation_id,
        name,
        group_type,
        created_by_user_id: actor.user_id,
        deleted_at: None,
        created_at: Utc::now(),
    };
    store.insert_group(&group).await?;

    audit::record(
        store,
        organisation_id,
        actor.user_id,
        ActivityType::GroupCreated,
        json!({ "groupId": group.id, "name": group.name }),
    )
    .await;
    Ok(group)
}

/// Links an existing organisation member into a group. A group member must
/// already be a live org member; the link upserts, so re-adding a previously
/// removed member revives the old link.
pub async fn add_group_member(
    store: &dyn Store,
    organisation_group_id: Uuid,
    member_id: Uuid,
    actor: &AccessContext,
) -> CoreResult<OrganisationGroupMember> {
    let group = store
        .get_group(organisation_group_id)
        .await?
        .ok_or(CoreError::NotFound {
            resource: "organisation group",
            id: organisation_group_id,
        })?;
    if group.deleted_at.is_some() {
        return Err(CoreError::NotFound {
            resource: "organisation group",
            id: organisation_group_id,
        });
    }
    require_same_org(actor, group.organisation_id, actions::ORG_GROUPS_MANAGE)?;
    gate::require_writable(Some(actor), actions::ORG_GROUPS_MANAGE)?;

    let member = store
        .get_member(group.organisation_id, member_id)
        .await?
        .filter(|m| m.deleted_at.is_none())
        .ok_or(CoreError::NotFound {
            resource: "organisation member",
            id: member_id,
        })?;

    let link = OrganisationGroupMember {
        id: Uuid::new_v4(),
        organisation_group_id,
        organisation_member_id: member.id,
        deleted_at: None,
        created_at: Utc::now(),
    };
    store.insert_group_member(&link).await?;

    audit::record(
        store,
        group.organisation_id,
        actor.user_id,
        ActivityType::GroupMemberAdded,
        json!({ "groupId": organisation_group_id, "memberId": member.id }),
    )
    .await;
    Ok(link)
}
