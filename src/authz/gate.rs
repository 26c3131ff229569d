//! Pure permission checks over [`AccessContext`]. No I/O: everything these
//! functions need is already in the context.

use crate::authz::context::AccessContext;
use crate::authz::grants;
use crate::error::{CoreError, CoreResult};
use crate::models::{MemberStatus, SubscriptionStatus};

/// Fails with `PermissionDenied` when there is no context (caller is not a
/// member) or the role's grant set does not cover `action`.
pub fn require_permission(ctx: Option<&AccessContext>, action: &str) -> CoreResult<()> {
    match ctx {
        Some(ctx) if grants::org_role_allows(ctx.role, action) => Ok(()),
        _ => Err(CoreError::PermissionDenied {
            action: action.to_string(),
        }),
    }
}

/// Billing state gates all mutating actions regardless of role: PAST_DUE
/// degrades writes before the organisation is fully locked, CANCELLED and
/// EXPIRED block them outright. The member must also be ACTIVE.
pub fn can_write(ctx: &AccessContext) -> bool {
    if ctx.member_status != MemberStatus::Active {
        return false;
    }
    matches!(
        ctx.organisation_status,
        SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::FreeTrial
    )
}

/// Reads are open to ACTIVE and PENDING members; SUSPENDED and INACTIVE are
/// shut out.
pub fn can_read(ctx: &AccessContext) -> bool {
    matches!(
        ctx.member_status,
        MemberStatus::Active | MemberStatus::Pending
    )
}

/// Combined gate for mutating actions. Role first, billing second, so a role
/// that would never be allowed gets `PermissionDenied` while a role blocked
/// only by billing gets `SubscriptionExpired` (the caller can render an
/// upgrade prompt instead of a generic denial).
pub fn require_writable<'a>(
    ctx: Option<&'a AccessContext>,
    action: &str,
) -> CoreResult<&'a AccessContext> {
    let Some(ctx) = ctx else {
        return Err(CoreError::PermissionDenied {
            action: action.to_string(),
        });
    };
    require_permission(Some(ctx), action)?;
    if !can_write(ctx) {
        return Err(CoreError::SubscriptionExpired {
            organisation_id: ctx.organisation_id,
        });
    }
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::grants::actions;
    use crate::models::OrgRole;
    use uuid::Uuid;

    fn ctx(
        role: OrgRole,
        member_status: MemberStatus,
        organisation_status: SubscriptionStatus,
    ) -> AccessContext {
        AccessContext {
            member_id: Uuid::new_v4(),
            organisation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role,
            member_status,
            organisation_status,
            subscription_status: SubscriptionStatus::Active,
        }
    }

    #[test]
    fn no_context_is_denied() {
        assert!(matches!(
            require_permission(None, actions::ORG_MEMBERS_REMOVE),
            Err(CoreError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn write_gate_ignores_role_when_billing_blocks() {
        // An OWNER of a cancelled org keeps the role grant but loses writes.
        let c = ctx(
            OrgRole::Owner,
            MemberStatus::Active,
            SubscriptionStatus::Cancelled,
        );
        assert!(require_permission(Some(&c), actions::ORG_LEADERBOARDS_CREATE).is_ok());
        assert!(!can_write(&c));
        assert!(matches!(
            require_writable(Some(&c), actions::ORG_LEADERBOARDS_CREATE),
            Err(CoreError::SubscriptionExpired { .. })
        ));
    }

    #[test]
    fn past_due_degrades_writes_but_not_reads() {
        let c = ctx(
            OrgRole::Admin,
            MemberStatus::Active,
            SubscriptionStatus::PastDue,
        );
        assert!(!can_write(&c));
        assert!(can_read(&c));
    }

    #[test]
    fn insufficient_role_beats_billing_in_error_kind() {
        let c = ctx(
            OrgRole::BillingAdmin,
            MemberStatus::Active,
            SubscriptionStatus::Expired,
        );
        assert!(matches!(
            require_writable(Some(&c), actions::ORG_MEMBERS_INVITE),
            Err(CoreError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn read_gate_follows_member_status() {
        for (status, expected) in [
            (MemberStatus::Active, true),
            (MemberStatus::Pending, true),
            (MemberStatus::Suspended, false),
            (MemberStatus::Inactive, false),
        ] {
            let c = ctx(OrgRole::Teacher, status, SubscriptionStatus::Active);
            assert_eq!(can_read(&c), expected, "status {status:?}");
        }
    }

    #[test]
    fn suspended_member_cannot_write_even_when_org_is_active() {
        let c = ctx(
            OrgRole::Owner,
            MemberStatus::Suspended,
            SubscriptionStatus::Active,
        );
        assert!(!can_write(&c));
    }
}
