//! Compiled role→action grant table.
//!
//! Two role namespaces exist and are never confused: organisation roles
//! (scoped to one organisation) and platform roles (global). Actions are
//! namespaced strings; a grant ending in `:manage` covers every action on
//! that resource. There is no default-allow: an action absent from a role's
//! list is denied.

use crate::models::{OrgRole, PlatformRole};

/// Action identifiers. New actions must be added here and to the grant lists
/// below; nothing is granted implicitly.
pub mod actions {
    pub const ORG_LEADERBOARDS_CREATE: &str = "org:leaderboards:create";
    pub const ORG_LEADERBOARDS_MANAGE: &str = "org:leaderboards:manage";
    pub const ORG_MEMBERS_INVITE: &str = "org:members:invite";
    pub const ORG_MEMBERS_REMOVE: &str = "org:members:remove";
    pub const ORG_MEMBERS_UPDATE_ROLE: &str = "org:members:update_role";
    pub const ORG_MEMBERS_MANAGE: &str = "org:members:manage";
    pub const ORG_GROUPS_CREATE: &str = "org:groups:create";
    pub const ORG_GROUPS_MANAGE: &str = "org:groups:manage";
    pub const ORG_BILLING_MANAGE: &str = "org:billing:manage";

    // Platform namespace
    pub const LEADERBOARDS_CREATE_AD_HOC: &str = "leaderboards:create_ad_hoc";
    pub const PLATFORM_ORGS_MANAGE: &str = "platform:organisations:manage";
}

use actions::*;

pub fn org_role_grants(role: OrgRole) -> &'static [&'static str] {
    match role {
        OrgRole::Owner => &[
            ORG_LEADERBOARDS_MANAGE,
            ORG_MEMBERS_MANAGE,
            ORG_GROUPS_MANAGE,
            ORG_BILLING_MANAGE,
        ],
        OrgRole::Admin => &[
            ORG_LEADERBOARDS_MANAGE,
            ORG_MEMBERS_INVITE,
            ORG_MEMBERS_REMOVE,
            ORG_MEMBERS_UPDATE_ROLE,
            ORG_GROUPS_MANAGE,
        ],
        OrgRole::Teacher => &[ORG_LEADERBOARDS_CREATE, ORG_GROUPS_CREATE],
        OrgRole::BillingAdmin => &[ORG_BILLING_MANAGE],
    }
}

pub fn platform_role_grants(role: PlatformRole) -> &'static [&'static str] {
    match role {
        PlatformRole::PlatformAdmin => &[PLATFORM_ORGS_MANAGE, LEADERBOARDS_CREATE_AD_HOC],
        PlatformRole::OrgAdmin | PlatformRole::Teacher => &[LEADERBOARDS_CREATE_AD_HOC],
        PlatformRole::Student | PlatformRole::Parent => &[],
    }
}

/// Exact grant, or a `:manage` grant on the same resource prefix.
pub fn granted(grants: &[&str], action: &str) -> bool {
    if grants.contains(&action) {
        return true;
    }
    match action.rsplit_once(':') {
        Some((resource, verb)) if verb != "manage" => {
            let manage = format!("{resource}:manage");
            grants.iter().any(|g| *g == manage)
        }
        _ => false,
    }
}

pub fn org_role_allows(role: OrgRole, action: &str) -> bool {
    granted(org_role_grants(role), action)
}

pub fn platform_role_allows(role: PlatformRole, action: &str) -> bool {
    granted(platform_role_grants(role), action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manage_expands_to_every_verb_on_the_resource() {
        assert!(org_role_allows(OrgRole::Owner, ORG_MEMBERS_REMOVE));
        assert!(org_role_allows(OrgRole::Owner, ORG_MEMBERS_UPDATE_ROLE));
        assert!(org_role_allows(OrgRole::Owner, "org:members:anything_new"));
        assert!(org_role_allows(OrgRole::Admin, ORG_LEADERBOARDS_CREATE));
    }

    #[test]
    fn manage_does_not_leak_across_resources() {
        assert!(!org_role_allows(OrgRole::BillingAdmin, ORG_MEMBERS_REMOVE));
        assert!(!org_role_allows(OrgRole::Teacher, ORG_MEMBERS_INVITE));
        assert!(!org_role_allows(OrgRole::Admin, ORG_BILLING_MANAGE));
    }

    #[test]
    fn unknown_action_is_denied_for_every_role() {
        for role in [
            OrgRole::Owner,
            OrgRole::Admin,
            OrgRole::Teacher,
            OrgRole::BillingAdmin,
        ] {
            assert!(!org_role_allows(role, "org:quizzes:publish"));
        }
    }

    #[test]
    fn platform_namespace_is_separate() {
        // An org OWNER holds no platform grants and vice versa.
        assert!(!org_role_allows(OrgRole::Owner, LEADERBOARDS_CREATE_AD_HOC));
        assert!(!platform_role_allows(
            PlatformRole::PlatformAdmin,
            ORG_MEMBERS_REMOVE
        ));
        assert!(platform_role_allows(
            PlatformRole::Teacher,
            LEADERBOARDS_CREATE_AD_HOC
        ));
        assert!(!platform_role_allows(
            PlatformRole::Student,
            LEADERBOARDS_CREATE_AD_HOC
        ));
    }
}
