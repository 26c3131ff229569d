use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::{MemberStatus, OrgRole, SubscriptionStatus};
use crate::store::Store;

/// Immutable snapshot of one user's standing in one organisation: role,
/// member status, organisation subscription status and the user's own
/// subscription status. The sole input to permission checks; no ambient or
/// global authorization state exists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessContext {
    pub member_id: Uuid,
    pub organisation_id: Uuid,
    pub user_id: Uuid,
    pub role: OrgRole,
    pub member_status: MemberStatus,
    pub organisation_status: SubscriptionStatus,
    pub subscription_status: SubscriptionStatus,
}

/// Loads the live membership row for (organisation, user) and bundles it with
/// subscription state. `Ok(None)` means "not a member" and is a valid result,
/// not an error: callers decide whether a public or ad-hoc path applies.
///
/// One logical lookup per call (a single join in the Postgres store); safe to
/// run on every request.
pub async fn resolve(
    store: &dyn Store,
    user_id: Uuid,
    organisation_id: Uuid,
) -> CoreResult<Option<AccessContext>> {
    store.load_access(organisation_id, user_id).await
}
