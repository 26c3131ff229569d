//! Append-only activity trail. Best-effort: the business state change is the
//! source of truth, so callers invoke this only after their primary write has
//! committed, and a failed audit write is logged and swallowed rather than
//! surfaced.

use uuid::Uuid;

use crate::models::{ActivityType, OrganisationActivity};
use crate::store::Store;

pub async fn record(
    store: &dyn Store,
    organisation_id: Uuid,
    actor_user_id: Uuid,
    activity_type: ActivityType,
    metadata: serde_json::Value,
) {
    let activity = OrganisationActivity::new(organisation_id, actor_user_id, activity_type, metadata);
    if let Err(e) = store.append_activity(&activity).await {
        tracing::warn!(
            organisation_id = %organisation_id,
            activity_type = ?activity_type,
            "audit write failed: {e}"
        );
    }
}
