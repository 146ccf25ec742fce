use serde_json::json;
use tracing::debug;

use crate::config::{BOOKMARKS_TABLE, LIKES_TABLE};
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::validate_uuid;
use crate::store::{Filter, Store};

/// Flip the viewer's like on a post, returning the resulting state
/// (`true` = liked).
pub async fn toggle_like(store: &dyn Store, post_id: &str) -> Result<bool> {
    toggle_membership(store, LIKES_TABLE, post_id).await
}

/// Flip the viewer's bookmark on a post, returning the resulting state
/// (`true` = bookmarked).
pub async fn toggle_bookmark(store: &dyn Store, post_id: &str) -> Result<bool> {
    toggle_membership(store, BOOKMARKS_TABLE, post_id).await
}

/// Atomic toggle of a `(post, user)` membership row.
///
/// Delete-first instead of read-check-then-act: the delete and the
/// conflict-keyed insert are each atomic on the backend, so two
/// concurrent toggles can never leave the row count above one. Whichever
/// call loses the insert race still reports "present", which is the
/// state it observed.
async fn toggle_membership(store: &dyn Store, table: &str, post_id: &str) -> Result<bool> {
    if !validate_uuid(post_id) {
        return Err(ApiError::Validation("post id must be a uuid".to_string()));
    }
    let user = store.current_user().await?.ok_or(ApiError::AuthRequired)?;

    let filters = [
        Filter::eq("post_id", post_id),
        Filter::eq("user_id", user.id.clone()),
    ];
    let removed = store.delete(table, &filters).await?;
    if removed > 0 {
        debug!(table, post_id, "membership removed");
        return Ok(false);
    }

    let inserted = store
        .insert_ignore(
            table,
            json!({ "post_id": post_id, "user_id": user.id }),
            &["post_id", "user_id"],
        )
        .await?;
    if !inserted {
        debug!(table, post_id, "membership already present");
    }
    Ok(true)
}
