use serde_json::json;
use tracing::debug;

use crate::config::{FOLLOWS_TABLE, USERS_TABLE};
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::validate_uuid;
use crate::models::models::{FollowEdgeRow, FollowerView};
use crate::posts::AUTHOR_COLUMNS;
use crate::store::{Filter, Join, Order, SelectQuery, Store};

fn edge_filters(follower_id: &str, following_id: &str) -> [Filter; 2] {
    [
        Filter::eq("follower_id", follower_id),
        Filter::eq("following_id", following_id),
    ]
}

/// Follow `target_user_id` as the signed-in viewer. Idempotent: the edge
/// is inserted with conflict-key semantics, so repeated or concurrent
/// calls leave exactly one row.
pub async fn follow_user(store: &dyn Store, target_user_id: &str) -> Result<()> {
    if !validate_uuid(target_user_id) {
        return Err(ApiError::Validation("target user id must be a uuid".to_string()));
    }
    let user = store.current_user().await?.ok_or(ApiError::AuthRequired)?;
    if user.id == target_user_id {
        return Err(ApiError::Validation("cannot follow yourself".to_string()));
    }

    let inserted = store
        .insert_ignore(
            FOLLOWS_TABLE,
            json!({ "follower_id": user.id, "following_id": target_user_id }),
            &["follower_id", "following_id"],
        )
        .await?;
    if !inserted {
        debug!(target_user_id, "already following");
    }
    Ok(())
}

pub async fn unfollow_user(store: &dyn Store, target_user_id: &str) -> Result<()> {
    if !validate_uuid(target_user_id) {
        return Err(ApiError::Validation("target user id must be a uuid".to_string()));
    }
    let user = store.current_user().await?.ok_or(ApiError::AuthRequired)?;
    store
        .delete(FOLLOWS_TABLE, &edge_filters(&user.id, target_user_id))
        .await?;
    Ok(())
}

/// Whether the signed-in viewer follows `target_user_id`. Signed-out
/// viewers follow nobody.
pub async fn is_following(store: &dyn Store, target_user_id: &str) -> Result<bool> {
    let Some(user) = store.current_user().await? else {
        return Ok(false);
    };
    let n = store
        .count(FOLLOWS_TABLE, &edge_filters(&user.id, target_user_id))
        .await?;
    Ok(n > 0)
}

async fn edge_list(
    store: &dyn Store,
    fixed_column: &str,
    joined_column: &str,
    user_id: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<FollowerView>> {
    if !validate_uuid(user_id) {
        return Err(ApiError::Validation("user id must be a uuid".to_string()));
    }
    let query = SelectQuery::all()
        .columns(&["created_at"])
        .join(Join::one("profile", USERS_TABLE, joined_column, &AUTHOR_COLUMNS))
        .filter(Filter::eq(fixed_column, user_id))
        .order(Order::desc("created_at"))
        .range(offset, limit);
    let rows = store.select(FOLLOWS_TABLE, query).await?;
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        let edge: FollowEdgeRow = serde_json::from_value(row)?;
        if let Some(view) = edge.into_view() {
            views.push(view);
        }
    }
    Ok(views)
}

/// Users following `user_id`, newest edge first.
pub async fn get_followers(
    store: &dyn Store,
    user_id: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<FollowerView>> {
    edge_list(store, "following_id", "follower_id", user_id, limit, offset).await
}

/// Users that `user_id` follows, newest edge first.
pub async fn get_following(
    store: &dyn Store,
    user_id: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<FollowerView>> {
    edge_list(store, "follower_id", "following_id", user_id, limit, offset).await
}
