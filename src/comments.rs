use serde_json::json;

use crate::config::{COMMENTS_TABLE, USERS_TABLE};
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::{sanitize_text, validate_uuid};
use crate::models::models::{CommentRow, CommentView};
use crate::store::{Filter, Join, Order, SelectQuery, Store};

const COMMENT_AUTHOR_COLUMNS: [&str; 5] = ["id", "first_name", "last_name", "username", "avatar_url"];

fn user_join() -> Join {
    Join::one("user", USERS_TABLE, "user_id", &COMMENT_AUTHOR_COLUMNS)
}

fn prepare_content(content: &str) -> Result<String> {
    let clean = sanitize_text(content.trim());
    if clean.is_empty() {
        return Err(ApiError::Validation("comment must not be empty".to_string()));
    }
    Ok(clean)
}

/// Top-level comments for a post, oldest first, each carrying its replies
/// (one level deep, also oldest first). No pagination — comment volume is
/// assumed small.
pub async fn get_for_post(store: &dyn Store, post_id: &str) -> Result<Vec<CommentView>> {
    if !validate_uuid(post_id) {
        return Err(ApiError::Validation("post id must be a uuid".to_string()));
    }
    let replies = Join::many("replies", COMMENTS_TABLE, "parent_id", &[])
        .with_nested(vec![user_join()]);
    let query = SelectQuery::all()
        .join(user_join())
        .join(replies)
        .filter(Filter::eq("post_id", post_id))
        .filter(Filter::is_null("parent_id"))
        .order(Order::asc("created_at"));
    let rows = store.select(COMMENTS_TABLE, query).await?;
    rows.into_iter()
        .map(|row| {
            let comment: CommentRow = serde_json::from_value(row)?;
            Ok(comment.into_view())
        })
        .collect()
}

pub async fn create(
    store: &dyn Store,
    post_id: &str,
    parent_id: Option<&str>,
    content: &str,
) -> Result<CommentView> {
    if !validate_uuid(post_id) {
        return Err(ApiError::Validation("post id must be a uuid".to_string()));
    }
    if let Some(parent) = parent_id {
        if !validate_uuid(parent) {
            return Err(ApiError::Validation("parent id must be a uuid".to_string()));
        }
    }
    let user = store.current_user().await?.ok_or(ApiError::AuthRequired)?;
    let content = prepare_content(content)?;

    let row = json!({
        "post_id": post_id,
        "user_id": user.id,
        "parent_id": parent_id,
        "content": content,
    });
    let value = store.insert(COMMENTS_TABLE, row, &[user_join()]).await?;
    let comment: CommentRow = serde_json::from_value(value)?;
    Ok(comment.into_view())
}

pub async fn update(store: &dyn Store, comment_id: &str, content: &str) -> Result<CommentView> {
    if !validate_uuid(comment_id) {
        return Err(ApiError::Validation("comment id must be a uuid".to_string()));
    }
    let content = prepare_content(content)?;
    let value = store
        .update(
            COMMENTS_TABLE,
            &[Filter::eq("id", comment_id)],
            json!({ "content": content }),
            &[user_join()],
        )
        .await?;
    let comment: CommentRow = serde_json::from_value(value)?;
    Ok(comment.into_view())
}

/// Single-row delete scoped by id; ownership is the backend's concern.
pub async fn delete(store: &dyn Store, comment_id: &str) -> Result<()> {
    if !validate_uuid(comment_id) {
        return Err(ApiError::Validation("comment id must be a uuid".to_string()));
    }
    store.delete(COMMENTS_TABLE, &[Filter::eq("id", comment_id)]).await?;
    Ok(())
}
