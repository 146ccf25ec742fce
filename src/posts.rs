use std::sync::OnceLock;

use ammonia::Builder;
use html_escape::encode_double_quoted_attribute;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{
    BOOKMARKS_TABLE, COMMENTS_TABLE, LIKES_TABLE, MAX_POST_LENGTH, POSTS_TABLE, USERS_TABLE,
};
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::validate_uuid;
use crate::models::models::{PostRow, PostView};
use crate::store::{Filter, Join, Order, SelectQuery, Store};

pub const AUTHOR_COLUMNS: [&str; 7] = [
    "id",
    "first_name",
    "last_name",
    "username",
    "avatar_url",
    "verified",
    "city",
];

pub(crate) fn author_join(on_local: &str) -> Join {
    Join::one("author", USERS_TABLE, on_local, &AUTHOR_COLUMNS)
}

fn count_joins() -> Vec<Join> {
    vec![
        Join::count("likes_count", LIKES_TABLE, "post_id"),
        Join::count("comments_count", COMMENTS_TABLE, "post_id"),
    ]
}

/// Viewer membership embeds. Left-join style: posts come back whether or
/// not the viewer has like/bookmark rows, and the flags are computed
/// client-side from the embedded memberships.
fn membership_joins() -> Vec<Join> {
    vec![
        Join::many("liked_by", LIKES_TABLE, "post_id", &["user_id"]),
        Join::many("bookmarked_by", BOOKMARKS_TABLE, "post_id", &["user_id"]),
    ]
}

fn into_views(rows: Vec<Value>, viewer: Option<&str>) -> Result<Vec<PostView>> {
    rows.into_iter()
        .map(|row| {
            let post: PostRow = serde_json::from_value(row)?;
            Ok(post.into_view(viewer))
        })
        .collect()
}

fn prepare_content(content: &str) -> Result<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("post content must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_POST_LENGTH {
        return Err(ApiError::Validation(format!(
            "post content exceeds {} characters",
            MAX_POST_LENGTH
        )));
    }
    Ok(filter_post_content(trimmed))
}

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("Regex should compile"))
}

fn filter_post_content(content: &str) -> String {
    // Sanitize HTML to remove dangerous scripts and event handlers
    let clean = Builder::default()
        .link_rel(Some("noopener noreferrer"))
        .clean(content)
        .to_string();

    // Convert HTTP/HTTPS URLs into clickable links with proper escaping
    url_regex()
        .replace_all(&clean, |caps: &regex::Captures| {
            let url = &caps[0];
            let escaped_url = encode_double_quoted_attribute(url);
            format!(r#"<a href="{}" target="_blank">{}</a>"#, escaped_url, url)
        })
        .to_string()
}

pub async fn create(
    store: &dyn Store,
    author_id: &str,
    content: &str,
    image_url: Option<&str>,
) -> Result<PostView> {
    if !validate_uuid(author_id) {
        return Err(ApiError::Validation("author id must be a uuid".to_string()));
    }
    let content = prepare_content(content)?;

    let row = json!({
        "author_id": author_id,
        "content": content,
        "image_url": image_url,
    });
    let value = store.insert(POSTS_TABLE, row, &[author_join("author_id")]).await?;
    let post: PostRow = serde_json::from_value(value)?;
    Ok(post.into_view(None))
}

/// Reverse-chronological feed window `[offset, offset + limit)`.
///
/// The primary path is a single joined select (author summary, like and
/// comment counts, viewer memberships). When that fails, the degraded
/// path re-reads the window without embeds and resolves each author with
/// an individual lookup, substituting the "Unknown User" placeholder for
/// authors that cannot be resolved.
pub async fn get_all(store: &dyn Store, limit: usize, offset: usize) -> Result<Vec<PostView>> {
    let viewer = store.current_user().await.ok().flatten();
    let viewer_id = viewer.as_ref().map(|u| u.id.as_str());

    let query = SelectQuery::all()
        .join(author_join("author_id"))
        .joins(count_joins())
        .joins(membership_joins())
        .order(Order::desc("created_at"))
        .range(offset, limit);

    // Both a failed select and rows that fail to map take the fallback;
    // the joined path either delivers fully annotated posts or steps aside.
    let joined = store
        .select(POSTS_TABLE, query)
        .await
        .and_then(|rows| into_views(rows, viewer_id));
    match joined {
        Ok(views) => Ok(views),
        Err(err) => {
            warn!(error = %err, "joined feed query failed, falling back to per-author lookups");
            get_all_degraded(store, limit, offset).await
        }
    }
}

async fn get_all_degraded(store: &dyn Store, limit: usize, offset: usize) -> Result<Vec<PostView>> {
    let rows = store
        .select(
            POSTS_TABLE,
            SelectQuery::all()
                .order(Order::desc("created_at"))
                .range(offset, limit),
        )
        .await?;

    let mut posts = Vec::with_capacity(rows.len());
    for row in rows {
        let mut post: PostRow = serde_json::from_value(row)?;
        let author_query = SelectQuery::all()
            .columns(&AUTHOR_COLUMNS)
            .filter(Filter::eq("id", post.author_id.clone()));
        post.author = match store.select_one(USERS_TABLE, author_query).await {
            Ok(Some(author)) => serde_json::from_value(author).ok(),
            Ok(None) => None,
            Err(err) => {
                debug!(error = %err, author_id = %post.author_id, "author lookup failed");
                None
            }
        };
        // Counts and viewer flags are unavailable without the embeds.
        posts.push(post.into_view(None));
    }
    Ok(posts)
}

pub async fn get_by_user(
    store: &dyn Store,
    user_id: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<PostView>> {
    if !validate_uuid(user_id) {
        return Err(ApiError::Validation("user id must be a uuid".to_string()));
    }
    let query = SelectQuery::all()
        .join(author_join("author_id"))
        .joins(count_joins())
        .filter(Filter::eq("author_id", user_id))
        .order(Order::desc("created_at"))
        .range(offset, limit);
    let rows = store.select(POSTS_TABLE, query).await?;
    into_views(rows, None)
}

pub async fn get_by_id(store: &dyn Store, post_id: &str) -> Result<Option<PostView>> {
    if !validate_uuid(post_id) {
        return Err(ApiError::Validation("post id must be a uuid".to_string()));
    }
    let query = SelectQuery::all()
        .join(author_join("author_id"))
        .joins(count_joins())
        .filter(Filter::eq("id", post_id));
    let row = store.select_one(POSTS_TABLE, query).await?;
    match row {
        Some(value) => {
            let post: PostRow = serde_json::from_value(value)?;
            Ok(Some(post.into_view(None)))
        }
        None => Ok(None),
    }
}

pub async fn update(store: &dyn Store, post_id: &str, content: &str) -> Result<PostView> {
    if !validate_uuid(post_id) {
        return Err(ApiError::Validation("post id must be a uuid".to_string()));
    }
    let content = prepare_content(content)?;
    let value = store
        .update(
            POSTS_TABLE,
            &[Filter::eq("id", post_id)],
            json!({ "content": content }),
            &[author_join("author_id")],
        )
        .await?;
    let post: PostRow = serde_json::from_value(value)?;
    Ok(post.into_view(None))
}

/// Unconditional delete; ownership is enforced by the backend's access
/// rules, not at this layer.
pub async fn delete(store: &dyn Store, post_id: &str) -> Result<()> {
    if !validate_uuid(post_id) {
        return Err(ApiError::Validation("post id must be a uuid".to_string()));
    }
    store.delete(POSTS_TABLE, &[Filter::eq("id", post_id)]).await?;
    Ok(())
}
