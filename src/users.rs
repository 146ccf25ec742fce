use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::try_join;

use crate::config::{DEFAULT_SEARCH_LIMIT, FOLLOWS_TABLE, MAX_BIO_LENGTH, POSTS_TABLE, USERS_TABLE};
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::{now_iso, sanitize_text, validate_uuid};
use crate::models::models::{Author, AuthorRow, Profile, UserRow, UserStats};
use crate::posts::AUTHOR_COLUMNS;
use crate::store::{Filter, SelectQuery, Store};

/// Fields accepted at registration time; `id` is the auth provider's id
/// for the new account.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Partial profile edit; only the supplied fields are written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

fn parse_profile(value: Value) -> Result<Profile> {
    let row: UserRow = serde_json::from_value(value)?;
    Ok(Profile::from(row))
}

/// Single-row fetch; a missing profile is a non-error `None`.
pub async fn get_profile(store: &dyn Store, user_id: &str) -> Result<Option<Profile>> {
    if !validate_uuid(user_id) {
        return Err(ApiError::Validation("user id must be a uuid".to_string()));
    }
    let row = store
        .select_one(USERS_TABLE, SelectQuery::all().filter(Filter::eq("id", user_id)))
        .await?;
    row.map(parse_profile).transpose()
}

pub async fn get_profile_by_username(store: &dyn Store, username: &str) -> Result<Option<Profile>> {
    let row = store
        .select_one(
            USERS_TABLE,
            SelectQuery::all().filter(Filter::eq("username", username)),
        )
        .await?;
    row.map(parse_profile).transpose()
}

pub async fn create_profile(store: &dyn Store, profile: NewProfile) -> Result<Profile> {
    if profile.username.trim().is_empty() {
        return Err(ApiError::Validation("username is required".to_string()));
    }
    let row = serde_json::to_value(&profile)?;
    let value = store.insert(USERS_TABLE, row, &[]).await?;
    parse_profile(value)
}

/// Merge the supplied fields plus a client-set `updated_at` timestamp.
pub async fn update_profile(
    store: &dyn Store,
    user_id: &str,
    updates: ProfileUpdate,
) -> Result<Profile> {
    if !validate_uuid(user_id) {
        return Err(ApiError::Validation("user id must be a uuid".to_string()));
    }
    if let Some(bio) = &updates.bio {
        if bio.chars().count() > MAX_BIO_LENGTH {
            return Err(ApiError::Validation(format!(
                "bio exceeds {} characters",
                MAX_BIO_LENGTH
            )));
        }
    }

    let mut patch = match serde_json::to_value(&updates)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(bio) = patch.get("bio").and_then(Value::as_str) {
        patch.insert("bio".to_string(), json!(sanitize_text(bio)));
    }
    patch.insert("updated_at".to_string(), json!(now_iso()));

    let value = store
        .update(
            USERS_TABLE,
            &[Filter::eq("id", user_id)],
            Value::Object(patch),
            &[],
        )
        .await?;
    parse_profile(value)
}

/// Case-insensitive substring search across first name, last name and
/// username. No ranking beyond the backend's default order.
pub async fn search_users(store: &dyn Store, query: &str, limit: usize) -> Result<Vec<Author>> {
    let needle = query.trim();
    if needle.is_empty() {
        return Ok(Vec::new());
    }
    let pattern = format!("%{}%", needle);
    let limit = if limit == 0 { DEFAULT_SEARCH_LIMIT } else { limit };

    let select = SelectQuery::all()
        .columns(&AUTHOR_COLUMNS)
        .filter(Filter::Or(vec![
            Filter::ilike("first_name", &pattern),
            Filter::ilike("last_name", &pattern),
            Filter::ilike("username", &pattern),
        ]))
        .range(0, limit);
    let rows = store.select(USERS_TABLE, select).await?;
    rows.into_iter()
        .map(|row| {
            let author: AuthorRow = serde_json::from_value(row)?;
            Ok(Author::from(author))
        })
        .collect()
}

/// Post, follower and following counts, issued concurrently. Any one
/// failure fails the whole call.
pub async fn get_user_stats(store: &dyn Store, user_id: &str) -> Result<UserStats> {
    if !validate_uuid(user_id) {
        return Err(ApiError::Validation("user id must be a uuid".to_string()));
    }
    let by_author = [Filter::eq("author_id", user_id)];
    let followed_by = [Filter::eq("following_id", user_id)];
    let follows = [Filter::eq("follower_id", user_id)];
    let (posts, followers, following) = try_join!(
        store.count(POSTS_TABLE, &by_author),
        store.count(FOLLOWS_TABLE, &followed_by),
        store.count(FOLLOWS_TABLE, &follows),
    )?;
    Ok(UserStats {
        posts,
        followers,
        following,
    })
}
