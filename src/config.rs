use crate::core::errors::{ApiError, Result};

// Table and bucket names on the hosted backend.
pub const USERS_TABLE: &str = "users";
pub const POSTS_TABLE: &str = "posts";
pub const LIKES_TABLE: &str = "post_likes";
pub const BOOKMARKS_TABLE: &str = "bookmarks";
pub const COMMENTS_TABLE: &str = "post_comments";
pub const FOLLOWS_TABLE: &str = "follows";
pub const AVATAR_BUCKET: &str = "avatars";

// Client-side limits; the backend does not enforce these.
pub const MAX_POST_LENGTH: usize = 280;
pub const MAX_BIO_LENGTH: usize = 500;
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Connection settings for the hosted backend, supplied out-of-band.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SANGAT_STORE_URL")
            .map_err(|_| ApiError::Config("SANGAT_STORE_URL".to_string()))?;
        let key = std::env::var("SANGAT_STORE_KEY")
            .map_err(|_| ApiError::Config("SANGAT_STORE_KEY".to_string()))?;
        Ok(Self { url, key })
    }
}
