use serde::{Deserialize, Serialize};

/// Placeholder author shown when a degraded-path author lookup fails.
pub const UNKNOWN_USER_NAME: &str = "Unknown User";

// === Wire rows (what the backend returns) ===

/// The author summary columns embedded into posts, comments and follow
/// edges. Comment embeds omit `verified`/`city`, so those default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorRow {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub city: Option<String>,
}

/// One `(post, user)` membership row from a like/bookmark embed.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipRow {
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CountRow {
    count: u64,
}

/// A `alias:table(count)` embed comes off the wire as `[{"count": n}]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CountEmbed {
    Rows(Vec<CountRow>),
    Scalar(u64),
}

fn count_embed<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let embed = Option::<CountEmbed>::deserialize(deserializer)?;
    Ok(embed.map(|e| match e {
        CountEmbed::Rows(rows) => rows.first().map_or(0, |r| r.count),
        CountEmbed::Scalar(n) => n,
    }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub author: Option<AuthorRow>,
    #[serde(default, deserialize_with = "count_embed")]
    pub likes_count: Option<u64>,
    #[serde(default, deserialize_with = "count_embed")]
    pub comments_count: Option<u64>,
    #[serde(default)]
    pub liked_by: Vec<MembershipRow>,
    #[serde(default)]
    pub bookmarked_by: Vec<MembershipRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub user: Option<AuthorRow>,
    #[serde(default)]
    pub replies: Vec<CommentRow>,
}

/// A `follows` row joined to the profile on the far side of the edge.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowEdgeRow {
    pub created_at: String,
    #[serde(default)]
    pub profile: Option<AuthorRow>,
}

/// A full `users` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// === View models (what the UI consumes) ===

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub verified: bool,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: String,
    pub author: Author,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: String,
    pub likes: u64,
    pub comments: u64,
    pub liked_by_viewer: bool,
    pub bookmarked_by_viewer: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub author: Author,
    pub parent_id: Option<String>,
    pub content: String,
    pub created_at: String,
    pub replies: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub verified: bool,
    pub created_at: String,
}

/// A follower/following list entry: the profile summary flattened out of
/// the join wrapper, plus when the edge was created.
#[derive(Debug, Clone, Serialize)]
pub struct FollowerView {
    pub author: Author,
    pub followed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub posts: u64,
    pub followers: u64,
    pub following: u64,
}

// === Mapping functions (wire -> view) ===

fn display_name(first: &str, last: &str) -> String {
    let name = format!("{} {}", first, last);
    name.trim().to_string()
}

impl Author {
    pub fn unknown() -> Self {
        Self {
            id: String::new(),
            name: UNKNOWN_USER_NAME.to_string(),
            username: "unknown".to_string(),
            avatar_url: None,
            verified: false,
            city: None,
        }
    }
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Self {
            name: display_name(&row.first_name, &row.last_name),
            id: row.id,
            username: row.username,
            avatar_url: row.avatar_url,
            verified: row.verified,
            city: row.city,
        }
    }
}

impl PostRow {
    /// Reshape into the view model, computing the viewer annotations from
    /// the embedded membership rows. `viewer` is the signed-in user id,
    /// if any; an anonymous viewer never appears liked or bookmarked.
    pub fn into_view(self, viewer: Option<&str>) -> PostView {
        let liked = viewer.is_some_and(|v| self.liked_by.iter().any(|m| m.user_id == v));
        let bookmarked = viewer.is_some_and(|v| self.bookmarked_by.iter().any(|m| m.user_id == v));
        PostView {
            id: self.id,
            author: self.author.map_or_else(Author::unknown, Author::from),
            content: self.content,
            image_url: self.image_url,
            created_at: self.created_at,
            likes: self.likes_count.unwrap_or(0),
            comments: self.comments_count.unwrap_or(0),
            liked_by_viewer: liked,
            bookmarked_by_viewer: bookmarked,
        }
    }
}

impl CommentRow {
    pub fn into_view(self) -> CommentView {
        let mut replies: Vec<CommentView> =
            self.replies.into_iter().map(CommentRow::into_view).collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        CommentView {
            id: self.id,
            post_id: self.post_id,
            author: self.user.map_or_else(Author::unknown, Author::from),
            parent_id: self.parent_id,
            content: self.content,
            created_at: self.created_at,
            replies,
        }
    }
}

impl From<UserRow> for Profile {
    fn from(row: UserRow) -> Self {
        Self {
            name: display_name(&row.first_name, &row.last_name),
            id: row.id,
            username: row.username,
            bio: row.bio,
            city: row.city,
            avatar_url: row.avatar_url,
            cover_url: row.cover_url,
            verified: row.verified,
            created_at: row.created_at,
        }
    }
}

impl FollowEdgeRow {
    /// Flatten the join wrapper and attach the edge timestamp. Edges whose
    /// profile failed to embed are dropped by the caller.
    pub fn into_view(self) -> Option<FollowerView> {
        self.profile.map(|profile| FollowerView {
            author: Author::from(profile),
            followed_at: self.created_at,
        })
    }
}
