use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::models::models::{Author, PostView};
use crate::posts;
use crate::store::Store;

/// What the home feed is currently showing.
///
/// `Degraded` is deliberately distinct from `Loaded`: it means the load
/// failed and the static sample sequence is on screen so the page stays
/// usable. Callers offer a "try again" action from it.
#[derive(Debug)]
pub enum FeedState {
    Loading,
    Loaded(Vec<PostView>),
    Empty,
    Degraded(Vec<PostView>),
}

impl FeedState {
    pub fn posts(&self) -> &[PostView] {
        match self {
            FeedState::Loaded(posts) | FeedState::Degraded(posts) => posts,
            FeedState::Loading | FeedState::Empty => &[],
        }
    }
}

/// The home feed state machine: `Loading` on entry, then `Loaded`,
/// `Empty` or `Degraded` depending on what the post repository returns.
pub struct Feed {
    store: Arc<dyn Store>,
    state: FeedState,
    last_refresh: u64,
    page_size: usize,
}

impl Feed {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            state: FeedState::Loading,
            last_refresh: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// Enter `Loading` and fetch the first page. Failure never escapes:
    /// it becomes the `Degraded` state carrying the sample sequence.
    pub async fn load(&mut self) {
        self.state = FeedState::Loading;
        self.state = match posts::get_all(self.store.as_ref(), self.page_size, 0).await {
            Ok(posts) if posts.is_empty() => FeedState::Empty,
            Ok(posts) => FeedState::Loaded(posts),
            Err(err) => {
                warn!(error = %err, "feed load failed, showing sample content");
                FeedState::Degraded(sample_posts())
            }
        };
    }

    /// Reload when the caller-supplied counter advances. The counter is
    /// monotonically increasing; repeated or stale values are ignored so
    /// a re-render does not refetch.
    pub async fn refresh(&mut self, counter: u64) {
        if counter <= self.last_refresh {
            return;
        }
        self.last_refresh = counter;
        self.load().await;
    }

    /// Manual "try again" re-entry into `Loading`.
    pub async fn retry(&mut self) {
        self.load().await;
    }
}

fn sample_author(id: &str, name: &str, username: &str, verified: bool) -> Author {
    Author {
        id: id.to_string(),
        name: name.to_string(),
        username: username.to_string(),
        avatar_url: None,
        verified,
        city: None,
    }
}

fn hours_ago(hours: i64) -> String {
    (Utc::now() - Duration::hours(hours)).to_rfc3339()
}

/// Static fallback content shown while the backend is unreachable.
pub fn sample_posts() -> Vec<PostView> {
    vec![
        PostView {
            id: "sample-1".to_string(),
            author: sample_author("sample-ali", "Ali Hassan", "alihassan", true),
            content: "Alhamdulillahi Rabbil Alameen! May Allah bless our community with \
                      unity and peace. Today marks another blessed day in our journey of faith. 🤲"
                .to_string(),
            image_url: None,
            created_at: hours_ago(2),
            likes: 24,
            comments: 8,
            liked_by_viewer: false,
            bookmarked_by_viewer: false,
        },
        PostView {
            id: "sample-2".to_string(),
            author: sample_author("sample-fatima", "Fatima Zahra", "fatimazahra", false),
            content: "Attending the Majlis tonight at Imam Bargah. The topic is \"The Path of \
                      Righteousness in Modern Times\". All brothers and sisters are welcome to \
                      join us. InshAllah it will be very beneficial for our spiritual growth."
                .to_string(),
            image_url: None,
            created_at: hours_ago(4),
            likes: 15,
            comments: 5,
            liked_by_viewer: true,
            bookmarked_by_viewer: true,
        },
        PostView {
            id: "sample-3".to_string(),
            author: sample_author("sample-raza", "Muhammad Raza", "mraza", false),
            content: "SubhanAllah! Just finished reading Dua Kumayl. The depth and beauty of \
                      Imam Ali's (AS) words never cease to amaze me. May Allah grant us the \
                      wisdom to understand and implement these teachings in our daily lives."
                .to_string(),
            image_url: None,
            created_at: hours_ago(8),
            likes: 42,
            comments: 12,
            liked_by_viewer: false,
            bookmarked_by_viewer: false,
        },
        PostView {
            id: "sample-4".to_string(),
            author: sample_author("sample-zainab", "Zainab Hussain", "zainabhussain", true),
            content: "Organizing a community iftar this Friday at the local mosque. We need \
                      volunteers to help with food preparation and serving. This is a great \
                      opportunity to earn sawab and bring our community together. Please DM me \
                      if you can help."
                .to_string(),
            image_url: None,
            created_at: hours_ago(12),
            likes: 31,
            comments: 18,
            liked_by_viewer: true,
            bookmarked_by_viewer: false,
        },
        PostView {
            id: "sample-5".to_string(),
            author: sample_author("sample-ahmed", "Ahmed Kazmi", "ahmedkazmi", false),
            content: "Reflection of the day: \"The best form of worship is to help those in \
                      need.\" - Imam Ali (AS)\n\nLet us remember to always extend our hand to \
                      help our brothers and sisters, regardless of their background. This is \
                      the true essence of our faith."
                .to_string(),
            image_url: None,
            created_at: hours_ago(24),
            likes: 67,
            comments: 23,
            liked_by_viewer: false,
            bookmarked_by_viewer: true,
        },
    ]
}
