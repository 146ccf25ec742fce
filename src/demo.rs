//! Demo content helpers: fill a fresh account's feed with themed posts,
//! and clear them out again. Rows are inserted directly, not through
//! [`crate::posts::create`], so the demo texts are exempt from the
//! post-length limit.

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::debug;

use crate::config::POSTS_TABLE;
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::validate_uuid;
use crate::models::models::{PostRow, PostView};
use crate::posts::author_join;
use crate::store::{Filter, Store};

struct DemoPost {
    content: &'static str,
    image_url: Option<&'static str>,
    hours_ago: i64,
}

const DEMO_POSTS: [DemoPost; 8] = [
    DemoPost {
        content: "Assalamu Alaikum brothers and sisters! I have a question about the \
                  significance of Ghadeer-e-Khumm. Can someone explain why this event is so \
                  important in Shia belief?\n\n#GhadeerEKhumm #ShiaBeliefs #IslamicHistory",
        image_url: Some(
            "https://images.unsplash.com/photo-1564769625905-50e93615e769?w=600&h=400&fit=crop",
        ),
        hours_ago: 2,
    },
    DemoPost {
        content: "Organizing a community iftar this Friday at our local Imam Bargah!\n\n\
                  Time: 6:30 PM\nLocation: Main Hall\nFree dinner for all\nSpecial program \
                  for children\n\nNeed volunteers for preparation. Please comment if you can \
                  help!\n\n#CommunityIftar #Volunteers #Unity",
        image_url: Some(
            "https://images.unsplash.com/photo-1542816417-0983c9c9ad53?w=600&h=400&fit=crop",
        ),
        hours_ago: 4,
    },
    DemoPost {
        content: "SubhanAllah! Just finished reciting Dua Kumayl. The depth of Imam Ali's \
                  (AS) words never ceases to amaze me.\n\n\"My God, You are the shelter of \
                  the shelterless and the helper of the helpless.\"\n\nThese words bring so \
                  much comfort during difficult times.\n\n#DuaKumayl #ImamAli #Spirituality",
        image_url: None,
        hours_ago: 6,
    },
    DemoPost {
        content: "Today I want to share wisdom from Imam Jafar Sadiq (AS):\n\n\"Knowledge is \
                  not what is memorized, but what benefits.\"\n\nTrue Islamic education isn't \
                  just about memorizing texts, but applying teachings in our daily lives.\n\n\
                  #ImamJafarSadiq #Knowledge #IslamicWisdom",
        image_url: Some(
            "https://images.unsplash.com/photo-1481627834876-b7833e8f5570?w=600&h=400&fit=crop",
        ),
        hours_ago: 8,
    },
    DemoPost {
        content: "Majlis announcement for this weekend!\n\nTopic: \"The Patience of Lady \
                  Zahra (AS)\"\nDate: Saturday, 7:00 PM\nSpeaker: Local Alim\n\nAll families \
                  welcome! Light refreshments after majlis.\n\n#Majlis #LadyFatima #Community",
        image_url: Some(
            "https://images.unsplash.com/photo-1591604129939-f1efa4d9f7fa?w=600&h=400&fit=crop",
        ),
        hours_ago: 12,
    },
    DemoPost {
        content: "Question for our community: How do you explain the concept of Wilayat to \
                  someone new to Shia Islam?\n\nLooking for simple, clear explanations that \
                  can help in dawah work. Please share your approaches and experiences.\n\n\
                  #Wilayat #Dawah #Community #Learning",
        image_url: None,
        hours_ago: 24,
    },
    DemoPost {
        content: "Alhamdulillah! Our monthly charity drive was successful!\n\nDistributed \
                  100 food packages, clothes for children, books for students and medicine \
                  for the elderly.\n\nThanks to all donors and volunteers! Next drive: first \
                  Saturday of next month.\n\n#Charity #CommunityService #Volunteers",
        image_url: Some(
            "https://images.unsplash.com/photo-1593113598332-cd288d649433?w=600&h=400&fit=crop",
        ),
        hours_ago: 48,
    },
    DemoPost {
        content: "Weekly Hadith from Prophet Muhammad (PBUH):\n\n\"The believers are like \
                  one body; when one part is in pain, the rest of the body feels it.\"\n\n\
                  This teaches us about community support and brotherhood. How can we better \
                  support each other?\n\n#Hadith #Brotherhood #Unity",
        image_url: Some(
            "https://images.unsplash.com/photo-1589998059171-988d887df646?w=600&h=400&fit=crop",
        ),
        hours_ago: 72,
    },
];

/// Insert the demo post batch authored by `user_id`, timestamped at
/// staggered offsets so the feed reads naturally. Returns the created
/// posts, author attached.
pub async fn seed_demo_data(store: &dyn Store, user_id: &str) -> Result<Vec<PostView>> {
    if !validate_uuid(user_id) {
        return Err(ApiError::Validation("user id must be a uuid".to_string()));
    }
    let mut views = Vec::with_capacity(DEMO_POSTS.len());
    for demo in &DEMO_POSTS {
        let created_at = (Utc::now() - Duration::hours(demo.hours_ago)).to_rfc3339();
        let row = json!({
            "author_id": user_id,
            "content": demo.content,
            "image_url": demo.image_url,
            "created_at": created_at,
        });
        let value = store
            .insert(POSTS_TABLE, row, &[author_join("author_id")])
            .await?;
        let post: PostRow = serde_json::from_value(value)?;
        views.push(post.into_view(None));
    }
    debug!(user_id, seeded = views.len(), "demo posts created");
    Ok(views)
}

/// Remove every post authored by `user_id`, returning how many were
/// deleted. This clears real posts too, not just the seeded batch.
pub async fn clear_demo_posts(store: &dyn Store, user_id: &str) -> Result<u64> {
    if !validate_uuid(user_id) {
        return Err(ApiError::Validation("user id must be a uuid".to_string()));
    }
    store
        .delete(POSTS_TABLE, &[Filter::eq("author_id", user_id)])
        .await
}
