use ammonia::Builder;
use uuid::Uuid;

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Strip all HTML, leaving plain text only. Used for usernames, bios and
/// comment bodies where markup is never wanted.
pub fn sanitize_text(text: &str) -> String {
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}
