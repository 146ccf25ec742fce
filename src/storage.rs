use chrono::Utc;
use mime_guess::from_path;

use crate::config::{AVATAR_BUCKET, MAX_UPLOAD_BYTES};
use crate::core::errors::{ApiError, Result};
use crate::core::helpers::validate_uuid;
use crate::store::Store;

fn extension(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or("bin")
}

fn check_upload(user_id: &str, bytes: &[u8]) -> Result<()> {
    if !validate_uuid(user_id) {
        return Err(ApiError::Validation("user id must be a uuid".to_string()));
    }
    if bytes.is_empty() {
        return Err(ApiError::Validation("file is empty".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::Validation(format!(
            "file exceeds {} bytes",
            MAX_UPLOAD_BYTES
        )));
    }
    Ok(())
}

async fn upload(store: &dyn Store, path: String, file_name: &str, bytes: Vec<u8>) -> Result<String> {
    let content_type = from_path(file_name).first_or_octet_stream();
    store
        .upload(AVATAR_BUCKET, &path, bytes, content_type.as_ref())
        .await?;
    Ok(store.public_url(AVATAR_BUCKET, &path))
}

/// Upload a profile picture and return its public URL. The object path is
/// derived from the user id and upload time so successive uploads never
/// collide.
pub async fn upload_avatar(
    store: &dyn Store,
    user_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<String> {
    check_upload(user_id, &bytes)?;
    let path = format!(
        "avatars/{}-{}.{}",
        user_id,
        Utc::now().timestamp_millis(),
        extension(file_name)
    );
    upload(store, path, file_name, bytes).await
}

/// Upload a profile cover photo and return its public URL.
pub async fn upload_cover_photo(
    store: &dyn Store,
    user_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<String> {
    check_upload(user_id, &bytes)?;
    let path = format!(
        "covers/cover-{}-{}.{}",
        user_id,
        Utc::now().timestamp_millis(),
        extension(file_name)
    );
    upload(store, path, file_name, bytes).await
}

pub async fn delete_file(store: &dyn Store, path: &str) -> Result<()> {
    store.remove(AVATAR_BUCKET, path).await
}
