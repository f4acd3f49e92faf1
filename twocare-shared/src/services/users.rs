/// User profile service
///
/// Reads and edits the caller's own profile and avatar. The avatar lives in
/// object storage; removing the previous file is best effort and never fails
/// the request.

use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{present, require_not_blank, ServiceContext};
use crate::error::{ResourceKind, ServiceError, ServiceResult};
use crate::models::user::{UpdateUser, User};
use crate::storage::{validate_image, AVATARS_BUCKET};

/// Body of `PATCH /v1/users/me`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 50, message = "firstName must be between 1 and 50 characters"))]
    pub first_name: Option<String>,

    /// `null` clears the last name
    #[serde(default, deserialize_with = "present")]
    #[validate(length(min = 1, max = 50, message = "lastName must be between 1 and 50 characters"))]
    pub last_name: Option<Option<String>>,
}

pub async fn get_profile(ctx: &ServiceContext, user_id: Uuid) -> ServiceResult<User> {
    ctx.store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::User, user_id))
}

pub async fn update_profile(ctx: &ServiceContext, user_id: Uuid, input: UpdateProfileInput) -> ServiceResult<User> {
    input.validate()?;
    if let Some(first_name) = &input.first_name {
        require_not_blank("firstName", first_name)?;
    }

    ctx.store
        .update_user(
            user_id,
            UpdateUser {
                first_name: input.first_name.map(|name| name.trim().to_string()),
                last_name: input
                    .last_name
                    .map(|name| name.map(|name| name.trim().to_string())),
                avatar_url: None,
            },
        )
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::User, user_id))
}

/// Replaces the caller's avatar
///
/// Stored at `avatars/<userId>-<millis>.<ext>` in the avatars bucket.
pub async fn upload_avatar(
    ctx: &ServiceContext,
    user_id: Uuid,
    data: Bytes,
    content_type: &str,
) -> ServiceResult<User> {
    let extension = validate_image(content_type, data.len(), ctx.config.storage.max_file_size)?;
    let current = get_profile(ctx, user_id).await?;

    let path = format!(
        "avatars/{}-{}.{}",
        user_id,
        ctx.now().timestamp_millis(),
        extension
    );
    let url = ctx.storage.upload(AVATARS_BUCKET, &path, data, content_type).await?;

    if let Some(previous) = current.avatar_url.as_deref().filter(|previous| *previous != url) {
        remove_avatar_file(ctx, user_id, previous).await;
    }

    let user = ctx
        .store
        .update_user(
            user_id,
            UpdateUser {
                avatar_url: Some(Some(url)),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::User, user_id))?;

    info!(user_id = %user_id, "Avatar uploaded");
    Ok(user)
}

/// Removes the caller's avatar
pub async fn delete_avatar(ctx: &ServiceContext, user_id: Uuid) -> ServiceResult<User> {
    let current = get_profile(ctx, user_id).await?;

    let Some(previous) = current.avatar_url.as_deref() else {
        return Ok(current);
    };
    remove_avatar_file(ctx, user_id, previous).await;

    ctx.store
        .update_user(
            user_id,
            UpdateUser {
                avatar_url: Some(None),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::User, user_id))
}

async fn remove_avatar_file(ctx: &ServiceContext, user_id: Uuid, url: &str) {
    if let Err(e) = ctx.storage.delete(url).await {
        warn!(user_id = %user_id, url, error = %e, "Failed to delete old avatar");
    }
}
