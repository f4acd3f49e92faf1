/// API route handlers
///
/// Handlers are thin: extract, call the service, wrap the result. Every
/// family-scoped rule lives in `twocare_shared::services`.
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, token refresh and logout
/// - `users`: Profile and avatar of the caller
/// - `families`: Families, members and invites
/// - `babies`: Babies and their photos
/// - `activities`: Care activities

use axum::extract::Multipart;
use bytes::Bytes;

use crate::error::{ApiError, ApiResult};

pub mod activities;
pub mod auth;
pub mod babies;
pub mod families;
pub mod health;
pub mod users;

/// Multipart field carrying uploads
pub const FILE_FIELD: &str = "file";

/// An uploaded file
#[derive(Debug)]
pub struct UploadedFile {
    pub data: Bytes,
    pub content_type: String,
}

/// Reads the `file` field of a multipart body, skipping other fields
pub async fn read_file_field(mut multipart: Multipart) -> ApiResult<UploadedFile> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await?;

        return Ok(UploadedFile { data, content_type });
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}
