/// Object storage for user avatars and baby photos
///
/// Uploads go through the [`ObjectStorage`] trait, which returns the public
/// URL of the stored object. [`validate_image`] runs before any upload.
///
/// # Implementations
///
/// - [`supabase::SupabaseStorage`]: Supabase Storage over its HTTP API
/// - [`memory::MemoryStorage`]: in-process map, for tests and local runs
/// - [`DisabledStorage`]: rejects every upload when storage is not configured

use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;
pub mod supabase;

pub use memory::MemoryStorage;
pub use supabase::SupabaseStorage;

/// Bucket holding user avatars
pub const AVATARS_BUCKET: &str = "avatars";

/// Bucket holding baby photos
pub const BABIES_BUCKET: &str = "babies";

/// Accepted image content types and the file extension each is stored under
pub const ALLOWED_IMAGE_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Upload had no bytes
    #[error("No file uploaded")]
    Empty,

    /// Content type is not an accepted image type
    #[error("Invalid file type: {0}. Allowed types: image/jpeg, image/png, image/webp, image/gif")]
    UnsupportedType(String),

    /// Upload exceeds the configured limit
    #[error("File size exceeds limit of {}MB", megabytes(.max))]
    TooLarge { size: usize, max: usize },

    /// URL does not point into this storage
    #[error("Invalid object URL: {0}")]
    InvalidUrl(String),

    /// Storage is not configured
    #[error("Object storage is not configured")]
    NotConfigured,

    /// The storage service rejected or failed the request
    #[error("Storage request failed: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Upstream(err.to_string())
    }
}

fn megabytes(bytes: &usize) -> f64 {
    *bytes as f64 / 1024.0 / 1024.0
}

/// Blob store addressed by bucket and path
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `data` at `bucket/path`, replacing any existing object
    ///
    /// # Returns
    ///
    /// The public URL of the object
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Deletes the object behind a URL previously returned by `upload`
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Checks an upload and returns the file extension for its content type
///
/// # Errors
///
/// - `Empty` for zero bytes
/// - `TooLarge` above `max_size`
/// - `UnsupportedType` for anything but JPEG, PNG, WebP and GIF
pub fn validate_image(content_type: &str, size: usize, max_size: usize) -> Result<&'static str, StorageError> {
    if size == 0 {
        return Err(StorageError::Empty);
    }
    if size > max_size {
        return Err(StorageError::TooLarge { size, max: max_size });
    }

    let normalized = content_type.trim().to_ascii_lowercase();
    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == normalized)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| StorageError::UnsupportedType(content_type.to_string()))
}

/// Storage used when no backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStorage;

#[async_trait]
impl ObjectStorage for DisabledStorage {
    async fn upload(&self, _: &str, _: &str, _: Bytes, _: &str) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }

    async fn delete(&self, _: &str) -> Result<(), StorageError> {
        Err(StorageError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image() {
        assert_eq!(validate_image("image/png", 10, 100).unwrap(), "png");
        assert_eq!(validate_image("IMAGE/JPEG", 10, 100).unwrap(), "jpg");

        assert!(matches!(validate_image("image/png", 0, 100), Err(StorageError::Empty)));
        assert!(matches!(
            validate_image("image/png", 101, 100),
            Err(StorageError::TooLarge { size: 101, max: 100 })
        ));
        assert!(matches!(
            validate_image("application/pdf", 10, 100),
            Err(StorageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_too_large_message() {
        let err = StorageError::TooLarge {
            size: 2 * 1024 * 1024,
            max: 1024 * 1024,
        };
        assert_eq!(err.to_string(), "File size exceeds limit of 1MB");
    }
}
