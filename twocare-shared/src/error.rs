//! Domain error taxonomy
//!
//! Every service operation returns [`ServiceError`]. The variants map one to one
//! onto HTTP statuses in the API crate:
//!
//! | Variant        | Status |
//! |----------------|--------|
//! | `NotFound`     | 404    |
//! | `Forbidden`    | 403    |
//! | `Conflict`     | 409    |
//! | `BadRequest`   | 400    |
//! | `Invalid`      | 400    |
//! | `Unauthorized` | 401    |
//! | `Internal`     | 500    |
//!
//! Lower-level errors (store, storage, password, JWT, authorization, metadata)
//! convert into it with `?`.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

use crate::auth::authorization::AuthzError;
use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use crate::db::StoreError;
use crate::metadata::MetadataError;
use crate::storage::StorageError;

/// Result alias used by the service layer
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Kind of resource a lookup failed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    User,
    Family,
    Member,
    Baby,
    Activity,
    Invite,
    RefreshToken,
}

impl ResourceKind {
    /// Message rendered to clients when the resource is missing or invisible
    pub fn not_found_message(&self) -> &'static str {
        match self {
            ResourceKind::User => "User not found",
            ResourceKind::Family => "Family not found",
            ResourceKind::Member => "Member not found",
            ResourceKind::Baby => "Baby not found",
            ResourceKind::Activity => "Activity not found",
            ResourceKind::Invite => "Invalid invite token",
            ResourceKind::RefreshToken => "Invalid refresh token",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::User => "user",
            ResourceKind::Family => "family",
            ResourceKind::Member => "member",
            ResourceKind::Baby => "baby",
            ResourceKind::Activity => "activity",
            ResourceKind::Invite => "invite",
            ResourceKind::RefreshToken => "refresh_token",
        };
        f.write_str(name)
    }
}

/// A single failed input constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error type for every service operation
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Resource is absent or soft-deleted
    #[error("{}", kind.not_found_message())]
    NotFound { kind: ResourceKind, id: String },

    /// Caller lacks the membership or role the operation requires
    #[error("{0}")]
    Forbidden(String),

    /// State conflict (duplicate email, reused invite, existing membership)
    #[error("{0}")]
    Conflict(String),

    /// Semantically invalid input (bad metadata, expired invite, bad upload)
    #[error("{0}")]
    BadRequest(String),

    /// Input failed declarative field validation
    #[error("Validation failed: {} errors", .0.len())]
    Invalid(Vec<FieldViolation>),

    /// Missing or invalid credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Anything the caller cannot act on
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Shorthand for a not-found error keyed by UUID or token
    pub fn not_found(kind: ResourceKind, id: impl ToString) -> Self {
        ServiceError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => {
                if constraint.contains("email") {
                    ServiceError::Conflict("Email already exists".to_string())
                } else if constraint.contains("family_user") {
                    ServiceError::Conflict("You are already a member of this family".to_string())
                } else {
                    ServiceError::Conflict(format!("Constraint violation: {}", constraint))
                }
            }
            StoreError::InviteAlreadyUsed => {
                ServiceError::Conflict("This invite has already been used".to_string())
            }
            StoreError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                ServiceError::Internal(format!("Database error: {}", e))
            }
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        ServiceError::Forbidden(err.to_string())
    }
}

impl From<MetadataError> for ServiceError {
    fn from(err: MetadataError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ServiceError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ServiceError::Internal(msg),
            JwtError::Expired => ServiceError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => {
                ServiceError::Unauthorized("Invalid token issuer".to_string())
            }
            other => ServiceError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedType(_) | StorageError::TooLarge { .. } | StorageError::Empty => {
                ServiceError::BadRequest(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "Object storage error");
                ServiceError::Internal(other.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        let mut violations: Vec<FieldViolation> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldViolation {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        ServiceError::Invalid(violations)
    }
}
