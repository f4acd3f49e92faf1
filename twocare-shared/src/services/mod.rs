/// Family-scoped resource services
///
/// Every operation is explicit function composition:
///
/// ```text
/// validate input ─▶ resolve_family_context ─▶ authorize ─▶ persist
/// ```
///
/// Services take the authenticated user's ID and a [`ServiceContext`] holding
/// the collaborators (store, object storage, clock, config). They return
/// [`crate::error::ServiceResult`]; the API crate maps errors onto HTTP.
///
/// # Modules
///
/// - [`access`]: Membership resolver shared by every family-scoped service
/// - [`families`]: Family CRUD, member listing and role changes
/// - [`invites`]: Invite creation and redemption
/// - [`babies`]: Baby profiles and photos
/// - [`activities`]: Care activity logging and listing
/// - [`auth`]: Registration, login and refresh-token rotation
/// - [`users`]: Profile and avatar management

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::clock::Clock;
use crate::config::Config;
use crate::db::Store;
use crate::error::{FieldViolation, ServiceError, ServiceResult};
use crate::storage::ObjectStorage;

pub mod access;
pub mod activities;
pub mod auth;
pub mod babies;
pub mod families;
pub mod invites;
pub mod users;

/// Collaborators shared by all services
#[derive(Clone)]
pub struct ServiceContext {
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn ObjectStorage>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn Store>,
        storage: Arc<dyn ObjectStorage>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            storage,
            clock,
            config,
        }
    }

    /// Current time according to the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// List response body: `{data, total}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        let total = i64::try_from(data.len()).unwrap_or(i64::MAX);
        Self { data, total }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Deserializes a field that is present in the body, keeping an explicit
/// `null` apart from an absent key
///
/// Pair with `#[serde(default)]`: an absent key stays `None`, `null` becomes
/// `Some(None)` for `Option<Option<T>>` fields.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Rejects strings that are empty after trimming
pub(crate) fn require_not_blank(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Invalid(vec![FieldViolation {
            field: field.to_string(),
            message: format!("{} should not be empty", field),
        }]));
    }
    Ok(())
}
