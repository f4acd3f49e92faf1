/// Activity service
///
/// Care events logged against a baby. Create, read and partial update only.
/// Metadata is validated against the schema of the effective activity type
/// whenever it is supplied.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::access::{resolve_family_context, ResourceRef};
use super::{present, ListResponse, ServiceContext};
use crate::auth::authorization::Operation;
use crate::error::{ResourceKind, ServiceError, ServiceResult};
use crate::metadata::ActivityMetadata;
use crate::models::activity::{Activity, ActivityFilter, ActivityType, CreateActivity, UpdateActivity};
use crate::models::Page;

/// Body of `POST /v1/activities`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityInput {
    pub baby_id: Uuid,

    #[serde(rename = "type")]
    pub activity_type: ActivityType,

    /// Defaults to now
    pub timestamp: Option<DateTime<Utc>>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,

    pub metadata: Option<Value>,
}

/// Body of `PATCH /v1/activities/:id`; absent fields stay unchanged
///
/// `notes: null` clears the notes. `metadata: null` is kept as a JSON null
/// and rejected by the metadata schema.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityInput {
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,

    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "present")]
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    pub metadata: Option<Value>,
}

/// Query of `GET /v1/activities`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListActivitiesQuery {
    pub baby_id: Uuid,

    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,

    /// Inclusive lower bound on `timestamp`
    pub from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `timestamp`
    pub to: Option<DateTime<Utc>>,

    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = "Page::MAX_PAGE_SIZE", message = "pageSize must be between 1 and 100"))]
    pub page_size: Option<u32>,
}

impl ListActivitiesQuery {
    fn filter(&self) -> ActivityFilter {
        ActivityFilter {
            baby_id: self.baby_id,
            activity_type: self.activity_type,
            from: self.from,
            to: self.to,
        }
    }

    fn page(&self) -> Page {
        Page {
            page: self.page.unwrap_or(Page::DEFAULT_PAGE),
            page_size: self.page_size.unwrap_or(Page::DEFAULT_PAGE_SIZE),
        }
    }
}

/// Logs an activity; PRIMARY_PARENT, CO_PARENT or CAREGIVER
pub async fn create_activity(
    ctx: &ServiceContext,
    user_id: Uuid,
    input: CreateActivityInput,
) -> ServiceResult<Activity> {
    input.validate()?;

    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Baby(input.baby_id), user_id).await?;
    access.authorize(Operation::CreateActivity, false)?;

    if let Some(metadata) = &input.metadata {
        let parsed = ActivityMetadata::parse(input.activity_type, metadata)?;
        debug!(baby_id = %input.baby_id, metadata = ?parsed, "Activity metadata accepted");
    }

    let activity = ctx
        .store
        .create_activity(CreateActivity {
            baby_id: input.baby_id,
            user_id,
            activity_type: input.activity_type,
            timestamp: input.timestamp.unwrap_or_else(|| ctx.now()),
            notes: input.notes,
            metadata: input.metadata,
        })
        .await?;

    info!(
        activity_id = %activity.id,
        baby_id = %activity.baby_id,
        activity_type = %activity.activity_type,
        "Activity logged"
    );
    Ok(activity)
}

pub async fn get_activity(ctx: &ServiceContext, user_id: Uuid, activity_id: Uuid) -> ServiceResult<Activity> {
    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Activity(activity_id), user_id).await?;
    access.authorize(Operation::ReadActivity, false)?;

    access
        .activity
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Activity, activity_id))
}

/// Partially updates an activity; its creator, PRIMARY_PARENT or CO_PARENT
pub async fn update_activity(
    ctx: &ServiceContext,
    user_id: Uuid,
    activity_id: Uuid,
    input: UpdateActivityInput,
) -> ServiceResult<Activity> {
    input.validate()?;

    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Activity(activity_id), user_id).await?;
    let current = access
        .activity
        .as_ref()
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Activity, activity_id))?;
    access.authorize(Operation::UpdateActivity, current.user_id == user_id)?;

    if let Some(metadata) = &input.metadata {
        let effective_type = input.activity_type.unwrap_or(current.activity_type);
        let parsed = ActivityMetadata::parse(effective_type, metadata)?;
        debug!(activity_id = %activity_id, metadata = ?parsed, "Activity metadata accepted");
    }

    ctx.store
        .update_activity(
            activity_id,
            UpdateActivity {
                activity_type: input.activity_type,
                timestamp: input.timestamp,
                notes: input.notes,
                metadata: input.metadata,
            },
        )
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Activity, activity_id))
}

/// One page of a baby's activities, newest first, with the total count
pub async fn list_activities(
    ctx: &ServiceContext,
    user_id: Uuid,
    query: ListActivitiesQuery,
) -> ServiceResult<ListResponse<Activity>> {
    query.validate()?;

    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Baby(query.baby_id), user_id).await?;
    access.authorize(Operation::ReadActivity, false)?;

    let filter = query.filter();
    let page = query.page();
    let (total, data) = futures::try_join!(
        ctx.store.count_activities(&filter),
        ctx.store.list_activities(&filter, page),
    )?;

    debug!(baby_id = %query.baby_id, total, returned = data.len(), "Listed activities");
    Ok(ListResponse { data, total })
}
