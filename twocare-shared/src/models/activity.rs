/// Activity model and database operations
///
/// Activities are care events logged against a baby. They can be created,
/// read and partially updated; there is no delete. `baby_id` and `user_id`
/// (the creator) never change after insert.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE activities (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     baby_id UUID NOT NULL REFERENCES babies(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     type activity_type NOT NULL,
///     timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     notes TEXT,
///     metadata JSONB,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE INDEX idx_activities_baby_timestamp ON activities(baby_id, timestamp DESC);
/// ```
///
/// # Example
///
/// ```no_run
/// use twocare_shared::models::activity::{Activity, ActivityFilter, ActivityType};
/// use twocare_shared::models::Page;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, baby_id: Uuid) -> Result<(), sqlx::Error> {
/// let filter = ActivityFilter {
///     baby_id,
///     activity_type: Some(ActivityType::Feeding),
///     ..Default::default()
/// };
/// let page = Activity::list(&pool, &filter, Page::default()).await?;
/// let total = Activity::count(&pool, &filter).await?;
/// # Ok(())
/// # }
/// ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use super::baby::Baby;
use super::family::Family;
use super::membership::FamilyMember;
use super::Page;

const ACTIVITY_COLUMNS: &str =
    "id, baby_id, user_id, type, timestamp, notes, metadata, created_at, updated_at";

/// Kind of care event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Feeding,
    DiaperChange,
    Sleep,
    Growth,
    Medication,
    Milestone,
    Note,
}

impl ActivityType {
    /// Every activity type
    pub const ALL: [ActivityType; 7] = [
        ActivityType::Feeding,
        ActivityType::DiaperChange,
        ActivityType::Sleep,
        ActivityType::Growth,
        ActivityType::Medication,
        ActivityType::Milestone,
        ActivityType::Note,
    ];

    /// Converts type to its wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Feeding => "FEEDING",
            ActivityType::DiaperChange => "DIAPER_CHANGE",
            ActivityType::Sleep => "SLEEP",
            ActivityType::Growth => "GROWTH",
            ActivityType::Medication => "MEDICATION",
            ActivityType::Milestone => "MILESTONE",
            ActivityType::Note => "NOTE",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,

    /// Baby the activity is logged for (immutable)
    pub baby_id: Uuid,

    /// Creator (immutable)
    pub user_id: Uuid,

    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub activity_type: ActivityType,

    /// When the activity happened
    pub timestamp: DateTime<Utc>,

    pub notes: Option<String>,

    /// Type-specific payload, validated against the schema for `activity_type`
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating an activity
#[derive(Debug, Clone)]
pub struct CreateActivity {
    pub baby_id: Uuid,
    pub user_id: Uuid,
    pub activity_type: ActivityType,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial activity update; `None` leaves a field unchanged
///
/// `notes: Some(None)` clears the notes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateActivity {
    pub activity_type: Option<ActivityType>,
    pub timestamp: Option<DateTime<Utc>>,
    pub notes: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
}

/// Activity with its full ownership chain
#[derive(Debug, Clone)]
pub struct ActivityWithFamily {
    pub activity: Activity,
    pub baby: Baby,
    pub family: Family,
    pub members: Vec<FamilyMember>,
}

/// Filter for listing activities of one baby
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityFilter {
    pub baby_id: Uuid,

    pub activity_type: Option<ActivityType>,

    /// Inclusive lower bound on `timestamp`
    pub from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `timestamp`
    pub to: Option<DateTime<Utc>>,
}

impl ActivityFilter {
    /// Whether an activity passes this filter
    pub fn matches(&self, activity: &Activity) -> bool {
        activity.baby_id == self.baby_id
            && self.activity_type.map_or(true, |t| activity.activity_type == t)
            && self.from.map_or(true, |from| activity.timestamp >= from)
            && self.to.map_or(true, |to| activity.timestamp <= to)
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE baby_id = ").push_bind(self.baby_id);

        if let Some(activity_type) = self.activity_type {
            builder.push(" AND type = ").push_bind(activity_type);
        }
        if let Some(from) = self.from {
            builder.push(" AND timestamp >= ").push_bind(from);
        }
        if let Some(to) = self.to {
            builder.push(" AND timestamp <= ").push_bind(to);
        }
    }
}

impl Activity {
    /// Creates an activity
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateActivity,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO activities (baby_id, user_id, type, timestamp, notes, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ACTIVITY_COLUMNS
        );

        sqlx::query_as::<_, Activity>(&query)
            .bind(data.baby_id)
            .bind(data.user_id)
            .bind(data.activity_type)
            .bind(data.timestamp)
            .bind(data.notes.is_some())
            .bind(data.notes)
            .bind(data.metadata)
            .fetch_one(executor)
            .await
    }

    /// Finds an activity by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM activities WHERE id = $1", ACTIVITY_COLUMNS);

        sqlx::query_as::<_, Activity>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Applies a partial update
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        data: UpdateActivity,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE activities SET \
                type = COALESCE($2, type), \
                timestamp = COALESCE($3, timestamp), \
                notes = CASE WHEN $4 THEN $5 ELSE notes END, \
                metadata = COALESCE($6, metadata), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {}",
            ACTIVITY_COLUMNS
        );

        sqlx::query_as::<_, Activity>(&query)
            .bind(id)
            .bind(data.activity_type)
            .bind(data.timestamp)
            .bind(data.notes.is_some())
            .bind(data.notes.flatten())
            .bind(data.metadata)
            .fetch_optional(executor)
            .await
    }

    /// Lists one page of activities matching `filter`, newest first
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        filter: &ActivityFilter,
        page: Page,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM activities", ACTIVITY_COLUMNS));
        filter.push_where(&mut builder);
        builder
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        builder.build_query_as::<Activity>().fetch_all(executor).await
    }

    /// Counts activities matching `filter`
    pub async fn count<'e, E: PgExecutor<'e>>(executor: E, filter: &ActivityFilter) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM activities");
        filter.push_where(&mut builder);

        let (count,): (i64,) = builder.build_query_as().fetch_one(executor).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn activity(baby_id: Uuid, activity_type: ActivityType, timestamp: DateTime<Utc>) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            baby_id,
            user_id: Uuid::new_v4(),
            activity_type,
            timestamp,
            notes: None,
            metadata: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    #[test]
    fn test_filter_matches() {
        let baby_id = Uuid::new_v4();
        let now = Utc::now();
        let feeding = activity(baby_id, ActivityType::Feeding, now);

        let filter = ActivityFilter {
            baby_id,
            ..Default::default()
        };
        assert!(filter.matches(&feeding));

        let filter = ActivityFilter {
            baby_id,
            activity_type: Some(ActivityType::Sleep),
            ..Default::default()
        };
        assert!(!filter.matches(&feeding));

        let filter = ActivityFilter {
            baby_id,
            from: Some(now),
            to: Some(now + Duration::hours(1)),
            ..Default::default()
        };
        assert!(filter.matches(&feeding));

        let filter = ActivityFilter {
            baby_id,
            from: Some(now + Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!filter.matches(&feeding));

        let other_baby = ActivityFilter {
            baby_id: Uuid::new_v4(),
            ..Default::default()
        };
        assert!(!other_baby.matches(&feeding));
    }

    #[test]
    fn test_activity_serializes_type_field() {
        let a = activity(Uuid::new_v4(), ActivityType::DiaperChange, Utc::now());
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "DIAPER_CHANGE");
        assert!(json.get("babyId").is_some());
    }
}
