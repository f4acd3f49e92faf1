/// Baby model, photos and database operations
///
/// A baby belongs to exactly one family for its whole life (`family_id` is
/// never updated). Babies are soft-deleted; a baby is visible only if both
/// it and its family are.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE babies (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     family_id UUID NOT NULL REFERENCES families(id) ON DELETE CASCADE,
///     name TEXT NOT NULL,
///     date_of_birth DATE NOT NULL,
///     gender gender,
///     photo_url TEXT,
///     deleted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE baby_photos (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     baby_id UUID NOT NULL REFERENCES babies(id) ON DELETE CASCADE,
///     url TEXT NOT NULL,
///     uploaded_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::family::Family;
use super::membership::FamilyMember;
use super::{visible, SoftDelete};

const BABY_COLUMNS: &str =
    "b.id, b.family_id, b.name, b.date_of_birth, b.gender, b.photo_url, b.deleted_at, b.created_at, b.updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Baby model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Baby {
    pub id: Uuid,

    /// Owning family (immutable)
    pub family_id: Uuid,

    pub name: String,

    pub date_of_birth: NaiveDate,

    pub gender: Option<Gender>,

    /// Most recent photo
    pub photo_url: Option<String>,

    /// Soft-delete timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl SoftDelete for Baby {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// Input for creating a baby
#[derive(Debug, Clone)]
pub struct CreateBaby {
    pub family_id: Uuid,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<Gender>,
    pub photo_url: Option<String>,
}

/// Partial baby update; `family_id` is deliberately absent
///
/// `Some(None)` clears `gender` or `photo_url`.
#[derive(Debug, Clone, Default)]
pub struct UpdateBaby {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Option<Gender>>,
    pub photo_url: Option<Option<String>>,
}

/// Baby with its owning family and that family's members
#[derive(Debug, Clone)]
pub struct BabyWithFamily {
    pub baby: Baby,
    pub family: Family,
    pub members: Vec<FamilyMember>,
}

/// One uploaded photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BabyPhoto {
    pub id: Uuid,
    pub baby_id: Uuid,
    pub url: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a photo
#[derive(Debug, Clone)]
pub struct CreateBabyPhoto {
    pub baby_id: Uuid,
    pub url: String,
    pub uploaded_by: Uuid,
}

impl Baby {
    /// Creates a baby
    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, data: CreateBaby) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO babies AS b (family_id, name, date_of_birth, gender, photo_url) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            BABY_COLUMNS
        );

        sqlx::query_as::<_, Baby>(&query)
            .bind(data.family_id)
            .bind(data.name.trim())
            .bind(data.date_of_birth)
            .bind(data.gender)
            .bind(data.photo_url)
            .fetch_one(executor)
            .await
    }

    /// Finds a baby by ID, including soft-deleted rows
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM babies b WHERE b.id = $1", BABY_COLUMNS);

        sqlx::query_as::<_, Baby>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists visible babies of one family, oldest first
    pub async fn list_for_family<'e, E: PgExecutor<'e>>(
        executor: E,
        family_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM babies b WHERE b.family_id = $1 AND {} ORDER BY b.created_at ASC",
            BABY_COLUMNS,
            visible("b")
        );

        sqlx::query_as::<_, Baby>(&query)
            .bind(family_id)
            .fetch_all(executor)
            .await
    }

    /// Lists visible babies across all visible families the user belongs to
    pub async fn list_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM babies b \
             JOIN families f ON f.id = b.family_id \
             JOIN family_members m ON m.family_id = f.id \
             WHERE m.user_id = $1 AND {} AND {} \
             ORDER BY b.created_at ASC",
            BABY_COLUMNS,
            visible("b"),
            visible("f")
        );

        sqlx::query_as::<_, Baby>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Applies a partial update to a visible baby
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        data: UpdateBaby,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE babies b SET \
                name = COALESCE($2, b.name), \
                date_of_birth = COALESCE($3, b.date_of_birth), \
                gender = CASE WHEN $4 THEN $5 ELSE b.gender END, \
                photo_url = CASE WHEN $6 THEN $7 ELSE b.photo_url END, \
                updated_at = NOW() \
             WHERE b.id = $1 AND {} \
             RETURNING {}",
            visible("b"),
            BABY_COLUMNS
        );

        sqlx::query_as::<_, Baby>(&query)
            .bind(id)
            .bind(data.name.as_deref().map(str::trim))
            .bind(data.date_of_birth)
            .bind(data.gender.is_some())
            .bind(data.gender.flatten())
            .bind(data.photo_url.is_some())
            .bind(data.photo_url.flatten())
            .fetch_optional(executor)
            .await
    }

    /// Soft-deletes a visible baby
    pub async fn soft_delete<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE babies b SET deleted_at = $2, updated_at = $2 WHERE b.id = $1 AND {}",
            visible("b")
        );

        let result = sqlx::query(&query).bind(id).bind(at).execute(executor).await?;

        Ok(result.rows_affected() > 0)
    }
}

impl BabyPhoto {
    /// Records an uploaded photo
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateBabyPhoto,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, BabyPhoto>(
            r#"
            INSERT INTO baby_photos (baby_id, url, uploaded_by)
            VALUES ($1, $2, $3)
            RETURNING id, baby_id, url, uploaded_by, created_at
            "#,
        )
        .bind(data.baby_id)
        .bind(data.url)
        .bind(data.uploaded_by)
        .fetch_one(executor)
        .await
    }

    /// Lists a baby's photos, newest first
    pub async fn list_for_baby<'e, E: PgExecutor<'e>>(
        executor: E,
        baby_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BabyPhoto>(
            r#"
            SELECT id, baby_id, url, uploaded_by, created_at
            FROM baby_photos
            WHERE baby_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(baby_id)
        .fetch_all(executor)
        .await
    }
}
