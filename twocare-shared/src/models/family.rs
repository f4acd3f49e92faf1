/// Family model and database operations
///
/// A family is the tenant boundary: babies, activities, invites and
/// memberships all hang off it. Families are soft-deleted; once `deleted_at`
/// is set the family and everything under it is invisible.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE families (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     deleted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use twocare_shared::models::family::Family;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let family = Family::create(&pool, "The Okafors").await?;
/// let found = Family::find_by_id(&pool, family.id).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::membership::FamilyMember;
use super::{visible, SoftDelete};

/// Family model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: Uuid,

    pub name: String,

    /// Soft-delete timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl SoftDelete for Family {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// Family together with its membership rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyWithMembers {
    #[serde(flatten)]
    pub family: Family,

    pub members: Vec<FamilyMember>,
}

/// Partial family update
#[derive(Debug, Clone, Default)]
pub struct UpdateFamily {
    pub name: Option<String>,
}

impl Family {
    /// Creates a family (without members; see `Store::create_family_with_owner`)
    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Family>(
            r#"
            INSERT INTO families (name)
            VALUES ($1)
            RETURNING id, name, deleted_at, created_at, updated_at
            "#,
        )
        .bind(name.trim())
        .fetch_one(executor)
        .await
    }

    /// Finds a family by ID, including soft-deleted rows
    ///
    /// Callers decide visibility with [`SoftDelete::is_visible`] so a deleted
    /// family can be reported as not found rather than forbidden.
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Family>(
            r#"
            SELECT id, name, deleted_at, created_at, updated_at
            FROM families
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists visible families the user belongs to, newest first
    pub async fn list_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT f.id, f.name, f.deleted_at, f.created_at, f.updated_at \
             FROM families f \
             JOIN family_members m ON m.family_id = f.id \
             WHERE m.user_id = $1 AND {} \
             ORDER BY f.created_at DESC",
            visible("f")
        );

        sqlx::query_as::<_, Family>(&query)
            .bind(user_id)
            .fetch_all(executor)
            .await
    }

    /// Applies a partial update to a visible family
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        data: UpdateFamily,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE families f SET name = COALESCE($2, f.name), updated_at = NOW() \
             WHERE f.id = $1 AND {} \
             RETURNING f.id, f.name, f.deleted_at, f.created_at, f.updated_at",
            visible("f")
        );

        sqlx::query_as::<_, Family>(&query)
            .bind(id)
            .bind(data.name.as_deref().map(str::trim))
            .fetch_optional(executor)
            .await
    }

    /// Soft-deletes a visible family
    ///
    /// # Returns
    ///
    /// True if the family was live and is now deleted
    pub async fn soft_delete<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE families f SET deleted_at = $2, updated_at = $2 WHERE f.id = $1 AND {}",
            visible("f")
        );

        let result = sqlx::query(&query).bind(id).bind(at).execute(executor).await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_family_is_invisible() {
        let mut family = Family {
            id: Uuid::new_v4(),
            name: "Family".to_string(),
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(family.is_visible());

        family.deleted_at = Some(Utc::now());
        assert!(!family.is_visible());
    }
}
