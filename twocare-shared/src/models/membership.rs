/// Family membership model and database operations
///
/// Memberships link users to families with a role. Exactly one row exists
/// per (family, user); the unique constraint is what makes a concurrent
/// second join fail.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE family_role AS ENUM ('PRIMARY_PARENT', 'CO_PARENT', 'CAREGIVER', 'VIEWER');
///
/// CREATE TABLE family_members (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     family_id UUID NOT NULL REFERENCES families(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role family_role NOT NULL DEFAULT 'VIEWER',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT family_members_family_user_key UNIQUE (family_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **PRIMARY_PARENT**: Full control, including deleting the family and babies
/// - **CO_PARENT**: Manages babies, invites and member roles
/// - **CAREGIVER**: Logs activities
/// - **VIEWER**: Read-only access
///
/// The actual rules live in [`crate::auth::authorization`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::user::UserSummary;

/// Role of a user within one family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "family_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FamilyRole {
    PrimaryParent,
    CoParent,
    Caregiver,
    Viewer,
}

impl FamilyRole {
    /// Every role
    pub const ALL: [FamilyRole; 4] = [
        FamilyRole::PrimaryParent,
        FamilyRole::CoParent,
        FamilyRole::Caregiver,
        FamilyRole::Viewer,
    ];

    /// Converts role to its wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyRole::PrimaryParent => "PRIMARY_PARENT",
            FamilyRole::CoParent => "CO_PARENT",
            FamilyRole::Caregiver => "CAREGIVER",
            FamilyRole::Viewer => "VIEWER",
        }
    }
}

impl Default for FamilyRole {
    fn default() -> Self {
        FamilyRole::Viewer
    }
}

/// Membership row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: Uuid,

    pub family_id: Uuid,

    pub user_id: Uuid,

    pub role: FamilyRole,

    /// When the user joined
    pub created_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone)]
pub struct CreateFamilyMember {
    pub family_id: Uuid,
    pub user_id: Uuid,
    pub role: FamilyRole,
}

/// Membership with the member's public profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberWithUser {
    #[serde(flatten)]
    pub member: FamilyMember,

    pub user: UserSummary,
}

#[derive(sqlx::FromRow)]
struct MemberUserRow {
    id: Uuid,
    family_id: Uuid,
    user_id: Uuid,
    role: FamilyRole,
    created_at: DateTime<Utc>,
    email: String,
    first_name: String,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<MemberUserRow> for MemberWithUser {
    fn from(row: MemberUserRow) -> Self {
        Self {
            member: FamilyMember {
                id: row.id,
                family_id: row.family_id,
                user_id: row.user_id,
                role: row.role,
                created_at: row.created_at,
            },
            user: UserSummary {
                id: row.user_id,
                email: row.email,
                first_name: row.first_name,
                last_name: row.last_name,
                avatar_url: row.avatar_url,
            },
        }
    }
}

impl FamilyMember {
    /// Adds a user to a family
    ///
    /// # Errors
    ///
    /// Fails with a unique violation (`family_members_family_user_key`) if the
    /// user is already a member.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: CreateFamilyMember,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, FamilyMember>(
            r#"
            INSERT INTO family_members (family_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING id, family_id, user_id, role, created_at
            "#,
        )
        .bind(data.family_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(executor)
        .await
    }

    /// Lists the members of one family, oldest first
    pub async fn list_for_family<'e, E: PgExecutor<'e>>(
        executor: E,
        family_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FamilyMember>(
            r#"
            SELECT id, family_id, user_id, role, created_at
            FROM family_members
            WHERE family_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(family_id)
        .fetch_all(executor)
        .await
    }

    /// Lists the members of several families at once
    pub async fn list_for_families<'e, E: PgExecutor<'e>>(
        executor: E,
        family_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, FamilyMember>(
            r#"
            SELECT id, family_id, user_id, role, created_at
            FROM family_members
            WHERE family_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(family_ids)
        .fetch_all(executor)
        .await
    }

    /// Lists members joined with their user profiles
    pub async fn list_with_users<'e, E: PgExecutor<'e>>(
        executor: E,
        family_id: Uuid,
    ) -> Result<Vec<MemberWithUser>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MemberUserRow>(
            r#"
            SELECT m.id, m.family_id, m.user_id, m.role, m.created_at,
                   u.email, u.first_name, u.last_name, u.avatar_url
            FROM family_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.family_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(family_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(MemberWithUser::from).collect())
    }

    /// Changes a member's role
    ///
    /// # Returns
    ///
    /// The updated membership, or `None` if the user is not a member
    pub async fn update_role<'e, E: PgExecutor<'e>>(
        executor: E,
        family_id: Uuid,
        user_id: Uuid,
        role: FamilyRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, FamilyMember>(
            r#"
            UPDATE family_members
            SET role = $3
            WHERE family_id = $1 AND user_id = $2
            RETURNING id, family_id, user_id, role, created_at
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(executor)
        .await
    }
}

/// Finds `user_id`'s membership among already-loaded members
pub fn find_member(members: &[FamilyMember], user_id: Uuid) -> Option<&FamilyMember> {
    members.iter().find(|m| m.user_id == user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        for role in FamilyRole::ALL {
            let json = serde_json::to_value(role).unwrap();
            assert_eq!(json, role.as_str());
        }
        assert_eq!(FamilyRole::default(), FamilyRole::Viewer);
    }

    #[test]
    fn test_find_member() {
        let family_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let members = vec![FamilyMember {
            id: Uuid::new_v4(),
            family_id,
            user_id,
            role: FamilyRole::Caregiver,
            created_at: Utc::now(),
        }];

        assert_eq!(find_member(&members, user_id).map(|m| m.role), Some(FamilyRole::Caregiver));
        assert!(find_member(&members, Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_member_with_user_serializes_flat() {
        let user_id = Uuid::new_v4();
        let entry = MemberWithUser {
            member: FamilyMember {
                id: Uuid::new_v4(),
                family_id: Uuid::new_v4(),
                user_id,
                role: FamilyRole::CoParent,
                created_at: Utc::now(),
            },
            user: UserSummary {
                id: user_id,
                email: "ana@example.com".to_string(),
                first_name: "Ana".to_string(),
                last_name: None,
                avatar_url: None,
            },
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["role"], "CO_PARENT");
        assert_eq!(json["userId"], user_id.to_string());
        assert_eq!(json["user"]["firstName"], "Ana");
    }
}
