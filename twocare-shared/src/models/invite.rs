/// Family invite model and database operations
///
/// An invite carries an opaque token, the role it grants and an expiry. It is
/// consumed exactly once: [`FamilyInvite::mark_used`] only succeeds while
/// `used_at IS NULL`, so of two concurrent redemptions only one can win.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE family_invites (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     token TEXT NOT NULL UNIQUE,
///     family_id UUID NOT NULL REFERENCES families(id) ON DELETE CASCADE,
///     role family_role NOT NULL DEFAULT 'VIEWER',
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     used_at TIMESTAMPTZ,
///     used_by UUID REFERENCES users(id) ON DELETE SET NULL
/// );
/// ```
///
/// # Lifecycle
///
/// ```text
/// Created ──accept──▶ Accepted (used_at, used_by set)
///    │
///    └──time passes──▶ Expired (accept fails)
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::family::Family;
use super::membership::{FamilyMember, FamilyRole};

const INVITE_COLUMNS: &str =
    "id, token, family_id, role, expires_at, created_by, created_at, used_at, used_by";

/// Invite model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FamilyInvite {
    pub id: Uuid,

    /// Opaque token embedded in the invite link
    pub token: String,

    pub family_id: Uuid,

    /// Role granted on acceptance
    pub role: FamilyRole,

    pub expires_at: DateTime<Utc>,

    pub created_by: Uuid,

    pub created_at: DateTime<Utc>,

    pub used_at: Option<DateTime<Utc>>,

    pub used_by: Option<Uuid>,
}

/// Input for creating an invite
#[derive(Debug, Clone)]
pub struct CreateInvite {
    pub token: String,
    pub family_id: Uuid,
    pub role: FamilyRole,
    pub expires_at: DateTime<Utc>,
    pub created_by: Uuid,
}

/// Invite with its family and that family's members
#[derive(Debug, Clone)]
pub struct InviteWithFamily {
    pub invite: FamilyInvite,
    pub family: Family,
    pub members: Vec<FamilyMember>,
}

impl FamilyInvite {
    /// Whether the invite has been consumed
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Whether the invite has expired at `now`; still valid at `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Creates an invite
    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, data: CreateInvite) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO family_invites (token, family_id, role, expires_at, created_by) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            INVITE_COLUMNS
        );

        sqlx::query_as::<_, FamilyInvite>(&query)
            .bind(data.token)
            .bind(data.family_id)
            .bind(data.role)
            .bind(data.expires_at)
            .bind(data.created_by)
            .fetch_one(executor)
            .await
    }

    /// Finds an invite by token
    pub async fn find_by_token<'e, E: PgExecutor<'e>>(
        executor: E,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM family_invites WHERE token = $1", INVITE_COLUMNS);

        sqlx::query_as::<_, FamilyInvite>(&query)
            .bind(token)
            .fetch_optional(executor)
            .await
    }

    /// Consumes an unused invite
    ///
    /// # Returns
    ///
    /// The updated invite, or `None` if it was already used (or does not exist)
    pub async fn mark_used<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE family_invites SET used_at = $3, used_by = $2 \
             WHERE id = $1 AND used_at IS NULL RETURNING {}",
            INVITE_COLUMNS
        );

        sqlx::query_as::<_, FamilyInvite>(&query)
            .bind(id)
            .bind(user_id)
            .bind(at)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_invite_state() {
        let now = Utc::now();
        let mut invite = FamilyInvite {
            id: Uuid::new_v4(),
            token: "token".to_string(),
            family_id: Uuid::new_v4(),
            role: FamilyRole::Caregiver,
            expires_at: now + Duration::hours(1),
            created_by: Uuid::new_v4(),
            created_at: now,
            used_at: None,
            used_by: None,
        };

        assert!(!invite.is_used());
        assert!(!invite.is_expired(now));
        assert!(invite.is_expired(now + Duration::hours(2)));

        assert!(!invite.is_expired(invite.expires_at));
        assert!(invite.is_expired(invite.expires_at + Duration::milliseconds(1)));

        invite.used_at = Some(now);
        assert!(invite.is_used());
    }
}
