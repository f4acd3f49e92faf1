/// Invite service
///
/// Invites grant a family role to whoever redeems the token first.
///
/// ```text
/// Created(expiresAt, role) ──join──▶ Accepted(usedAt, usedBy)
///        │                              ▲
///        ├──time passes──▶ Expired      └── a second join ─▶ Conflict
/// ```
///
/// Redemption checks run in a fixed order, each with its own error, and the
/// final write is one transaction whose conditional update settles races.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::access::{resolve_family_context, ResourceRef};
use super::families::{family_details, FamilyDetails};
use super::ServiceContext;
use crate::auth::authorization::authorize_invite_role;
use crate::auth::token::{generate_token, INVITE_TOKEN_LENGTH};
use crate::error::{ResourceKind, ServiceError, ServiceResult};
use crate::models::invite::CreateInvite;
use crate::models::membership::{find_member, FamilyRole};
use crate::models::SoftDelete;

/// Default invite lifetime (7 days)
pub const DEFAULT_INVITE_HOURS: i64 = 168;

/// Longest accepted invite lifetime (30 days)
pub const MAX_INVITE_HOURS: i64 = 720;

/// Body of `POST /v1/families/:id/invite`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteInput {
    /// Role granted on acceptance (default VIEWER)
    pub role: Option<FamilyRole>,

    #[validate(range(min = 1, max = "MAX_INVITE_HOURS", message = "expiresInHours must be between 1 and 720"))]
    pub expires_in_hours: Option<i64>,
}

/// Body of `POST /v1/families/join`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinFamilyInput {
    #[validate(length(min = 1, message = "token should not be empty"))]
    pub token: String,
}

/// Created invite as returned to the inviter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    pub invite_link: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues an invite; PRIMARY_PARENT or CO_PARENT
///
/// Only a PRIMARY_PARENT may issue an invite granting PRIMARY_PARENT.
pub async fn create_invite(
    ctx: &ServiceContext,
    user_id: Uuid,
    family_id: Uuid,
    input: CreateInviteInput,
) -> ServiceResult<InviteResponse> {
    input.validate()?;

    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Family(family_id), user_id).await?;
    let role = input.role.unwrap_or_default();
    authorize_invite_role(access.role(), role)?;

    let hours = input.expires_in_hours.unwrap_or(DEFAULT_INVITE_HOURS);
    let invite = ctx
        .store
        .create_invite(CreateInvite {
            token: generate_token(INVITE_TOKEN_LENGTH),
            family_id,
            role,
            expires_at: ctx.now() + Duration::hours(hours),
            created_by: user_id,
        })
        .await?;

    info!(
        family_id = %family_id,
        invite_id = %invite.id,
        role = role.as_str(),
        expires_in_hours = hours,
        "Invite created"
    );

    Ok(InviteResponse {
        invite_link: ctx.config.invite_link(&invite.token),
        token: invite.token,
        expires_at: invite.expires_at,
    })
}

/// Redeems an invite token and returns the joined family
///
/// # Errors
///
/// In check order:
/// 1. `NotFound(Invite)` for an unknown token
/// 2. `Conflict` if the invite was already used
/// 3. `BadRequest("This invite has expired")`
/// 4. `NotFound(Family)` if the family was deleted
/// 5. `Conflict` if the caller is already a member
pub async fn join_family(ctx: &ServiceContext, user_id: Uuid, input: JoinFamilyInput) -> ServiceResult<FamilyDetails> {
    input.validate()?;

    let found = ctx
        .store
        .find_invite_by_token(input.token.trim())
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Invite, "token"))?;
    let invite = found.invite;
    let now = ctx.now();

    if invite.is_used() {
        return Err(ServiceError::Conflict("This invite has already been used".to_string()));
    }
    if invite.is_expired(now) {
        return Err(ServiceError::BadRequest("This invite has expired".to_string()));
    }
    if !found.family.is_visible() {
        return Err(ServiceError::not_found(ResourceKind::Family, found.family.id));
    }
    if find_member(&found.members, user_id).is_some() {
        return Err(ServiceError::Conflict(
            "You are already a member of this family".to_string(),
        ));
    }

    let member = ctx.store.redeem_invite(&invite, user_id, now).await?;

    info!(
        family_id = %invite.family_id,
        user_id = %user_id,
        role = member.role.as_str(),
        "Invite redeemed"
    );

    family_details(ctx, found.family).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::Store;
    use crate::services::testing::{harness, Harness};

    async fn invite(h: &Harness, inviter: Uuid, family_id: Uuid, role: FamilyRole, hours: i64) -> InviteResponse {
        create_invite(
            &h.ctx,
            inviter,
            family_id,
            CreateInviteInput {
                role: Some(role),
                expires_in_hours: Some(hours),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_invite_defaults() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;

        let created = create_invite(&h.ctx, owner.id, family.id, CreateInviteInput::default())
            .await
            .unwrap();

        assert_eq!(created.token.len(), INVITE_TOKEN_LENGTH);
        assert_eq!(
            created.invite_link,
            format!("https://app.twocare.test/families/join/{}", created.token)
        );
        assert_eq!(created.expires_at, h.ctx.now() + Duration::hours(168));

        let joiner = h.user("joiner");
        let details = join_family(&h.ctx, joiner.id, JoinFamilyInput { token: created.token })
            .await
            .unwrap();
        let joined = details.members.iter().find(|m| m.member.user_id == joiner.id).unwrap();
        assert_eq!(joined.member.role, FamilyRole::Viewer);
    }

    #[tokio::test]
    async fn test_invite_lifetime_bounds() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;

        for hours in [0, MAX_INVITE_HOURS + 1] {
            let err = create_invite(
                &h.ctx,
                owner.id,
                family.id,
                CreateInviteInput {
                    role: None,
                    expires_in_hours: Some(hours),
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ServiceError::Invalid(_)));
        }
    }

    #[tokio::test]
    async fn test_invite_permissions() {
        let h = harness();
        let owner = h.user("owner");
        let co = h.user("co");
        let carer = h.user("carer");
        let family = h
            .family(&owner, &[(&co, FamilyRole::CoParent), (&carer, FamilyRole::Caregiver)])
            .await;

        let err = create_invite(&h.ctx, carer.id, family.id, CreateInviteInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(ref m) if m == "Only PRIMARY_PARENT or CO_PARENT can create invites"));

        let err = create_invite(
            &h.ctx,
            co.id,
            family.id,
            CreateInviteInput {
                role: Some(FamilyRole::PrimaryParent),
                expires_in_hours: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        invite(&h, owner.id, family.id, FamilyRole::PrimaryParent, 1).await;
    }

    #[tokio::test]
    async fn test_expired_invite_is_bad_request() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;
        let created = invite(&h, owner.id, family.id, FamilyRole::Caregiver, 1).await;

        h.clock.advance(Duration::hours(2));

        let joiner = h.user("joiner");
        let err = join_family(&h.ctx, joiner.id, JoinFamilyInput { token: created.token })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("expired")));
        assert_eq!(h.store.member_count(family.id), 1);
    }

    #[tokio::test]
    async fn test_invite_valid_until_its_expiry_instant() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;
        let first = invite(&h, owner.id, family.id, FamilyRole::Caregiver, 1).await;
        let second = invite(&h, owner.id, family.id, FamilyRole::Caregiver, 1).await;

        h.clock.advance(Duration::hours(1));
        assert_eq!(h.ctx.now(), first.expires_at);

        let on_time = h.user("on-time");
        join_family(&h.ctx, on_time.id, JoinFamilyInput { token: first.token })
            .await
            .unwrap();

        h.clock.advance(Duration::milliseconds(1));

        let late = h.user("late");
        let err = join_family(&h.ctx, late.id, JoinFamilyInput { token: second.token })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m == "This invite has expired"));
        assert_eq!(h.store.member_count(family.id), 2);
    }

    #[tokio::test]
    async fn test_join_check_order() {
        let h = harness();
        let owner = h.user("owner");
        let joiner = h.user("joiner");
        let family = h.family(&owner, &[]).await;

        let err = join_family(&h.ctx, joiner.id, JoinFamilyInput { token: "nope".to_string() })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid invite token");

        let created = invite(&h, owner.id, family.id, FamilyRole::Caregiver, 24).await;
        let err = join_family(&h.ctx, owner.id, JoinFamilyInput { token: created.token.clone() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ref m) if m == "You are already a member of this family"));

        join_family(&h.ctx, joiner.id, JoinFamilyInput { token: created.token.clone() })
            .await
            .unwrap();

        // used beats expired
        h.clock.advance(Duration::hours(48));
        let err = join_family(&h.ctx, h.user("late").id, JoinFamilyInput { token: created.token })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ref m) if m == "This invite has already been used"));
    }

    #[tokio::test]
    async fn test_invite_to_deleted_family_is_not_found() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;
        let created = invite(&h, owner.id, family.id, FamilyRole::Viewer, 24).await;
        h.store.soft_delete_family(family.id, h.ctx.now()).await.unwrap();

        let err = join_family(&h.ctx, h.user("joiner").id, JoinFamilyInput { token: created.token })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Family not found");
    }

    #[tokio::test]
    async fn test_concurrent_redemption_has_one_winner() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;
        let created = invite(&h, owner.id, family.id, FamilyRole::Caregiver, 24).await;

        let ctx = Arc::new(h.ctx.clone());
        let (first, second) = (h.user("first"), h.user("second"));

        let tasks: Vec<_> = [first.id, second.id]
            .into_iter()
            .map(|user_id| {
                let ctx = ctx.clone();
                let token = created.token.clone();
                tokio::spawn(async move { join_family(&ctx, user_id, JoinFamilyInput { token }).await })
            })
            .collect();

        let mut successes = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ServiceError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(h.store.member_count(family.id), 2);
    }
}
