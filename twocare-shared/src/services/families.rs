/// Family service
///
/// Families are the tenant boundary. Creating one makes the caller its
/// PRIMARY_PARENT; everything else goes through the membership resolver and
/// the permission matrix.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::access::{resolve_family_context, ResourceRef};
use super::{require_not_blank, ServiceContext};
use crate::auth::authorization::{authorize_role_change, Operation};
use crate::error::{ResourceKind, ServiceError, ServiceResult};
use crate::models::baby::Baby;
use crate::models::family::{Family, FamilyWithMembers, UpdateFamily};
use crate::models::membership::{find_member, FamilyMember, FamilyRole, MemberWithUser};

/// Body of `POST /v1/families`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFamilyInput {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
}

/// Body of `PATCH /v1/families/:id`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFamilyInput {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,
}

/// Body of `PATCH /v1/families/:id/members/:userId`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRoleInput {
    pub role: FamilyRole,
}

/// Family with member profiles and visible babies
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDetails {
    #[serde(flatten)]
    pub family: Family,

    pub members: Vec<MemberWithUser>,

    pub babies: Vec<Baby>,
}

/// Loads member profiles and babies for an already-authorized family
pub(crate) async fn family_details(ctx: &ServiceContext, family: Family) -> ServiceResult<FamilyDetails> {
    let (members, babies) = futures::try_join!(
        ctx.store.list_members_with_users(family.id),
        ctx.store.list_babies_for_family(family.id),
    )?;

    Ok(FamilyDetails {
        family,
        members,
        babies,
    })
}

/// Creates a family with the caller as PRIMARY_PARENT
pub async fn create_family(
    ctx: &ServiceContext,
    user_id: Uuid,
    input: CreateFamilyInput,
) -> ServiceResult<FamilyWithMembers> {
    input.validate()?;
    require_not_blank("name", &input.name)?;

    let created = ctx.store.create_family_with_owner(&input.name, user_id).await?;

    info!(family_id = %created.family.id, user_id = %user_id, "Family created");
    Ok(created)
}

/// Lists the visible families the caller belongs to
pub async fn list_families(ctx: &ServiceContext, user_id: Uuid) -> ServiceResult<Vec<FamilyWithMembers>> {
    Ok(ctx.store.list_families_for_user(user_id).await?)
}

/// Family with members and babies; any member may read
pub async fn get_family(ctx: &ServiceContext, user_id: Uuid, family_id: Uuid) -> ServiceResult<FamilyDetails> {
    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Family(family_id), user_id).await?;
    access.authorize(Operation::ReadFamily, false)?;

    family_details(ctx, access.family).await
}

/// Renames a family; PRIMARY_PARENT or CO_PARENT
pub async fn update_family(
    ctx: &ServiceContext,
    user_id: Uuid,
    family_id: Uuid,
    input: UpdateFamilyInput,
) -> ServiceResult<FamilyDetails> {
    input.validate()?;
    if let Some(name) = &input.name {
        require_not_blank("name", name)?;
    }

    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Family(family_id), user_id).await?;
    access.authorize(Operation::UpdateFamily, false)?;

    let family = ctx
        .store
        .update_family(family_id, UpdateFamily { name: input.name })
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Family, family_id))?;

    family_details(ctx, family).await
}

/// Soft-deletes a family; PRIMARY_PARENT only
pub async fn delete_family(ctx: &ServiceContext, user_id: Uuid, family_id: Uuid) -> ServiceResult<()> {
    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Family(family_id), user_id).await?;
    access.authorize(Operation::DeleteFamily, false)?;

    if !ctx.store.soft_delete_family(family_id, ctx.now()).await? {
        return Err(ServiceError::not_found(ResourceKind::Family, family_id));
    }

    info!(family_id = %family_id, user_id = %user_id, "Family deleted");
    Ok(())
}

/// Members with their profiles; any member may read
pub async fn list_members(
    ctx: &ServiceContext,
    user_id: Uuid,
    family_id: Uuid,
) -> ServiceResult<Vec<MemberWithUser>> {
    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Family(family_id), user_id).await?;
    access.authorize(Operation::ReadFamily, false)?;

    Ok(ctx.store.list_members_with_users(family_id).await?)
}

/// Changes another member's role
///
/// # Errors
///
/// - `Forbidden` per the matrix, the self-demotion lock and the
///   PRIMARY_PARENT grant/revoke rule
/// - `NotFound(Member)` when the target is not a member
pub async fn update_member_role(
    ctx: &ServiceContext,
    user_id: Uuid,
    family_id: Uuid,
    target_user_id: Uuid,
    input: UpdateMemberRoleInput,
) -> ServiceResult<FamilyMember> {
    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Family(family_id), user_id).await?;
    access.authorize(Operation::UpdateMemberRole, false)?;

    let target = find_member(&access.members, target_user_id)
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Member, target_user_id))?;

    authorize_role_change(user_id, access.role(), target_user_id, target.role, input.role)?;

    let updated = ctx
        .store
        .update_member_role(family_id, target_user_id, input.role)
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Member, target_user_id))?;

    info!(
        family_id = %family_id,
        target_user_id = %target_user_id,
        role = input.role.as_str(),
        "Member role changed"
    );
    Ok(updated)
}
