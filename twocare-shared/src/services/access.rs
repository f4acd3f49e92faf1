/// Membership resolver
///
/// Turns a resource reference and a user into the owning family plus the
/// user's membership, in exactly one store lookup per resource kind:
///
/// | Reference  | Store call                  |
/// |------------|-----------------------------|
/// | `Family`   | `find_family_with_members`  |
/// | `Baby`     | `find_baby_with_family`     |
/// | `Activity` | `find_activity_with_family` |
///
/// Visibility is checked before membership, so a deleted or missing resource
/// is always `NotFound`, never `Forbidden`. For an activity the order is
/// activity exists, baby visible, family visible; for a baby it is baby
/// visible, family visible.

use uuid::Uuid;

use crate::auth::authorization::{authorize, AuthzError, Operation};
use crate::db::Store;
use crate::error::{ResourceKind, ServiceError, ServiceResult};
use crate::models::activity::Activity;
use crate::models::baby::Baby;
use crate::models::family::Family;
use crate::models::membership::{find_member, FamilyMember, FamilyRole};
use crate::models::SoftDelete;

/// A family-scoped resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    Family(Uuid),
    Baby(Uuid),
    Activity(Uuid),
}

/// Resolved ownership chain and the caller's membership
#[derive(Debug, Clone)]
pub struct FamilyContext {
    pub family: Family,
    pub baby: Option<Baby>,
    pub activity: Option<Activity>,

    /// The caller's membership row
    pub membership: FamilyMember,

    /// Every member of the family
    pub members: Vec<FamilyMember>,
}

impl FamilyContext {
    /// The caller's role in the family
    pub fn role(&self) -> FamilyRole {
        self.membership.role
    }

    /// Runs the permission matrix for the caller
    pub fn authorize(&self, operation: Operation, is_owner: bool) -> Result<(), AuthzError> {
        authorize(self.role(), operation, is_owner)
    }
}

fn visible_or_not_found<T: SoftDelete>(row: &T, kind: ResourceKind, id: Uuid) -> ServiceResult<()> {
    if row.is_visible() {
        Ok(())
    } else {
        Err(ServiceError::not_found(kind, id))
    }
}

fn membership_of(
    family: &Family,
    members: &[FamilyMember],
    user_id: Uuid,
) -> ServiceResult<FamilyMember> {
    find_member(members, user_id).cloned().ok_or_else(|| {
        AuthzError::NotMember {
            family_id: family.id,
        }
        .into()
    })
}

/// Resolves the family behind `resource` and the caller's membership in it
///
/// # Errors
///
/// - `NotFound` when the resource, its baby or its family is missing or soft-deleted
/// - `Forbidden("You are not a member of this family")` when the caller has no membership
pub async fn resolve_family_context(
    store: &dyn Store,
    resource: ResourceRef,
    user_id: Uuid,
) -> ServiceResult<FamilyContext> {
    let (family, baby, activity, members) = match resource {
        ResourceRef::Family(id) => {
            let found = store
                .find_family_with_members(id)
                .await?
                .ok_or_else(|| ServiceError::not_found(ResourceKind::Family, id))?;
            visible_or_not_found(&found.family, ResourceKind::Family, id)?;
            (found.family, None, None, found.members)
        }
        ResourceRef::Baby(id) => {
            let found = store
                .find_baby_with_family(id)
                .await?
                .ok_or_else(|| ServiceError::not_found(ResourceKind::Baby, id))?;
            visible_or_not_found(&found.baby, ResourceKind::Baby, id)?;
            visible_or_not_found(&found.family, ResourceKind::Family, found.family.id)?;
            (found.family, Some(found.baby), None, found.members)
        }
        ResourceRef::Activity(id) => {
            let found = store
                .find_activity_with_family(id)
                .await?
                .ok_or_else(|| ServiceError::not_found(ResourceKind::Activity, id))?;
            visible_or_not_found(&found.baby, ResourceKind::Baby, found.baby.id)?;
            visible_or_not_found(&found.family, ResourceKind::Family, found.family.id)?;
            (found.family, Some(found.baby), Some(found.activity), found.members)
        }
    };

    let membership = membership_of(&family, &members, user_id)?;

    Ok(FamilyContext {
        family,
        baby,
        activity,
        membership,
        members,
    })
}
