/// Persistence seam for the service layer
///
/// Every method returns exactly the shape its caller needs: the resolver's
/// point lookups bring back the resource together with its ownership chain
/// (`*_with_family`) in a single call, list methods apply soft-delete
/// visibility, and the two multi-row writes (`create_family_with_owner`,
/// `redeem_invite`) are atomic.
///
/// Point lookups by ID return soft-deleted rows as well so callers can tell
/// "deleted" apart from "never existed"; visibility is then decided with
/// [`crate::models::SoftDelete`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreResult;
use crate::models::activity::{Activity, ActivityFilter, ActivityWithFamily, CreateActivity, UpdateActivity};
use crate::models::baby::{Baby, BabyPhoto, BabyWithFamily, CreateBaby, CreateBabyPhoto, UpdateBaby};
use crate::models::family::{Family, FamilyWithMembers, UpdateFamily};
use crate::models::invite::{CreateInvite, FamilyInvite, InviteWithFamily};
use crate::models::membership::{FamilyMember, FamilyRole, MemberWithUser};
use crate::models::refresh_token::{CreateRefreshToken, RefreshToken};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::models::Page;

#[async_trait]
pub trait Store: Send + Sync {
    /// Verifies the backing store is reachable
    async fn health_check(&self) -> StoreResult<()>;

    // Users

    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Lookup by email; implementations normalize before comparing
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>>;

    // Refresh tokens

    async fn create_refresh_token(&self, data: CreateRefreshToken) -> StoreResult<RefreshToken>;

    async fn find_refresh_token(&self, id: Uuid) -> StoreResult<Option<RefreshToken>>;

    /// Revokes one token; false if it was already revoked or is unknown
    async fn revoke_refresh_token(&self, id: Uuid) -> StoreResult<bool>;

    /// Revokes every live token of a user and returns how many were revoked
    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64>;

    // Families

    /// Inserts a family and its PRIMARY_PARENT membership atomically
    async fn create_family_with_owner(&self, name: &str, owner_id: Uuid) -> StoreResult<FamilyWithMembers>;

    /// Family (deleted or not) with its members
    async fn find_family_with_members(&self, id: Uuid) -> StoreResult<Option<FamilyWithMembers>>;

    /// Visible families the user belongs to, newest first
    async fn list_families_for_user(&self, user_id: Uuid) -> StoreResult<Vec<FamilyWithMembers>>;

    async fn update_family(&self, id: Uuid, data: UpdateFamily) -> StoreResult<Option<Family>>;

    async fn soft_delete_family(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    // Members

    async fn list_members_with_users(&self, family_id: Uuid) -> StoreResult<Vec<MemberWithUser>>;

    async fn update_member_role(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        role: FamilyRole,
    ) -> StoreResult<Option<FamilyMember>>;

    // Babies

    async fn create_baby(&self, data: CreateBaby) -> StoreResult<Baby>;

    /// Baby (deleted or not) with its family and the family's members
    async fn find_baby_with_family(&self, id: Uuid) -> StoreResult<Option<BabyWithFamily>>;

    async fn list_babies_for_family(&self, family_id: Uuid) -> StoreResult<Vec<Baby>>;

    async fn list_babies_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Baby>>;

    async fn update_baby(&self, id: Uuid, data: UpdateBaby) -> StoreResult<Option<Baby>>;

    async fn soft_delete_baby(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Records a photo and makes it the baby's current `photo_url`, atomically
    async fn add_baby_photo(&self, data: CreateBabyPhoto) -> StoreResult<BabyPhoto>;

    async fn list_baby_photos(&self, baby_id: Uuid) -> StoreResult<Vec<BabyPhoto>>;

    // Activities

    async fn create_activity(&self, data: CreateActivity) -> StoreResult<Activity>;

    /// Activity with its baby, family and members
    async fn find_activity_with_family(&self, id: Uuid) -> StoreResult<Option<ActivityWithFamily>>;

    async fn update_activity(&self, id: Uuid, data: UpdateActivity) -> StoreResult<Option<Activity>>;

    async fn list_activities(&self, filter: &ActivityFilter, page: Page) -> StoreResult<Vec<Activity>>;

    async fn count_activities(&self, filter: &ActivityFilter) -> StoreResult<i64>;

    // Invites

    async fn create_invite(&self, data: CreateInvite) -> StoreResult<FamilyInvite>;

    /// Invite with its family (deleted or not) and members
    async fn find_invite_by_token(&self, token: &str) -> StoreResult<Option<InviteWithFamily>>;

    /// Consumes the invite and inserts the membership in one transaction
    ///
    /// # Errors
    ///
    /// - `StoreError::InviteAlreadyUsed` if another redemption won the race
    /// - `StoreError::UniqueViolation` if the user is already a member
    async fn redeem_invite(
        &self,
        invite: &FamilyInvite,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<FamilyMember>;
}
