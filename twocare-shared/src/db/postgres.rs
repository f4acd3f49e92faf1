/// PostgreSQL implementation of [`Store`]
///
/// Thin composition of the model methods. Shape-returning lookups run their
/// queries on one pooled connection; atomic writes use `pool.begin()`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::store::Store;
use super::{StoreError, StoreResult};
use crate::models::activity::{Activity, ActivityFilter, ActivityWithFamily, CreateActivity, UpdateActivity};
use crate::models::baby::{Baby, BabyPhoto, BabyWithFamily, CreateBaby, CreateBabyPhoto, UpdateBaby};
use crate::models::family::{Family, FamilyWithMembers, UpdateFamily};
use crate::models::invite::{CreateInvite, FamilyInvite, InviteWithFamily};
use crate::models::membership::{CreateFamilyMember, FamilyMember, FamilyRole, MemberWithUser};
use crate::models::refresh_token::{CreateRefreshToken, RefreshToken};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::models::Page;

/// sqlx-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        super::pool::ping(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>> {
        if data.is_empty() {
            return self.find_user_by_id(id).await;
        }
        Ok(User::update(&self.pool, id, data).await?)
    }

    async fn create_refresh_token(&self, data: CreateRefreshToken) -> StoreResult<RefreshToken> {
        Ok(RefreshToken::create(&self.pool, data).await?)
    }

    async fn find_refresh_token(&self, id: Uuid) -> StoreResult<Option<RefreshToken>> {
        Ok(RefreshToken::find_by_id(&self.pool, id).await?)
    }

    async fn revoke_refresh_token(&self, id: Uuid) -> StoreResult<bool> {
        Ok(RefreshToken::revoke(&self.pool, id).await?)
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(RefreshToken::revoke_all_for_user(&self.pool, user_id).await?)
    }

    async fn create_family_with_owner(&self, name: &str, owner_id: Uuid) -> StoreResult<FamilyWithMembers> {
        let mut tx = self.pool.begin().await?;

        let family = Family::create(&mut *tx, name).await?;
        let owner = FamilyMember::create(
            &mut *tx,
            CreateFamilyMember {
                family_id: family.id,
                user_id: owner_id,
                role: FamilyRole::PrimaryParent,
            },
        )
        .await?;

        tx.commit().await?;

        debug!(family_id = %family.id, owner_id = %owner_id, "Created family with owner");
        Ok(FamilyWithMembers {
            family,
            members: vec![owner],
        })
    }

    async fn find_family_with_members(&self, id: Uuid) -> StoreResult<Option<FamilyWithMembers>> {
        let mut conn = self.pool.acquire().await?;

        let Some(family) = Family::find_by_id(&mut *conn, id).await? else {
            return Ok(None);
        };
        let members = FamilyMember::list_for_family(&mut *conn, id).await?;

        Ok(Some(FamilyWithMembers { family, members }))
    }

    async fn list_families_for_user(&self, user_id: Uuid) -> StoreResult<Vec<FamilyWithMembers>> {
        let mut conn = self.pool.acquire().await?;

        let families = Family::list_for_user(&mut *conn, user_id).await?;
        let ids: Vec<Uuid> = families.iter().map(|f| f.id).collect();
        let mut grouped: HashMap<Uuid, Vec<FamilyMember>> = HashMap::new();
        for member in FamilyMember::list_for_families(&mut *conn, &ids).await? {
            grouped.entry(member.family_id).or_default().push(member);
        }

        Ok(families
            .into_iter()
            .map(|family| {
                let members = grouped.remove(&family.id).unwrap_or_default();
                FamilyWithMembers { family, members }
            })
            .collect())
    }

    async fn update_family(&self, id: Uuid, data: UpdateFamily) -> StoreResult<Option<Family>> {
        Ok(Family::update(&self.pool, id, data).await?)
    }

    async fn soft_delete_family(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(Family::soft_delete(&self.pool, id, at).await?)
    }

    async fn list_members_with_users(&self, family_id: Uuid) -> StoreResult<Vec<MemberWithUser>> {
        Ok(FamilyMember::list_with_users(&self.pool, family_id).await?)
    }

    async fn update_member_role(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        role: FamilyRole,
    ) -> StoreResult<Option<FamilyMember>> {
        Ok(FamilyMember::update_role(&self.pool, family_id, user_id, role).await?)
    }

    async fn create_baby(&self, data: CreateBaby) -> StoreResult<Baby> {
        Ok(Baby::create(&self.pool, data).await?)
    }

    async fn find_baby_with_family(&self, id: Uuid) -> StoreResult<Option<BabyWithFamily>> {
        let mut conn = self.pool.acquire().await?;

        let Some(baby) = Baby::find_by_id(&mut *conn, id).await? else {
            return Ok(None);
        };
        let Some(family) = Family::find_by_id(&mut *conn, baby.family_id).await? else {
            return Ok(None);
        };
        let members = FamilyMember::list_for_family(&mut *conn, family.id).await?;

        Ok(Some(BabyWithFamily { baby, family, members }))
    }

    async fn list_babies_for_family(&self, family_id: Uuid) -> StoreResult<Vec<Baby>> {
        Ok(Baby::list_for_family(&self.pool, family_id).await?)
    }

    async fn list_babies_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Baby>> {
        Ok(Baby::list_for_user(&self.pool, user_id).await?)
    }

    async fn update_baby(&self, id: Uuid, data: UpdateBaby) -> StoreResult<Option<Baby>> {
        Ok(Baby::update(&self.pool, id, data).await?)
    }

    async fn soft_delete_baby(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(Baby::soft_delete(&self.pool, id, at).await?)
    }

    async fn add_baby_photo(&self, data: CreateBabyPhoto) -> StoreResult<BabyPhoto> {
        let mut tx = self.pool.begin().await?;

        let baby_id = data.baby_id;
        let photo = BabyPhoto::create(&mut *tx, data).await?;
        Baby::update(
            &mut *tx,
            baby_id,
            UpdateBaby {
                photo_url: Some(Some(photo.url.clone())),
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;
        Ok(photo)
    }

    async fn list_baby_photos(&self, baby_id: Uuid) -> StoreResult<Vec<BabyPhoto>> {
        Ok(BabyPhoto::list_for_baby(&self.pool, baby_id).await?)
    }

    async fn create_activity(&self, data: CreateActivity) -> StoreResult<Activity> {
        Ok(Activity::create(&self.pool, data).await?)
    }

    async fn find_activity_with_family(&self, id: Uuid) -> StoreResult<Option<ActivityWithFamily>> {
        let mut conn = self.pool.acquire().await?;

        let Some(activity) = Activity::find_by_id(&mut *conn, id).await? else {
            return Ok(None);
        };
        let Some(baby) = Baby::find_by_id(&mut *conn, activity.baby_id).await? else {
            return Ok(None);
        };
        let Some(family) = Family::find_by_id(&mut *conn, baby.family_id).await? else {
            return Ok(None);
        };
        let members = FamilyMember::list_for_family(&mut *conn, family.id).await?;

        Ok(Some(ActivityWithFamily {
            activity,
            baby,
            family,
            members,
        }))
    }

    async fn update_activity(&self, id: Uuid, data: UpdateActivity) -> StoreResult<Option<Activity>> {
        Ok(Activity::update(&self.pool, id, data).await?)
    }

    async fn list_activities(&self, filter: &ActivityFilter, page: Page) -> StoreResult<Vec<Activity>> {
        Ok(Activity::list(&self.pool, filter, page).await?)
    }

    async fn count_activities(&self, filter: &ActivityFilter) -> StoreResult<i64> {
        Ok(Activity::count(&self.pool, filter).await?)
    }

    async fn create_invite(&self, data: CreateInvite) -> StoreResult<FamilyInvite> {
        Ok(FamilyInvite::create(&self.pool, data).await?)
    }

    async fn find_invite_by_token(&self, token: &str) -> StoreResult<Option<InviteWithFamily>> {
        let mut conn = self.pool.acquire().await?;

        let Some(invite) = FamilyInvite::find_by_token(&mut *conn, token).await? else {
            return Ok(None);
        };
        let Some(family) = Family::find_by_id(&mut *conn, invite.family_id).await? else {
            return Ok(None);
        };
        let members = FamilyMember::list_for_family(&mut *conn, family.id).await?;

        Ok(Some(InviteWithFamily {
            invite,
            family,
            members,
        }))
    }

    async fn redeem_invite(
        &self,
        invite: &FamilyInvite,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<FamilyMember> {
        let mut tx = self.pool.begin().await?;

        if FamilyInvite::mark_used(&mut *tx, invite.id, user_id, at).await?.is_none() {
            return Err(StoreError::InviteAlreadyUsed);
        }

        let member = FamilyMember::create(
            &mut *tx,
            CreateFamilyMember {
                family_id: invite.family_id,
                user_id,
                role: invite.role,
            },
        )
        .await?;

        tx.commit().await?;

        debug!(invite_id = %invite.id, user_id = %user_id, "Redeemed invite");
        Ok(member)
    }
}
