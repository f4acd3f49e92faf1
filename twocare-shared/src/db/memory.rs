/// In-process implementation of [`Store`]
///
/// All state sits behind one mutex, so every method (including the atomic
/// ones) is linearizable. Ordering and visibility mirror the SQL in
/// [`crate::models`]. The resolver-facing lookups are recorded so tests can
/// assert how many round trips an operation made and of which shape.
///
/// # Example
///
/// ```
/// use twocare_shared::db::memory::{Lookup, MemoryStore};
/// use twocare_shared::db::Store;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), twocare_shared::db::StoreError> {
/// let store = MemoryStore::new();
/// let id = Uuid::new_v4();
/// assert!(store.find_family_with_members(id).await?.is_none());
/// assert_eq!(store.lookups(), vec![Lookup::FamilyWithMembers(id)]);
/// # Ok(())
/// # }
/// ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::Store;
use super::{StoreError, StoreResult};
use crate::models::activity::{Activity, ActivityFilter, ActivityWithFamily, CreateActivity, UpdateActivity};
use crate::models::baby::{Baby, BabyPhoto, BabyWithFamily, CreateBaby, CreateBabyPhoto, UpdateBaby};
use crate::models::family::{Family, FamilyWithMembers, UpdateFamily};
use crate::models::invite::{CreateInvite, FamilyInvite, InviteWithFamily};
use crate::models::membership::{FamilyMember, FamilyRole, MemberWithUser};
use crate::models::refresh_token::{CreateRefreshToken, RefreshToken};
use crate::models::user::{normalize_email, CreateUser, UpdateUser, User, UserRole, UserSummary};
use crate::models::{Page, SoftDelete};

const USERS_EMAIL_KEY: &str = "users_email_key";
const MEMBERS_FAMILY_USER_KEY: &str = "family_members_family_user_key";
const INVITES_TOKEN_KEY: &str = "family_invites_token_key";

/// A recorded resolver-facing lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    FamilyWithMembers(Uuid),
    BabyWithFamily(Uuid),
    ActivityWithFamily(Uuid),
    InviteByToken,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    refresh_tokens: Vec<RefreshToken>,
    families: Vec<Family>,
    members: Vec<FamilyMember>,
    babies: Vec<Baby>,
    photos: Vec<BabyPhoto>,
    activities: Vec<Activity>,
    invites: Vec<FamilyInvite>,
    lookups: Vec<Lookup>,
}

impl State {
    fn members_of(&self, family_id: Uuid) -> Vec<FamilyMember> {
        self.members
            .iter()
            .filter(|m| m.family_id == family_id)
            .cloned()
            .collect()
    }

    fn family(&self, id: Uuid) -> Option<&Family> {
        self.families.iter().find(|f| f.id == id)
    }

    fn baby(&self, id: Uuid) -> Option<&Baby> {
        self.babies.iter().find(|b| b.id == id)
    }

    fn is_member(&self, family_id: Uuid, user_id: Uuid) -> bool {
        self.members
            .iter()
            .any(|m| m.family_id == family_id && m.user_id == user_id)
    }

    fn visible_family(&self, id: Uuid) -> bool {
        self.family(id).is_some_and(|f| f.is_visible())
    }
}

/// Mutex-guarded in-memory store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lookups recorded since creation or the last [`MemoryStore::clear_lookups`]
    pub fn lookups(&self) -> Vec<Lookup> {
        self.lock().lookups.clone()
    }

    pub fn clear_lookups(&self) {
        self.lock().lookups.clear();
    }

    /// Inserts a user directly, bypassing the unique-email check
    pub fn insert_user(&self, email: &str, first_name: &str, password_hash: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash: password_hash.to_string(),
            first_name: first_name.to_string(),
            last_name: None,
            role: UserRole::Parent,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().users.push(user.clone());
        user
    }

    /// Adds a membership directly, bypassing invites
    pub fn insert_member(&self, family_id: Uuid, user_id: Uuid, role: FamilyRole) -> FamilyMember {
        let member = FamilyMember {
            id: Uuid::new_v4(),
            family_id,
            user_id,
            role,
            created_at: Utc::now(),
        };
        self.lock().members.push(member.clone());
        member
    }

    /// Removes a membership; there is no service operation for this
    pub fn remove_member(&self, family_id: Uuid, user_id: Uuid) -> bool {
        let mut state = self.lock();
        let before = state.members.len();
        state
            .members
            .retain(|m| !(m.family_id == family_id && m.user_id == user_id));
        state.members.len() != before
    }

    /// Number of membership rows for a family, deleted or not
    pub fn member_count(&self, family_id: Uuid) -> usize {
        self.lock().members_of(family_id).len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut state = self.lock();
        let email = normalize_email(&data.email);
        if state.users.iter().any(|u| u.email == email) {
            return Err(StoreError::UniqueViolation(USERS_EMAIL_KEY.to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: data.password_hash,
            first_name: data.first_name.trim().to_string(),
            last_name: data.last_name.map(|n| n.trim().to_string()),
            role: UserRole::Parent,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>> {
        let mut state = self.lock();
        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        if data.is_empty() {
            return Ok(Some(user.clone()));
        }
        if let Some(first_name) = data.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = data.last_name {
            user.last_name = last_name;
        }
        if let Some(avatar_url) = data.avatar_url {
            user.avatar_url = avatar_url;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn create_refresh_token(&self, data: CreateRefreshToken) -> StoreResult<RefreshToken> {
        let token = RefreshToken {
            id: data.id,
            user_id: data.user_id,
            token_hash: data.token_hash,
            expires_at: data.expires_at,
            revoked: false,
            created_at: Utc::now(),
        };
        self.lock().refresh_tokens.push(token.clone());
        Ok(token)
    }

    async fn find_refresh_token(&self, id: Uuid) -> StoreResult<Option<RefreshToken>> {
        Ok(self.lock().refresh_tokens.iter().find(|t| t.id == id).cloned())
    }

    async fn revoke_refresh_token(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.refresh_tokens.iter_mut().find(|t| t.id == id && !t.revoked) {
            Some(token) => {
                token.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut state = self.lock();
        let mut revoked = 0;
        for token in state
            .refresh_tokens
            .iter_mut()
            .filter(|t| t.user_id == user_id && !t.revoked)
        {
            token.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn create_family_with_owner(&self, name: &str, owner_id: Uuid) -> StoreResult<FamilyWithMembers> {
        let mut state = self.lock();
        let now = Utc::now();
        let family = Family {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        let owner = FamilyMember {
            id: Uuid::new_v4(),
            family_id: family.id,
            user_id: owner_id,
            role: FamilyRole::PrimaryParent,
            created_at: now,
        };
        state.families.push(family.clone());
        state.members.push(owner.clone());

        Ok(FamilyWithMembers {
            family,
            members: vec![owner],
        })
    }

    async fn find_family_with_members(&self, id: Uuid) -> StoreResult<Option<FamilyWithMembers>> {
        let mut state = self.lock();
        state.lookups.push(Lookup::FamilyWithMembers(id));

        Ok(state.family(id).cloned().map(|family| FamilyWithMembers {
            members: state.members_of(id),
            family,
        }))
    }

    async fn list_families_for_user(&self, user_id: Uuid) -> StoreResult<Vec<FamilyWithMembers>> {
        let state = self.lock();
        Ok(state
            .families
            .iter()
            .rev()
            .filter(|f| f.is_visible() && state.is_member(f.id, user_id))
            .map(|f| FamilyWithMembers {
                family: f.clone(),
                members: state.members_of(f.id),
            })
            .collect())
    }

    async fn update_family(&self, id: Uuid, data: UpdateFamily) -> StoreResult<Option<Family>> {
        let mut state = self.lock();
        let Some(family) = state.families.iter_mut().find(|f| f.id == id && f.is_visible()) else {
            return Ok(None);
        };
        if let Some(name) = data.name {
            family.name = name.trim().to_string();
        }
        family.updated_at = Utc::now();
        Ok(Some(family.clone()))
    }

    async fn soft_delete_family(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.families.iter_mut().find(|f| f.id == id && f.is_visible()) {
            Some(family) => {
                family.deleted_at = Some(at);
                family.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_members_with_users(&self, family_id: Uuid) -> StoreResult<Vec<MemberWithUser>> {
        let state = self.lock();
        Ok(state
            .members_of(family_id)
            .into_iter()
            .filter_map(|member| {
                let user = state.users.iter().find(|u| u.id == member.user_id)?;
                Some(MemberWithUser {
                    user: UserSummary::from(user),
                    member,
                })
            })
            .collect())
    }

    async fn update_member_role(
        &self,
        family_id: Uuid,
        user_id: Uuid,
        role: FamilyRole,
    ) -> StoreResult<Option<FamilyMember>> {
        let mut state = self.lock();
        Ok(state
            .members
            .iter_mut()
            .find(|m| m.family_id == family_id && m.user_id == user_id)
            .map(|member| {
                member.role = role;
                member.clone()
            }))
    }

    async fn create_baby(&self, data: CreateBaby) -> StoreResult<Baby> {
        let now = Utc::now();
        let baby = Baby {
            id: Uuid::new_v4(),
            family_id: data.family_id,
            name: data.name.trim().to_string(),
            date_of_birth: data.date_of_birth,
            gender: data.gender,
            photo_url: data.photo_url,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().babies.push(baby.clone());
        Ok(baby)
    }

    async fn find_baby_with_family(&self, id: Uuid) -> StoreResult<Option<BabyWithFamily>> {
        let mut state = self.lock();
        state.lookups.push(Lookup::BabyWithFamily(id));

        let Some(baby) = state.baby(id).cloned() else {
            return Ok(None);
        };
        let Some(family) = state.family(baby.family_id).cloned() else {
            return Ok(None);
        };
        let members = state.members_of(family.id);

        Ok(Some(BabyWithFamily { baby, family, members }))
    }

    async fn list_babies_for_family(&self, family_id: Uuid) -> StoreResult<Vec<Baby>> {
        Ok(self
            .lock()
            .babies
            .iter()
            .filter(|b| b.family_id == family_id && b.is_visible())
            .cloned()
            .collect())
    }

    async fn list_babies_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Baby>> {
        let state = self.lock();
        Ok(state
            .babies
            .iter()
            .filter(|b| {
                b.is_visible() && state.visible_family(b.family_id) && state.is_member(b.family_id, user_id)
            })
            .cloned()
            .collect())
    }

    async fn update_baby(&self, id: Uuid, data: UpdateBaby) -> StoreResult<Option<Baby>> {
        let mut state = self.lock();
        let Some(baby) = state.babies.iter_mut().find(|b| b.id == id && b.is_visible()) else {
            return Ok(None);
        };
        if let Some(name) = data.name {
            baby.name = name.trim().to_string();
        }
        if let Some(date_of_birth) = data.date_of_birth {
            baby.date_of_birth = date_of_birth;
        }
        if let Some(gender) = data.gender {
            baby.gender = gender;
        }
        if let Some(photo_url) = data.photo_url {
            baby.photo_url = photo_url;
        }
        baby.updated_at = Utc::now();
        Ok(Some(baby.clone()))
    }

    async fn soft_delete_baby(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.babies.iter_mut().find(|b| b.id == id && b.is_visible()) {
            Some(baby) => {
                baby.deleted_at = Some(at);
                baby.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_baby_photo(&self, data: CreateBabyPhoto) -> StoreResult<BabyPhoto> {
        let mut state = self.lock();
        let photo = BabyPhoto {
            id: Uuid::new_v4(),
            baby_id: data.baby_id,
            url: data.url,
            uploaded_by: data.uploaded_by,
            created_at: Utc::now(),
        };
        if let Some(baby) = state.babies.iter_mut().find(|b| b.id == data.baby_id && b.is_visible()) {
            baby.photo_url = Some(photo.url.clone());
            baby.updated_at = photo.created_at;
        }
        state.photos.push(photo.clone());
        Ok(photo)
    }

    async fn list_baby_photos(&self, baby_id: Uuid) -> StoreResult<Vec<BabyPhoto>> {
        Ok(self
            .lock()
            .photos
            .iter()
            .rev()
            .filter(|p| p.baby_id == baby_id)
            .cloned()
            .collect())
    }

    async fn create_activity(&self, data: CreateActivity) -> StoreResult<Activity> {
        let now = Utc::now();
        let activity = Activity {
            id: Uuid::new_v4(),
            baby_id: data.baby_id,
            user_id: data.user_id,
            activity_type: data.activity_type,
            timestamp: data.timestamp,
            notes: data.notes,
            metadata: data.metadata,
            created_at: now,
            updated_at: now,
        };
        self.lock().activities.push(activity.clone());
        Ok(activity)
    }

    async fn find_activity_with_family(&self, id: Uuid) -> StoreResult<Option<ActivityWithFamily>> {
        let mut state = self.lock();
        state.lookups.push(Lookup::ActivityWithFamily(id));

        let Some(activity) = state.activities.iter().find(|a| a.id == id).cloned() else {
            return Ok(None);
        };
        let Some(baby) = state.baby(activity.baby_id).cloned() else {
            return Ok(None);
        };
        let Some(family) = state.family(baby.family_id).cloned() else {
            return Ok(None);
        };
        let members = state.members_of(family.id);

        Ok(Some(ActivityWithFamily {
            activity,
            baby,
            family,
            members,
        }))
    }

    async fn update_activity(&self, id: Uuid, data: UpdateActivity) -> StoreResult<Option<Activity>> {
        let mut state = self.lock();
        let Some(activity) = state.activities.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(activity_type) = data.activity_type {
            activity.activity_type = activity_type;
        }
        if let Some(timestamp) = data.timestamp {
            activity.timestamp = timestamp;
        }
        if let Some(notes) = data.notes {
            activity.notes = notes;
        }
        if let Some(metadata) = data.metadata {
            activity.metadata = Some(metadata);
        }
        activity.updated_at = Utc::now();
        Ok(Some(activity.clone()))
    }

    async fn list_activities(&self, filter: &ActivityFilter, page: Page) -> StoreResult<Vec<Activity>> {
        let state = self.lock();
        let mut matching: Vec<Activity> = state
            .activities
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_activities(&self, filter: &ActivityFilter) -> StoreResult<i64> {
        let count = self.lock().activities.iter().filter(|a| filter.matches(a)).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn create_invite(&self, data: CreateInvite) -> StoreResult<FamilyInvite> {
        let mut state = self.lock();
        if state.invites.iter().any(|i| i.token == data.token) {
            return Err(StoreError::UniqueViolation(INVITES_TOKEN_KEY.to_string()));
        }

        let invite = FamilyInvite {
            id: Uuid::new_v4(),
            token: data.token,
            family_id: data.family_id,
            role: data.role,
            expires_at: data.expires_at,
            created_by: data.created_by,
            created_at: Utc::now(),
            used_at: None,
            used_by: None,
        };
        state.invites.push(invite.clone());
        Ok(invite)
    }

    async fn find_invite_by_token(&self, token: &str) -> StoreResult<Option<InviteWithFamily>> {
        let mut state = self.lock();
        state.lookups.push(Lookup::InviteByToken);

        let Some(invite) = state.invites.iter().find(|i| i.token == token).cloned() else {
            return Ok(None);
        };
        let Some(family) = state.family(invite.family_id).cloned() else {
            return Ok(None);
        };
        let members = state.members_of(family.id);

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
        let mut state = self.lock();

        let Some(stored) = state
            .invites
            .iter()
            .position(|i| i.id == invite.id && i.used_at.is_none())
        else {
            return Err(StoreError::InviteAlreadyUsed);
        };
        if state.is_member(invite.family_id, user_id) {
            return Err(StoreError::UniqueViolation(MEMBERS_FAMILY_USER_KEY.to_string()));
        }

        state.invites[stored].used_at = Some(at);
        state.invites[stored].used_by = Some(user_id);

        let member = FamilyMember {
            id: Uuid::new_v4(),
            family_id: invite.family_id,
            user_id,
            role: invite.role,
            created_at: at,
        };
        state.members.push(member.clone());
        Ok(member)
    }
}
