/// Baby service
///
/// A baby belongs to one family for life. PRIMARY_PARENT and CO_PARENT
/// manage profiles and photos, only PRIMARY_PARENT deletes, every member
/// reads.

use bytes::Bytes;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::access::{resolve_family_context, ResourceRef};
use super::{present, require_not_blank, ServiceContext};
use crate::auth::authorization::Operation;
use crate::error::{ResourceKind, ServiceError, ServiceResult};
use crate::models::baby::{Baby, BabyPhoto, CreateBaby, CreateBabyPhoto, Gender, UpdateBaby};
use crate::storage::{validate_image, BABIES_BUCKET};

/// Body of `POST /v1/babies`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBabyInput {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    pub date_of_birth: NaiveDate,

    pub gender: Option<Gender>,

    pub family_id: Uuid,

    #[validate(url(message = "photoUrl must be a URL"))]
    pub photo_url: Option<String>,
}

/// Body of `PATCH /v1/babies/:id`; `familyId` cannot change
///
/// `gender: null` and `photoUrl: null` clear those fields.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBabyInput {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    pub date_of_birth: Option<NaiveDate>,

    #[serde(default, deserialize_with = "present")]
    pub gender: Option<Option<Gender>>,

    #[serde(default, deserialize_with = "present")]
    #[validate(url(message = "photoUrl must be a URL"))]
    pub photo_url: Option<Option<String>>,
}

/// Adds a baby to a family; PRIMARY_PARENT or CO_PARENT
pub async fn create_baby(ctx: &ServiceContext, user_id: Uuid, input: CreateBabyInput) -> ServiceResult<Baby> {
    input.validate()?;
    require_not_blank("name", &input.name)?;

    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Family(input.family_id), user_id).await?;
    access.authorize(Operation::CreateBaby, false)?;

    let baby = ctx
        .store
        .create_baby(CreateBaby {
            family_id: input.family_id,
            name: input.name,
            date_of_birth: input.date_of_birth,
            gender: input.gender,
            photo_url: input.photo_url,
        })
        .await?;

    info!(baby_id = %baby.id, family_id = %baby.family_id, "Baby created");
    Ok(baby)
}

/// Visible babies across every visible family of the caller
pub async fn list_babies(ctx: &ServiceContext, user_id: Uuid) -> ServiceResult<Vec<Baby>> {
    Ok(ctx.store.list_babies_for_user(user_id).await?)
}

pub async fn get_baby(ctx: &ServiceContext, user_id: Uuid, baby_id: Uuid) -> ServiceResult<Baby> {
    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Baby(baby_id), user_id).await?;
    access.authorize(Operation::ReadBaby, false)?;

    access
        .baby
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Baby, baby_id))
}

/// Partially updates a baby; PRIMARY_PARENT or CO_PARENT
pub async fn update_baby(
    ctx: &ServiceContext,
    user_id: Uuid,
    baby_id: Uuid,
    input: UpdateBabyInput,
) -> ServiceResult<Baby> {
    input.validate()?;
    if let Some(name) = &input.name {
        require_not_blank("name", name)?;
    }

    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Baby(baby_id), user_id).await?;
    access.authorize(Operation::UpdateBaby, false)?;

    ctx.store
        .update_baby(
            baby_id,
            UpdateBaby {
                name: input.name,
                date_of_birth: input.date_of_birth,
                gender: input.gender,
                photo_url: input.photo_url,
            },
        )
        .await?
        .ok_or_else(|| ServiceError::not_found(ResourceKind::Baby, baby_id))
}

/// Soft-deletes a baby; PRIMARY_PARENT only
pub async fn delete_baby(ctx: &ServiceContext, user_id: Uuid, baby_id: Uuid) -> ServiceResult<()> {
    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Baby(baby_id), user_id).await?;
    access.authorize(Operation::DeleteBaby, false)?;

    if !ctx.store.soft_delete_baby(baby_id, ctx.now()).await? {
        return Err(ServiceError::not_found(ResourceKind::Baby, baby_id));
    }

    info!(baby_id = %baby_id, user_id = %user_id, "Baby deleted");
    Ok(())
}

/// Uploads a photo and makes it the baby's current photo
///
/// Counts as a baby update for authorization.
pub async fn upload_baby_photo(
    ctx: &ServiceContext,
    user_id: Uuid,
    baby_id: Uuid,
    data: Bytes,
    content_type: &str,
) -> ServiceResult<BabyPhoto> {
    let extension = validate_image(content_type, data.len(), ctx.config.storage.max_file_size)?;

    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Baby(baby_id), user_id).await?;
    access.authorize(Operation::UpdateBaby, false)?;

    let path = format!(
        "{}/{}-{}.{}",
        baby_id,
        ctx.now().timestamp_millis(),
        Uuid::new_v4().simple(),
        extension
    );
    let url = ctx.storage.upload(BABIES_BUCKET, &path, data, content_type).await?;

    let photo = ctx
        .store
        .add_baby_photo(CreateBabyPhoto {
            baby_id,
            url,
            uploaded_by: user_id,
        })
        .await?;

    info!(baby_id = %baby_id, photo_id = %photo.id, "Baby photo uploaded");
    Ok(photo)
}

/// Photos of a baby, newest first; any member
pub async fn list_baby_photos(ctx: &ServiceContext, user_id: Uuid, baby_id: Uuid) -> ServiceResult<Vec<BabyPhoto>> {
    let access = resolve_family_context(ctx.store.as_ref(), ResourceRef::Baby(baby_id), user_id).await?;
    access.authorize(Operation::ReadBaby, false)?;

    Ok(ctx.store.list_baby_photos(baby_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::membership::FamilyRole;
    use crate::services::families::{delete_family, get_family};
    use crate::services::testing::harness;

    fn input(family_id: Uuid) -> CreateBabyInput {
        CreateBabyInput {
            name: "Ada".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            gender: Some(Gender::Female),
            family_id,
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn test_viewer_cannot_add_babies() {
        let h = harness();
        let owner = h.user("owner");
        let viewer = h.user("viewer");
        let family = h.family(&owner, &[(&viewer, FamilyRole::Viewer)]).await;

        let err = create_baby(&h.ctx, viewer.id, input(family.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(ref m) if m == "Only PRIMARY_PARENT or CO_PARENT can add babies"));

        let baby = create_baby(&h.ctx, owner.id, input(family.id)).await.unwrap();
        assert_eq!(baby.family_id, family.id);
    }

    #[tokio::test]
    async fn test_non_member_is_forbidden_everywhere() {
        let h = harness();
        let owner = h.user("owner");
        let stranger = h.user("stranger");
        let family = h.family(&owner, &[]).await;
        let baby = h.baby(&family).await;

        let results = vec![
            create_baby(&h.ctx, stranger.id, input(family.id)).await.map(|_| ()),
            get_baby(&h.ctx, stranger.id, baby.id).await.map(|_| ()),
            update_baby(&h.ctx, stranger.id, baby.id, UpdateBabyInput::default())
                .await
                .map(|_| ()),
            delete_baby(&h.ctx, stranger.id, baby.id).await,
            list_baby_photos(&h.ctx, stranger.id, baby.id).await.map(|_| ()),
            upload_baby_photo(&h.ctx, stranger.id, baby.id, Bytes::from_static(b"img"), "image/png")
                .await
                .map(|_| ()),
        ];

        for result in results {
            assert!(matches!(result, Err(ServiceError::Forbidden(ref m)) if m == "You are not a member of this family"));
        }
        assert!(list_babies(&h.ctx, stranger.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_baby_rules() {
        let h = harness();
        let owner = h.user("owner");
        let co = h.user("co");
        let family = h.family(&owner, &[(&co, FamilyRole::CoParent)]).await;
        let baby = h.baby(&family).await;

        let err = delete_baby(&h.ctx, co.id, baby.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(ref m) if m == "Only PRIMARY_PARENT can delete babies"));

        delete_baby(&h.ctx, owner.id, baby.id).await.unwrap();

        for user in [&owner, &co] {
            let err = get_baby(&h.ctx, user.id, baby.id).await.unwrap_err();
            assert_eq!(err.to_string(), "Baby not found");
        }
        assert!(list_babies(&h.ctx, owner.id).await.unwrap().is_empty());
        assert!(get_family(&h.ctx, owner.id, family.id).await.unwrap().babies.is_empty());
    }

    #[tokio::test]
    async fn test_babies_of_deleted_family_disappear() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;
        let baby = h.baby(&family).await;
        assert_eq!(list_babies(&h.ctx, owner.id).await.unwrap().len(), 1);

        delete_family(&h.ctx, owner.id, family.id).await.unwrap();

        assert!(list_babies(&h.ctx, owner.id).await.unwrap().is_empty());
        let err = update_baby(&h.ctx, owner.id, baby.id, UpdateBabyInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;
        let baby = create_baby(&h.ctx, owner.id, input(family.id)).await.unwrap();

        let updated = update_baby(
            &h.ctx,
            owner.id,
            baby.id,
            UpdateBabyInput {
                name: Some("Ada Lovelace".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Ada Lovelace");
        assert_eq!(updated.date_of_birth, baby.date_of_birth);
        assert_eq!(updated.gender, Some(Gender::Female));
        assert_eq!(updated.family_id, family.id);
    }

    #[tokio::test]
    async fn test_update_with_null_clears_optional_fields() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;
        let baby = create_baby(
            &h.ctx,
            owner.id,
            CreateBabyInput {
                photo_url: Some("https://cdn.twocare.test/ada.jpg".to_string()),
                ..input(family.id)
            },
        )
        .await
        .unwrap();

        let rename: UpdateBabyInput = serde_json::from_value(serde_json::json!({"name": "Ada L"})).unwrap();
        let updated = update_baby(&h.ctx, owner.id, baby.id, rename).await.unwrap();
        assert_eq!(updated.gender, Some(Gender::Female));
        assert!(updated.photo_url.is_some());

        let clear: UpdateBabyInput =
            serde_json::from_value(serde_json::json!({"gender": null, "photoUrl": null})).unwrap();
        assert_eq!(clear.gender, Some(None));
        let updated = update_baby(&h.ctx, owner.id, baby.id, clear).await.unwrap();
        assert_eq!(updated.name, "Ada L");
        assert_eq!(updated.gender, None);
        assert_eq!(updated.photo_url, None);
    }

    #[tokio::test]
    async fn test_photo_upload() {
        let h = harness();
        let owner = h.user("owner");
        let viewer = h.user("viewer");
        let family = h.family(&owner, &[(&viewer, FamilyRole::Viewer)]).await;
        let baby = h.baby(&family).await;

        let photo = upload_baby_photo(&h.ctx, owner.id, baby.id, Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert!(photo.url.starts_with(&format!("memory://babies/{}/", baby.id)));
        assert!(photo.url.ends_with(".jpg"));
        assert!(h.storage.contains(&photo.url));

        let current = get_baby(&h.ctx, viewer.id, baby.id).await.unwrap();
        assert_eq!(current.photo_url.as_deref(), Some(photo.url.as_str()));

        let photos = list_baby_photos(&h.ctx, viewer.id, baby.id).await.unwrap();
        assert_eq!(photos.len(), 1);

        let err = upload_baby_photo(&h.ctx, viewer.id, baby.id, Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_photo_upload_rejects_bad_files() {
        let h = harness();
        let owner = h.user("owner");
        let family = h.family(&owner, &[]).await;
        let baby = h.baby(&family).await;

        let err = upload_baby_photo(&h.ctx, owner.id, baby.id, Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(_)));

        let too_big = Bytes::from(vec![0u8; h.ctx.config.storage.max_file_size + 1]);
        let err = upload_baby_photo(&h.ctx, owner.id, baby.id, too_big, "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("exceeds")));
        assert!(h.storage.is_empty());
    }
}
