/// Baby endpoints
///
/// - `POST /v1/babies` - add a baby to a family (201)
/// - `GET /v1/babies` - babies across the caller's families
/// - `GET|PATCH|DELETE /v1/babies/:id`
/// - `POST /v1/babies/:id/photos` - multipart, field `file` (201)
/// - `GET /v1/babies/:id/photos` - newest first

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use twocare_shared::{
    auth::middleware::AuthContext,
    models::baby::{Baby, BabyPhoto},
    services::{
        babies::{self, CreateBabyInput, UpdateBabyInput},
        ListResponse,
    },
};
use uuid::Uuid;

use super::read_file_field;
use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiPath},
};

pub async fn create_baby(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiJson(req): ApiJson<CreateBabyInput>,
) -> ApiResult<(StatusCode, Json<Baby>)> {
    let baby = babies::create_baby(&state.services, auth_ctx.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(baby)))
}

pub async fn list_babies(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
) -> ApiResult<Json<ListResponse<Baby>>> {
    let babies = babies::list_babies(&state.services, auth_ctx.user_id).await?;
    Ok(Json(babies.into()))
}

pub async fn get_baby(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Baby>> {
    Ok(Json(babies::get_baby(&state.services, auth_ctx.user_id, id).await?))
}

pub async fn update_baby(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateBabyInput>,
) -> ApiResult<Json<Baby>> {
    Ok(Json(babies::update_baby(&state.services, auth_ctx.user_id, id, req).await?))
}

pub async fn delete_baby(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    babies::delete_baby(&state.services, auth_ctx.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_photo(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<BabyPhoto>)> {
    let file = read_file_field(multipart).await?;
    let photo =
        babies::upload_baby_photo(&state.services, auth_ctx.user_id, id, file.data, &file.content_type).await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

pub async fn list_photos(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ListResponse<BabyPhoto>>> {
    let photos = babies::list_baby_photos(&state.services, auth_ctx.user_id, id).await?;
    Ok(Json(photos.into()))
}
