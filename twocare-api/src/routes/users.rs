/// Profile endpoints for the authenticated user
///
/// - `GET /v1/users/me`
/// - `PATCH /v1/users/me` - `{firstName?, lastName?}`
/// - `POST /v1/users/me/avatar` - multipart, field `file`
/// - `DELETE /v1/users/me/avatar`

use axum::{
    extract::{Multipart, State},
    Json,
};
use twocare_shared::{
    auth::middleware::AuthContext,
    models::user::User,
    services::users::{self, UpdateProfileInput},
};

use super::read_file_field;
use crate::{app::AppState, error::ApiResult, extract::ApiJson};

pub async fn get_profile(State(state): State<AppState>, auth_ctx: AuthContext) -> ApiResult<Json<User>> {
    Ok(Json(users::get_profile(&state.services, auth_ctx.user_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiJson(req): ApiJson<UpdateProfileInput>,
) -> ApiResult<Json<User>> {
    Ok(Json(users::update_profile(&state.services, auth_ctx.user_id, req).await?))
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    multipart: Multipart,
) -> ApiResult<Json<User>> {
    let file = read_file_field(multipart).await?;
    let user = users::upload_avatar(&state.services, auth_ctx.user_id, file.data, &file.content_type).await?;
    Ok(Json(user))
}

pub async fn delete_avatar(State(state): State<AppState>, auth_ctx: AuthContext) -> ApiResult<Json<User>> {
    Ok(Json(users::delete_avatar(&state.services, auth_ctx.user_id).await?))
}
