/// Activity endpoints
///
/// - `POST /v1/activities` - log an activity (201)
/// - `GET /v1/activities?babyId=&type=&from=&to=&page=&pageSize=`
/// - `GET|PATCH /v1/activities/:id`
///
/// ```json
/// {
///   "babyId": "uuid",
///   "type": "FEEDING",
///   "timestamp": "2025-06-01T07:30:00Z",
///   "metadata": { "amount": 120, "unit": "ml", "feedType": "formula" }
/// }
/// ```

use axum::{extract::State, http::StatusCode, Json};
use twocare_shared::{
    auth::middleware::AuthContext,
    models::activity::Activity,
    services::{
        activities::{self, CreateActivityInput, ListActivitiesQuery, UpdateActivityInput},
        ListResponse,
    },
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiPath, ApiQuery},
};

pub async fn create_activity(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiJson(req): ApiJson<CreateActivityInput>,
) -> ApiResult<(StatusCode, Json<Activity>)> {
    let activity = activities::create_activity(&state.services, auth_ctx.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn list_activities(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiQuery(query): ApiQuery<ListActivitiesQuery>,
) -> ApiResult<Json<ListResponse<Activity>>> {
    Ok(Json(activities::list_activities(&state.services, auth_ctx.user_id, query).await?))
}

pub async fn get_activity(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Activity>> {
    Ok(Json(activities::get_activity(&state.services, auth_ctx.user_id, id).await?))
}

pub async fn update_activity(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateActivityInput>,
) -> ApiResult<Json<Activity>> {
    Ok(Json(activities::update_activity(&state.services, auth_ctx.user_id, id, req).await?))
}
