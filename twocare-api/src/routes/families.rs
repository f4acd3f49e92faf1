/// Family endpoints
///
/// - `POST /v1/families` - create, caller becomes PRIMARY_PARENT (201)
/// - `GET /v1/families` - families of the caller
/// - `POST /v1/families/join` - redeem an invite token (201)
/// - `GET|PATCH|DELETE /v1/families/:id`
/// - `GET /v1/families/:id/members`
/// - `PATCH /v1/families/:id/members/:userId` - change a member's role
/// - `POST /v1/families/:id/invite` - issue an invite link (201)

use axum::{extract::State, http::StatusCode, Json};
use twocare_shared::{
    auth::middleware::AuthContext,
    models::{
        family::FamilyWithMembers,
        membership::{FamilyMember, MemberWithUser},
    },
    services::{
        families::{self, CreateFamilyInput, FamilyDetails, UpdateFamilyInput, UpdateMemberRoleInput},
        invites::{self, CreateInviteInput, InviteResponse, JoinFamilyInput},
        ListResponse,
    },
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{ApiJson, ApiPath},
};

pub async fn create_family(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiJson(req): ApiJson<CreateFamilyInput>,
) -> ApiResult<(StatusCode, Json<FamilyWithMembers>)> {
    let family = families::create_family(&state.services, auth_ctx.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(family)))
}

pub async fn list_families(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
) -> ApiResult<Json<ListResponse<FamilyWithMembers>>> {
    let families = families::list_families(&state.services, auth_ctx.user_id).await?;
    Ok(Json(families.into()))
}

pub async fn get_family(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<FamilyDetails>> {
    Ok(Json(families::get_family(&state.services, auth_ctx.user_id, id).await?))
}

pub async fn update_family(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateFamilyInput>,
) -> ApiResult<Json<FamilyDetails>> {
    Ok(Json(families::update_family(&state.services, auth_ctx.user_id, id, req).await?))
}

pub async fn delete_family(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    families::delete_family(&state.services, auth_ctx.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ListResponse<MemberWithUser>>> {
    let members = families::list_members(&state.services, auth_ctx.user_id, id).await?;
    Ok(Json(members.into()))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath((id, user_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<UpdateMemberRoleInput>,
) -> ApiResult<Json<FamilyMember>> {
    let member = families::update_member_role(&state.services, auth_ctx.user_id, id, user_id, req).await?;
    Ok(Json(member))
}

pub async fn create_invite(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
    req: Option<Json<CreateInviteInput>>,
) -> ApiResult<(StatusCode, Json<InviteResponse>)> {
    let input = req.map(|Json(input)| input).unwrap_or_default();
    let invite = invites::create_invite(&state.services, auth_ctx.user_id, id, input).await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

pub async fn join_family(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    ApiJson(req): ApiJson<JoinFamilyInput>,
) -> ApiResult<(StatusCode, Json<FamilyDetails>)> {
    let family = invites::join_family(&state.services, auth_ctx.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(family)))
}
