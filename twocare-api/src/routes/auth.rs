/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register and sign in (201)
/// - `POST /v1/auth/login` - Sign in
/// - `POST /v1/auth/refresh` - Rotate a refresh token
/// - `POST /v1/auth/logout` - Revoke one refresh token, or all without one (auth)
/// - `POST /v1/auth/logout-all` - Revoke every refresh token (auth)
///
/// Sign-in responses share one shape:
///
/// ```json
/// {
///   "user": { "id": "uuid", "email": "ana@example.com", "firstName": "Ana", ... },
///   "accessToken": "eyJ...",
///   "refreshToken": "eyJ..."
/// }
/// ```

use axum::{extract::State, http::StatusCode, Json};
use twocare_shared::{
    auth::middleware::AuthContext,
    services::{
        auth::{self, AuthResponse, LoginInput, LogoutInput, RefreshInput, RegisterInput},
        MessageResponse,
    },
};

use crate::{app::AppState, error::ApiResult, extract::ApiJson};

/// Register a new user
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterInput>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let response = auth::register(&state.services, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with email and password
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginInput>,
) -> ApiResult<Json<AuthResponse>> {
    Ok(Json(auth::login(&state.services, req).await?))
}

/// Exchange a refresh token for a new pair
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, revoked or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshInput>,
) -> ApiResult<Json<AuthResponse>> {
    Ok(Json(auth::refresh(&state.services, req).await?))
}

/// End the session of one refresh token; the body is optional
pub async fn logout(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
    req: Option<Json<LogoutInput>>,
) -> ApiResult<Json<MessageResponse>> {
    let input = req.map(|Json(input)| input).unwrap_or_default();
    Ok(Json(auth::logout(&state.services, auth_ctx.user_id, input).await?))
}

pub async fn logout_all(
    State(state): State<AppState>,
    auth_ctx: AuthContext,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(auth::logout_all(&state.services, auth_ctx.user_id).await?))
}
