/// JWT authentication layer
///
/// Validates `Authorization: Bearer <access token>` and injects the
/// [`AuthContext`] into request extensions, where handlers pick it up as an
/// extractor. Refresh tokens are rejected here.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use twocare_shared::auth::middleware::{authenticate_bearer, AuthContext};

use crate::{app::AppState, error::ApiError};

pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth_context: AuthContext = authenticate_bearer(auth_header, &state.config.jwt.secret)?;
    tracing::debug!(user_id = %auth_context.user_id, "Request authenticated");

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
