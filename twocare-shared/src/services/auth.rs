/// Authentication service
///
/// Registration, login and refresh-token rotation.
///
/// Every issued pair consists of a short-lived access JWT and a refresh JWT
/// whose `tokenId` names a stored row. Only the SHA-256 digest of the refresh
/// JWT is persisted. Refreshing revokes the presented row and issues a new
/// pair, so each refresh token works once.
///
/// ```text
/// register/login ──▶ (access, refresh#1)
/// refresh(refresh#1) ──▶ revoke #1 ──▶ (access, refresh#2)
/// refresh(refresh#1) ──▶ Unauthorized("Refresh token has been revoked")
/// ```

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{require_not_blank, MessageResponse, ServiceContext};
use crate::auth::jwt::{create_token, validate_refresh_token, Claims};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{hash_token, verify_token_hash};
use crate::error::{ServiceError, ServiceResult};
use crate::models::refresh_token::CreateRefreshToken;
use crate::models::user::{normalize_email, CreateUser, User, UserSummary};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Body of `POST /v1/auth/register`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(email(message = "email must be an email"))]
    pub email: String,

    #[validate(length(min = 8, message = "password must be longer than or equal to 8 characters"))]
    pub password: String,

    #[validate(length(max = 50, message = "firstName must be at most 50 characters"))]
    pub first_name: String,

    #[validate(length(max = 50, message = "lastName must be at most 50 characters"))]
    pub last_name: Option<String>,
}

/// Body of `POST /v1/auth/login`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    #[validate(email(message = "email must be an email"))]
    pub email: String,

    pub password: String,
}

/// Body of `POST /v1/auth/refresh`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshInput {
    pub refresh_token: String,
}

/// Body of `POST /v1/auth/logout`; without a token every session ends
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutInput {
    pub refresh_token: Option<String>,
}

/// Issued token pair with the user it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserSummary,
    pub access_token: String,
    pub refresh_token: String,
}

/// Creates an account and signs it in
pub async fn register(ctx: &ServiceContext, input: RegisterInput) -> ServiceResult<AuthResponse> {
    input.validate()?;
    require_not_blank("firstName", &input.first_name)?;

    let email = normalize_email(&input.email);
    if ctx.store.find_user_by_email(&email).await?.is_some() {
        return Err(ServiceError::Conflict("Email already exists".to_string()));
    }

    let password_hash = hash_password(&input.password)?;

    // A concurrent registration still loses on users_email_key
    let user = ctx
        .store
        .create_user(CreateUser {
            email,
            password_hash,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.map(|name| name.trim().to_string()),
        })
        .await?;

    info!(user_id = %user.id, "User registered");
    issue_tokens(ctx, &user).await
}

/// Exchanges email and password for a token pair
pub async fn login(ctx: &ServiceContext, input: LoginInput) -> ServiceResult<AuthResponse> {
    input.validate()?;

    let user = ctx
        .store
        .find_user_by_email(&input.email)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(&input.password, &user.password_hash)? {
        warn!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    info!(user_id = %user.id, "User logged in");
    issue_tokens(ctx, &user).await
}

/// Rotates a refresh token
///
/// # Errors
///
/// `Unauthorized` when the JWT is invalid, the stored row is missing, belongs
/// to someone else, is revoked or expired, or its digest does not match.
pub async fn refresh(ctx: &ServiceContext, input: RefreshInput) -> ServiceResult<AuthResponse> {
    let claims = validate_refresh_token(&input.refresh_token, &ctx.config.jwt.refresh_secret)
        .map_err(|e| {
            warn!(error = %e, "Refresh token rejected");
            ServiceError::Unauthorized(INVALID_REFRESH_TOKEN.to_string())
        })?;
    let token_id = claims
        .token_id
        .ok_or_else(|| ServiceError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()))?;

    let stored = ctx
        .store
        .find_refresh_token(token_id)
        .await?
        .filter(|token| token.user_id == claims.sub)
        .ok_or_else(|| ServiceError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()))?;

    if stored.revoked {
        warn!(user_id = %claims.sub, token_id = %token_id, "Revoked refresh token presented");
        return Err(ServiceError::Unauthorized("Refresh token has been revoked".to_string()));
    }
    if stored.is_expired(ctx.now()) {
        return Err(ServiceError::Unauthorized("Refresh token has expired".to_string()));
    }
    if !verify_token_hash(&input.refresh_token, &stored.token_hash) {
        return Err(ServiceError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()));
    }

    let user = ctx
        .store
        .find_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| ServiceError::Unauthorized(INVALID_REFRESH_TOKEN.to_string()))?;

    // Losing a race here means someone else rotated this token first
    if !ctx.store.revoke_refresh_token(token_id).await? {
        return Err(ServiceError::Unauthorized("Refresh token has been revoked".to_string()));
    }

    issue_tokens(ctx, &user).await
}

/// Revokes one refresh token of the caller, or all of them when none is given
pub async fn logout(ctx: &ServiceContext, user_id: Uuid, input: LogoutInput) -> ServiceResult<MessageResponse> {
    let Some(refresh_token) = input.refresh_token else {
        return logout_all(ctx, user_id).await;
    };

    // Tokens that fail to parse or belong to someone else are ignored
    if let Ok(claims) = validate_refresh_token(&refresh_token, &ctx.config.jwt.refresh_secret) {
        if let Some(token_id) = claims.token_id.filter(|_| claims.sub == user_id) {
            let owned = ctx
                .store
                .find_refresh_token(token_id)
                .await?
                .is_some_and(|token| token.user_id == user_id);
            if owned {
                ctx.store.revoke_refresh_token(token_id).await?;
            }
        }
    }

    info!(user_id = %user_id, "User logged out");
    Ok(MessageResponse::new("Logged out successfully"))
}

/// Revokes every live refresh token of the caller
pub async fn logout_all(ctx: &ServiceContext, user_id: Uuid) -> ServiceResult<MessageResponse> {
    let revoked = ctx.store.revoke_user_refresh_tokens(user_id).await?;

    info!(user_id = %user_id, revoked, "User logged out of all sessions");
    Ok(MessageResponse::new("Logged out from all devices"))
}

/// Mints an access token and a stored refresh token for `user`
pub(crate) async fn issue_tokens(ctx: &ServiceContext, user: &User) -> ServiceResult<AuthResponse> {
    let jwt = &ctx.config.jwt;

    let access_token = create_token(
        &Claims::access(user.id, &user.email, user.role, jwt.expires_in),
        &jwt.secret,
    )?;

    let token_id = Uuid::new_v4();
    let refresh_token = create_token(
        &Claims::refresh(user.id, &user.email, user.role, token_id, jwt.refresh_expires_in),
        &jwt.refresh_secret,
    )?;

    ctx.store
        .create_refresh_token(CreateRefreshToken {
            id: token_id,
            user_id: user.id,
            token_hash: hash_token(&refresh_token),
            expires_at: ctx.now() + jwt.refresh_expires_in,
        })
        .await?;

    Ok(AuthResponse {
        user: UserSummary::from(user),
        access_token,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::auth::jwt::validate_access_token;
    use crate::services::testing::harness;

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "correct horse".to_string(),
            first_name: "Ana".to_string(),
            last_name: None,
        }
    }

    fn unauthorized_message(err: ServiceError) -> String {
        match err {
            ServiceError::Unauthorized(message) => message,
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    // Argon2 is slow in debug builds, so one test covers the password round trip
    #[tokio::test]
    async fn test_register_then_login() {
        let h = harness();

        let registered = register(&h.ctx, register_input("Ana@Example.com")).await.unwrap();
        assert_eq!(registered.user.email, "ana@example.com");

        let claims = validate_access_token(&registered.access_token, &h.ctx.config.jwt.secret).unwrap();
        assert_eq!(claims.sub, registered.user.id);

        let err = register(&h.ctx, register_input("ana@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ref m) if m == "Email already exists"));

        let logged_in = login(
            &h.ctx,
            LoginInput {
                email: "ana@example.com".to_string(),
                password: "correct horse".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let err = login(
            &h.ctx,
            LoginInput {
                email: "ana@example.com".to_string(),
                password: "wrong horse".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unauthorized_message(err), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let h = harness();

        let err = register(
            &h.ctx,
            RegisterInput {
                password: "short".to_string(),
                ..register_input("not-an-email")
            },
        )
        .await
        .unwrap_err();
        match err {
            ServiceError::Invalid(violations) => {
                let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "password"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let h = harness();

        let err = login(
            &h.ctx,
            LoginInput {
                email: "nobody@example.com".to_string(),
                password: "whatever1".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unauthorized_message(err), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let h = harness();
        let user = h.user("ana");
        let first = issue_tokens(&h.ctx, &user).await.unwrap();

        let second = refresh(
            &h.ctx,
            RefreshInput {
                refresh_token: first.refresh_token.clone(),
            },
        )
        .await
        .unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        let err = refresh(
            &h.ctx,
            RefreshInput {
                refresh_token: first.refresh_token,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unauthorized_message(err), "Refresh token has been revoked");

        refresh(
            &h.ctx,
            RefreshInput {
                refresh_token: second.refresh_token,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_rejects_bad_tokens() {
        let h = harness();
        let user = h.user("ana");
        let issued = issue_tokens(&h.ctx, &user).await.unwrap();

        // access tokens are signed with the other secret
        let err = refresh(
            &h.ctx,
            RefreshInput {
                refresh_token: issued.access_token,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unauthorized_message(err), "Invalid refresh token");

        let err = refresh(
            &h.ctx,
            RefreshInput {
                refresh_token: "garbage".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unauthorized_message(err), "Invalid refresh token");

        // valid signature, but no stored row
        let jwt = &h.ctx.config.jwt;
        let orphan = create_token(
            &Claims::refresh(user.id, &user.email, user.role, Uuid::new_v4(), jwt.refresh_expires_in),
            &jwt.refresh_secret,
        )
        .unwrap();
        let err = refresh(&h.ctx, RefreshInput { refresh_token: orphan }).await.unwrap_err();
        assert_eq!(unauthorized_message(err), "Invalid refresh token");
    }

    #[tokio::test]
    async fn test_refresh_after_stored_expiry() {
        let h = harness();
        let user = h.user("ana");
        let issued = issue_tokens(&h.ctx, &user).await.unwrap();

        h.clock.advance(h.ctx.config.jwt.refresh_expires_in + Duration::seconds(1));

        let err = refresh(
            &h.ctx,
            RefreshInput {
                refresh_token: issued.refresh_token,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unauthorized_message(err), "Refresh token has expired");
    }

    #[tokio::test]
    async fn test_logout_revokes_only_own_token() {
        let h = harness();
        let ana = h.user("ana");
        let ben = h.user("ben");
        let ana_tokens = issue_tokens(&h.ctx, &ana).await.unwrap();
        let ana_other = issue_tokens(&h.ctx, &ana).await.unwrap();

        // ben cannot revoke ana's token
        logout(
            &h.ctx,
            ben.id,
            LogoutInput {
                refresh_token: Some(ana_tokens.refresh_token.clone()),
            },
        )
        .await
        .unwrap();

        let response = logout(
            &h.ctx,
            ana.id,
            LogoutInput {
                refresh_token: Some(ana_tokens.refresh_token.clone()),
            },
        )
        .await
        .unwrap();
        assert_eq!(response.message, "Logged out successfully");

        let err = refresh(
            &h.ctx,
            RefreshInput {
                refresh_token: ana_tokens.refresh_token,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(unauthorized_message(err), "Refresh token has been revoked");

        refresh(
            &h.ctx,
            RefreshInput {
                refresh_token: ana_other.refresh_token,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_logout_all_revokes_every_session() {
        let h = harness();
        let ana = h.user("ana");
        let sessions = vec![
            issue_tokens(&h.ctx, &ana).await.unwrap(),
            issue_tokens(&h.ctx, &ana).await.unwrap(),
        ];

        let response = logout(&h.ctx, ana.id, LogoutInput::default()).await.unwrap();
        assert_eq!(response.message, "Logged out from all devices");

        for session in sessions {
            let err = refresh(
                &h.ctx,
                RefreshInput {
                    refresh_token: session.refresh_token,
                },
            )
            .await
            .unwrap_err();
            assert_eq!(unauthorized_message(err), "Refresh token has been revoked");
        }
    }
}
