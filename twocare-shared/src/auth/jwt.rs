/// JWT token generation and validation
///
/// Access and refresh tokens are both HS256 JWTs, signed with different
/// secrets. Refresh tokens additionally carry a `tokenId` that points at a
/// revocable row in the refresh-token store.
///
/// # Claims
///
/// - `sub`: User ID
/// - `email`, `role`: User identity at issue time
/// - `iss`: Always "twocare"
/// - `iat`, `nbf`, `exp`: Unix timestamps
/// - `tokenType`: `access` or `refresh`
/// - `tokenId`: Refresh-token row ID (refresh tokens only)
///
/// # Example
///
/// ```
/// use twocare_shared::auth::jwt::{create_token, validate_access_token, Claims};
/// use twocare_shared::models::user::UserRole;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let claims = Claims::access(user_id, "ana@example.com", UserRole::Parent, Duration::days(1));
/// let token = create_token(&claims, "your-secret-key-at-least-32-bytes")?;
///
/// let validated = validate_access_token(&token, "your-secret-key-at-least-32-bytes")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Token issuer
pub const ISSUER: &str = "twocare";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token is not of the expected type
    #[error("Expected {expected} token, got {actual} token")]
    WrongType { expected: &'static str, actual: &'static str },

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}, got {actual}")]
    InvalidIssuer { expected: String, actual: String },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Access token, sent on every API call
    Access,

    /// Refresh token, exchanged for a new pair
    Refresh,
}

impl TokenType {
    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// User email at issue time
    pub email: String,

    /// Platform role at issue time
    pub role: UserRole,

    /// Issuer - Always "twocare"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Token type
    pub token_type: TokenType,

    /// Refresh-token row ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<Uuid>,
}

impl Claims {
    fn build(
        user_id: Uuid,
        email: &str,
        role: UserRole,
        token_type: TokenType,
        token_id: Option<Uuid>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            email: email.to_string(),
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
            token_id,
        }
    }

    /// Claims for an access token
    pub fn access(user_id: Uuid, email: &str, role: UserRole, expires_in: Duration) -> Self {
        Self::build(user_id, email, role, TokenType::Access, None, expires_in)
    }

    /// Claims for a refresh token bound to a stored token row
    pub fn refresh(
        user_id: Uuid,
        email: &str,
        role: UserRole,
        token_id: Uuid,
        expires_in: Duration,
    ) -> Self {
        Self::build(user_id, email, role, TokenType::Refresh, Some(token_id), expires_in)
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Creates a signed HS256 token from claims
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a token and extracts claims
///
/// Verifies signature, `exp`, `nbf` and issuer.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
            expected: ISSUER.to_string(),
            actual: "unknown".to_string(),
        },
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }
    Ok(claims)
}

/// Validates a token and checks it is an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Access)
}

/// Validates a token and checks it is a refresh token carrying a `tokenId`
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = expect_type(validate_token(token, secret)?, TokenType::Refresh)?;

    if claims.token_id.is_none() {
        return Err(JwtError::ValidationError(
            "Refresh token is missing tokenId".to_string(),
        ));
    }

    Ok(claims)
}

/// Parses a lifetime string such as `30s`, `15m`, `12h`, `1d` or `2w`
///
/// Anything that does not match `<digits><unit>` falls back to 7 days.
pub fn parse_expires_in(value: &str) -> Duration {
    const FALLBACK_DAYS: i64 = 7;

    let value = value.trim();
    let Some(unit) = value.chars().last() else {
        return Duration::days(FALLBACK_DAYS);
    };
    let digits = &value[..value.len() - unit.len_utf8()];

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Duration::days(FALLBACK_DAYS);
    }

    let Ok(amount) = digits.parse::<i64>() else {
        return Duration::days(FALLBACK_DAYS);
    };

    match unit {
        's' => Duration::seconds(amount),
        'm' => Duration::minutes(amount),
        'h' => Duration::hours(amount),
        'd' => Duration::days(amount),
        'w' => Duration::weeks(amount),
        _ => Duration::days(FALLBACK_DAYS),
    }
}
