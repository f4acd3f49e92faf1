//! Configuration management
//!
//! Configuration is loaded once at startup from environment variables (and an
//! optional `.env` file) into an immutable [`Config`], then shared as
//! `Arc<Config>` by the service context and the API state.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
//! - `API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `API_PORT`: Port to bind to (default: 3000)
//! - `API_PRODUCTION`: Enables HSTS and strict CORS (default: false)
//! - `CORS_ORIGIN`: Comma-separated allowed origins, `*` for any (default: *)
//! - `JWT_SECRET`: Access token signing secret, at least 32 characters (required)
//! - `JWT_EXPIRATION`: Access token lifetime, e.g. `15m`, `1d` (default: 1d)
//! - `JWT_REFRESH_SECRET`: Refresh token signing secret, at least 32 characters (required)
//! - `JWT_REFRESH_EXPIRATION`: Refresh token lifetime (default: 7d)
//! - `FRONTEND_URL`: Base URL used in invite links (default: http://localhost:3000)
//! - `SUPABASE_URL` / `SUPABASE_SERVICE_ROLE_KEY`: Object storage (optional)
//! - `STORAGE_MAX_FILE_SIZE`: Upload limit in bytes (default: 1048576)
//!
//! # Example
//!
//! ```no_run
//! use twocare_shared::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::env;

use chrono::Duration;

use crate::auth::jwt::parse_expires_in;
use crate::db::pool::DatabaseConfig;

/// Minimum length for both JWT secrets
pub const MIN_SECRET_LENGTH: usize = 32;

/// Default upload limit for avatars and photos (1 MiB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 1024 * 1024;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Invite link configuration
    pub invites: InviteConfig,

    /// Object storage configuration
    pub storage: StorageConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` means any)
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for access token signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Access token lifetime
    pub expires_in: Duration,

    /// Secret key for refresh token signing
    pub refresh_secret: String,

    /// Refresh token lifetime
    pub refresh_expires_in: Duration,
}

/// Invite link configuration
#[derive(Debug, Clone)]
pub struct InviteConfig {
    /// Frontend base URL; links are `<frontend_url>/families/join/<token>`
    pub frontend_url: String,
}

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Supabase project URL
    pub supabase_url: Option<String>,

    /// Supabase service role key
    pub service_role_key: Option<String>,

    /// Maximum accepted upload size in bytes
    pub max_file_size: usize,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    /// - A JWT secret is shorter than 32 characters
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an explicit key/value map
    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = lookup("API_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()?;
        let production = lookup("API_PRODUCTION")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let cors_origins = lookup("CORS_ORIGIN")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let refresh_secret = lookup("JWT_REFRESH_SECRET").ok_or_else(|| {
            anyhow::anyhow!("JWT_REFRESH_SECRET environment variable is required")
        })?;
        if refresh_secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("JWT_REFRESH_SECRET must be at least 32 characters long");
        }

        let expires_in = parse_expires_in(&lookup("JWT_EXPIRATION").unwrap_or_else(|| "1d".to_string()));
        let refresh_expires_in =
            parse_expires_in(&lookup("JWT_REFRESH_EXPIRATION").unwrap_or_else(|| "7d".to_string()));

        let frontend_url = lookup("FRONTEND_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        let max_file_size = match lookup("STORAGE_MAX_FILE_SIZE") {
            Some(value) => value.parse::<usize>()?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                ..Default::default()
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expires_in,
                refresh_secret,
                refresh_expires_in,
            },
            invites: InviteConfig { frontend_url },
            storage: StorageConfig {
                supabase_url: lookup("SUPABASE_URL").filter(|v| !v.is_empty()),
                service_role_key: lookup("SUPABASE_SERVICE_ROLE_KEY").filter(|v| !v.is_empty()),
                max_file_size,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Builds the public link for an invite token
    pub fn invite_link(&self, token: &str) -> String {
        format!("{}/families/join/{}", self.invites.frontend_url, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("DATABASE_URL".to_string(), "postgresql://localhost/twocare".to_string());
        vars.insert("JWT_SECRET".to_string(), "a".repeat(32));
        vars.insert("JWT_REFRESH_SECRET".to_string(), "b".repeat(32));
        vars
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_map(&base_vars()).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.jwt.expires_in, Duration::days(1));
        assert_eq!(config.jwt.refresh_expires_in, Duration::days(7));
        assert_eq!(config.storage.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert!(config.storage.supabase_url.is_none());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut vars = base_vars();
        vars.insert("JWT_SECRET".to_string(), "too-short".to_string());

        let err = Config::from_map(&vars).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let mut vars = base_vars();
        vars.insert("JWT_REFRESH_SECRET".to_string(), "too-short".to_string());
        assert!(Config::from_map(&vars).is_err());
    }

    #[test]
    fn test_missing_database_url() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");

        let err = Config::from_map(&vars).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_cors_origins_and_invite_link() {
        let mut vars = base_vars();
        vars.insert(
            "CORS_ORIGIN".to_string(),
            "https://app.twocare.io, https://admin.twocare.io".to_string(),
        );
        vars.insert("FRONTEND_URL".to_string(), "https://app.twocare.io/".to_string());
        vars.insert("JWT_EXPIRATION".to_string(), "15m".to_string());

        let config = Config::from_map(&vars).unwrap();
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.jwt.expires_in, Duration::minutes(15));
        assert_eq!(
            config.invite_link("abc"),
            "https://app.twocare.io/families/join/abc"
        );
    }
}
