//! # TwoCare Shared Library
//!
//! This crate contains the domain model, persistence layer, authorization rules
//! and resource services behind the TwoCare co-parenting API.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `metadata`: Per-activity-type metadata validation
//! - `auth`: Password hashing, JWTs, the family permission matrix and request auth context
//! - `db`: Connection pool, migrations and the `Store` persistence seam
//! - `storage`: Object storage for avatars and baby photos
//! - `services`: Family-scoped resource services (families, invites, babies, activities, users, auth)
//! - `config`: Configuration management
//! - `clock`: Injectable time source
//! - `error`: Domain error taxonomy

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod metadata;
pub mod models;
pub mod services;
pub mod storage;

/// Current version of the TwoCare shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
