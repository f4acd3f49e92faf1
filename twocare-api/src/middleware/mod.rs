/// Middleware modules for the API server
///
/// - `auth`: Bearer JWT authentication for protected routes
/// - `security`: Security response headers

pub mod auth;
pub mod security;
