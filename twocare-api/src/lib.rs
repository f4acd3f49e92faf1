//! # TwoCare API Server Library
//!
//! HTTP surface of the TwoCare co-parenting backend. Handlers are thin: they
//! extract the authenticated user and the request body, call a service from
//! `twocare_shared::services`, and map the result onto a response.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `error`: Error envelope and HTTP status mapping
//! - `extract`: Extractors that reject with the error envelope
//! - `middleware`: JWT authentication and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
