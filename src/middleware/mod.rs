//! # Middleware Module
//!
//! - `auth`: resolves the caller from the cookie session or a bearer token
//!   and rejects anonymous requests to protected routes

pub mod auth;
