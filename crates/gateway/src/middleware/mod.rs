//! Middleware for caller identification.

mod auth;

pub use auth::{identity_middleware, TokenError, TokenVerifier};
