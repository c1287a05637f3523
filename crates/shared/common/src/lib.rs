//! Common utilities shared by the repository service and the gateway.
//!
//! This crate provides:
//! - Unified error handling for startup and HTTP requests
//! - Repository configuration structures

pub mod config;
pub mod error;

pub use config::*;
pub use error::{AppError, AppResult, ConfigError};
