//! Common utilities shared across services.
//!
//! This crate provides:
//! - Application error type on top of repository errors
//! - Configuration structures

pub mod config;
pub mod error;

pub use config::*;
pub use error::{AppError, AppResult};
