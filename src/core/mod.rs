//! Core types and error handling.

pub mod error;

pub use error::{ErrorContext, ProvendError, user_friendly_error};
