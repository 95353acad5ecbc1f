//! # wayfarer-shared
//!
//! Identifiers, constants and input validation used by every Wayfarer crate.

pub mod constants;
pub mod error;
pub mod types;
pub mod validation;

pub use error::ValidationError;
