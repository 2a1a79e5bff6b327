//! # mediahub-core
//!
//! Core crate for MediaHub. Contains configuration schemas, typed
//! identifiers, the blob storage trait, and the unified error system.
//!
//! This crate has **no** internal dependencies on other MediaHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
