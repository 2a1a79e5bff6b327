//! # mediahub-entity
//!
//! Domain entity models for MediaHub. Every struct in this crate represents
//! a database table row; database entities derive `sqlx::FromRow`.

pub mod attachment;
pub mod emoji;

pub use attachment::{MediaAttachment, MediaType, ProcessingStatus};
pub use emoji::Emoji;
