//! # mediahub-database
//!
//! PostgreSQL connection management, the attachment and emoji repository
//! traits, and their Postgres and in-memory implementations.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{AttachmentRepository, EmojiRepository};
