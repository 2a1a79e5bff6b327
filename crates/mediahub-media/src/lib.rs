//! # mediahub-media
//!
//! Asynchronous media coordination for MediaHub.
//!
//! Callers submit media, emoji, or recache requests to the [`MediaManager`].
//! Each request is validated and persisted synchronously, then handed back as
//! a processing handle while a bounded worker pool decodes, thumbnails, and
//! stores the data in the background. The manager also owns a nightly job
//! that evicts locally cached copies of old remote media.

pub mod context;
pub mod manager;
pub mod processing;
pub mod prune;
pub mod sniff;
pub mod types;

mod job;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{MediaContext, MediaLimits};
pub use manager::{MediaManager, PoolSizing};
pub use processing::{ProcessingEmoji, ProcessingMedia, ProcessingState};
pub use prune::{PruneReport, prune_remote};
pub use types::{AdditionalEmojiInfo, AdditionalMediaInfo, DataFn, PostDataFn};
