//! Media attachment entities.

pub mod kind;
pub mod model;

pub use kind::{MediaType, ProcessingStatus};
pub use model::MediaAttachment;
