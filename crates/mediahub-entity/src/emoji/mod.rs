//! Custom emoji entities.

pub mod model;

pub use model::Emoji;
