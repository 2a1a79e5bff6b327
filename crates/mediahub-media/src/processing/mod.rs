//! Processing handles for submitted media and emoji.
//!
//! A handle is created once the submission has been validated and its record
//! persisted. Loading it runs the decode and store work at most once; every
//! later load, from the worker or from a caller, sees the cached outcome.

pub mod emoji;
pub mod media;

use std::sync::atomic::{AtomicU8, Ordering};

pub use emoji::ProcessingEmoji;
pub use media::ProcessingMedia;

/// Where a handle is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingState {
    /// Waiting for a worker.
    ///
    /// Handles start here. The manager only returns a handle once the pool
    /// has accepted its job; if the pool refuses it, the handle is failed
    /// before the error reaches the caller, so no caller observes a
    /// `Queued` handle that is not actually queued.
    Queued,
    /// A load is running.
    Materializing,
    /// Stored successfully.
    Done,
    /// Processing failed or was abandoned.
    Failed,
}

impl ProcessingState {
    /// Whether the handle has reached an outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Queued,
            1 => Self::Materializing,
            2 => Self::Done,
            _ => Self::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Materializing => 1,
            Self::Done => 2,
            Self::Failed => 3,
        }
    }
}

/// Lock-free cell holding a [`ProcessingState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ProcessingState::Queued.as_u8()))
    }

    pub(crate) fn get(&self) -> ProcessingState {
        ProcessingState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ProcessingState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Validate a focal point coordinate.
pub(crate) fn valid_focus(value: f32) -> bool {
    (-1.0..=1.0).contains(&value)
}
