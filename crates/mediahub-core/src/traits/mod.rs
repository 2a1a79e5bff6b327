//! Core traits defined in `mediahub-core` and implemented by other crates.

pub mod storage;

pub use storage::StorageProvider;
