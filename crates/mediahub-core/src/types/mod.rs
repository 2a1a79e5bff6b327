//! Core type definitions used across the MediaHub workspace.

pub mod id;

pub use id::*;
