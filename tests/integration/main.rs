//! Integration tests for the media manager against in-memory metadata and
//! on-disk blob storage.

mod helpers;
mod manager_test;
