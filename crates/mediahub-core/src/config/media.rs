//! Media processing and remote cache configuration.

use serde::{Deserialize, Serialize};

/// Media manager configuration.
///
/// Read once when the media manager is constructed; nothing here can be
/// changed on a running manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Maximum age in days of locally cached remote media. `0` disables
    /// the nightly prune job.
    #[serde(default = "default_remote_cache_days")]
    pub remote_cache_days: u32,
    /// Override for the number of processing workers. When unset, half the
    /// available parallelism is used (at least one).
    #[serde(default)]
    pub worker_count: Option<usize>,
    /// Six-field cron expression (with seconds) for the prune job.
    #[serde(default = "default_prune_schedule")]
    pub prune_schedule: String,
    /// Seconds to wait for an in-flight prune run when stopping.
    #[serde(default = "default_prune_grace")]
    pub prune_grace_seconds: u64,
    /// Number of attachment records fetched per prune scan page.
    #[serde(default = "default_prune_batch_size")]
    pub prune_batch_size: usize,
    /// Longest edge of generated thumbnails, in pixels.
    #[serde(default = "default_thumbnail_max_dimension")]
    pub thumbnail_max_dimension: u32,
    /// Maximum size of an image attachment in bytes.
    #[serde(default = "default_image_max_size")]
    pub image_max_size: u64,
    /// Maximum size of a video attachment in bytes.
    #[serde(default = "default_video_max_size")]
    pub video_max_size: u64,
    /// Maximum size of a locally uploaded emoji in bytes.
    #[serde(default = "default_emoji_local_max_size")]
    pub emoji_local_max_size: u64,
    /// Maximum size of a remote emoji in bytes.
    #[serde(default = "default_emoji_remote_max_size")]
    pub emoji_remote_max_size: u64,
}

impl MediaConfig {
    /// Whether the nightly remote cache prune job should be scheduled.
    pub fn remote_cache_enabled(&self) -> bool {
        self.remote_cache_days != 0
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            remote_cache_days: default_remote_cache_days(),
            worker_count: None,
            prune_schedule: default_prune_schedule(),
            prune_grace_seconds: default_prune_grace(),
            prune_batch_size: default_prune_batch_size(),
            thumbnail_max_dimension: default_thumbnail_max_dimension(),
            image_max_size: default_image_max_size(),
            video_max_size: default_video_max_size(),
            emoji_local_max_size: default_emoji_local_max_size(),
            emoji_remote_max_size: default_emoji_remote_max_size(),
        }
    }
}

fn default_remote_cache_days() -> u32 {
    30
}

fn default_prune_schedule() -> String {
    // every day at midnight
    "0 0 0 * * *".to_string()
}

fn default_prune_grace() -> u64 {
    60
}

fn default_prune_batch_size() -> usize {
    20
}

fn default_thumbnail_max_dimension() -> u32 {
    512
}

fn default_image_max_size() -> u64 {
    2_097_152 // 2 MiB
}

fn default_video_max_size() -> u64 {
    10_485_760 // 10 MiB
}

fn default_emoji_local_max_size() -> u64 {
    51_200 // 50 KiB
}

fn default_emoji_remote_max_size() -> u64 {
    102_400 // 100 KiB
}
