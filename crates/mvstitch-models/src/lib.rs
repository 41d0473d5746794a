//! Shared data models for mvstitch.
//!
//! This crate provides plain, Serde-serializable types for:
//! - Loaded video and audio clips
//! - Encoding configuration
//! - Output naming constants

pub mod clip;
pub mod encoding;
pub mod output;

// Re-export common types
pub use clip::{display_name, total_duration, AudioClip, VideoClip};
pub use encoding::EncodingConfig;
pub use output::{DEFAULT_OUTPUT_NAME, OUTPUT_EXTENSION, SUGGESTED_NAME_SUFFIX};
