#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for music video export.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Timeout support via tokio
//! - FFprobe-backed media loading
//! - Looping/trimming clip sequences to a target duration
//! - Collision-free output naming and path reservation

pub mod command;
pub mod error;
pub mod export;
pub mod fs_utils;
pub mod loader;
pub mod probe;
pub mod progress;
pub mod sequence;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use export::{
    build_export_command, plan_inputs, Canvas, ClipInput, ClipUse, ExportRequest, Exporter, FfmpegExporter,
};
pub use fs_utils::{move_file, reserve_output_path, resolve_output_path, suggested_output_name};
pub use loader::{FfprobeLoader, MediaLoader};
pub use probe::{probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use sequence::{build_sequence, loop_count, Sequence, SequenceEntry};
