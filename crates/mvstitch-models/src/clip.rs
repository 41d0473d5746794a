//! Loaded clip descriptions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A video clip chosen by the user.
///
/// Only the video stream is ever used; any audio the file carries is ignored
/// when the clip is exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoClip {
    /// Source file
    pub path: PathBuf,
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
}

impl VideoClip {
    /// File name used in user-facing messages.
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

/// The audio track the video is cut to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    /// Source file
    pub path: PathBuf,
    /// Duration in seconds
    pub duration: f64,
    /// Audio codec
    pub codec: String,
}

impl AudioClip {
    /// File name used in user-facing messages.
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

/// Sum of the clip durations, ignoring invalid values.
pub fn total_duration(clips: &[VideoClip]) -> f64 {
    clips
        .iter()
        .map(|c| c.duration)
        .filter(|d| d.is_finite() && *d > 0.0)
        .sum()
}

/// Last path component, or the whole path when there is none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
