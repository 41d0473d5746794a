//! Platform detection and the post-export preview.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Platforms the stitcher runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
}

impl Platform {
    /// The platform this binary is running on, if supported.
    pub fn current() -> Option<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value.
    pub fn from_os(os: &str) -> Option<Self> {
        match os {
            "macos" => Some(Self::MacOs),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    /// Program and arguments that preview `path`.
    pub fn preview_command(&self, path: &Path) -> (&'static str, Vec<OsString>) {
        match self {
            Self::MacOs => ("qlmanage", vec!["-p".into(), path.as_os_str().to_owned()]),
            Self::Linux => ("xdg-open", vec![path.as_os_str().to_owned()]),
        }
    }
}

/// Open `path` in the platform previewer and wait for it.
///
/// Output is discarded; a missing or failing previewer is only logged.
pub async fn launch_preview(platform: Platform, path: &Path) {
    let (program, args) = platform.preview_command(path);
    debug!("Launching preview: {} {:?}", program, args);

    let status = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("{} exited with {}", program, status),
        Err(e) => warn!("Could not launch {}: {}", program, e),
    }
}
