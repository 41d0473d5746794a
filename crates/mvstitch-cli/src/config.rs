//! Runtime configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use mvstitch_models::EncodingConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("Could not determine the home directory")]
    NoHomeDir,
}

/// Stitcher configuration.
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Directory exports are written to
    pub output_dir: PathBuf,
    /// Directory the file dialogs open in
    pub picker_dir: PathBuf,
    /// Encoder settings
    pub encoding: EncodingConfig,
    /// Kill FFmpeg after this many seconds
    pub export_timeout_secs: Option<u64>,
    /// Open the result in the platform previewer
    pub preview: bool,
    /// Emit JSON logs
    pub json_logs: bool,
}

impl StitchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = dirs::home_dir();

        let output_dir = match lookup("MVSTITCH_OUTPUT_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_output_dir(home.as_deref())?,
        };

        let picker_dir = match lookup("MVSTITCH_PICKER_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_picker_dir(home.as_deref(), &output_dir),
        };

        let defaults = EncodingConfig::default();
        let encoding = EncodingConfig {
            codec: lookup("MVSTITCH_VIDEO_CODEC").unwrap_or(defaults.codec),
            preset: lookup("MVSTITCH_PRESET").unwrap_or(defaults.preset),
            crf: parse_var(&lookup, "MVSTITCH_CRF")?.unwrap_or(defaults.crf),
            audio_codec: lookup("MVSTITCH_AUDIO_CODEC").unwrap_or(defaults.audio_codec),
            audio_bitrate: lookup("MVSTITCH_AUDIO_BITRATE").unwrap_or(defaults.audio_bitrate),
            extra_args: defaults.extra_args,
        };

        Ok(Self {
            output_dir,
            picker_dir,
            encoding,
            export_timeout_secs: parse_var(&lookup, "MVSTITCH_EXPORT_TIMEOUT_SECS")?,
            preview: parse_flag(&lookup, "MVSTITCH_PREVIEW")?.unwrap_or(true),
            json_logs: lookup("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn default_output_dir(home: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(desktop) = dirs::desktop_dir() {
        return Ok(desktop);
    }
    home.map(|h| h.join("Desktop")).ok_or(ConfigError::NoHomeDir)
}

/// Downloads when it exists, otherwise the output directory.
fn default_picker_dir(home: Option<&Path>, output_dir: &Path) -> PathBuf {
    dirs::download_dir()
        .or_else(|| home.map(|h| h.join("Downloads")))
        .filter(|d| d.is_dir())
        .unwrap_or_else(|| output_dir.to_path_buf())
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Invalid { var, value }),
        },
    }
}

fn parse_flag<F>(lookup: &F, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid { var, value }),
        },
    }
}
