//! Video encoding configuration.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor), x264's own default
pub const DEFAULT_CRF: u8 = 23;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Pixel format every export is converted to (widest player support)
pub const OUTPUT_PIXEL_FORMAT: &str = "yuv420p";

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "h264_videotoolbox")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Whether the video codec understands `-crf`.
    ///
    /// Hardware encoders (VideoToolbox, NVENC, VAAPI) reject it.
    pub fn supports_crf(&self) -> bool {
        matches!(self.codec.as_str(), "libx264" | "libx265" | "libvpx-vp9" | "libaom-av1")
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];

        if self.supports_crf() {
            args.extend_from_slice(&["-crf".to_string(), self.crf.to_string()]);
        }

        args.extend_from_slice(&[
            "-pix_fmt".to_string(),
            OUTPUT_PIXEL_FORMAT.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]);

        args.extend(self.extra_args.clone());

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.preset, "medium");
        assert_eq!(config.audio_codec, "aac");
        assert_eq!(config.crf, 23);
    }

    #[test]
    fn test_ffmpeg_args() {
        let config = EncodingConfig::default();
        let args = config.to_ffmpeg_args();
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"23".to_string()));
        assert!(args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_hardware_codec_skips_crf() {
        let config = EncodingConfig {
            codec: "h264_videotoolbox".to_string(),
            ..Default::default()
        };
        let args = config.to_ffmpeg_args();
        assert!(args.contains(&"h264_videotoolbox".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 18}"#).unwrap();
        assert_eq!(config.crf, 18);
        assert_eq!(config.codec, DEFAULT_VIDEO_CODEC);
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_extra_args_are_appended_last() {
        let config = EncodingConfig {
            crf: 20,
            extra_args: vec!["-tune".to_string(), "film".to_string()],
            ..Default::default()
        };
        let args = config.to_ffmpeg_args();
        assert_eq!(&args[args.len() - 2..], &["-tune".to_string(), "film".to_string()]);
        assert!(args.contains(&"20".to_string()));
    }
}
