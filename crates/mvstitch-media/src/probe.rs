//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Frame rate assumed when a stream does not report one.
const FALLBACK_FPS: f64 = 30.0;

/// Media file information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration: f64,
    /// First video stream, if any
    pub video: Option<VideoStreamInfo>,
    /// First audio stream, if any
    pub audio: Option<AudioStreamInfo>,
}

/// Video stream information.
///
/// `width` and `height` are the displayed size: a stream stored landscape
/// with a 90 or 270 degree rotation reports portrait dimensions, matching
/// the frames FFmpeg decodes after autorotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    /// Displayed width in pixels
    pub width: u32,
    /// Displayed height in pixels
    pub height: u32,
    /// Display rotation in degrees, normalized to 0, 90, 180 or 270
    pub rotation: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
}

/// Audio stream information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    /// Audio codec
    pub codec: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u32,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Rotation from the display matrix, falling back to the legacy `rotate` tag.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| parse_number::<f64>(self.tags.rotate.as_deref()))
            .filter(|d| d.is_finite())
            .unwrap_or(0.0);
        normalize_rotation(degrees)
    }
}

/// Probe a media file for information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe could not read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Parse `ffprobe -print_format json` output.
pub fn parse_probe_output(json: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    // Container duration, falling back to the longest stream
    let duration = parse_number::<f64>(probe.format.duration.as_deref())
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| parse_number::<f64>(s.duration.as_deref()))
                .reduce(f64::max)
        })
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let video = video_stream.map(|s| {
        let rotation = s.rotation();
        let (coded_width, coded_height) = (s.width.unwrap_or(0), s.height.unwrap_or(0));
        let (width, height) = if rotation % 180 == 90 {
            (coded_height, coded_width)
        } else {
            (coded_width, coded_height)
        };
        VideoStreamInfo {
            width,
            height,
            rotation,
            fps: s
                .avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
                .unwrap_or(FALLBACK_FPS),
            codec: s.codec_name.clone().unwrap_or_default(),
        }
    });

    let audio = audio_stream.map(|s| AudioStreamInfo {
        codec: s.codec_name.clone().unwrap_or_default(),
        sample_rate: parse_number(s.sample_rate.as_deref()).unwrap_or(0),
        channels: s.channels.unwrap_or(0),
    });

    Ok(MediaInfo {
        duration,
        video,
        audio,
    })
}

/// Round to the nearest quarter turn in `[0, 360)`.
fn normalize_rotation(degrees: f64) -> u32 {
    let quarter_turns = (degrees / 90.0).round().rem_euclid(4.0);
    quarter_turns as u32 * 90
}

fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value.and_then(|v| v.trim().parse::<T>().ok())
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
///
/// Returns `None` for zero or undefined rates such as "0/0".
fn parse_frame_rate(s: &str) -> Option<f64> {
    let fps = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("abc").is_none());
    }

    #[test]
    fn test_parse_video_with_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                 "r_frame_rate": "30/1", "avg_frame_rate": "30000/1001"},
                {"codec_type": "audio", "codec_name": "aac", "sample_rate": "48000", "channels": 2}
            ],
            "format": {"duration": "12.500000", "size": "1048576", "bit_rate": "671088"}
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!((info.duration - 12.5).abs() < 1e-9);

        let video = info.video.unwrap();
        assert_eq!((video.width, video.height), (1920, 1080));
        assert_eq!(video.rotation, 0);
        assert!((video.fps - 29.97).abs() < 0.01);
        assert_eq!(video.codec, "h264");

        let audio = info.audio.unwrap();
        assert_eq!(audio.sample_rate, 48_000);
        assert_eq!(audio.channels, 2);
    }

    #[test]
    fn test_portrait_phone_clip_reports_display_size() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "hevc", "width": 1920, "height": 1080,
                 "avg_frame_rate": "30/1", "tags": {"rotate": "90"},
                 "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}
            ],
            "format": {"duration": "6.0"}
        }"#;

        let video = parse_probe_output(json).unwrap().video.unwrap();
        assert_eq!(video.rotation, 270);
        assert_eq!((video.width, video.height), (1080, 1920));
    }

    #[test]
    fn test_rotate_tag_without_side_data() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 1280, "height": 720, "tags": {"rotate": "90"}}],
            "format": {"duration": "3.0"}
        }"#;
        let video = parse_probe_output(json).unwrap().video.unwrap();
        assert_eq!((video.width, video.height), (720, 1280));

        let upside_down = br#"{
            "streams": [{"codec_type": "video", "width": 1280, "height": 720,
                         "side_data_list": [{"rotation": 180}]}],
            "format": {"duration": "3.0"}
        }"#;
        let video = parse_probe_output(upside_down).unwrap().video.unwrap();
        assert_eq!(video.rotation, 180);
        assert_eq!((video.width, video.height), (1280, 720));
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0.0), 0);
        assert_eq!(normalize_rotation(-90.0), 270);
        assert_eq!(normalize_rotation(90.00001), 90);
        assert_eq!(normalize_rotation(-180.0), 180);
        assert_eq!(normalize_rotation(450.0), 90);
    }

    #[test]
    fn test_parse_audio_only() {
        let json = br#"{
            "streams": [{"codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100", "channels": 2}],
            "format": {"duration": "187.3"}
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!(info.video.is_none());
        assert_eq!(info.audio.unwrap().codec, "mp3");
        assert!((info.duration - 187.3).abs() < 1e-9);
    }

    #[test]
    fn test_duration_falls_back_to_streams() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 640, "height": 480, "avg_frame_rate": "0/0",
                 "r_frame_rate": "25/1", "duration": "4.0"},
                {"codec_type": "audio", "duration": "4.2"}
            ],
            "format": {}
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!((info.duration - 4.2).abs() < 1e-9);
        assert!((info.video.unwrap().fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_duration_is_zero() {
        let info = parse_probe_output(br#"{"streams": [], "format": {}}"#).unwrap();
        assert_eq!(info.duration, 0.0);
        assert!(info.video.is_none() && info.audio.is_none());
    }

    #[test]
    fn test_garbage_is_json_error() {
        assert!(matches!(
            parse_probe_output(b"not json"),
            Err(MediaError::JsonParse(_))
        ));
    }
}
