//! Music video export.
//!
//! A sequence of video clips is concatenated onto a common canvas, the audio
//! track is attached, and the result is encoded into a single MP4. Each
//! distinct clip is opened once no matter how often the sequence repeats it.
//!
//! Rendering happens in a scratch directory; the finished file is moved onto
//! the requested path only after FFmpeg succeeds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use mvstitch_models::encoding::OUTPUT_PIXEL_FORMAT;
use mvstitch_models::{AudioClip, EncodingConfig, VideoClip};

use crate::command::{format_seconds, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::move_file;
use crate::progress::{FfmpegProgress, ProgressCallback};
use crate::sequence::Sequence;

/// Frame rate used when no clip reports a usable one.
const DEFAULT_CANVAS_FPS: f64 = 30.0;

/// Label of the concatenated video stream in the filter graph.
const VIDEO_OUT_LABEL: &str = "vout";

/// Everything an export needs.
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    /// Clips the sequence indexes into
    pub clips: &'a [VideoClip],
    /// Clip order and per-entry durations
    pub sequence: &'a Sequence,
    /// Soundtrack
    pub audio: &'a AudioClip,
    /// Final file location
    pub output: &'a Path,
}

/// Encodes a sequence with its soundtrack to a file.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, request: ExportRequest<'_>, progress: ProgressCallback) -> MediaResult<()>;
}

/// Frame every clip is composed onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl Canvas {
    /// Largest clip size (rounded up to even for 4:2:0) at the highest frame rate.
    pub fn for_clips<'a>(clips: impl IntoIterator<Item = &'a VideoClip>) -> Self {
        let mut width = 0;
        let mut height = 0;
        let mut fps: f64 = 0.0;
        for clip in clips {
            width = width.max(clip.width);
            height = height.max(clip.height);
            if clip.fps.is_finite() {
                fps = fps.max(clip.fps);
            }
        }
        Self {
            width: round_up_even(width.max(2)),
            height: round_up_even(height.max(2)),
            fps: if fps > 0.0 { fps } else { DEFAULT_CANVAS_FPS },
        }
    }
}

fn round_up_even(value: u32) -> u32 {
    value + (value & 1)
}

/// FFmpeg-backed exporter.
#[derive(Debug, Clone, Default)]
pub struct FfmpegExporter {
    encoding: EncodingConfig,
    timeout_secs: Option<u64>,
}

impl FfmpegExporter {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            timeout_secs: None,
        }
    }

    /// Kill FFmpeg if the export takes longer than `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[async_trait]
impl Exporter for FfmpegExporter {
    async fn export(&self, request: ExportRequest<'_>, progress: ProgressCallback) -> MediaResult<()> {
        let scratch = tempfile::Builder::new().prefix("mvstitch-").tempdir()?;
        let render_path = scratch.path().join("render.mp4");

        let cmd = build_export_command(&request, &self.encoding, &render_path)?;

        info!(
            "Exporting {} segment(s) from {} input(s) + {} -> {} ({:.2}s)",
            request.sequence.entries.len(),
            cmd.input_count().saturating_sub(1),
            request.audio.path.display(),
            request.output.display(),
            request.sequence.duration
        );

        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        runner
            .run_with_progress(&cmd, move |p: FfmpegProgress| progress(p))
            .await?;

        if !render_path.exists() {
            return Err(MediaError::ffmpeg_failed("FFmpeg produced no output file", None, None));
        }

        move_file(&render_path, request.output).await?;

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch directory: {}", e);
        }

        info!("Export written: {}", request.output.display());
        Ok(())
    }
}

/// One distinct clip as an FFmpeg input.
///
/// The file is read with `-stream_loop` so every repeat comes from the same
/// decoder, and each use is cut out of the looped stream with `trim`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInput {
    /// Index into the clip list
    pub clip_index: usize,
    /// Uses of the clip, in playback order
    pub uses: Vec<ClipUse>,
}

/// One occurrence of a clip in the sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipUse {
    /// Position in the sequence
    pub segment: usize,
    /// Offset into the looped input, in seconds
    pub start: f64,
    /// Seconds used from `start`
    pub duration: f64,
}

impl ClipInput {
    /// Passes over the file after the first.
    pub fn extra_loops(&self) -> u32 {
        u32::try_from(self.uses.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }

    /// How much of the looped input is read.
    pub fn read_duration(&self) -> f64 {
        self.uses
            .iter()
            .map(|u| u.start + u.duration)
            .fold(0.0, f64::max)
    }
}

/// Group sequence entries by clip, in order of first appearance.
///
/// A clip's n-th use starts `n` clip lengths into its looped input.
pub fn plan_inputs(clips: &[VideoClip], sequence: &Sequence) -> MediaResult<Vec<ClipInput>> {
    let mut inputs: Vec<ClipInput> = Vec::new();
    let mut slot_of_clip: HashMap<usize, usize> = HashMap::new();

    for (segment, entry) in sequence.entries.iter().enumerate() {
        let clip = clips.get(entry.clip_index).ok_or_else(|| {
            MediaError::internal(format!(
                "sequence references clip {} of {}",
                entry.clip_index,
                clips.len()
            ))
        })?;

        let slot = *slot_of_clip.entry(entry.clip_index).or_insert_with(|| {
            inputs.push(ClipInput {
                clip_index: entry.clip_index,
                uses: Vec::new(),
            });
            inputs.len() - 1
        });

        let input = &mut inputs[slot];
        let start = input.uses.len() as f64 * clip.duration;
        input.uses.push(ClipUse {
            segment,
            start,
            duration: entry.duration,
        });
    }

    Ok(inputs)
}

/// Build the FFmpeg command for an export rendering into `render_path`.
///
/// Inputs are one looped `-i` per distinct clip followed by the audio file;
/// only the first video stream of each clip and the first audio stream of
/// the soundtrack are mapped.
pub fn build_export_command(
    request: &ExportRequest<'_>,
    encoding: &EncodingConfig,
    render_path: &Path,
) -> MediaResult<FfmpegCommand> {
    let sequence = request.sequence;
    if sequence.entries.is_empty() {
        return Err(MediaError::EmptyContent {
            total: sequence.source_duration,
        });
    }

    let inputs = plan_inputs(request.clips, sequence)?;

    let mut cmd = FfmpegCommand::new(render_path);
    for input in &inputs {
        let clip = &request.clips[input.clip_index];
        cmd = cmd.input_looped(&clip.path, input.extra_loops(), input.read_duration());
    }

    let audio_index = cmd.input_count();
    cmd = cmd.input(&request.audio.path);

    let canvas = Canvas::for_clips(request.clips);
    let filter = build_compose_filter(&inputs, canvas);

    Ok(cmd
        .filter_complex(filter)
        .map(format!("[{VIDEO_OUT_LABEL}]"))
        .map(format!("{audio_index}:a:0"))
        .output_args(encoding.to_ffmpeg_args())
        .output_duration(sequence.duration)
        .output_args(["-movflags", "+faststart"])
        .format("mp4"))
}

/// Pad every input onto the canvas, cut out its uses, and concatenate them
/// in sequence order.
pub fn build_compose_filter(inputs: &[ClipInput], canvas: Canvas) -> String {
    let Canvas { width, height, fps } = canvas;
    let segments: usize = inputs.iter().map(|i| i.uses.len()).sum();

    let mut filter = String::new();
    for (index, input) in inputs.iter().enumerate() {
        filter.push_str(&format!(
            "[{index}:v:0]pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps:.3},\
             format={OUTPUT_PIXEL_FORMAT}"
        ));

        if let [only] = input.uses.as_slice() {
            filter.push_str(&format!(",{}[s{}];", trim_use(only), only.segment));
            continue;
        }

        filter.push_str(&format!(",split={}", input.uses.len()));
        for n in 0..input.uses.len() {
            filter.push_str(&format!("[c{index}u{n}]"));
        }
        filter.push(';');
        for (n, clip_use) in input.uses.iter().enumerate() {
            filter.push_str(&format!("[c{index}u{n}]{}[s{}];", trim_use(clip_use), clip_use.segment));
        }
    }

    for segment in 0..segments {
        filter.push_str(&format!("[s{segment}]"));
    }
    filter.push_str(&format!("concat=n={segments}:v=1:a=0[{VIDEO_OUT_LABEL}]"));
    filter
}

fn trim_use(clip_use: &ClipUse) -> String {
    format!(
        "trim=start={}:duration={},setpts=PTS-STARTPTS",
        format_seconds(clip_use.start),
        format_seconds(clip_use.duration)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::parse_probe_output;
    use crate::sequence::build_sequence;
    use std::path::PathBuf;

    fn clip(name: &str, duration: f64, width: u32, height: u32, fps: f64) -> VideoClip {
        VideoClip {
            path: PathBuf::from(format!("/clips/{name}")),
            duration,
            width,
            height,
            fps,
        }
    }

    fn audio(duration: f64) -> AudioClip {
        AudioClip {
            path: PathBuf::from("/music/song.mp3"),
            duration,
            codec: "mp3".to_string(),
        }
    }

    #[test]
    fn test_canvas_takes_largest_even_size() {
        let clips = vec![
            clip("a.mp4", 1.0, 1280, 720, 24.0),
            clip("b.mp4", 1.0, 1081, 1919, 29.97),
        ];
        let canvas = Canvas::for_clips(&clips);
        assert_eq!((canvas.width, canvas.height), (1280, 1920));
        assert!((canvas.fps - 29.97).abs() < 1e-9);
    }

    #[test]
    fn test_canvas_defaults() {
        let canvas = Canvas::for_clips(&[clip("a.mp4", 1.0, 0, 0, f64::NAN)]);
        assert_eq!((canvas.width, canvas.height), (2, 2));
        assert_eq!(canvas.fps, DEFAULT_CANVAS_FPS);
    }

    #[test]
    fn test_rotated_phone_clip_gets_portrait_canvas() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 1920, "height": 1080, "avg_frame_rate": "30/1",
                         "tags": {"rotate": "90"}, "side_data_list": [{"rotation": -90}]}],
            "format": {"duration": "8.0"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        let stream = info.video.unwrap();
        let portrait = VideoClip {
            path: PathBuf::from("/clips/phone.mov"),
            duration: info.duration,
            width: stream.width,
            height: stream.height,
            fps: stream.fps,
        };
        let clips = vec![portrait, clip("wide.mp4", 4.0, 1280, 720, 30.0)];

        let canvas = Canvas::for_clips(&clips);
        assert_eq!((canvas.width, canvas.height), (1280, 1920));

        let sequence = build_sequence(&[8.0, 4.0], 12.0).unwrap();
        let filter = build_compose_filter(&plan_inputs(&clips, &sequence).unwrap(), canvas);
        assert!(filter.starts_with("[0:v:0]pad=1280:1920:"));
    }

    #[test]
    fn test_repeats_share_one_input() {
        let clips = vec![clip("a.mp4", 10.0, 1920, 1080, 30.0), clip("b.mp4", 10.0, 1920, 1080, 30.0)];
        let sequence = build_sequence(&[10.0, 10.0], 25.0).unwrap();

        let inputs = plan_inputs(&clips, &sequence).unwrap();
        assert_eq!(inputs.len(), 2);

        let a = &inputs[0];
        assert_eq!(a.clip_index, 0);
        assert_eq!(a.extra_loops(), 1);
        assert_eq!(a.uses.iter().map(|u| u.segment).collect::<Vec<_>>(), vec![0, 2]);
        assert!((a.uses[1].start - 10.0).abs() < 1e-9);
        assert!((a.uses[1].duration - 5.0).abs() < 1e-9);
        assert!((a.read_duration() - 15.0).abs() < 1e-9);

        let b = &inputs[1];
        assert_eq!(b.extra_loops(), 0);
        assert!((b.read_duration() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_compose_filter_splits_repeated_clips() {
        let clips = vec![clip("a.mp4", 10.0, 1920, 1080, 30.0), clip("b.mp4", 10.0, 1920, 1080, 30.0)];
        let sequence = build_sequence(&[10.0, 10.0], 25.0).unwrap();
        let canvas = Canvas {
            width: 1920,
            height: 1080,
            fps: 30.0,
        };

        let filter = build_compose_filter(&plan_inputs(&clips, &sequence).unwrap(), canvas);
        assert!(filter.contains("pad=1920:1080"));
        assert!(filter.contains(",split=2[c0u0][c0u1];"));
        assert!(filter.contains("[c0u0]trim=start=0.000:duration=10.000,setpts=PTS-STARTPTS[s0];"));
        assert!(filter.contains("[c0u1]trim=start=10.000:duration=5.000,setpts=PTS-STARTPTS[s2];"));
        assert!(filter.contains(",trim=start=0.000:duration=10.000,setpts=PTS-STARTPTS[s1];"));
        assert!(filter.ends_with("[s0][s1][s2]concat=n=3:v=1:a=0[vout]"));
    }

    #[test]
    fn test_export_command_follows_sequence() {
        let clips = vec![clip("a.mp4", 10.0, 1920, 1080, 30.0), clip("b.mp4", 10.0, 1920, 1080, 30.0)];
        let sequence = build_sequence(&[10.0, 10.0], 25.0).unwrap();
        let soundtrack = audio(25.0);
        let request = ExportRequest {
            clips: &clips,
            sequence: &sequence,
            audio: &soundtrack,
            output: Path::new("/desktop/Song.mp4"),
        };

        let cmd = build_export_command(&request, &EncodingConfig::default(), Path::new("/tmp/render.mp4")).unwrap();
        let args = cmd.build_args();

        let inputs: Vec<&str> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(inputs, vec!["/clips/a.mp4", "/clips/b.mp4", "/music/song.mp3"]);

        // "a" plays twice: once in full, then cut to the remaining five seconds
        let a = args.iter().position(|x| x == "/clips/a.mp4").unwrap();
        assert_eq!(&args[a - 5..a], &["-stream_loop", "1", "-t", "15.000", "-i"]);
        let b = args.iter().position(|x| x == "/clips/b.mp4").unwrap();
        assert_eq!(&args[b - 3..b], &["-t", "10.000", "-i"]);

        assert!(args.contains(&"2:a:0".to_string()));
        assert!(args.contains(&"[vout]".to_string()));
        let t = args.iter().rposition(|x| x == "-t").unwrap();
        assert_eq!(args[t + 1], "25.000");
        assert_eq!(args.last().map(String::as_str), Some("/tmp/render.mp4"));
    }

    #[test]
    fn test_short_loop_under_long_song_opens_clip_once() {
        let clips = vec![clip("beat.mp4", 1.0, 720, 720, 24.0)];
        let sequence = build_sequence(&[1.0], 240.0).unwrap();
        let soundtrack = audio(240.0);
        let request = ExportRequest {
            clips: &clips,
            sequence: &sequence,
            audio: &soundtrack,
            output: Path::new("/desktop/beat.mp4"),
        };

        let args = build_export_command(&request, &EncodingConfig::default(), Path::new("/tmp/r.mp4"))
            .unwrap()
            .build_args();

        assert_eq!(args.iter().filter(|x| *x == "-i").count(), 2);
        let pos = args.iter().position(|x| x == "-stream_loop").unwrap();
        assert_eq!(args[pos + 1], "239");
    }

    #[test]
    fn test_export_command_rejects_bad_index() {
        let clips = vec![clip("a.mp4", 10.0, 640, 480, 25.0)];
        let sequence = build_sequence(&[10.0, 10.0], 15.0).unwrap();
        let soundtrack = audio(15.0);
        let request = ExportRequest {
            clips: &clips,
            sequence: &sequence,
            audio: &soundtrack,
            output: Path::new("/desktop/out.mp4"),
        };

        assert!(matches!(
            build_export_command(&request, &EncodingConfig::default(), Path::new("/tmp/r.mp4")),
            Err(MediaError::Internal(_))
        ));
    }
}
