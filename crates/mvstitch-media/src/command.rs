//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Number of diagnostic stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Only errors reach stderr besides the progress blocks.
const LOG_LEVEL: &str = "error";

/// One `-i` input with the options that precede it.
#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input files, in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Add an input file.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args(Vec::<String>::new(), path)
    }

    /// Add an input file preceded by input options.
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an input played `1 + extra_loops` times back to back, cut to `seconds`.
    pub fn input_looped(self, path: impl AsRef<Path>, extra_loops: u32, seconds: f64) -> Self {
        let mut args = Vec::new();
        if extra_loops > 0 {
            args.push("-stream_loop".to_string());
            args.push(extra_loops.to_string());
        }
        args.push("-t".to_string());
        args.push(format_seconds(seconds));
        self.input_with_args(args, path)
    }

    /// Number of inputs added so far.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Limit the output duration.
    pub fn output_duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format_seconds(seconds))
    }

    /// Force the output container format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        // The output is always a fresh scratch file
        let mut args = vec!["-y".to_string()];

        // Never block on an interactive "overwrite?" or keypress prompt
        args.push("-nostdin".to_string());

        args.push("-v".to_string());
        args.push(LOG_LEVEL.to_string());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Format seconds the way FFmpeg duration options expect.
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds.max(0.0))
}

/// Runner for FFmpeg commands with progress tracking and a timeout.
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr was not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        let diagnostics: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let diagnostics_writer = Arc::clone(&diagnostics);

        // Progress and diagnostics share stderr
        let progress_handle = tokio::spawn(async move {
            let mut current_progress = FfmpegProgress::default();

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current_progress) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    if let Ok(mut tail) = diagnostics_writer.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            }
        });

        let result = self.wait_for_completion(&mut child).await;

        // Wait for progress task to complete
        let _ = progress_handle.await;

        result.map_err(|e| match e {
            MediaError::FfmpegFailed {
                message, exit_code, ..
            } => {
                let stderr = diagnostics
                    .lock()
                    .ok()
                    .map(|tail| tail.iter().cloned().collect::<Vec<_>>().join("\n"))
                    .filter(|s| !s.is_empty());
                MediaError::ffmpeg_failed(message, stderr, exit_code)
            }
            other => other,
        })
    }

    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let status = wait_with_timeout(child, self.timeout_secs).await?;

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

async fn wait_with_timeout(
    child: &mut Child,
    timeout_secs: Option<u64>,
) -> MediaResult<std::process::ExitStatus> {
    let Some(timeout_secs) = timeout_secs else {
        return Ok(child.wait().await?);
    };

    match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => Ok(status?),
        Err(_) => {
            warn!("FFmpeg timed out after {} seconds, killing process", timeout_secs);
            let _ = child.kill().await;
            Err(MediaError::Timeout(timeout_secs))
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
