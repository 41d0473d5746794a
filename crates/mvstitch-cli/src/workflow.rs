//! The interactive export run.
//!
//! Steps run strictly in order:
//!
//! ```text
//! SelectVideos -> ConfirmVideos -> LoadVideos -> SelectAudio -> LoadAudio
//!   -> ResolveOutputPath -> BuildSequence -> Export -> Cleanup -> Done
//! ```
//!
//! Cancellation or a failure at any step ends the run with a
//! [`WorkflowError`]. Every media handle opened along the way is released
//! exactly once, whichever way the run ends.
//!
//! The workflow never prints. It reports what happens through
//! [`WorkflowEvent`]s; the console layer decides how to show them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{warn, Instrument};

use mvstitch_media::{
    build_sequence, reserve_output_path, suggested_output_name, ExportRequest, Exporter,
    FfmpegProgress, MediaError, MediaLoader, ProgressCallback,
};
use mvstitch_models::{total_duration, AudioClip, VideoClip, OUTPUT_EXTENSION};

use crate::error::{WorkflowError, WorkflowResult};
use crate::logging::RunLogger;
use crate::prompt::Prompter;
use crate::selector::FileSelector;

pub const VIDEO_PROMPT: &str = "Select video clips (order matters)";
pub const AUDIO_PROMPT: &str = "Select ONE audio file";
pub const NAME_PROMPT: &str = "Enter custom name (or press Enter for default): ";

/// Workflow steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    SelectVideos,
    ConfirmVideos,
    LoadVideos,
    SelectAudio,
    LoadAudio,
    ResolveOutputPath,
    BuildSequence,
    Export,
    Cleanup,
    Done,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelectVideos => "select_videos",
            Self::ConfirmVideos => "confirm_videos",
            Self::LoadVideos => "load_videos",
            Self::SelectAudio => "select_audio",
            Self::LoadAudio => "load_audio",
            Self::ResolveOutputPath => "resolve_output_path",
            Self::BuildSequence => "build_sequence",
            Self::Export => "export",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something the user should hear about.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    VideosSelected(Vec<PathBuf>),
    VideoLoaded {
        index: usize,
        count: usize,
        clip: VideoClip,
    },
    VideosLoaded {
        count: usize,
        total_duration: f64,
    },
    AudioSelected(PathBuf),
    AudioLoaded(AudioClip),
    OutputSuggested(String),
    OutputResolved(PathBuf),
    Looping {
        loops: u32,
    },
    ExportStarted {
        duration: f64,
    },
    ExportProgress {
        percent: f64,
        eta_secs: Option<f64>,
    },
    ExportFinished(PathBuf),
}

/// Receives workflow events; may be called from FFmpeg's progress task.
pub type EventSink = Arc<dyn Fn(&WorkflowEvent) + Send + Sync>;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    /// Where the music video was written
    pub output_path: PathBuf,
    /// Number of selected video clips
    pub video_count: usize,
    /// Repetitions of the clip list
    pub loops: u32,
    /// Exported length in seconds
    pub duration: f64,
    /// Soundtrack source
    pub audio_path: PathBuf,
}

/// Tracks opened media so each handle is released exactly once.
///
/// Dropping the guard releases anything still held, so early returns and
/// failures clean up the same way the success path does.
struct AcquiredMedia<'a> {
    loader: &'a dyn MediaLoader,
    held: Vec<PathBuf>,
}

impl<'a> AcquiredMedia<'a> {
    fn new(loader: &'a dyn MediaLoader) -> Self {
        Self {
            loader,
            held: Vec::new(),
        }
    }

    fn track(&mut self, path: &Path) {
        self.held.push(path.to_path_buf());
    }

    /// Release in reverse acquisition order.
    fn release_all(&mut self) -> usize {
        let count = self.held.len();
        while let Some(path) = self.held.pop() {
            self.loader.release(&path);
        }
        count
    }
}

impl Drop for AcquiredMedia<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Empty file claimed at the output path for the duration of a run.
///
/// Removed on drop unless the export finished and [`ReservedOutput::keep`]
/// was called.
struct ReservedOutput {
    path: PathBuf,
    kept: bool,
}

impl ReservedOutput {
    fn path(&self) -> &Path {
        &self.path
    }

    fn keep(mut self) -> PathBuf {
        self.kept = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ReservedOutput {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove unfinished output {}: {}", self.path.display(), e),
        }
    }
}

/// Orchestrates one export run.
pub struct ExportWorkflow<'a> {
    selector: &'a dyn FileSelector,
    prompter: &'a dyn Prompter,
    loader: &'a dyn MediaLoader,
    exporter: &'a dyn Exporter,
    output_dir: PathBuf,
    events: EventSink,
}

impl<'a> ExportWorkflow<'a> {
    pub fn new(
        selector: &'a dyn FileSelector,
        prompter: &'a dyn Prompter,
        loader: &'a dyn MediaLoader,
        exporter: &'a dyn Exporter,
        output_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            selector,
            prompter,
            loader,
            exporter,
            output_dir: output_dir.as_ref().to_path_buf(),
            events: Arc::new(|_: &WorkflowEvent| {}),
        }
    }

    /// Send events to `sink`.
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = sink;
        self
    }

    /// Run every step once.
    pub async fn run(&self) -> WorkflowResult<ExportSummary> {
        let mut log = RunLogger::new();
        let span = log.create_span();
        let mut media = AcquiredMedia::new(self.loader);

        let result = self.execute(&mut log, &mut media).instrument(span).await;

        let released = media.release_all();
        match &result {
            Ok(summary) => {
                log.enter(WorkflowStep::Done.as_str());
                log.log_completion(&summary.output_path.display().to_string());
            }
            Err(e) if e.is_cancelled() => {
                log.log_progress(&format!("{e} ({released} handle(s) released)"));
            }
            Err(e) => {
                log.log_error(&format!("{e} ({released} handle(s) released)"));
            }
        }
        result
    }

    async fn execute(&self, log: &mut RunLogger, media: &mut AcquiredMedia<'_>) -> WorkflowResult<ExportSummary> {
        log.enter(WorkflowStep::SelectVideos.as_str());
        let video_paths = self.selector.select_many(VIDEO_PROMPT);
        if video_paths.is_empty() {
            return Err(WorkflowError::Cancelled);
        }
        self.emit(WorkflowEvent::VideosSelected(video_paths.clone()));

        log.enter(WorkflowStep::ConfirmVideos.as_str());
        let question = format!("\nProceed with {} video(s)? (y/n): ", video_paths.len());
        if !self.prompter.confirm(&question) {
            return Err(WorkflowError::Cancelled);
        }

        log.enter(WorkflowStep::LoadVideos.as_str());
        let clips = self.load_videos(&video_paths, media).await?;
        let total = total_duration(&clips);
        if total <= 0.0 {
            return Err(WorkflowError::EmptyContent);
        }
        log.log_progress(&format!("{} video(s), {:.2}s total", clips.len(), total));
        self.emit(WorkflowEvent::VideosLoaded {
            count: clips.len(),
            total_duration: total,
        });

        log.enter(WorkflowStep::SelectAudio.as_str());
        let audio_path = self
            .selector
            .select_one(AUDIO_PROMPT)
            .ok_or(WorkflowError::Cancelled)?;
        self.emit(WorkflowEvent::AudioSelected(audio_path.clone()));

        log.enter(WorkflowStep::LoadAudio.as_str());
        let audio = self.load_audio(&audio_path, media).await?;
        self.emit(WorkflowEvent::AudioLoaded(audio.clone()));

        log.enter(WorkflowStep::ResolveOutputPath.as_str());
        let output = self.reserve_output(&audio)?;
        log.log_progress(&format!("Output reserved: {}", output.path().display()));
        self.emit(WorkflowEvent::OutputResolved(output.path().to_path_buf()));

        log.enter(WorkflowStep::BuildSequence.as_str());
        let durations: Vec<f64> = clips.iter().map(|c| c.duration).collect();
        let sequence = build_sequence(&durations, audio.duration).map_err(WorkflowError::from_sequence)?;
        log.log_progress(&format!(
            "{} loop(s), {} segment(s), {:.2}s of {:.2}s{}",
            sequence.loops,
            sequence.entries.len(),
            sequence.duration,
            sequence.raw_duration,
            if sequence.is_trimmed() { ", trimmed" } else { "" }
        ));
        if sequence.loops > 1 {
            self.emit(WorkflowEvent::Looping {
                loops: sequence.loops,
            });
        }

        log.enter(WorkflowStep::Export.as_str());
        self.emit(WorkflowEvent::ExportStarted {
            duration: sequence.duration,
        });
        let request = ExportRequest {
            clips: &clips,
            sequence: &sequence,
            audio: &audio,
            output: output.path(),
        };
        if let Err(e) = self
            .exporter
            .export(request, self.progress_callback(sequence.duration))
            .await
        {
            log.log_warning(&format!("Export failed, discarding {}", output.path().display()));
            return Err(WorkflowError::export(output.path(), e));
        }
        let output_path = output.keep();
        self.emit(WorkflowEvent::ExportFinished(output_path.clone()));

        log.enter(WorkflowStep::Cleanup.as_str());
        media.release_all();

        Ok(ExportSummary {
            output_path,
            video_count: clips.len(),
            loops: sequence.loops,
            duration: sequence.duration,
            audio_path: audio.path,
        })
    }

    async fn load_videos(&self, paths: &[PathBuf], media: &mut AcquiredMedia<'_>) -> WorkflowResult<Vec<VideoClip>> {
        let mut clips = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let clip = self
                .loader
                .open_video(path)
                .await
                .map_err(|e| WorkflowError::load(path, e))?;
            media.track(path);

            self.emit(WorkflowEvent::VideoLoaded {
                index,
                count: paths.len(),
                clip: clip.clone(),
            });
            clips.push(clip);
        }
        Ok(clips)
    }

    async fn load_audio(&self, path: &Path, media: &mut AcquiredMedia<'_>) -> WorkflowResult<AudioClip> {
        let audio = self
            .loader
            .open_audio(path)
            .await
            .map_err(|e| WorkflowError::load(path, e))?;
        media.track(path);

        if !audio.duration.is_finite() || audio.duration <= 0.0 {
            return Err(WorkflowError::load(
                path,
                MediaError::invalid_audio("audio track has no duration"),
            ));
        }
        Ok(audio)
    }

    /// Suggest a name from the audio file, let the user override it, and
    /// claim the resulting path.
    fn reserve_output(&self, audio: &AudioClip) -> WorkflowResult<ReservedOutput> {
        let suggested = suggested_output_name(&audio.path);
        self.emit(WorkflowEvent::OutputSuggested(suggested.clone()));

        let answer = self.prompter.ask(NAME_PROMPT);
        let name = if answer.trim().is_empty() { suggested } else { answer };

        let path = reserve_output_path(&self.output_dir, &name, OUTPUT_EXTENSION).map_err(|e| {
            WorkflowError::export(self.output_dir.join(format!("{}{OUTPUT_EXTENSION}", name.trim())), e)
        })?;
        Ok(ReservedOutput { path, kept: false })
    }

    fn progress_callback(&self, total_secs: f64) -> ProgressCallback {
        let events = Arc::clone(&self.events);
        Box::new(move |progress: FfmpegProgress| {
            events(&WorkflowEvent::ExportProgress {
                percent: progress.percentage(total_secs),
                eta_secs: progress.eta_seconds(total_secs),
            });
        })
    }

    fn emit(&self, event: WorkflowEvent) {
        (self.events)(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names() {
        assert_eq!(WorkflowStep::ResolveOutputPath.to_string(), "resolve_output_path");
        assert_eq!(WorkflowStep::Done.as_str(), "done");
    }

    #[test]
    fn test_unkept_reservation_is_removed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = reserve_output_path(dir.path(), "Song", OUTPUT_EXTENSION).unwrap();
        assert!(path.exists());

        drop(ReservedOutput {
            path: path.clone(),
            kept: false,
        });
        assert!(!path.exists());
    }

    #[test]
    fn test_kept_reservation_stays() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = reserve_output_path(dir.path(), "Song", OUTPUT_EXTENSION).unwrap();

        let kept = ReservedOutput {
            path: path.clone(),
            kept: false,
        }
        .keep();
        assert_eq!(kept, path);
        assert!(path.exists());
    }
}
