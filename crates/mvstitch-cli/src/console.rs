//! Terminal presentation of workflow events and outcomes.

use indicatif::{HumanDuration, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mvstitch_models::display_name;

use crate::error::WorkflowError;
use crate::workflow::{EventSink, ExportSummary, WorkflowEvent};

const RULE_WIDTH: usize = 70;
const LOAD_TEMPLATE: &str = "  Videos {bar:30} {pos}/{len} {msg}";
const EXPORT_TEMPLATE: &str = "  [{elapsed_precise}] {wide_bar} {pos:>3}% {msg}";

pub fn print_banner() {
    let rule = "=".repeat(RULE_WIDTH);
    println!("\n{rule}");
    println!("   MUSIC VIDEO STITCHER");
    println!("{rule}\n");
}

/// Renders workflow events: plain lines, plus progress bars while videos
/// load and while the export encodes.
pub struct Console {
    draw: bool,
    loading: Mutex<Option<ProgressBar>>,
    export: Mutex<Option<ProgressBar>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self {
            draw: true,
            loading: Mutex::new(None),
            export: Mutex::new(None),
        }
    }

    /// Event sink feeding this console.
    pub fn sink(self: &Arc<Self>) -> EventSink {
        let console = Arc::clone(self);
        Arc::new(move |event: &WorkflowEvent| console.render(event))
    }

    pub fn render(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::VideoLoaded { index, count, clip } => {
                let mut slot = lock(&self.loading);
                if *index == 0 || slot.is_none() {
                    println!("\nLoading videos...");
                    *slot = Some(self.bar(*count as u64, LOAD_TEMPLATE));
                }
                if let Some(bar) = slot.as_ref() {
                    bar.set_message(format!("{} ({:.2}s)", clip.file_name(), clip.duration));
                    bar.inc(1);
                }
            }
            WorkflowEvent::VideosLoaded { .. } => {
                if let Some(bar) = lock(&self.loading).take() {
                    bar.finish();
                }
                self.print_line(event);
            }
            WorkflowEvent::ExportStarted { .. } => {
                self.print_line(event);
                *lock(&self.export) = Some(self.bar(100, EXPORT_TEMPLATE));
            }
            WorkflowEvent::ExportProgress { percent, eta_secs } => {
                if let Some(bar) = lock(&self.export).as_ref() {
                    bar.set_position(percent.clamp(0.0, 100.0).round() as u64);
                    if let Some(eta) = eta_secs.filter(|s| s.is_finite()) {
                        let eta = HumanDuration(Duration::from_secs_f64(eta.max(0.0)));
                        bar.set_message(format!("~{eta} left"));
                    }
                }
            }
            WorkflowEvent::ExportFinished(_) => {
                if let Some(bar) = lock(&self.export).take() {
                    bar.set_position(100);
                    bar.finish_with_message("done");
                }
                self.print_line(event);
            }
            _ => self.print_line(event),
        }
    }

    /// Leave any unfinished bar in place so the failure prints below it.
    pub fn abandon(&self) {
        for slot in [&self.loading, &self.export] {
            if let Some(bar) = lock(slot).take() {
                bar.abandon();
            }
        }
    }

    fn bar(&self, len: u64, template: &str) -> ProgressBar {
        let target = if self.draw {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        };
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        ProgressBar::with_draw_target(Some(len), target).with_style(style)
    }

    fn print_line(&self, event: &WorkflowEvent) {
        if let Some(line) = format_event(event) {
            println!("{line}");
        }
    }
}

fn lock(slot: &Mutex<Option<ProgressBar>>) -> MutexGuard<'_, Option<ProgressBar>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Text for events printed as whole lines. Progress events draw bars instead.
pub fn format_event(event: &WorkflowEvent) -> Option<String> {
    let text = match event {
        WorkflowEvent::VideosSelected(paths) => {
            let mut text = format!("Selected {} file(s):", paths.len());
            for path in paths {
                text.push_str(&format!("\n  • {}", display_name(path)));
            }
            text
        }
        WorkflowEvent::VideosLoaded { total_duration, .. } => {
            format!("Total video length: {total_duration:.2} seconds")
        }
        WorkflowEvent::AudioSelected(path) => format!("Selected 1 file(s):\n  • {}", display_name(path)),
        WorkflowEvent::AudioLoaded(audio) => {
            format!("Audio: {} ({:.2} seconds)", audio.file_name(), audio.duration)
        }
        WorkflowEvent::OutputSuggested(name) => format!("\nSuggested name: {name}.mp4"),
        WorkflowEvent::OutputResolved(path) => format!("Saving to: {}", path.display()),
        WorkflowEvent::Looping { loops } => format!("Looping video {loops} times"),
        WorkflowEvent::ExportStarted { duration } => {
            format!("\nExporting {:.2} seconds...", duration)
        }
        WorkflowEvent::ExportFinished(_) => "Export complete!".to_string(),
        WorkflowEvent::VideoLoaded { .. } | WorkflowEvent::ExportProgress { .. } => return None,
    };
    Some(text)
}

pub fn print_summary(summary: &ExportSummary) {
    println!(
        "{} clip(s) x{} -> {} ({:.2}s)",
        summary.video_count,
        summary.loops,
        display_name(&summary.output_path),
        summary.duration
    );
}

pub fn print_done(summary: &ExportSummary) {
    let dir = summary
        .output_path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    println!("\nDone! Your music video is in {dir}.");
}

/// Cancellation prints its message plainly; real failures go to stderr.
pub fn print_failure(error: &WorkflowError) {
    if error.is_cancelled() {
        println!("{error}");
        return;
    }

    eprintln!("\n{error}");
    let stderr = match error {
        WorkflowError::Load { source, .. } | WorkflowError::Export { source, .. } => source.stderr(),
        _ => None,
    };
    if let Some(detail) = stderr {
        eprintln!("{detail}");
    }
}
