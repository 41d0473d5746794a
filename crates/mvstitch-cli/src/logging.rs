//! Tracing setup and structured run logging.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Install the global subscriber.
///
/// Logs go to stderr so they never interleave with prompts on stdout.
/// `RUST_LOG` overrides the default `mvstitch=info` directive.
pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mvstitch=info,mvstitch_cli=info,mvstitch_media=info"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Run logger for structured logging with consistent formatting.
///
/// Every line carries the run id and the workflow step it belongs to.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    step: String,
}

impl RunLogger {
    /// Create a logger for a fresh run.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            step: "start".to_string(),
        }
    }

    /// Create a logger with a known run id.
    pub fn from_string(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            step: "start".to_string(),
        }
    }

    /// Enter a workflow step.
    pub fn enter(&mut self, step: &str) {
        self.step = step.to_string();
        info!(
            run_id = %self.run_id,
            step = %self.step,
            "Step started"
        );
    }

    /// Log a progress update within the current step.
    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            step = %self.step,
            "{}", message
        );
    }

    /// Log a warning within the current step.
    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            step = %self.step,
            "{}", message
        );
    }

    /// Log the failure that ended the run.
    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            step = %self.step,
            "Run failed: {}", message
        );
    }

    /// Log the end of a successful run.
    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            step = %self.step,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    /// Create a tracing span covering the run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let a = RunLogger::new();
        let b = RunLogger::new();

        assert_ne!(a.run_id(), b.run_id());
        assert!(Uuid::parse_str(a.run_id()).is_ok());
        assert_eq!(a.step(), "start");
    }

    #[test]
    fn test_enter_tracks_step() {
        let mut logger = RunLogger::from_string("run-123");
        logger.enter("load_videos");

        assert_eq!(logger.run_id(), "run-123");
        assert_eq!(logger.step(), "load_videos");
    }
}
