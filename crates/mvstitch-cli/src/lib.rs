//! Interactive music video stitcher.
//!
//! This crate provides:
//! - Environment-driven configuration
//! - Native file dialogs and terminal prompts behind swappable traits
//! - The export workflow with guaranteed media release
//! - Console presentation and the post-export preview

pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod preview;
pub mod prompt;
pub mod selector;
pub mod workflow;

pub use config::{ConfigError, StitchConfig};
pub use error::{FailureKind, WorkflowError, WorkflowResult};
pub use logging::{init_tracing, RunLogger};
pub use preview::{launch_preview, Platform};
pub use prompt::{Prompter, ScriptedPrompter, StdinPrompter};
pub use selector::{DialogSelector, FileSelector, ScriptedSelector};
pub use workflow::{EventSink, ExportSummary, ExportWorkflow, WorkflowEvent, WorkflowStep};
