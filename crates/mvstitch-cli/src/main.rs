//! Music video stitcher binary.

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};

use mvstitch_cli::{
    console, init_tracing, launch_preview, DialogSelector, ExportWorkflow, Platform, StdinPrompter,
    StitchConfig,
};
use mvstitch_media::{check_ffmpeg, check_ffprobe, FfmpegExporter, FfprobeLoader};

// The runtime drives this future on the main thread, which native dialogs require on macOS.
#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match StitchConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.json_logs);

    let Some(platform) = Platform::current() else {
        eprintln!("This tool only runs on macOS and Linux.");
        std::process::exit(1);
    };

    console::print_banner();
    info!("Starting mvstitch: {:?}", config);

    if let Err(e) = preflight() {
        error!("Preflight failed: {:#}", e);
        eprintln!("{e:#}");
        std::process::exit(1);
    }

    let selector = DialogSelector::new(&config.picker_dir);
    let prompter = StdinPrompter;
    let loader = FfprobeLoader::new();
    let mut exporter = FfmpegExporter::new(config.encoding.clone());
    if let Some(secs) = config.export_timeout_secs {
        exporter = exporter.with_timeout(secs);
    }

    let renderer = Arc::new(console::Console::new());
    let workflow = ExportWorkflow::new(&selector, &prompter, &loader, &exporter, &config.output_dir)
        .with_events(renderer.sink());

    match workflow.run().await {
        Ok(summary) => {
            console::print_summary(&summary);
            if config.preview {
                launch_preview(platform, &summary.output_path).await;
            }
            console::print_done(&summary);
        }
        Err(e) => {
            renderer.abandon();
            console::print_failure(&e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Both FFmpeg tools must be installed before any dialog opens.
fn preflight() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().context("ffmpeg is required; install it and make sure it is on PATH")?;
    let ffprobe = check_ffprobe().context("ffprobe is required; it ships with ffmpeg")?;
    info!("Using {} and {}", ffmpeg.display(), ffprobe.display());
    Ok(())
}
