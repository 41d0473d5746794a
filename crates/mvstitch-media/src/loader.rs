//! Opening source media.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use mvstitch_models::{AudioClip, VideoClip};

use crate::error::{MediaError, MediaResult};
use crate::probe::probe_media;

/// Opens video and audio sources and releases them when the run is over.
///
/// Every clip returned by `open_video` / `open_audio` gets exactly one
/// matching `release` call from its owner.
#[async_trait]
pub trait MediaLoader: Send + Sync {
    /// Open a video source. Its audio is never used.
    async fn open_video(&self, path: &Path) -> MediaResult<VideoClip>;

    /// Open an audio source.
    async fn open_audio(&self, path: &Path) -> MediaResult<AudioClip>;

    /// Release whatever `open_*` acquired for `path`.
    fn release(&self, path: &Path);
}

/// Loader backed by `ffprobe`.
#[derive(Debug, Clone, Default)]
pub struct FfprobeLoader;

impl FfprobeLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaLoader for FfprobeLoader {
    async fn open_video(&self, path: &Path) -> MediaResult<VideoClip> {
        let info = probe_media(path).await?;

        let video = info
            .video
            .ok_or_else(|| MediaError::invalid_video(format!("no video stream in {}", path.display())))?;

        if video.width == 0 || video.height == 0 {
            return Err(MediaError::invalid_video(format!(
                "{} reports no frame size",
                path.display()
            )));
        }

        debug!(
            "Opened video {} ({:.2}s, {}x{} rotated {} @ {:.2} fps, {})",
            path.display(),
            info.duration,
            video.width,
            video.height,
            video.rotation,
            video.fps,
            video.codec
        );

        Ok(VideoClip {
            path: path.to_path_buf(),
            duration: info.duration,
            width: video.width,
            height: video.height,
            fps: video.fps,
        })
    }

    async fn open_audio(&self, path: &Path) -> MediaResult<AudioClip> {
        let info = probe_media(path).await?;

        let audio = info
            .audio
            .ok_or_else(|| MediaError::invalid_audio(format!("no audio stream in {}", path.display())))?;

        info!(
            "Opened audio {} ({:.2}s, {} Hz, {} ch, {})",
            path.display(),
            info.duration,
            audio.sample_rate,
            audio.channels,
            audio.codec
        );

        Ok(AudioClip {
            path: path.to_path_buf(),
            duration: info.duration,
            codec: audio.codec,
        })
    }

    fn release(&self, path: &Path) {
        // ffprobe leaves nothing open; ffmpeg reopens the file at export time
        debug!("Released {}", path.display());
    }
}
