//! Filesystem utilities: output naming and cross-device moves.

use std::path::{Path, PathBuf};
use tokio::fs;

use mvstitch_models::{DEFAULT_OUTPUT_NAME, SUGGESTED_NAME_SUFFIX};

use crate::error::{MediaError, MediaResult};

/// Resolve a file path in `dir` that does not exist yet.
///
/// A blank `base_name` becomes [`DEFAULT_OUTPUT_NAME`]. On collision a
/// `-1`, `-2`, ... suffix is inserted before the extension.
///
/// The path is only guaranteed unused at the moment of the check; use
/// [`reserve_output_path`] to claim it.
///
/// # Example
///
/// ```ignore
/// // With "Song.mp4" already on the desktop:
/// let path = resolve_output_path(&desktop, "Song", ".mp4");
/// assert_eq!(path, desktop.join("Song-1.mp4"));
/// ```
pub fn resolve_output_path(dir: impl AsRef<Path>, base_name: &str, extension: &str) -> PathBuf {
    let dir = dir.as_ref();
    let name = match base_name.trim() {
        "" => DEFAULT_OUTPUT_NAME,
        trimmed => trimmed,
    };

    let mut candidate = dir.join(format!("{name}{extension}"));
    let mut suffix = 1u32;
    // Dangling symlinks count as taken
    while std::fs::symlink_metadata(&candidate).is_ok() {
        candidate = dir.join(format!("{name}-{suffix}{extension}"));
        suffix += 1;
    }
    candidate
}

/// Resolve a free path like [`resolve_output_path`] and create it empty.
///
/// Creation uses `create_new`, so a file that appears between the check and
/// the claim is never opened; the next suffix is tried instead. The returned
/// placeholder belongs to the caller until it is replaced or removed.
pub fn reserve_output_path(dir: impl AsRef<Path>, base_name: &str, extension: &str) -> MediaResult<PathBuf> {
    let dir = dir.as_ref();
    loop {
        let candidate = resolve_output_path(dir, base_name, extension);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!("{} was taken while reserving, retrying", candidate.display());
            }
            Err(e) => return Err(MediaError::from(e)),
        }
    }
}

/// Output name offered for an audio track: `"<stem> music video"`.
pub fn suggested_output_name(audio_path: impl AsRef<Path>) -> String {
    let stem = audio_path
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}{SUGGESTED_NAME_SUFFIX}").trim().to_string()
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// This function first attempts a fast rename. If that fails with EXDEV
/// (cross-device link error), it falls back to copy-and-delete.
///
/// The copy is performed to a temporary file first, then renamed to the
/// destination to ensure atomicity on the destination filesystem.
///
/// # Errors
///
/// Returns an error if:
/// - The source file doesn't exist
/// - The destination directory doesn't exist and can't be created
/// - The copy or rename operations fail
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

/// Copy file to destination (via temp file) then delete source.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    // Same directory as dst, so the final rename stays on one filesystem
    let tmp_dst = partial_path(dst);

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        let _ = std::fs::remove_file(&tmp_dst);
        MediaError::from(e)
    })?;

    fs::rename(&tmp_dst, dst).await.map_err(|e| {
        let _ = std::fs::remove_file(&tmp_dst);
        tracing::error!(
            "Failed to rename temp file during cross-device move: {} -> {}: {}",
            tmp_dst.display(),
            dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    // Best effort: the destination is complete either way
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// `Song.mp4` -> `.Song.mp4.partial`, hidden next to the destination.
fn partial_path(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dst.with_file_name(format!(".{name}.partial"))
}
