//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in microseconds
    pub out_time_us: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Output position in seconds.
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_us.max(0) as f64 / 1_000_000.0
    }

    /// Calculate progress percentage given the total output duration in seconds.
    pub fn percentage(&self, total_secs: f64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if total_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_secs() / total_secs) * 100.0).clamp(0.0, 100.0)
    }

    /// Estimate time remaining in seconds.
    pub fn eta_seconds(&self, total_secs: f64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_us <= 0 {
            return None;
        }

        let remaining = total_secs - self.out_time_secs();
        if remaining <= 0.0 {
            return Some(0.0);
        }

        // Time remaining = remaining duration / speed
        Some(remaining / self.speed)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + 'static>;

/// Fold one line of `-progress` output into `current`.
///
/// Returns a snapshot at the end of every progress block (`progress=...`),
/// `None` for any other line.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();

    let (key, value) = line.split_once('=')?;
    match key {
        // Despite the name, ffmpeg reports out_time_ms in microseconds too
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_us = us;
            }
        }
        "out_time" => {
            current.out_time = value.to_string();
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            // Format: "1.5x" or "N/A"
            if let Some(speed) = value
                .trim()
                .strip_suffix('x')
                .and_then(|s| s.trim().parse().ok())
            {
                current.speed = speed;
            }
        }
        "progress" => {
            // "continue" or "end"
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// Whether a stderr line belongs to the `-progress pipe:2` key/value stream.
pub fn is_progress_line(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "frame",
        "fps",
        "stream_0_0_q",
        "bitrate",
        "total_size",
        "out_time_us",
        "out_time_ms",
        "out_time",
        "dup_frames",
        "drop_frames",
        "speed",
        "progress",
    ];

    match line.trim().split_once('=') {
        Some((key, _)) => KEYS.contains(&key) || key.starts_with("stream_"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_us: 5_000_000,
            ..Default::default()
        };

        assert!((progress.percentage(10.0) - 50.0).abs() < 0.01);
        assert!((progress.percentage(5.0) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0.0), 0.0);
    }

    #[test]
    fn test_complete_is_full() {
        let progress = FfmpegProgress {
            is_complete: true,
            ..Default::default()
        };
        assert_eq!(progress.percentage(25.0), 100.0);
    }

    #[test]
    fn test_eta_calculation() {
        let progress = FfmpegProgress {
            out_time_us: 5_000_000,
            speed: 2.0, // 2x realtime
            ..Default::default()
        };

        // 5 seconds remaining at 2x speed = 2.5 seconds ETA
        let eta = progress.eta_seconds(10.0).unwrap();
        assert!((eta - 2.5).abs() < 0.01);
        assert_eq!(progress.eta_seconds(4.0), Some(0.0));
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(parse_progress_line("out_time_ms=5000000", &mut progress).is_none());
        assert_eq!(progress.out_time_us, 5_000_000);

        parse_progress_line("out_time_us=6000000", &mut progress);
        assert!((progress.out_time_secs() - 6.0).abs() < 1e-9);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        parse_progress_line("speed=N/A", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let snapshot = parse_progress_line("progress=continue", &mut progress).unwrap();
        assert!(!snapshot.is_complete);

        let result = parse_progress_line("progress=end", &mut progress);
        assert!(result.is_some());
        assert!(progress.is_complete);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("frame=120"));
        assert!(is_progress_line("stream_0_0_q=28.0"));
        assert!(is_progress_line("progress=end"));
        assert!(!is_progress_line("[mov,mp4] moov atom not found"));
        assert!(!is_progress_line("clip.mp4: Invalid data found when processing input"));
    }
}
