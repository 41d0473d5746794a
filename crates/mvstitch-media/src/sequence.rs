//! Looping and trimming clips to a target duration.
//!
//! The clip list is repeated until it covers the target, then cut so the
//! result ends exactly at the target. Nothing is ever padded.

use serde::Serialize;

use crate::error::{MediaError, MediaResult};

/// Entries shorter than this are dropped. Durations reach FFmpeg in milliseconds.
const MIN_ENTRY_SECS: f64 = 1e-3;

/// One clip occurrence in a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequenceEntry {
    /// Index into the clip list the sequence was built from
    pub clip_index: usize,
    /// Seconds of the clip used, from its start
    pub duration: f64,
}

/// Clips repeated and trimmed to a target duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    /// Clip occurrences in playback order
    pub entries: Vec<SequenceEntry>,
    /// How many times the clip list was repeated
    pub loops: u32,
    /// Sum of the clip durations
    pub source_duration: f64,
    /// Length of the repeated list before trimming
    pub raw_duration: f64,
    /// Final length, never above the target
    pub duration: f64,
}

impl Sequence {
    /// Whether the repeated list had to be cut short.
    pub fn is_trimmed(&self) -> bool {
        self.raw_duration > self.duration + MIN_ENTRY_SECS
    }
}

/// Number of repetitions needed for `total` seconds to cover `target`.
pub fn loop_count(total: f64, target: f64) -> u32 {
    if total <= 0.0 || !total.is_finite() || !target.is_finite() {
        return 1;
    }
    let loops = (target / total).ceil();
    if loops <= 1.0 {
        1
    } else if loops >= u32::MAX as f64 {
        u32::MAX
    } else {
        loops as u32
    }
}

/// Build the sequence covering `[0, target)` from clip durations.
///
/// # Errors
/// - `EmptyContent` when the durations sum to zero
/// - `InvalidDuration` when `target` is not a positive number
pub fn build_sequence(durations: &[f64], target: f64) -> MediaResult<Sequence> {
    if !target.is_finite() || target <= 0.0 {
        return Err(MediaError::InvalidDuration(format!(
            "target duration must be positive, got {target}"
        )));
    }

    let durations: Vec<f64> = durations.iter().map(|d| sanitize(*d)).collect();
    let total: f64 = durations.iter().sum();
    if total <= 0.0 {
        return Err(MediaError::EmptyContent { total });
    }

    let loops = loop_count(total, target);
    let raw_duration = total * loops as f64;

    let mut entries = Vec::new();
    let mut elapsed = 0.0;

    'outer: for _ in 0..loops {
        for (clip_index, &clip_duration) in durations.iter().enumerate() {
            let remaining = target - elapsed;
            if remaining < MIN_ENTRY_SECS {
                break 'outer;
            }
            let duration = clip_duration.min(remaining);
            if duration < MIN_ENTRY_SECS {
                continue;
            }
            entries.push(SequenceEntry {
                clip_index,
                duration,
            });
            elapsed += duration;
        }
    }

    Ok(Sequence {
        entries,
        loops,
        source_duration: total,
        raw_duration,
        duration: target.min(raw_duration),
    })
}

fn sanitize(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::format_seconds;

    fn entries_sum(seq: &Sequence) -> f64 {
        seq.entries.iter().map(|e| e.duration).sum()
    }

    #[test]
    fn test_loops_and_trim() {
        // [10, 10] against 25s: two loops, 40s raw, cut to 25s
        let seq = build_sequence(&[10.0, 10.0], 25.0).unwrap();
        assert_eq!(seq.loops, 2);
        assert!((seq.raw_duration - 40.0).abs() < 1e-9);
        assert!((seq.duration - 25.0).abs() < 1e-9);
        assert!(seq.is_trimmed());

        let order: Vec<usize> = seq.entries.iter().map(|e| e.clip_index).collect();
        assert_eq!(order, vec![0, 1, 0]);
        assert!((seq.entries[2].duration - 5.0).abs() < 1e-9);
        assert!((entries_sum(&seq) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_long_clip_is_trimmed() {
        let seq = build_sequence(&[30.0], 10.0).unwrap();
        assert_eq!(seq.loops, 1);
        assert_eq!(seq.entries.len(), 1);
        assert!((seq.duration - 10.0).abs() < 1e-9);
        assert!((seq.entries[0].duration - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_fit_is_not_trimmed() {
        let seq = build_sequence(&[5.0, 5.0], 20.0).unwrap();
        assert_eq!(seq.loops, 2);
        assert_eq!(seq.entries.len(), 4);
        assert!(!seq.is_trimmed());
        assert!((seq.duration - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_sub_millisecond_tail_is_dropped() {
        let seq = build_sequence(&[10.0, 10.0], 20.0003).unwrap();
        assert_eq!(seq.loops, 2);
        assert_eq!(seq.entries.len(), 2);

        let seq = build_sequence(&[10.0, 10.0], 20.0015).unwrap();
        assert_eq!(seq.entries.len(), 3);
        for entry in &seq.entries {
            assert_ne!(format_seconds(entry.duration), "0.000");
        }
    }

    #[test]
    fn test_empty_content() {
        assert!(matches!(
            build_sequence(&[0.0, 0.0], 10.0),
            Err(MediaError::EmptyContent { .. })
        ));
        assert!(matches!(
            build_sequence(&[], 10.0),
            Err(MediaError::EmptyContent { .. })
        ));
    }

    #[test]
    fn test_invalid_target() {
        for target in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                build_sequence(&[10.0], target),
                Err(MediaError::InvalidDuration(_))
            ));
        }
    }

    #[test]
    fn test_zero_length_clips_are_skipped() {
        let seq = build_sequence(&[0.0, 4.0, f64::NAN], 6.0).unwrap();
        assert_eq!(seq.loops, 2);
        assert!(seq.entries.iter().all(|e| e.clip_index == 1));
        assert!((entries_sum(&seq) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_loop_count_minimum_is_one() {
        assert_eq!(loop_count(100.0, 1.0), 1);
        assert_eq!(loop_count(10.0, 10.0), 1);
        assert_eq!(loop_count(10.0, 10.5), 2);
        assert_eq!(loop_count(0.0, 10.0), 1);
    }

    #[test]
    fn test_duration_properties_hold_across_inputs() {
        let lists: &[&[f64]] = &[
            &[1.0],
            &[0.4, 2.6],
            &[3.3, 3.3, 3.3],
            &[59.94, 0.5],
            &[7.0, 0.0, 11.0],
        ];
        let targets = [0.1, 1.0, 9.99, 10.0, 33.3, 187.25, 600.0];

        for durations in lists {
            let total: f64 = durations.iter().sum();
            for &target in &targets {
                let seq = build_sequence(durations, target).unwrap();

                assert!(seq.loops >= 1);
                assert_eq!(seq.loops, (target / total).ceil().max(1.0) as u32);
                assert!(seq.duration <= target + 1e-9);
                assert!((seq.duration - target.min(total * seq.loops as f64)).abs() < 1e-9);
                assert!((entries_sum(&seq) - seq.duration).abs() < MIN_ENTRY_SECS);

                // Order is the selection order within every repetition
                let non_empty: Vec<usize> = durations
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| **d > 0.0)
                    .map(|(i, _)| i)
                    .collect();
                for (pos, entry) in seq.entries.iter().enumerate() {
                    assert_eq!(entry.clip_index, non_empty[pos % non_empty.len()]);
                }
            }
        }
    }
}
