//! Quarter-note based time representation.
//!
//! Metric time is measured in quarter notes: 1.0 is one quarter note,
//! independent of tempo or sample rate. The clock advances it in whole
//! multiples of its per-pulse interval, and the players compare event start
//! times against it after snapping them to that interval.

/// A position in metric time (quarter notes from song start).
pub type MetricTime = f64;

/// One quarter note.
pub const QUARTER_NOTE: MetricTime = 1.0;

/// One eighth note.
pub const EIGHTH_NOTE: MetricTime = 0.5;

/// One sixteenth note.
pub const SIXTEENTH_NOTE: MetricTime = 0.25;

/// Snap `time` to the nearest multiple of `interval`.
///
/// With `allow_zero == false` a time that would snap to zero snaps to one
/// interval instead. A non-positive interval disables quantization.
pub fn quantize(time: MetricTime, interval: MetricTime, allow_zero: bool) -> MetricTime {
    if interval <= 0.0 {
        return time;
    }
    let mut steps = (time / interval).round();
    if !allow_zero && steps == 0.0 {
        steps = 1.0;
    }
    steps * interval
}

/// Quantized end time for a note that starts at the (already quantized)
/// `start` and lasts `duration`.
///
/// The end is always at least one interval after the start, so a very short
/// note still produces a gate the destination can see.
pub fn quantize_note_end(start: MetricTime, duration: MetricTime, interval: MetricTime) -> MetricTime {
    if interval <= 0.0 {
        return start + duration;
    }
    let end = quantize(start + duration, interval, true);
    if end <= start {
        start + interval
    } else {
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_rounds_to_nearest() {
        assert_eq!(quantize(1.1, 0.25, true), 1.0);
        assert_eq!(quantize(1.2, 0.25, true), 1.25);
        assert_eq!(quantize(0.9, 0.5, true), 1.0);
    }

    #[test]
    fn quantize_exact_multiple_is_unchanged() {
        assert_eq!(quantize(4.0, 0.5, true), 4.0);
        assert_eq!(quantize(0.0, SIXTEENTH_NOTE, true), 0.0);
    }

    #[test]
    fn quantize_disallowing_zero_snaps_up() {
        assert_eq!(quantize(0.1, 0.5, false), 0.5);
        assert_eq!(quantize(0.1, 0.5, true), 0.0);
    }

    #[test]
    fn quantize_with_zero_interval_is_identity() {
        assert_eq!(quantize(1.2345, 0.0, true), 1.2345);
    }

    #[test]
    fn note_end_is_at_least_one_interval() {
        // a 32nd note on a quarter-note clock still lasts one clock
        assert_eq!(quantize_note_end(2.0, 0.125, QUARTER_NOTE), 3.0);
    }

    #[test]
    fn note_end_rounds_like_start() {
        assert_eq!(quantize_note_end(1.0, 2.0, SIXTEENTH_NOTE), 3.0);
        assert_eq!(quantize_note_end(0.0, 0.5, 0.001), 0.5);
    }
}
