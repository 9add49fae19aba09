//! Musical clock: turns clock pulses into metric time.
//!
//! Each rising edge of the external clock input advances metric time by
//! one clock-rate step. A rising edge on the reset input rewinds to the
//! "not started" state, in which the next clock pulse lands on time 0.

use ps_ir::{quantize, MetricTime};

/// Accumulated error below which a clocked time counts as on the grid.
const GRID_TOLERANCE: MetricTime = 1e-9;

/// Voltage above which an input reads high.
pub const TRIGGER_HIGH: f32 = 1.0;
/// Voltage below which an input reads low again.
pub const TRIGGER_LOW: f32 = 0.25;

/// Metric time reported before the first clock pulse.
pub const NOT_STARTED: MetricTime = -1.0;

/// Turns a voltage level into clean rising edges, with hysteresis.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchmittTrigger {
    high: bool,
}

impl SchmittTrigger {
    /// Create a trigger in the given initial state.
    ///
    /// Starting high suppresses a spurious edge from an input that is
    /// already high at startup.
    pub fn new(high: bool) -> Self {
        Self { high }
    }

    /// Feed one input level. Returns true on a rising edge.
    pub fn process(&mut self, volts: f32) -> bool {
        if self.high {
            if volts < TRIGGER_LOW {
                self.high = false;
            }
            false
        } else if volts > TRIGGER_HIGH {
            self.high = true;
            true
        } else {
            false
        }
    }

    /// Current debounced level.
    pub fn is_high(&self) -> bool {
        self.high
    }
}

/// What each clock pulse is worth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClockRate {
    /// MIDI-style clock, 24 pulses per quarter note
    External,
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
}

impl ClockRate {
    /// All rates, in the order of [`ClockRate::labels`].
    pub const ALL: [ClockRate; 8] = [
        ClockRate::External,
        ClockRate::Whole,
        ClockRate::Half,
        ClockRate::Quarter,
        ClockRate::Eighth,
        ClockRate::Sixteenth,
        ClockRate::ThirtySecond,
        ClockRate::SixtyFourth,
    ];

    /// Human-readable labels, indexed like [`ClockRate::ALL`].
    pub fn labels() -> [&'static str; 8] {
        Self::ALL.map(ClockRate::label)
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            ClockRate::External => "External x24",
            ClockRate::Whole => "Whole note",
            ClockRate::Half => "Half note",
            ClockRate::Quarter => "Quarter note",
            ClockRate::Eighth => "Eighth note",
            ClockRate::Sixteenth => "Sixteenth note",
            ClockRate::ThirtySecond => "32nd note",
            ClockRate::SixtyFourth => "64th note",
        }
    }

    /// Look up a rate by its position in [`ClockRate::labels`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Look up a rate by label, ignoring ASCII case.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rate| rate.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Metric time (in quarter notes) advanced by one clock pulse.
    pub fn metric_time_per_clock(self) -> MetricTime {
        match self {
            ClockRate::External => 1.0 / 24.0,
            ClockRate::Whole => 4.0,
            ClockRate::Half => 2.0,
            ClockRate::Quarter => 1.0,
            ClockRate::Eighth => 0.5,
            ClockRate::Sixteenth => 0.25,
            ClockRate::ThirtySecond => 0.125,
            ClockRate::SixtyFourth => 0.0625,
        }
    }
}

/// Result of one [`Clock::update`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockResults {
    /// A reset edge was seen during this update
    pub did_reset: bool,
    /// Metric time after this update ([`NOT_STARTED`] before the first pulse)
    pub total_elapsed_time: MetricTime,
}

/// Pulse-driven metric clock.
#[derive(Clone, Debug)]
pub struct Clock {
    rate: ClockRate,
    metric_time_per_clock: MetricTime,
    elapsed: MetricTime,
    clock_trigger: SchmittTrigger,
    reset_trigger: SchmittTrigger,
    /// Samples in the post-reset window during which pulses are ignored
    reset_lockout_samples: u32,
    /// Samples left in the current lockout window
    lockout_remaining: u32,
}

impl Default for Clock {
    fn default() -> Self {
        let rate = ClockRate::default();
        Self {
            rate,
            metric_time_per_clock: rate.metric_time_per_clock(),
            elapsed: NOT_STARTED,
            clock_trigger: SchmittTrigger::default(),
            reset_trigger: SchmittTrigger::default(),
            reset_lockout_samples: 0,
            lockout_remaining: 0,
        }
    }
}

impl Clock {
    /// Create a clock at the default rate with no reset lockout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the clock rate and recompute sample-rate dependent state.
    pub fn setup(&mut self, rate: ClockRate, samples_per_second: f32) {
        self.rate = rate;
        self.metric_time_per_clock = rate.metric_time_per_clock();
        self.reset_lockout_samples = (samples_per_second.max(0.0) / 1000.0).round() as u32;
    }

    /// Advance by `samples` samples with the given input levels.
    pub fn update(
        &mut self,
        samples: u32,
        clock_volts: f32,
        running: bool,
        reset_volts: f32,
    ) -> ClockResults {
        self.lockout_remaining = self.lockout_remaining.saturating_sub(samples);

        let did_reset = self.reset_trigger.process(reset_volts);
        if did_reset {
            self.reset();
            self.lockout_remaining = self.reset_lockout_samples;
        }

        let clocked = self.clock_trigger.process(clock_volts);
        if clocked && running && self.lockout_remaining == 0 {
            self.elapsed = if self.elapsed < 0.0 {
                0.0
            } else {
                self.advance()
            };
        }

        ClockResults {
            did_reset,
            total_elapsed_time: self.elapsed,
        }
    }

    /// One pulse past the current time. Whole pulse counts are snapped to
    /// the pulse grid so they compare equal to quantized note times.
    fn advance(&self) -> MetricTime {
        let step = self.metric_time_per_clock;
        let next = self.elapsed + step;
        let snapped = quantize(next, step, true);
        if (snapped - next).abs() < GRID_TOLERANCE {
            snapped
        } else {
            next
        }
    }

    /// Rewind to the "not started" state.
    pub fn reset(&mut self) {
        self.elapsed = NOT_STARTED;
    }

    /// Current metric time ([`NOT_STARTED`] before the first pulse).
    pub fn cur_metric_time(&self) -> MetricTime {
        self.elapsed
    }

    /// Metric time advanced by one pulse at the current rate.
    pub fn metric_time_per_clock(&self) -> MetricTime {
        self.metric_time_per_clock
    }

    /// The selected clock rate.
    pub fn rate(&self) -> ClockRate {
        self.rate
    }
}
