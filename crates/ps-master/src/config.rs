//! Typed configuration for the sequencer host.

use std::path::Path;

use config::{Config, File};
use ps_engine::{ClockRate, MAX_VOICES};
use ps_ir::MAX_TRACKS;
use serde::Deserialize;

/// Errors from building or loading a [`SequencerConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("track count must be 1..={max}, got {count}", max = MAX_TRACKS)]
    TrackCount { count: usize },

    #[error("polyphony for track {track} must be 1..={max}, got {polyphony}", max = MAX_VOICES)]
    Polyphony { track: usize, polyphony: usize },

    #[error("unknown clock rate {0:?}")]
    UnknownClockRate(String),

    #[error("sample rate must be positive, got {0}")]
    SampleRate(f32),

    #[error("retrigger time must not be negative, got {0} ms")]
    RetriggerTime(f32),
}

/// Per-track settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackConfig {
    /// Number of voices (1..=16)
    pub polyphony: usize,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self { polyphony: 1 }
    }
}

/// Sequencer host settings.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SequencerConfig {
    /// Samples per second
    pub sample_rate: f32,
    /// Clock rate label, as listed by [`ClockRate::labels`]
    pub clock_rate: String,
    /// Gate-low gap forced between touching notes, in milliseconds
    pub retrigger_ms: f32,
    /// One entry per output track
    pub tracks: Vec<TrackConfig>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            clock_rate: ClockRate::Quarter.label().to_string(),
            retrigger_ms: 1.0,
            tracks: vec![TrackConfig::default()],
        }
    }
}

impl SequencerConfig {
    /// Load a configuration file (format chosen by extension).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SequencerConfig>()?)
    }

    /// Check every value against the ranges the engine accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate > 0.0) {
            return Err(ConfigError::SampleRate(self.sample_rate));
        }
        if !(self.retrigger_ms >= 0.0) {
            return Err(ConfigError::RetriggerTime(self.retrigger_ms));
        }
        self.parsed_clock_rate()?;
        if !(1..=MAX_TRACKS).contains(&self.tracks.len()) {
            return Err(ConfigError::TrackCount {
                count: self.tracks.len(),
            });
        }
        for (track, config) in self.tracks.iter().enumerate() {
            if !(1..=MAX_VOICES).contains(&config.polyphony) {
                return Err(ConfigError::Polyphony {
                    track,
                    polyphony: config.polyphony,
                });
            }
        }
        Ok(())
    }

    /// The clock rate named by `clock_rate`.
    pub fn parsed_clock_rate(&self) -> Result<ClockRate, ConfigError> {
        ClockRate::from_label(&self.clock_rate)
            .ok_or_else(|| ConfigError::UnknownClockRate(self.clock_rate.clone()))
    }

    /// Retrigger gap converted to samples.
    pub fn retrigger_samples(&self) -> u32 {
        retrigger_samples(self.retrigger_ms, self.sample_rate)
    }
}

pub(crate) fn retrigger_samples(ms: f32, sample_rate: f32) -> u32 {
    (ms / 1000.0 * sample_rate).max(0.0) as u32
}
