//! Headless sequencer host for polyseq.
//!
//! [`Sequencer`] wraps a [`PlaybackEngine`] the way a modular synth module
//! would: it is stepped once per sample, reads clock/reset/run input
//! voltages, and exposes polyphonic CV and gate output voltages per track.

mod config;
mod outputs;

use std::sync::Arc;

use ps_engine::{ClockRate, PlaybackEngine, SchmittTrigger, TickDivider, MAX_VOICES};
use ps_ir::{MetricTime, SharedSong};
use tracing::{debug, info};

pub use crate::config::{ConfigError, SequencerConfig, TrackConfig};
pub use crate::outputs::{VoltageOutputs, GATE_HIGH_VOLTS};

/// Samples between engine updates.
pub const SAMPLES_PER_UPDATE: usize = 4;

const POLY_LABELS: [&str; MAX_VOICES] = [
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
];

/// Input voltages, sampled on every engine update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Inputs {
    /// Clock pulses
    pub clock: f32,
    /// Rising edge rewinds to the start
    pub reset: f32,
    /// Rising edge toggles run/stop
    pub run: f32,
}

/// A four-track polyphonic sequencer, stepped per sample.
pub struct Sequencer {
    engine: PlaybackEngine<VoltageOutputs>,
    divider: TickDivider,
    inputs: Inputs,
    run_trigger: SchmittTrigger,
    run_stop_requested: bool,
    running: bool,
    was_running: bool,
    clock_rate: ClockRate,
    sample_rate: f32,
    retrigger_ms: f32,
    polyphony: Vec<usize>,
}

impl Sequencer {
    /// Build a sequencer for `song`. Transport starts running.
    pub fn new(song: Arc<SharedSong>, config: &SequencerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let clock_rate = config.parsed_clock_rate()?;
        let polyphony: Vec<usize> = config.tracks.iter().map(|t| t.polyphony).collect();

        let engine = PlaybackEngine::new(song, polyphony.len(), VoltageOutputs::default());
        let mut sequencer = Self {
            engine,
            divider: TickDivider::new(SAMPLES_PER_UPDATE),
            inputs: Inputs::default(),
            run_trigger: SchmittTrigger::new(true),
            run_stop_requested: false,
            running: true,
            was_running: false,
            clock_rate,
            sample_rate: config.sample_rate,
            retrigger_ms: config.retrigger_ms,
            polyphony,
        };
        sequencer.on_sample_rate_change(config.sample_rate);
        Ok(sequencer)
    }

    /// Advance by one sample.
    pub fn step(&mut self) {
        if let Some(samples) = self.divider.step() {
            self.stepn(samples);
        }
    }

    /// Set the input voltages seen by subsequent steps.
    pub fn set_inputs(&mut self, inputs: Inputs) {
        self.inputs = inputs;
    }

    pub fn inputs(&self) -> Inputs {
        self.inputs
    }

    /// Flip run/stop on the next update.
    pub fn toggle_run_stop(&mut self) {
        self.run_stop_requested = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_clock_rate(&mut self, rate: ClockRate) {
        self.clock_rate = rate;
    }

    pub fn clock_rate(&self) -> ClockRate {
        self.clock_rate
    }

    /// Set the polyphony (1..=16) of one track.
    pub fn set_polyphony(&mut self, track: usize, voices: usize) {
        debug_assert!(track < self.polyphony.len(), "track {} out of range", track);
        debug_assert!((1..=MAX_VOICES).contains(&voices), "polyphony {} out of range", voices);
        if let Some(p) = self.polyphony.get_mut(track) {
            *p = voices.clamp(1, MAX_VOICES);
        }
    }

    /// Recompute everything that depends on the sample rate.
    pub fn on_sample_rate_change(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        let samples = crate::config::retrigger_samples(self.retrigger_ms, sample_rate);
        info!(sample_rate, retrigger_samples = samples, "sample rate changed");
        self.engine.set_sample_count_for_retrigger(samples);
    }

    /// Replace the song and start it from the top.
    pub fn set_song(&mut self, song: Arc<SharedSong>) {
        self.engine.set_song(song);
    }

    /// The song being played.
    pub fn song(&self) -> &Arc<SharedSong> {
        self.engine.song()
    }

    /// 0 while stopped, otherwise the section playing on `track` (0 = none).
    pub fn play_status(&self, track: usize) -> usize {
        if !self.running {
            return 0;
        }
        self.engine.get_section(track)
    }

    pub fn set_next_section_request(&mut self, track: usize, section: usize) {
        self.engine.set_next_section_request(track, section);
    }

    pub fn get_next_section_request(&self, track: usize) -> usize {
        self.engine.get_next_section_request(track)
    }

    /// Current metric time (-1 before the first clock).
    pub fn metric_time(&self) -> MetricTime {
        self.engine.clock().cur_metric_time()
    }

    pub fn outputs(&self) -> &VoltageOutputs {
        self.engine.sink()
    }

    pub fn engine(&self) -> &PlaybackEngine<VoltageOutputs> {
        &self.engine
    }

    pub fn num_tracks(&self) -> usize {
        self.engine.num_tracks()
    }

    pub fn clock_rate_labels() -> [&'static str; 8] {
        ClockRate::labels()
    }

    pub fn poly_labels() -> [&'static str; MAX_VOICES] {
        POLY_LABELS
    }

    /// One engine update covering `samples` samples.
    fn stepn(&mut self, samples: usize) {
        self.service_run_stop();
        self.engine.setup_clock(self.clock_rate, self.sample_rate);

        let running = self.running;
        let samples = samples as u32;
        let results = self
            .engine
            .update_clock(samples, self.inputs.clock, running, self.inputs.reset);
        if results.did_reset {
            self.engine.reset(true);
            // in case of stuck notes
            self.engine.sink_mut().all_gates_off();
        }

        let quantize_interval = self.engine.clock().metric_time_per_clock();
        self.engine
            .update_to_metric_time(results.total_elapsed_time, quantize_interval, running);

        for (track, &voices) in self.polyphony.iter().enumerate() {
            self.engine.sink_mut().set_channels(track, voices);
            self.engine.set_num_voices(track, voices);
        }

        if !running && self.was_running {
            // a voice in its retrigger gap would otherwise open after this
            self.engine.reset_all_voices(true);
            self.engine.sink_mut().all_gates_off();
        }
        self.was_running = running;

        self.engine.update_sample_count(samples);
    }

    fn service_run_stop(&mut self) {
        let toggled = self.run_trigger.process(self.inputs.run);
        if toggled || self.run_stop_requested {
            self.run_stop_requested = false;
            self.running = !self.running;
            debug!(running = self.running, "run/stop toggled");
        }
    }
}
