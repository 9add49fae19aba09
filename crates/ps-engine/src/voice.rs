//! Voice: single-note playback state machine.

use ps_ir::MetricTime;

use crate::sink::Sink;

/// Voice lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    /// Gate closed, nothing pending.
    #[default]
    Idle,
    /// Gate open.
    Playing,
    /// Gate held low for a short gap before the pending note opens it.
    Retriggering,
}

/// Default gate-low gap in samples, about 1 ms at 44.1 kHz.
pub const DEFAULT_RETRIGGER_SAMPLES: u32 = 44;

/// One output voice of a track.
///
/// A voice sends gate and CV changes for a fixed `(track, index)` pair. It
/// only calls the sink when its output actually changes.
#[derive(Clone, Debug)]
pub struct Voice {
    track: usize,
    index: usize,
    state: VoiceState,
    /// Pitch of the current (or pending) note
    pitch: Option<f32>,
    /// Last CV sent to the sink
    sent_cv: Option<f32>,
    note_end_time: MetricTime,
    last_note_off_time: MetricTime,
    retrigger_samples: u32,
    retrigger_remaining: u32,
}

impl Voice {
    /// Create an idle voice.
    pub fn new(track: usize, index: usize) -> Self {
        Self {
            track,
            index,
            state: VoiceState::Idle,
            pitch: None,
            sent_cv: None,
            note_end_time: 0.0,
            last_note_off_time: MetricTime::NEG_INFINITY,
            retrigger_samples: DEFAULT_RETRIGGER_SAMPLES,
            retrigger_remaining: 0,
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Pitch of the current, pending, or last played note.
    pub fn pitch(&self) -> Option<f32> {
        self.pitch
    }

    pub fn is_idle(&self) -> bool {
        self.state == VoiceState::Idle
    }

    /// End time of the note this voice is busy with, if any.
    pub fn pending_note_end(&self) -> Option<MetricTime> {
        match self.state {
            VoiceState::Idle => None,
            VoiceState::Playing | VoiceState::Retriggering => Some(self.note_end_time),
        }
    }

    /// Set the minimum gate-low gap, in samples.
    pub fn set_sample_count_for_retrigger(&mut self, samples: u32) {
        self.retrigger_samples = samples;
    }

    /// Start a note.
    ///
    /// If the voice is still sounding, or its last note ended at or after
    /// `start_time`, the gate is closed first and the note opens it only
    /// after the retrigger gap.
    pub fn play_note<S: Sink>(
        &mut self,
        pitch: f32,
        start_time: MetricTime,
        duration: MetricTime,
        sink: &mut S,
    ) {
        self.pitch = Some(pitch);
        self.note_end_time = start_time + duration;

        let needs_gap = self.state != VoiceState::Idle || self.last_note_off_time >= start_time;
        if needs_gap {
            if self.state == VoiceState::Playing {
                sink.set_gate(self.track, self.index, false);
            }
            self.state = VoiceState::Retriggering;
            self.retrigger_remaining = self.retrigger_samples;
        } else {
            self.open_gate(pitch, sink);
        }
    }

    /// Close the gate if the note is over. Returns true if the state changed.
    pub fn update_to_metric_time<S: Sink>(&mut self, time: MetricTime, sink: &mut S) -> bool {
        match self.state {
            VoiceState::Playing if time >= self.note_end_time => {
                sink.set_gate(self.track, self.index, false);
            }
            // the gate is already low
            VoiceState::Retriggering if time >= self.note_end_time => {}
            _ => return false,
        }
        self.state = VoiceState::Idle;
        self.last_note_off_time = self.note_end_time;
        true
    }

    /// Count down the retrigger gap.
    pub fn update_sample_count<S: Sink>(&mut self, samples: u32, sink: &mut S) {
        if self.state != VoiceState::Retriggering {
            return;
        }
        self.retrigger_remaining = self.retrigger_remaining.saturating_sub(samples);
        if self.retrigger_remaining == 0 {
            if let Some(pitch) = self.pitch {
                self.open_gate(pitch, sink);
            }
        }
    }

    /// Force the voice to idle. With `clear_gates`, a sounding voice closes
    /// its gate.
    pub fn reset<S: Sink>(&mut self, clear_gates: bool, sink: &mut S) {
        if clear_gates && self.state == VoiceState::Playing {
            sink.set_gate(self.track, self.index, false);
        }
        self.state = VoiceState::Idle;
        self.last_note_off_time = MetricTime::NEG_INFINITY;
        self.retrigger_remaining = 0;
    }

    fn open_gate<S: Sink>(&mut self, pitch: f32, sink: &mut S) {
        self.state = VoiceState::Playing;
        sink.set_gate(self.track, self.index, true);
        if self.sent_cv != Some(pitch) {
            sink.set_cv(self.track, self.index, pitch);
            self.sent_cv = Some(pitch);
        }
    }
}
