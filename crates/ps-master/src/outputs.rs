//! Output voltage buffers the engine writes into.

use ps_engine::{Sink, MAX_VOICES};
use ps_ir::MAX_TRACKS;

/// Gate voltage while a voice sounds.
pub const GATE_HIGH_VOLTS: f32 = 10.0;

/// Per-track polyphonic CV and gate outputs.
#[derive(Clone, Debug)]
pub struct VoltageOutputs {
    cv: [[f32; MAX_VOICES]; MAX_TRACKS],
    gate: [[f32; MAX_VOICES]; MAX_TRACKS],
    channels: [usize; MAX_TRACKS],
    lock_failures: u64,
}

impl Default for VoltageOutputs {
    fn default() -> Self {
        Self {
            cv: [[0.0; MAX_VOICES]; MAX_TRACKS],
            gate: [[0.0; MAX_VOICES]; MAX_TRACKS],
            channels: [1; MAX_TRACKS],
            lock_failures: 0,
        }
    }
}

impl VoltageOutputs {
    /// CV output of one voice, in volts.
    pub fn cv(&self, track: usize, voice: usize) -> f32 {
        self.cv[track][voice]
    }

    /// Gate output of one voice, in volts.
    pub fn gate(&self, track: usize, voice: usize) -> f32 {
        self.gate[track][voice]
    }

    /// The active CV channels of a track.
    pub fn cv_channels(&self, track: usize) -> &[f32] {
        &self.cv[track][..self.channels[track]]
    }

    /// The active gate channels of a track.
    pub fn gate_channels(&self, track: usize) -> &[f32] {
        &self.gate[track][..self.channels[track]]
    }

    /// Number of active channels on a track.
    pub fn channels(&self, track: usize) -> usize {
        self.channels[track]
    }

    pub fn set_channels(&mut self, track: usize, channels: usize) {
        self.channels[track] = channels.clamp(1, MAX_VOICES);
    }

    /// Times the engine reported it could not read the song.
    pub fn lock_failures(&self) -> u64 {
        self.lock_failures
    }

    /// Drop every gate to 0 V.
    pub fn all_gates_off(&mut self) {
        for track in &mut self.gate {
            track.fill(0.0);
        }
    }
}

impl Sink for VoltageOutputs {
    fn set_gate(&mut self, track: usize, voice: usize, on: bool) {
        debug_assert!(track < MAX_TRACKS && voice < MAX_VOICES);
        self.gate[track][voice] = if on { GATE_HIGH_VOLTS } else { 0.0 };
    }

    fn set_cv(&mut self, track: usize, voice: usize, cv: f32) {
        debug_assert!(track < MAX_TRACKS && voice < MAX_VOICES);
        self.cv[track][voice] = cv;
    }

    fn on_lock_failed(&mut self) {
        self.lock_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_calls_become_voltages() {
        let mut out = VoltageOutputs::default();
        out.set_gate(2, 5, true);
        out.set_cv(2, 5, -0.5);
        assert_eq!(out.gate(2, 5), GATE_HIGH_VOLTS);
        assert_eq!(out.cv(2, 5), -0.5);

        out.set_gate(2, 5, false);
        assert_eq!(out.gate(2, 5), 0.0);
    }

    #[test]
    fn channel_slices_follow_polyphony() {
        let mut out = VoltageOutputs::default();
        assert_eq!(out.gate_channels(0).len(), 1);
        out.set_channels(0, 6);
        assert_eq!(out.gate_channels(0).len(), 6);
        assert_eq!(out.cv_channels(0).len(), 6);
        out.set_channels(0, 40);
        assert_eq!(out.channels(0), MAX_VOICES);
    }

    #[test]
    fn all_gates_off_keeps_cv() {
        let mut out = VoltageOutputs::default();
        out.set_gate(0, 0, true);
        out.set_gate(3, 15, true);
        out.set_cv(3, 15, 1.0);
        out.all_gates_off();
        assert_eq!(out.gate(0, 0), 0.0);
        assert_eq!(out.gate(3, 15), 0.0);
        assert_eq!(out.cv(3, 15), 1.0);
    }
}
