//! The output side of the engine: where gate and pitch changes go.

use heapless::Deque;
use ps_ir::MAX_TRACKS;

use crate::voice_assigner::MAX_VOICES;

/// Receives gate and pitch changes from the voices.
///
/// Calls arrive on the audio thread in metric-time order per track. An
/// implementation must not block.
pub trait Sink {
    /// Open or close the gate of one voice.
    fn set_gate(&mut self, track: usize, voice: usize, on: bool);

    /// Set the pitch CV (1V/octave) of one voice.
    fn set_cv(&mut self, track: usize, voice: usize, cv: f32);

    /// The engine could not read the song this tick.
    fn on_lock_failed(&mut self) {}
}

impl<T: Sink + ?Sized> Sink for &mut T {
    fn set_gate(&mut self, track: usize, voice: usize, on: bool) {
        (**self).set_gate(track, voice, on);
    }

    fn set_cv(&mut self, track: usize, voice: usize, cv: f32) {
        (**self).set_cv(track, voice, cv);
    }

    fn on_lock_failed(&mut self) {
        (**self).on_lock_failed();
    }
}

/// One call received by a [`RecordingSink`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SinkCall {
    Gate { track: usize, voice: usize, on: bool },
    Cv { track: usize, voice: usize, cv: f32 },
    LockFailed,
}

/// Transcript capacity of a [`RecordingSink`]; older calls are dropped first.
pub const TRANSCRIPT_CAPACITY: usize = 1024;

/// A sink that remembers the current output state and every call it got.
///
/// The transcript is a fixed-capacity ring buffer so the sink never
/// allocates while recording.
#[derive(Clone, Debug)]
pub struct RecordingSink {
    gates: [[bool; MAX_VOICES]; MAX_TRACKS],
    cvs: [[Option<f32>; MAX_VOICES]; MAX_TRACKS],
    /// Number of `set_gate` calls received
    pub gate_change_count: usize,
    /// Number of `set_cv` calls received
    pub cv_change_count: usize,
    /// Number of `on_lock_failed` calls received
    pub lock_conflicts: usize,
    transcript: Deque<SinkCall, TRANSCRIPT_CAPACITY>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self {
            gates: [[false; MAX_VOICES]; MAX_TRACKS],
            cvs: [[None; MAX_VOICES]; MAX_TRACKS],
            gate_change_count: 0,
            cv_change_count: 0,
            lock_conflicts: 0,
            transcript: Deque::new(),
        }
    }
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current gate state of a voice.
    pub fn gate(&self, track: usize, voice: usize) -> bool {
        self.gates[track][voice]
    }

    /// Last CV sent to a voice, if any.
    pub fn cv(&self, track: usize, voice: usize) -> Option<f32> {
        self.cvs[track][voice]
    }

    /// Number of voices with an open gate on a track.
    pub fn open_gates(&self, track: usize) -> usize {
        self.gates[track].iter().filter(|&&g| g).count()
    }

    /// Recorded calls, oldest first.
    pub fn transcript(&self) -> impl Iterator<Item = &SinkCall> + '_ {
        self.transcript.iter()
    }

    /// Number of calls held in the transcript.
    pub fn transcript_len(&self) -> usize {
        self.transcript.len()
    }

    /// Forget the transcript but keep the output state and counters.
    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    fn record(&mut self, call: SinkCall) {
        if self.transcript.is_full() {
            self.transcript.pop_front();
        }
        let _ = self.transcript.push_back(call);
    }
}

impl Sink for RecordingSink {
    fn set_gate(&mut self, track: usize, voice: usize, on: bool) {
        debug_assert!(track < MAX_TRACKS && voice < MAX_VOICES);
        self.gates[track][voice] = on;
        self.gate_change_count += 1;
        self.record(SinkCall::Gate { track, voice, on });
    }

    fn set_cv(&mut self, track: usize, voice: usize, cv: f32) {
        debug_assert!(track < MAX_TRACKS && voice < MAX_VOICES);
        self.cvs[track][voice] = Some(cv);
        self.cv_change_count += 1;
        self.record(SinkCall::Cv { track, voice, cv });
    }

    fn on_lock_failed(&mut self) {
        self.lock_conflicts += 1;
        self.record(SinkCall::LockFailed);
    }
}
