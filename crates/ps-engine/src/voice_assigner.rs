//! VoiceAssigner: picks which voice plays each new note.

use ps_ir::MetricTime;

use crate::sink::Sink;
use crate::voice::Voice;

/// Maximum number of voices per track.
pub const MAX_VOICES: usize = 16;

/// Identifier for a voice slot in the assigner.
pub type VoiceId = usize;

/// Fixed pool of voices for one track, allocated round-robin.
///
/// Allocation order:
/// 1. an idle voice that last played the same pitch,
/// 2. the first idle voice at or after the cursor (wrapping),
/// 3. the voice at the cursor, stolen.
///
/// The cursor moves past every voice handed out by 2 and 3, so sustained
/// overload cycles through the pool instead of hammering voice 0.
#[derive(Clone, Debug)]
pub struct VoiceAssigner {
    voices: [Voice; MAX_VOICES],
    num_voices: usize,
    cursor: usize,
}

impl VoiceAssigner {
    /// Create a monophonic assigner for a track.
    pub fn new(track: usize) -> Self {
        Self {
            voices: core::array::from_fn(|i| Voice::new(track, i)),
            num_voices: 1,
            cursor: 0,
        }
    }

    /// Number of voices in use.
    pub fn num_voices(&self) -> usize {
        self.num_voices
    }

    /// Restrict allocation to the first `n` voices. Voices dropped from the
    /// pool are silenced.
    pub fn set_num_voices<S: Sink>(&mut self, n: usize, sink: &mut S) {
        debug_assert!(n <= MAX_VOICES, "polyphony {} out of range", n);
        let n = n.clamp(1, MAX_VOICES);
        for voice in &mut self.voices[n..] {
            voice.reset(true, sink);
        }
        self.num_voices = n;
        self.cursor %= n;
    }

    /// Choose the voice for a new note.
    pub fn get_next(&mut self, pitch: f32) -> VoiceId {
        let n = self.num_voices;
        let active = &self.voices[..n];

        if let Some(id) = active
            .iter()
            .position(|v| v.is_idle() && v.pitch() == Some(pitch))
        {
            return id;
        }

        let id = (0..n)
            .map(|offset| (self.cursor + offset) % n)
            .find(|&i| active[i].is_idle())
            .unwrap_or(self.cursor);
        self.cursor = (id + 1) % n;
        id
    }

    pub fn voice(&self, id: VoiceId) -> &Voice {
        &self.voices[id]
    }

    pub fn voice_mut(&mut self, id: VoiceId) -> &mut Voice {
        &mut self.voices[id]
    }

    /// The voices in use.
    pub fn voices(&self) -> &[Voice] {
        &self.voices[..self.num_voices]
    }

    /// Earliest end time among busy voices.
    pub fn next_note_end(&self) -> Option<MetricTime> {
        self.voices()
            .iter()
            .filter_map(Voice::pending_note_end)
            .reduce(MetricTime::min)
    }

    /// End the earliest note that finishes at or before `horizon`.
    /// Returns true if a voice changed state.
    pub fn poll_note_off<S: Sink>(&mut self, horizon: MetricTime, sink: &mut S) -> bool {
        let n = self.num_voices;
        let earliest = self.voices[..n]
            .iter_mut()
            .filter_map(|v| v.pending_note_end().map(|end| (end, v)))
            .filter(|(end, _)| *end <= horizon)
            .min_by(|(a, _), (b, _)| a.total_cmp(b));
        match earliest {
            Some((end, voice)) => voice.update_to_metric_time(end, sink),
            None => false,
        }
    }

    pub fn set_sample_count_for_retrigger(&mut self, samples: u32) {
        for voice in &mut self.voices {
            voice.set_sample_count_for_retrigger(samples);
        }
    }

    /// Forward elapsed samples to every voice.
    pub fn update_sample_count<S: Sink>(&mut self, samples: u32, sink: &mut S) {
        for voice in &mut self.voices[..self.num_voices] {
            voice.update_sample_count(samples, sink);
        }
    }

    /// Force every voice to idle.
    pub fn reset_all<S: Sink>(&mut self, clear_gates: bool, sink: &mut S) {
        for voice in &mut self.voices {
            voice.reset(clear_gates, sink);
        }
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::voice::VoiceState;

    fn assigner(n: usize, sink: &mut RecordingSink) -> VoiceAssigner {
        let mut va = VoiceAssigner::new(0);
        va.set_num_voices(n, sink);
        va
    }

    #[test]
    fn single_voice_is_always_chosen() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(1, &mut sink);
        assert_eq!(va.get_next(0.0), 0);
        assert_eq!(va.get_next(0.0), 0);
    }

    #[test]
    fn busy_voice_is_skipped() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(2, &mut sink);
        let id = va.get_next(0.0);
        assert_eq!(id, 0);
        va.voice_mut(id).play_note(3.0, 0.0, 1.0, &mut sink);
        assert_eq!(va.get_next(0.0), 1);
    }

    #[test]
    fn idle_voice_with_same_pitch_is_reused() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(4, &mut sink);

        let a = va.get_next(0.0);
        va.voice_mut(a).play_note(0.0, 0.0, 10.0, &mut sink);
        let b = va.get_next(1.0);
        va.voice_mut(b).play_note(1.0, 0.0, 10.0, &mut sink);
        assert_eq!((a, b), (0, 1));

        assert!(va.voice_mut(0).update_to_metric_time(20.0, &mut sink));
        assert!(va.voice_mut(1).update_to_metric_time(20.0, &mut sink));

        assert_eq!(va.get_next(1.0), 1);
    }

    #[test]
    fn overflow_steals_in_rotation() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(4, &mut sink);

        let mut assigned = Vec::new();
        for pitch in 0..5 {
            let id = va.get_next(pitch as f32);
            va.voice_mut(id).play_note(pitch as f32, 0.0, 10.0, &mut sink);
            assigned.push(id);
        }
        assert_eq!(assigned, vec![0, 1, 2, 3, 0]);
        assert_eq!(va.voice(0).state(), VoiceState::Retriggering);
        assert_eq!(va.voice(0).pitch(), Some(4.0));
    }

    #[test]
    fn overlapping_notes_use_two_voices() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(4, &mut sink);

        let a = va.get_next(0.0);
        va.voice_mut(a).play_note(0.0, 1.0, 2.0, &mut sink);
        let b = va.get_next(1.0);
        va.voice_mut(b).play_note(1.0, 2.0, 2.0, &mut sink);
        assert_eq!((a, b), (0, 1));
        assert_eq!(va.voice(b).state(), VoiceState::Playing);

        assert_eq!(va.next_note_end(), Some(3.0));
        assert!(va.poll_note_off(5.0, &mut sink));
        assert!(va.poll_note_off(5.0, &mut sink));
        assert!(!va.poll_note_off(5.0, &mut sink));
        assert!(va.voices().iter().all(Voice::is_idle));
    }

    #[test]
    fn mono_overlap_steals_the_only_voice() {
        let mut sink = RecordingSink::new();
        let mut va = VoiceAssigner::new(0);
        va.set_sample_count_for_retrigger(4);

        let a = va.get_next(0.0);
        va.voice_mut(a).play_note(0.0, 1.0, 2.0, &mut sink);
        let b = va.get_next(1.0);
        assert_eq!(b, 0);
        va.voice_mut(b).play_note(1.0, 2.0, 2.0, &mut sink);
        assert_eq!(va.voice(0).state(), VoiceState::Retriggering);

        va.update_sample_count(4, &mut sink);
        assert_eq!(va.voice(0).state(), VoiceState::Playing);
        assert!(va.poll_note_off(5.0, &mut sink));
        assert!(va.voice(0).is_idle());
    }

    #[test]
    fn back_to_back_notes_cycle_through_four_voices() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(4, &mut sink);

        let mut ids = Vec::new();
        for i in 0..5 {
            let start = i as MetricTime;
            let id = va.get_next(i as f32);
            va.voice_mut(id).play_note(i as f32, start, 0.5, &mut sink);
            assert!(va.poll_note_off(start + 0.5, &mut sink));
            ids.push(id);
        }
        assert_eq!(ids, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn idle_voices_rotate() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(2, &mut sink);

        let id = va.get_next(0.0);
        assert_eq!(id, 0);
        va.voice_mut(id).play_note(0.0, 1.0, 2.0, &mut sink);
        assert!(va.poll_note_off(5.0, &mut sink));

        let id = va.get_next(1.0);
        assert_eq!(id, 1);
        va.voice_mut(id).play_note(0.0, 5.0, 1.0, &mut sink);
        assert!(va.poll_note_off(7.0, &mut sink));

        // neither idle voice last played 1.0, so the cursor wins
        assert_eq!(va.get_next(1.0), 0);
    }

    #[test]
    fn poll_note_off_takes_earliest_first() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(2, &mut sink);
        va.voice_mut(0).play_note(0.0, 0.0, 3.0, &mut sink);
        va.voice_mut(1).play_note(1.0, 0.0, 2.0, &mut sink);

        assert!(!va.poll_note_off(1.5, &mut sink));
        assert!(va.poll_note_off(4.0, &mut sink));
        assert!(va.voice(0).pending_note_end().is_some());
        assert!(va.voice(1).is_idle());
    }

    #[test]
    fn lowering_polyphony_silences_dropped_voices() {
        let mut sink = RecordingSink::new();
        let mut va = assigner(4, &mut sink);
        va.voice_mut(3).play_note(1.0, 0.0, 8.0, &mut sink);
        assert!(sink.gate(0, 3));

        va.set_num_voices(2, &mut sink);
        assert_eq!(va.num_voices(), 2);
        assert!(!sink.gate(0, 3));
        assert!(va.voice(3).is_idle());
    }
}
