//! TrackPlayer: walks one track's events and drives its voices.
//!
//! The player never holds on to the song. Every call that reads events
//! takes the song borrowed from the playback guard, and the player keeps
//! only a cursor into the current section plus the track time of the last
//! event it consumed. After an edit the cursor is recomputed from that
//! time, so inserts and deletes neither replay nor skip events.

use ps_ir::{
    quantize, quantize_note_end, Event, MetricTime, NoteEvent, Song, Track, TrackSlot,
    MAX_SECTIONS,
};
use tracing::debug;

use crate::sink::Sink;
use crate::voice_assigner::VoiceAssigner;

/// The next thing a player will do, and when.
#[derive(Clone, Copy, Debug)]
enum Action {
    Note(NoteEvent),
    EndOfIteration,
}

/// Plays one track of a song.
#[derive(Clone, Debug)]
pub struct TrackPlayer {
    track_index: usize,
    voices: VoiceAssigner,
    /// 0-based index of the sounding section, `None` when nothing is playable
    section: Option<usize>,
    /// Pending section request: 0 = none, 1..=4 = section number
    next_section_request: usize,
    /// Iterations left before moving to the next section
    loop_counter: u32,
    /// Metric time at which the current loop iteration began
    iteration_start: MetricTime,
    /// Index of the next event to consume in the current section
    cursor: usize,
    /// Track time of the last note consumed in this iteration
    last_consumed: Option<MetricTime>,
    /// Pick a section on the next song read
    needs_home: bool,
    running: bool,
    /// Metric time of the last song read
    now: MetricTime,
    /// Quantization in effect at the last song read
    quantize_interval: MetricTime,
    /// Time of the next pending action as of the last song read
    next_action_hint: Option<MetricTime>,
}

impl TrackPlayer {
    /// Create a player for track `track_index`, rewound to the start.
    pub fn new(track_index: usize) -> Self {
        Self {
            track_index,
            voices: VoiceAssigner::new(track_index),
            section: None,
            next_section_request: 0,
            loop_counter: 1,
            iteration_start: 0.0,
            cursor: 0,
            last_consumed: None,
            needs_home: true,
            running: true,
            now: 0.0,
            quantize_interval: 0.0,
            next_action_hint: None,
        }
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn voices(&self) -> &VoiceAssigner {
        &self.voices
    }

    /// Do the single earliest pending action due by `metric_time`.
    ///
    /// Pending actions are a voice's note-off, the next note, and the end of
    /// the loop iteration. A note-off due at or before the next event goes
    /// first. Returns true if something happened; call until it returns
    /// false to catch up.
    pub fn play_once<S: Sink>(
        &mut self,
        song: &Song,
        metric_time: MetricTime,
        quantize_interval: MetricTime,
        sink: &mut S,
    ) -> bool {
        self.quantize_interval = quantize_interval;
        if self.needs_home {
            self.home(song);
        }
        if self.next_section_request != 0 && (!self.running || self.section.is_none()) {
            self.apply_request_now(song, metric_time);
        }
        self.now = metric_time;

        let next = self.next_action(song, quantize_interval);
        self.next_action_hint = next.map(|(time, _)| time);

        let due = next.filter(|(time, _)| *time <= metric_time);
        let horizon = due.map_or(metric_time, |(time, _)| time);
        if self.voices.poll_note_off(horizon, sink) {
            return true;
        }

        match due {
            None => false,
            Some((start, Action::Note(note))) => {
                self.trigger(&note, start, quantize_interval, sink);
                true
            }
            Some((_, Action::EndOfIteration)) => {
                self.on_end_of_iteration(song);
                true
            }
        }
    }

    /// End notes due by `metric_time` without reading the song.
    ///
    /// Used when the song is locked by the editor. Note-offs never run past
    /// the next event seen at the last read, so output stays in time order.
    pub fn poll_note_offs<S: Sink>(&mut self, metric_time: MetricTime, sink: &mut S) -> bool {
        let horizon = self
            .next_action_hint
            .map_or(metric_time, |hint| hint.min(metric_time));
        self.voices.poll_note_off(horizon, sink)
    }

    /// Rewind to the start. The section is chosen again on the next read.
    pub fn reset(&mut self) {
        self.needs_home = true;
        self.iteration_start = 0.0;
        self.cursor = 0;
        self.last_consumed = None;
        self.next_action_hint = None;
        self.now = 0.0;
    }

    /// Re-derive the cursor after the song was edited.
    ///
    /// Notes that would have been due by the last read are skipped, so an
    /// edit behind the play position does not sound late.
    pub fn resync(&mut self, song: &Song, metric_time: MetricTime) {
        if self.needs_home {
            return;
        }
        match self.current_track(song) {
            Some(track) if has_loop(track) => {
                let (origin, _) = track.loop_bounds();
                let at_origin = track.first_index_at_or_after(origin);
                self.cursor = self
                    .last_consumed
                    .map_or(at_origin, |t| track.first_index_after(t).max(at_origin));
                self.skip_past_notes(song);
            }
            // the section went away: start over wherever something plays
            _ => {
                let first = self.slot(song).and_then(TrackSlot::first_playable);
                self.start_section_at(song, first, metric_time);
            }
        }
    }

    /// Force every voice to idle.
    pub fn reset_all_voices<S: Sink>(&mut self, clear_gates: bool, sink: &mut S) {
        self.voices.reset_all(clear_gates, sink);
    }

    pub fn set_num_voices<S: Sink>(&mut self, n: usize, sink: &mut S) {
        if n != self.voices.num_voices() {
            debug!(track = self.track_index, voices = n, "polyphony changed");
        }
        self.voices.set_num_voices(n, sink);
    }

    pub fn set_sample_count_for_retrigger(&mut self, samples: u32) {
        self.voices.set_sample_count_for_retrigger(samples);
    }

    pub fn update_sample_count<S: Sink>(&mut self, samples: u32, sink: &mut S) {
        self.voices.update_sample_count(samples, sink);
    }

    pub fn set_running_status(&mut self, running: bool) {
        self.running = running;
    }

    /// Metric time at which the current loop iteration began.
    pub fn current_loop_iteration_start(&self) -> MetricTime {
        self.iteration_start
    }

    /// Section currently playing: 0 = none, 1..=4 = section number.
    pub fn get_section(&self) -> usize {
        self.section.map_or(0, |s| s + 1)
    }

    /// Pending section request: 0 = none, 1..=4 = section number.
    pub fn get_next_section(&self) -> usize {
        self.next_section_request
    }

    /// Request a section (1..=4, 0 clears the request).
    ///
    /// With the song at hand the request is validated now, and applied
    /// immediately while transport is stopped. Otherwise it is validated
    /// when it is acted on.
    pub fn set_next_section(&mut self, section: usize, song: Option<&Song>) {
        debug_assert!(section <= MAX_SECTIONS, "section {} out of range", section);
        let section = section.min(MAX_SECTIONS);
        match song {
            Some(song) => {
                self.next_section_request = self.validate_section_request(section, song);
                if !self.running && self.next_section_request != 0 {
                    self.apply_request_now(song, self.now);
                }
            }
            None => self.next_section_request = section,
        }
    }

    /// Turn a section request (0, 1..=4) into a playable one.
    ///
    /// Searches forward from the requested section, wrapping, for one with
    /// something to play. Returns 0 if there is none.
    pub fn validate_section_request(&self, section: usize, song: &Song) -> usize {
        if section == 0 {
            return 0;
        }
        let Some(slot) = self.slot(song) else {
            return 0;
        };
        (0..MAX_SECTIONS)
            .map(|offset| (section - 1 + offset) % MAX_SECTIONS)
            .find(|&i| slot.is_section_playable(i))
            .map_or(0, |i| i + 1)
    }

    fn slot<'a>(&self, song: &'a Song) -> Option<&'a TrackSlot> {
        song.slot(self.track_index)
    }

    fn current_track<'a>(&self, song: &'a Song) -> Option<&'a Track> {
        self.section
            .and_then(|section| song.track(self.track_index, section))
    }

    fn next_action(&self, song: &Song, quantize_interval: MetricTime) -> Option<(MetricTime, Action)> {
        let track = self.current_track(song)?;
        if !has_loop(track) {
            return None;
        }
        let (origin, end) = track.loop_bounds();
        let next = match track.events().get(self.cursor) {
            Some(Event::Note(note)) if note.start_time < end => {
                let start = self.iteration_start + (note.start_time - origin);
                (quantize(start, quantize_interval, true), Action::Note(*note))
            }
            _ => (self.iteration_start + (end - origin), Action::EndOfIteration),
        };
        Some(next)
    }

    fn trigger<S: Sink>(
        &mut self,
        note: &NoteEvent,
        start: MetricTime,
        quantize_interval: MetricTime,
        sink: &mut S,
    ) {
        let end = quantize_note_end(start, note.duration, quantize_interval);
        let id = self.voices.get_next(note.pitch);
        self.voices
            .voice_mut(id)
            .play_note(note.pitch, start, end - start, sink);
        self.cursor += 1;
        self.last_consumed = Some(note.start_time);
    }

    fn on_end_of_iteration(&mut self, song: &Song) {
        let (origin, end) = self
            .current_track(song)
            .map_or((0.0, 0.0), Track::loop_bounds);
        self.iteration_start += end - origin;

        if self.next_section_request != 0 {
            let next = self.take_section_request(song);
            self.begin_section(song, next);
            return;
        }

        let Some(current) = self.section else {
            return;
        };
        let repeat_count = song
            .section(self.track_index, current)
            .map_or(1, |s| s.repeat_count);
        let repeat = if repeat_count == 0 {
            true
        } else {
            self.loop_counter = self.loop_counter.saturating_sub(1);
            self.loop_counter > 0
        };

        let playable = self.slot(song).is_some_and(|slot| slot.is_section_playable(current));
        if repeat && playable {
            self.begin_iteration(song);
        } else {
            let following = (current + 1) % MAX_SECTIONS + 1;
            let next = self.validate_section_request(following, song).checked_sub(1);
            self.begin_section(song, next);
        }
    }

    /// Pick the starting section: a pending request, else the first
    /// playable one.
    fn home(&mut self, song: &Song) {
        self.needs_home = false;
        let first = if self.next_section_request != 0 {
            self.take_section_request(song)
        } else {
            self.slot(song).and_then(TrackSlot::first_playable)
        };
        self.begin_section(song, first);
    }

    fn apply_request_now(&mut self, song: &Song, metric_time: MetricTime) {
        let next = self.take_section_request(song);
        if self.needs_home {
            self.needs_home = false;
            self.begin_section(song, next);
        } else {
            self.start_section_at(song, next, metric_time);
        }
    }

    /// Start a section mid-song, lined up with its loop grid.
    fn start_section_at(&mut self, song: &Song, section: Option<usize>, metric_time: MetricTime) {
        self.begin_section(song, section);
        let Some(track) = self.current_track(song) else {
            return;
        };
        let (origin, end) = track.loop_bounds();
        let length = end - origin;
        if length > 0.0 {
            let now = metric_time.max(0.0);
            self.iteration_start = now - now % length;
            self.skip_past_notes(song);
        }
    }

    /// Move the cursor past notes that were already due at the last read.
    fn skip_past_notes(&mut self, song: &Song) {
        let Some(track) = self.current_track(song) else {
            return;
        };
        let (origin, _) = track.loop_bounds();
        while let Some(Event::Note(note)) = track.events().get(self.cursor) {
            let start = self.iteration_start + (note.start_time - origin);
            if quantize(start, self.quantize_interval, true) > self.now {
                break;
            }
            self.cursor += 1;
        }
    }

    fn take_section_request(&mut self, song: &Song) -> Option<usize> {
        let request = self.validate_section_request(self.next_section_request, song);
        self.next_section_request = 0;
        request.checked_sub(1)
    }

    fn begin_section(&mut self, song: &Song, section: Option<usize>) {
        if section != self.section {
            debug!(
                track = self.track_index,
                from = self.get_section(),
                to = section.map_or(0, |s| s + 1),
                "section switch"
            );
        }
        if section.is_none() {
            debug!(track = self.track_index, "no playable section");
        }
        self.section = section;
        self.loop_counter = section
            .and_then(|s| song.section(self.track_index, s))
            .map_or(1, |s| s.repeat_count);
        self.begin_iteration(song);
    }

    fn begin_iteration(&mut self, song: &Song) {
        self.cursor = self.current_track(song).map_or(0, |track| {
            let (origin, _) = track.loop_bounds();
            track.first_index_at_or_after(origin)
        });
        self.last_consumed = None;
    }
}

/// A loop iteration must have positive length or it would never advance.
fn has_loop(track: &Track) -> bool {
    let (origin, end) = track.loop_bounds();
    end > origin
}
