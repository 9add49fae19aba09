//! Tracks: ordered note sequences closed by an end-of-track marker.

use crate::event::{Event, NoteEvent};
use crate::metric_time::MetricTime;

/// Error type for track edits.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TrackError {
    /// Notes must have a positive duration
    #[error("note duration must be positive, got {0}")]
    NonPositiveDuration(MetricTime),
    /// Notes cannot start before the track does
    #[error("note start must not be negative, got {0}")]
    NegativeStart(MetricTime),
    /// The note would end after the end-of-track marker
    #[error("note ends at {end} but the track is only {length} long")]
    PastEnd { end: MetricTime, length: MetricTime },
    /// The end-of-track marker cannot move before the last note ends
    #[error("track length {length} is before the last note end {last_note_end}")]
    EndBeforeLastNote {
        length: MetricTime,
        last_note_end: MetricTime,
    },
}

/// A loop confined to part of a track.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SubrangeLoop {
    /// When false the track loops over its natural length
    pub enabled: bool,
    /// Loop start, relative to the track
    pub start: MetricTime,
    /// Loop end, relative to the track
    pub end: MetricTime,
}

impl SubrangeLoop {
    /// Create a subrange loop descriptor.
    pub fn new(enabled: bool, start: MetricTime, end: MetricTime) -> Self {
        Self { enabled, start, end }
    }
}

/// An ordered sequence of note events, terminated by exactly one
/// end-of-track marker.
///
/// Events are kept sorted by start time. Notes that share a start time keep
/// their insertion order, so `(start, position)` is strictly increasing.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    events: Vec<Event>,
    subrange: SubrangeLoop,
}

impl Track {
    /// Create an empty track of the given length.
    pub fn new(length: MetricTime) -> Self {
        Self {
            events: vec![Event::End(length.max(0.0))],
            subrange: SubrangeLoop::default(),
        }
    }

    /// Build a track from notes in any order.
    pub fn from_notes(notes: &[NoteEvent], length: MetricTime) -> Result<Self, TrackError> {
        let mut track = Self::new(length);
        for note in notes {
            track.insert_note(*note)?;
        }
        Ok(track)
    }

    /// All events in time order; the last one is always the end marker.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Track length: the time of the end-of-track marker.
    pub fn length(&self) -> MetricTime {
        self.events.last().map_or(0.0, Event::time)
    }

    /// Iterate over the notes in time order.
    pub fn notes(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter().filter_map(Event::note)
    }

    /// Number of notes in the track.
    pub fn num_notes(&self) -> usize {
        self.events.len() - 1
    }

    /// Returns true if the track holds at least one note.
    pub fn has_notes(&self) -> bool {
        self.num_notes() > 0
    }

    /// Insert a note, keeping time order. Returns the event index.
    pub fn insert_note(&mut self, note: NoteEvent) -> Result<usize, TrackError> {
        if !(note.duration > 0.0) {
            return Err(TrackError::NonPositiveDuration(note.duration));
        }
        if note.start_time < 0.0 {
            return Err(TrackError::NegativeStart(note.start_time));
        }
        let length = self.length();
        if note.end_time() > length {
            return Err(TrackError::PastEnd {
                end: note.end_time(),
                length,
            });
        }
        let index = self.first_index_after(note.start_time);
        self.events.insert(index, Event::Note(note));
        Ok(index)
    }

    /// Remove the note at `index`. The end marker cannot be removed.
    pub fn remove_note(&mut self, index: usize) -> Option<NoteEvent> {
        match self.events.get(index) {
            Some(Event::Note(_)) => self.events.remove(index).note().copied(),
            _ => None,
        }
    }

    /// Remove every note starting exactly at `time`. Returns how many were removed.
    pub fn remove_notes_at(&mut self, time: MetricTime) -> usize {
        let before = self.events.len();
        self.events
            .retain(|e| !matches!(e, Event::Note(n) if n.start_time == time));
        before - self.events.len()
    }

    /// Move the end-of-track marker.
    pub fn set_length(&mut self, length: MetricTime) -> Result<(), TrackError> {
        let last_note_end = self.notes().map(NoteEvent::end_time).fold(0.0, f64::max);
        if length < last_note_end {
            return Err(TrackError::EndBeforeLastNote {
                length,
                last_note_end,
            });
        }
        if let Some(end) = self.events.last_mut() {
            *end = Event::End(length);
        }
        Ok(())
    }

    /// The subrange loop descriptor.
    pub fn subrange_loop(&self) -> SubrangeLoop {
        self.subrange
    }

    /// Replace the subrange loop descriptor.
    pub fn set_subrange_loop(&mut self, subrange: SubrangeLoop) {
        self.subrange = subrange;
    }

    /// Start and end of one loop iteration, relative to the track.
    pub fn loop_bounds(&self) -> (MetricTime, MetricTime) {
        if self.subrange.enabled {
            (self.subrange.start, self.subrange.end)
        } else {
            (0.0, self.length())
        }
    }

    /// Returns true if a loop iteration has a positive length and contains a note.
    pub fn is_playable(&self) -> bool {
        let (origin, end) = self.loop_bounds();
        end > origin
            && self
                .notes()
                .any(|n| n.start_time >= origin && n.start_time < end)
    }

    /// Index of the first note starting at or after `time`, or of the end
    /// marker if there is none.
    pub fn first_index_at_or_after(&self, time: MetricTime) -> usize {
        self.events
            .partition_point(|e| !e.is_end() && e.time() < time)
    }

    /// Index of the first note starting strictly after `time`, or of the end
    /// marker if there is none.
    pub fn first_index_after(&self, time: MetricTime) -> usize {
        self.events
            .partition_point(|e| !e.is_end() && e.time() <= time)
    }

    /// Check the track invariants (debug builds only).
    pub fn assert_valid(&self) {
        debug_assert!(matches!(self.events.last(), Some(Event::End(_))));
        debug_assert_eq!(self.events.iter().filter(|e| e.is_end()).count(), 1);
        debug_assert!(self
            .events
            .windows(2)
            .all(|w| w[0].time() <= w[1].time()));
        debug_assert!(self
            .notes()
            .all(|n| n.duration > 0.0 && n.start_time >= 0.0 && n.end_time() <= self.length()));
    }
}
