//! Event types stored in a track.

use crate::metric_time::MetricTime;

/// A note to be played.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    /// When the note starts, relative to the start of its track
    pub start_time: MetricTime,
    /// How long the note lasts (always > 0)
    pub duration: MetricTime,
    /// Pitch as a 1V/octave control voltage
    pub pitch: f32,
}

impl NoteEvent {
    /// Create a new note.
    pub fn new(start_time: MetricTime, duration: MetricTime, pitch: f32) -> Self {
        Self {
            start_time,
            duration,
            pitch,
        }
    }

    /// The time at which the note stops sounding.
    pub fn end_time(&self) -> MetricTime {
        self.start_time + self.duration
    }
}

/// An entry in a track's event sequence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    /// Play a note
    Note(NoteEvent),
    /// End-of-track marker; its time is the track length
    End(MetricTime),
}

impl Event {
    /// The time of the event, relative to the start of its track.
    pub fn time(&self) -> MetricTime {
        match self {
            Event::Note(note) => note.start_time,
            Event::End(time) => *time,
        }
    }

    /// Get the note if this is a note event.
    pub fn note(&self) -> Option<&NoteEvent> {
        match self {
            Event::Note(note) => Some(note),
            Event::End(_) => None,
        }
    }

    /// Returns true for the end-of-track marker.
    pub fn is_end(&self) -> bool {
        matches!(self, Event::End(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_end_time() {
        let note = NoteEvent::new(1.5, 0.5, 2.0);
        assert_eq!(note.end_time(), 2.0);
    }

    #[test]
    fn event_time_and_accessors() {
        let note = Event::Note(NoteEvent::new(3.0, 1.0, 0.0));
        let end = Event::End(8.0);
        assert_eq!(note.time(), 3.0);
        assert_eq!(end.time(), 8.0);
        assert!(note.note().is_some());
        assert!(end.note().is_none());
        assert!(end.is_end());
        assert!(!note.is_end());
    }
}
