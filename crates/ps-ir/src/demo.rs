//! Ready-made song content for tests and demos.

use crate::event::NoteEvent;
use crate::metric_time::MetricTime;
use crate::pitch::semitone_to_cv;
use crate::song::Song;
use crate::track::Track;

const C_MAJOR: [u8; 8] = [60, 62, 64, 65, 67, 69, 71, 72];

/// Canned track layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemoContent {
    /// No notes, 8 quarter notes long
    Empty,
    /// An eighth note at 2V on the downbeat of a one-quarter track
    OneQuarter,
    /// A C major scale in quarter notes
    EightQuarterNotes,
    /// Four quarter notes, each ending exactly where the next starts
    FourTouchingQuarters,
    /// Four notes slightly shorter than a quarter
    FourAlmostTouchingQuarters,
}

impl Track {
    /// Build a track with canned content.
    pub fn make_demo(content: DemoContent) -> Self {
        let (notes, length): (Vec<NoteEvent>, MetricTime) = match content {
            DemoContent::Empty => (Vec::new(), 8.0),
            DemoContent::OneQuarter => (vec![NoteEvent::new(0.0, 0.5, 2.0)], 1.0),
            DemoContent::EightQuarterNotes => (quarters(&C_MAJOR, 1.0), 8.0),
            DemoContent::FourTouchingQuarters => (quarters(&C_MAJOR[..4], 1.0), 4.0),
            DemoContent::FourAlmostTouchingQuarters => (quarters(&C_MAJOR[..4], 0.95), 4.0),
        };
        let mut track = Track::new(length);
        for note in notes {
            let inserted = track.insert_note(note);
            debug_assert!(inserted.is_ok(), "demo note {:?} does not fit", note);
        }
        track
    }
}

impl Song {
    /// Build a song whose tracks all play the same canned content.
    pub fn make_demo(content: DemoContent, num_tracks: usize) -> Self {
        let mut song = Song::with_tracks("Demo", num_tracks);
        for index in 0..song.num_tracks() {
            song.set_track(index, Track::make_demo(content));
        }
        song
    }
}

fn quarters(notes: &[u8], duration: MetricTime) -> Vec<NoteEvent> {
    notes
        .iter()
        .enumerate()
        .map(|(i, &note)| NoteEvent::new(i as MetricTime, duration, semitone_to_cv(note)))
        .collect()
}
