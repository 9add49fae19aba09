//! Song structure: tracks, each with up to four sections.

use arrayvec::ArrayString;

use crate::metric_time::MetricTime;
use crate::track::Track;

/// Maximum number of tracks a song can hold.
pub const MAX_TRACKS: usize = 4;

/// Maximum number of sections per track.
pub const MAX_SECTIONS: usize = 4;

/// A complete song.
#[derive(Clone, Debug, Default)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    /// Track slots, one per output track
    tracks: Vec<TrackSlot>,
}

impl Song {
    /// Create a new song without tracks.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song
    }

    /// Create a song with `num_tracks` empty track slots.
    pub fn with_tracks(title: &str, num_tracks: usize) -> Self {
        debug_assert!(num_tracks <= MAX_TRACKS);
        let mut song = Self::new(title);
        song.tracks = (0..num_tracks.min(MAX_TRACKS))
            .map(|_| TrackSlot::default())
            .collect();
        song
    }

    /// Number of track slots.
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Get a track slot.
    pub fn slot(&self, track: usize) -> Option<&TrackSlot> {
        self.tracks.get(track)
    }

    /// Get a mutable track slot.
    pub fn slot_mut(&mut self, track: usize) -> Option<&mut TrackSlot> {
        self.tracks.get_mut(track)
    }

    /// Install `track` as the first section of track slot `index`, growing
    /// the song if needed. This is the single-section layout.
    pub fn set_track(&mut self, index: usize, track: Track) {
        self.set_section(index, 0, Some(Section::new("", track)));
    }

    /// Install (or clear) one section of a track slot, growing the song if needed.
    pub fn set_section(&mut self, track: usize, section: usize, value: Option<Section>) {
        debug_assert!(track < MAX_TRACKS, "track index {} out of range", track);
        debug_assert!(section < MAX_SECTIONS, "section index {} out of range", section);
        if track >= MAX_TRACKS || section >= MAX_SECTIONS {
            return;
        }
        if self.tracks.len() <= track {
            self.tracks.resize_with(track + 1, TrackSlot::default);
        }
        self.tracks[track].sections[section] = value;
    }

    /// Get one section of a track slot.
    pub fn section(&self, track: usize, section: usize) -> Option<&Section> {
        self.slot(track).and_then(|slot| slot.section(section))
    }

    /// Get the event track of one section.
    pub fn track(&self, track: usize, section: usize) -> Option<&Track> {
        self.section(track, section).map(|s| &s.track)
    }

    /// Get the event track of one section for editing.
    pub fn track_mut(&mut self, track: usize, section: usize) -> Option<&mut Track> {
        self.slot_mut(track)
            .and_then(|slot| slot.section_mut(section))
            .map(|s| &mut s.track)
    }

    /// Length of the longest first-playable section across all tracks.
    pub fn total_time(&self) -> MetricTime {
        self.tracks
            .iter()
            .filter_map(|slot| slot.first_playable().and_then(|i| slot.section(i)))
            .map(|s| s.track.length())
            .fold(0.0, f64::max)
    }

    /// Check every track's invariants (debug builds only).
    pub fn assert_valid(&self) {
        for slot in &self.tracks {
            for section in slot.sections.iter().flatten() {
                section.track.assert_valid();
            }
        }
    }
}

/// The sections that can play on one output track.
#[derive(Clone, Debug, Default)]
pub struct TrackSlot {
    sections: [Option<Section>; MAX_SECTIONS],
}

impl TrackSlot {
    /// Get a section by 0-based index.
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index).and_then(Option::as_ref)
    }

    /// Get a section by 0-based index for editing.
    pub fn section_mut(&mut self, index: usize) -> Option<&mut Section> {
        self.sections.get_mut(index).and_then(Option::as_mut)
    }

    /// Returns true if the section exists and has something to play.
    pub fn is_section_playable(&self, index: usize) -> bool {
        self.section(index).is_some_and(|s| s.track.is_playable())
    }

    /// 0-based index of the first playable section.
    pub fn first_playable(&self) -> Option<usize> {
        (0..MAX_SECTIONS).find(|&i| self.is_section_playable(i))
    }
}

/// One alternative track for a track slot.
#[derive(Clone, Debug)]
pub struct Section {
    /// Display name
    pub name: ArrayString<32>,
    /// The events to play
    pub track: Track,
    /// Loop iterations before moving on to the next section (0 = forever)
    pub repeat_count: u32,
}

impl Section {
    /// Create a section that plays once before moving on.
    pub fn new(name: &str, track: Track) -> Self {
        let mut section_name = ArrayString::new();
        let _ = section_name.try_push_str(name);
        Self {
            name: section_name,
            track,
            repeat_count: 1,
        }
    }

    /// Set how many loop iterations the section plays (0 = forever).
    pub fn with_repeat_count(mut self, repeat_count: u32) -> Self {
        self.repeat_count = repeat_count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoteEvent;

    fn one_note_track(length: MetricTime) -> Track {
        Track::from_notes(&[NoteEvent::new(0.0, 0.5, 0.0)], length).unwrap()
    }

    #[test]
    fn new_song_has_no_tracks() {
        let song = Song::new("Test");
        assert_eq!(song.title.as_str(), "Test");
        assert_eq!(song.num_tracks(), 0);
        assert!(song.track(0, 0).is_none());
    }

    #[test]
    fn set_track_grows_song() {
        let mut song = Song::new("Test");
        song.set_track(2, one_note_track(1.0));
        assert_eq!(song.num_tracks(), 3);
        assert!(song.track(2, 0).is_some());
        assert!(song.track(0, 0).is_none());
    }

    #[test]
    fn sections_are_independent() {
        let mut song = Song::with_tracks("Test", 1);
        song.set_section(0, 1, Some(Section::new("B", one_note_track(2.0))));
        song.set_section(0, 3, Some(Section::new("D", Track::new(4.0))));
        let slot = song.slot(0).unwrap();
        assert!(!slot.is_section_playable(0));
        assert!(slot.is_section_playable(1));
        assert!(!slot.is_section_playable(3));
        assert_eq!(slot.first_playable(), Some(1));
        assert_eq!(song.section(0, 1).unwrap().name.as_str(), "B");
    }

    #[test]
    fn section_repeat_count_defaults_to_one() {
        let section = Section::new("A", Track::new(1.0));
        assert_eq!(section.repeat_count, 1);
        assert_eq!(section.with_repeat_count(0).repeat_count, 0);
    }

    #[test]
    fn total_time_uses_longest_track() {
        let mut song = Song::with_tracks("Test", 2);
        song.set_track(0, one_note_track(4.0));
        song.set_track(1, one_note_track(8.0));
        assert_eq!(song.total_time(), 8.0);
    }

    #[test]
    fn track_mut_edits_in_place() {
        let mut song = Song::new("Test");
        song.set_track(0, Track::new(4.0));
        song.track_mut(0, 0)
            .unwrap()
            .insert_note(NoteEvent::new(1.0, 1.0, 0.0))
            .unwrap();
        assert_eq!(song.track(0, 0).unwrap().num_notes(), 1);
        song.assert_valid();
    }
}
