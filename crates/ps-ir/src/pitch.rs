//! Note-number to control-voltage conversion.
//!
//! Pitches are carried as 1V/octave control voltages with middle C at 0V,
//! the convention the gate/CV outputs follow.

/// MIDI note number of middle C (C4), which maps to 0V.
pub const MIDDLE_C: u8 = 60;

/// Convert a MIDI note number to a 1V/octave voltage.
pub fn semitone_to_cv(note: u8) -> f32 {
    (note as f32 - MIDDLE_C as f32) / 12.0
}

/// Convert a 1V/octave voltage to the nearest MIDI note number, clamped to 0..=127.
pub fn cv_to_semitone(cv: f32) -> u8 {
    let note = (cv * 12.0).round() + MIDDLE_C as f32;
    note.clamp(0.0, 127.0) as u8
}
