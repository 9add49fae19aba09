//! Song data model for the polyseq playback engine.
//!
//! This crate defines the song representation shared between an editor and
//! the playback engine: tracks of timed note events, optional sections per
//! track, subrange loops, and the lock that arbitrates access between the
//! two threads. The editor owns the song; the engine only borrows it under
//! a non-blocking guard.

mod demo;
mod event;
mod lock;
mod metric_time;
mod pitch;
pub mod song;
mod track;

pub use demo::DemoContent;
pub use event::{Event, NoteEvent};
pub use lock::{EditGuard, PlayGuard, SharedSong};
pub use metric_time::{quantize, quantize_note_end, MetricTime, EIGHTH_NOTE, QUARTER_NOTE, SIXTEENTH_NOTE};
pub use pitch::{cv_to_semitone, semitone_to_cv, MIDDLE_C};
pub use song::{Section, Song, TrackSlot, MAX_SECTIONS, MAX_TRACKS};
pub use track::{SubrangeLoop, Track, TrackError};
