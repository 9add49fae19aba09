//! Real-time playback engine for polyseq.
//!
//! Advances a metric clock, walks each track's events, assigns notes to a
//! bounded pool of voices and reports gate/CV changes to a [`Sink`]. Nothing
//! here blocks or allocates once the engine is built.

mod clock;
mod engine;
mod scheduler;
mod sink;
mod track_player;
mod voice;
mod voice_assigner;

pub use clock::{Clock, ClockRate, ClockResults, SchmittTrigger, NOT_STARTED, TRIGGER_HIGH, TRIGGER_LOW};
pub use engine::PlaybackEngine;
pub use scheduler::TickDivider;
pub use sink::{RecordingSink, Sink, SinkCall, TRANSCRIPT_CAPACITY};
pub use track_player::TrackPlayer;
pub use voice::{Voice, VoiceState, DEFAULT_RETRIGGER_SAMPLES};
pub use voice_assigner::{VoiceAssigner, VoiceId, MAX_VOICES};
