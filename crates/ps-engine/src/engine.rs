//! Main playback engine.
//!
//! Owns one [`TrackPlayer`] per track, the [`Clock`], and the [`Sink`]. The
//! host calls [`PlaybackEngine::update_to_metric_time`] once per scheduling
//! tick; everything else is configuration.

use std::sync::Arc;

use heapless::Vec as HVec;
use ps_ir::{MetricTime, SharedSong, MAX_TRACKS};
use tracing::{debug, info, trace};

use crate::clock::{Clock, ClockRate, ClockResults};
use crate::sink::Sink;
use crate::track_player::TrackPlayer;

/// The playback engine.
pub struct PlaybackEngine<S: Sink> {
    /// The song being played, shared with the editor
    song: Arc<SharedSong>,
    /// One player per output track
    players: HVec<TrackPlayer, MAX_TRACKS>,
    clock: Clock,
    sink: S,
    /// Ticks on which the song could not be read
    lock_conflicts: u64,
}

impl<S: Sink> PlaybackEngine<S> {
    /// Create an engine playing `num_tracks` tracks (1..=4) of `song`.
    pub fn new(song: Arc<SharedSong>, num_tracks: usize, sink: S) -> Self {
        debug_assert!(
            (1..=MAX_TRACKS).contains(&num_tracks),
            "track count {} out of range",
            num_tracks
        );
        let mut players = HVec::new();
        for track in 0..num_tracks.clamp(1, MAX_TRACKS) {
            let _ = players.push(TrackPlayer::new(track));
        }
        Self {
            song,
            players,
            clock: Clock::new(),
            sink,
            lock_conflicts: 0,
        }
    }

    /// Advance every track to `metric_time`.
    ///
    /// Never blocks. If the editor holds the song, the tick only ends notes
    /// already known to be over, counts the conflict, and tells the sink.
    pub fn update_to_metric_time(
        &mut self,
        metric_time: MetricTime,
        quantize_interval: MetricTime,
        running: bool,
    ) {
        let Self {
            song,
            players,
            sink,
            lock_conflicts,
            ..
        } = self;

        for player in players.iter_mut() {
            player.set_running_status(running);
        }

        match song.try_play() {
            Some(song) => {
                if song.take_dirty() {
                    for player in players.iter_mut() {
                        player.resync(&song, metric_time);
                    }
                }
                for player in players.iter_mut() {
                    while player.play_once(&song, metric_time, quantize_interval, sink) {}
                }
            }
            None => {
                *lock_conflicts += 1;
                sink.on_lock_failed();
                trace!(metric_time, conflicts = *lock_conflicts, "song locked, skipping event read");
                for player in players.iter_mut() {
                    while player.poll_note_offs(metric_time, sink) {}
                }
            }
        }
    }

    /// Rewind the clock and all players, silencing every voice.
    ///
    /// Does not touch the song, so it works while the editor holds it.
    pub fn reset(&mut self, clear_gates: bool) {
        debug!(clear_gates, "transport reset");
        self.clock.reset();
        for player in self.players.iter_mut() {
            player.reset();
            player.reset_all_voices(clear_gates, &mut self.sink);
        }
    }

    /// Force every voice of every track to idle, keeping the play position.
    ///
    /// Pending retriggers are dropped, so no gate opens until the next note.
    pub fn reset_all_voices(&mut self, clear_gates: bool) {
        for player in self.players.iter_mut() {
            player.reset_all_voices(clear_gates, &mut self.sink);
        }
    }

    /// Replace the song and start it from the top.
    pub fn set_song(&mut self, song: Arc<SharedSong>) {
        info!(tracks = self.players.len(), "song replaced");
        self.song = song;
        self.reset(true);
    }

    /// The song being played.
    pub fn song(&self) -> &Arc<SharedSong> {
        &self.song
    }

    pub fn num_tracks(&self) -> usize {
        self.players.len()
    }

    pub fn set_num_voices(&mut self, track: usize, voices: usize) {
        debug_assert!(track < self.players.len(), "track {} out of range", track);
        if let Some(player) = self.players.get_mut(track) {
            player.set_num_voices(voices, &mut self.sink);
        }
    }

    pub fn set_sample_count_for_retrigger(&mut self, samples: u32) {
        for player in self.players.iter_mut() {
            player.set_sample_count_for_retrigger(samples);
        }
    }

    /// Forward elapsed samples to every voice.
    pub fn update_sample_count(&mut self, samples: u32) {
        for player in self.players.iter_mut() {
            player.update_sample_count(samples, &mut self.sink);
        }
    }

    /// Select the clock rate for the owned clock.
    pub fn setup_clock(&mut self, rate: ClockRate, samples_per_second: f32) {
        self.clock.setup(rate, samples_per_second);
    }

    /// Run the owned clock.
    pub fn update_clock(
        &mut self,
        samples: u32,
        clock_volts: f32,
        running: bool,
        reset_volts: f32,
    ) -> ClockResults {
        self.clock.update(samples, clock_volts, running, reset_volts)
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn set_running_status(&mut self, running: bool) {
        for player in self.players.iter_mut() {
            player.set_running_status(running);
        }
    }

    /// Section playing on a track: 0 = none, 1..=4.
    pub fn get_section(&self, track: usize) -> usize {
        self.player(track).map_or(0, TrackPlayer::get_section)
    }

    /// Request a section (1..=4, 0 clears) for a track.
    pub fn set_next_section_request(&mut self, track: usize, section: usize) {
        debug_assert!(track < self.players.len(), "track {} out of range", track);
        let guard = self.song.try_play();
        if let Some(player) = self.players.get_mut(track) {
            player.set_next_section(section, guard.as_deref());
        }
    }

    /// Pending section request for a track: 0 = none, 1..=4.
    pub fn get_next_section_request(&self, track: usize) -> usize {
        self.player(track).map_or(0, TrackPlayer::get_next_section)
    }

    pub fn current_loop_iteration_start(&self, track: usize) -> MetricTime {
        self.player(track)
            .map_or(0.0, TrackPlayer::current_loop_iteration_start)
    }

    /// Number of ticks on which the song could not be read.
    pub fn lock_conflicts(&self) -> u64 {
        self.lock_conflicts
    }

    /// Direct access to one track's player.
    pub fn player(&self, track: usize) -> Option<&TrackPlayer> {
        debug_assert!(track < self.players.len(), "track {} out of range", track);
        self.players.get(track)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
