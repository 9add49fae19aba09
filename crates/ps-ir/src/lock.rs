//! Shared access to a song between the editor and the playback thread.
//!
//! The editor takes the lock with [`SharedSong::edit`], which may block.
//! The playback thread only ever calls [`SharedSong::try_play`], which never
//! blocks: when the editor holds the song, the player skips reading new
//! events for that tick and tries again on the next one.

use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::song::Song;

/// A song shared between one editor and one player.
#[derive(Debug, Default)]
pub struct SharedSong {
    song: Mutex<Song>,
    /// Set when an edit guard is released, cleared by the player.
    dirty: AtomicBool,
}

impl SharedSong {
    /// Wrap a song for shared access.
    pub fn new(song: Song) -> Self {
        Self {
            song: Mutex::new(song),
            dirty: AtomicBool::new(false),
        }
    }

    /// Lock the song for editing, blocking until the player releases it.
    ///
    /// Dropping the guard marks the song as modified.
    pub fn edit(&self) -> EditGuard<'_> {
        EditGuard {
            song: self.song.lock(),
            dirty: &self.dirty,
        }
    }

    /// Try to lock the song for playback without blocking.
    pub fn try_play(&self) -> Option<PlayGuard<'_>> {
        self.song.try_lock().map(|song| PlayGuard {
            song,
            dirty: &self.dirty,
        })
    }

    /// Returns true if an edit happened since the player last looked.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Consume the wrapper and return the song.
    pub fn into_inner(self) -> Song {
        self.song.into_inner()
    }
}

/// Exclusive editor access to a song.
pub struct EditGuard<'a> {
    song: MutexGuard<'a, Song>,
    dirty: &'a AtomicBool,
}

impl Deref for EditGuard<'_> {
    type Target = Song;

    fn deref(&self) -> &Song {
        &self.song
    }
}

impl DerefMut for EditGuard<'_> {
    fn deref_mut(&mut self) -> &mut Song {
        &mut self.song
    }
}

impl Drop for EditGuard<'_> {
    fn drop(&mut self) {
        self.dirty.store(true, Ordering::Release);
    }
}

/// Read access to a song for one playback tick.
pub struct PlayGuard<'a> {
    song: MutexGuard<'a, Song>,
    dirty: &'a AtomicBool,
}

impl PlayGuard<'_> {
    /// Returns true (once) if the song was edited since the last call.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

impl Deref for PlayGuard<'_> {
    type Target = Song;

    fn deref(&self) -> &Song {
        &self.song
    }
}
