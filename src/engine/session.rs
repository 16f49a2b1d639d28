/*
Session snapshot
================

Read-only visualization state shared between the audio thread and the
control/UI thread. The audio thread is the single writer: it packs each
track's display-relevant state into one atomic word at the end of every
block and publishes with Release ordering; readers poll with Acquire at a
UI-tick cadence (tens of Hz) and derive LED brightness from the snapshot.

Nothing here ever feeds back into audio decisions. Control intent flows the
other way, through the command queue.

Packed track word:

    bit  0       playing
    bits 1..5    current column (0..15)
    bits 5..8    play mode
    bits 8..13   loop start (0..16)
    bits 13..18  loop end (0..16)
    bits 18..25  step cursor (0..63)
*/

use std::sync::atomic::{AtomicU32, Ordering};

use crate::track::PlayMode;
use crate::{NUM_COLUMNS, NUM_PATTERNS, NUM_TRACKS};

pub const BRIGHTNESS_MAX: u8 = 15;
const BRIGHTNESS_LOOP_REGION: u8 = 4;
const BRIGHTNESS_LOOP_EDGE: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub playing: bool,
    pub current_column: usize,
    pub play_mode: PlayMode,
    pub loop_start: usize,
    pub loop_end: usize,
    pub step_cursor: usize,
}

#[derive(Debug, Default)]
pub struct SessionState {
    tracks: [AtomicU32; NUM_TRACKS],
    /// bit i: pattern i playing; bit 16+i: pattern i recording.
    patterns: AtomicU32,
}

fn mode_to_bits(mode: PlayMode) -> u32 {
    match mode {
        PlayMode::OneShot => 0,
        PlayMode::Loop => 1,
        PlayMode::Gate => 2,
        PlayMode::Step => 3,
        PlayMode::Grain => 4,
    }
}

fn mode_from_bits(bits: u32) -> PlayMode {
    match bits {
        0 => PlayMode::OneShot,
        2 => PlayMode::Gate,
        3 => PlayMode::Step,
        4 => PlayMode::Grain,
        _ => PlayMode::Loop,
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audio-thread publish, once per block.
    pub(crate) fn publish_track(&self, track: usize, snapshot: TrackSnapshot) {
        if track >= NUM_TRACKS {
            return;
        }
        let word = (snapshot.playing as u32)
            | ((snapshot.current_column as u32 & 0xF) << 1)
            | (mode_to_bits(snapshot.play_mode) << 5)
            | ((snapshot.loop_start as u32 & 0x1F) << 8)
            | ((snapshot.loop_end as u32 & 0x1F) << 13)
            | ((snapshot.step_cursor as u32 & 0x7F) << 18);
        self.tracks[track].store(word, Ordering::Release);
    }

    pub(crate) fn publish_patterns(&self, playing: [bool; NUM_PATTERNS], recording: [bool; NUM_PATTERNS]) {
        let mut word = 0u32;
        for i in 0..NUM_PATTERNS {
            if playing[i] {
                word |= 1 << i;
            }
            if recording[i] {
                word |= 1 << (16 + i);
            }
        }
        self.patterns.store(word, Ordering::Release);
    }

    pub fn track(&self, track: usize) -> TrackSnapshot {
        let word = self.tracks[track.min(NUM_TRACKS - 1)].load(Ordering::Acquire);
        TrackSnapshot {
            playing: word & 1 != 0,
            current_column: ((word >> 1) & 0xF) as usize,
            play_mode: mode_from_bits((word >> 5) & 0x7),
            loop_start: ((word >> 8) & 0x1F) as usize,
            loop_end: ((word >> 13) & 0x1F) as usize,
            step_cursor: ((word >> 18) & 0x7F) as usize,
        }
    }

    pub fn is_playing(&self, track: usize) -> bool {
        self.track(track).playing
    }

    pub fn pattern_playing(&self, pattern: usize) -> bool {
        pattern < NUM_PATTERNS && self.patterns.load(Ordering::Acquire) & (1 << pattern) != 0
    }

    pub fn pattern_recording(&self, pattern: usize) -> bool {
        pattern < NUM_PATTERNS
            && self.patterns.load(Ordering::Acquire) & (1 << (16 + pattern)) != 0
    }

    /// LED brightness for one grid cell, 0..=15.
    ///
    /// Full on the playhead column of a playing track, mid-bright at the
    /// loop edges, dim inside the loop region, dark elsewhere. Step mode
    /// lights the step cursor instead of the playhead.
    pub fn brightness(&self, track: usize, column: usize) -> u8 {
        if track >= NUM_TRACKS || column >= NUM_COLUMNS {
            return 0;
        }
        let snap = self.track(track);
        let cursor_column = match snap.play_mode {
            PlayMode::Step => snap.step_cursor % NUM_COLUMNS,
            _ => snap.current_column,
        };
        if snap.playing && column == cursor_column {
            return BRIGHTNESS_MAX;
        }
        if column == snap.loop_start || column + 1 == snap.loop_end {
            return BRIGHTNESS_LOOP_EDGE;
        }
        if column > snap.loop_start && column + 1 < snap.loop_end {
            return BRIGHTNESS_LOOP_REGION;
        }
        0
    }
}
