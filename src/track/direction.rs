/*
Direction modes
===============

How the playhead (or the step cursor) moves through the loop region:

  Normal       forward at the playback rate.
  Reverse      backward at the playback rate.
  PingPong     forward, bouncing at the loop edges.
  Random       a uniformly random column per trigger, never the same column
               twice in a row when more than one is available.
  RandomWalk   bounded-step movement: each trigger moves at most two columns
               from the last, staying inside the loop.
  RandomSlice  a random contiguous run of columns replayed a few times, then
               a new run is drawn. The repeats give a deliberate stutter.

The RNG is a per-track SmallRng so two engines seeded alike make identical
random choices. Changing mode resets the bookkeeping; a walk position or a
half-played slice never leaks across a mode change.
*/

use rand::{rngs::SmallRng, Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionMode {
    #[default]
    Normal,
    Reverse,
    PingPong,
    Random,
    RandomWalk,
    RandomSlice,
}

impl DirectionMode {
    /// Sign of the playhead rate for the continuous modes.
    pub fn rate_sign(&self) -> f32 {
        match self {
            DirectionMode::Reverse => -1.0,
            _ => 1.0,
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(
            self,
            DirectionMode::Random | DirectionMode::RandomWalk | DirectionMode::RandomSlice
        )
    }
}

const WALK_MAX_STEP: i64 = 2;
const SLICE_MIN_LEN: usize = 2;
const SLICE_MAX_LEN: usize = 4;
const SLICE_MIN_REPEATS: u32 = 2;
const SLICE_MAX_REPEATS: u32 = 4;

#[derive(Debug, Clone)]
pub struct DirectionState {
    rng: SmallRng,
    last_column: Option<usize>,
    walk_column: Option<usize>,
    slice_start: usize,
    slice_len: usize,
    slice_cursor: usize,
    slice_repeats_left: u32,
    ping_forward: bool,
}

impl DirectionState {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            last_column: None,
            walk_column: None,
            slice_start: 0,
            slice_len: 0,
            slice_cursor: 0,
            slice_repeats_left: 0,
            ping_forward: true,
        }
    }

    /// Drop all random-mode bookkeeping. Called on every direction change.
    pub fn reset(&mut self) {
        self.last_column = None;
        self.walk_column = None;
        self.slice_len = 0;
        self.slice_repeats_left = 0;
        self.ping_forward = true;
    }

    pub fn ping_forward(&self) -> bool {
        self.ping_forward
    }

    pub fn bounce(&mut self) {
        self.ping_forward = !self.ping_forward;
    }

    /// Choose the next column for a trigger in `loop_start..loop_end`.
    ///
    /// Non-random modes return `requested` unchanged.
    pub fn choose_column(
        &mut self,
        mode: DirectionMode,
        requested: usize,
        loop_start: usize,
        loop_end: usize,
    ) -> usize {
        let (lo, hi) = if loop_start < loop_end {
            (loop_start, loop_end)
        } else {
            (0, crate::NUM_COLUMNS)
        };
        let span = hi - lo;

        let column = match mode {
            DirectionMode::Random => {
                if span <= 1 {
                    lo
                } else {
                    // Redraw once on a repeat so runs of the same column are rare.
                    let mut col = lo + self.rng.gen_range(0..span);
                    if Some(col) == self.last_column {
                        col = lo + self.rng.gen_range(0..span);
                    }
                    col
                }
            }
            DirectionMode::RandomWalk => {
                let origin = self.walk_column.unwrap_or(requested.clamp(lo, hi - 1)) as i64;
                let step = self.rng.gen_range(-WALK_MAX_STEP..=WALK_MAX_STEP);
                let col = (origin + step).clamp(lo as i64, hi as i64 - 1) as usize;
                self.walk_column = Some(col);
                col
            }
            DirectionMode::RandomSlice => self.next_slice_column(lo, span),
            _ => requested.clamp(lo, hi.saturating_sub(1)),
        };

        self.last_column = Some(column);
        column
    }

    fn next_slice_column(&mut self, lo: usize, span: usize) -> usize {
        if span == 0 {
            return lo;
        }
        let exhausted = self.slice_repeats_left == 0
            || self.slice_len == 0
            || self.slice_start < lo
            || self.slice_start + self.slice_len > lo + span;
        if exhausted {
            self.slice_len = self
                .rng
                .gen_range(SLICE_MIN_LEN..=SLICE_MAX_LEN)
                .min(span.max(1));
            let max_start = span - self.slice_len;
            self.slice_start = lo + if max_start == 0 {
                0
            } else {
                self.rng.gen_range(0..=max_start)
            };
            self.slice_cursor = 0;
            self.slice_repeats_left = self.rng.gen_range(SLICE_MIN_REPEATS..=SLICE_MAX_REPEATS);
        }

        let column = self.slice_start + self.slice_cursor;
        self.slice_cursor += 1;
        if self.slice_cursor >= self.slice_len {
            self.slice_cursor = 0;
            self.slice_repeats_left = self.slice_repeats_left.saturating_sub(1);
        }
        column
    }
}
