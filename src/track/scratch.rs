/*
Scratch and tape-stop gestures
==============================

A held button can bend the playback rate away from the timeline: a scratch
pushes the rate toward a gesture-driven target (possibly negative, playing
backward), a tape stop slews it toward zero. Either way the shared clock keeps
moving, so when the gesture ends the playhead is somewhere the timeline says
it should not be.

Release therefore has a reconciliation phase: the track measures the gap
between the actual playhead and the timeline-anchored position and the gesture
state plays it back at a blended rate over a short return window. When the
window closes the track snaps to the phase reference captured at gesture
start, which absorbs any drift the blended return accumulated.

The gesture state machine:

    Idle --begin()--> Active --release(gap)--> Returning --window ends--> Idle
                        |                                       |
                        +--release(gap ~ 0): snap, straight to Idle

At most one gesture is active per track; begin() during Active re-anchors the
phase reference rather than stacking a second gesture.
*/

pub const SCRATCH_AMOUNT_MIN: f32 = 0.0;
pub const SCRATCH_AMOUNT_MAX: f32 = 100.0;

/// Rate multiplier swing at full scratch amount.
const SCRATCH_DEPTH: f32 = 4.0;
/// One-pole smoothing time for the rate while the gesture is held.
const GESTURE_SMOOTH_MS: f32 = 20.0;
/// Slower slew for tape stops, so the pitch drop reads as a tape.
const TAPE_STOP_MS: f32 = 250.0;
/// Length of the reverse-scratch return after release.
const RETURN_MS: f32 = 50.0;
/// Gaps under one millisecond snap instead of blending.
const SNAP_GAP_MS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active,
    Returning,
}

#[derive(Debug, Clone)]
pub struct ScratchState {
    phase: Phase,
    amount: f32,

    multiplier: f32,
    target_multiplier: f32,
    tape_stop: bool,

    /// Playhead offset from the timeline position, captured at begin().
    phase_reference: f64,

    return_samples_left: u32,
    return_rate_offset: f32,
    finished: bool,
}

impl Default for ScratchState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            amount: 50.0,
            multiplier: 1.0,
            target_multiplier: 1.0,
            tape_stop: false,
            phase_reference: 0.0,
            return_samples_left: 0,
            return_rate_offset: 0.0,
            finished: false,
        }
    }
}

impl ScratchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = if amount.is_finite() {
            amount.clamp(SCRATCH_AMOUNT_MIN, SCRATCH_AMOUNT_MAX)
        } else {
            self.amount
        };
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn is_returning(&self) -> bool {
        self.phase == Phase::Returning
    }

    /// Start a gesture. `playhead_offset` is the playhead's current distance
    /// from the timeline position, kept as the phase reference for the final
    /// correction at gesture end.
    pub fn begin(&mut self, playhead_offset: f64) {
        self.phase = Phase::Active;
        self.phase_reference = if playhead_offset.is_finite() {
            playhead_offset
        } else {
            0.0
        };
        self.tape_stop = false;
        self.target_multiplier = self.multiplier;
        self.finished = false;
    }

    /// Gesture input in -1..1; negative bends the rate backward.
    pub fn set_gesture(&mut self, value: f32) {
        if self.phase != Phase::Active || !value.is_finite() {
            return;
        }
        let depth = self.amount / SCRATCH_AMOUNT_MAX * SCRATCH_DEPTH;
        self.target_multiplier = 1.0 + value.clamp(-1.0, 1.0) * depth;
        self.tape_stop = false;
    }

    /// Slew the rate to zero instead of tracking a gesture.
    pub fn tape_stop(&mut self) {
        if self.phase == Phase::Idle {
            self.begin(0.0);
        }
        self.target_multiplier = 0.0;
        self.tape_stop = true;
    }

    /// End the gesture. `gap_samples` is how far the playhead sits from where
    /// the timeline says it should be; positive means ahead.
    pub fn release(&mut self, gap_samples: f64, sample_rate: f32) {
        if self.phase != Phase::Active {
            return;
        }
        let snap_gap = (SNAP_GAP_MS * 0.001 * sample_rate) as f64;
        if gap_samples.abs() <= snap_gap || !gap_samples.is_finite() {
            self.phase = Phase::Idle;
            self.multiplier = 1.0;
            self.finished = true;
            return;
        }
        let return_samples = ((RETURN_MS * 0.001 * sample_rate) as u32).max(1);
        // Rate offset that walks the gap back across the return window. A
        // playhead that ran ahead comes back by playing slower (or backward).
        self.return_rate_offset = (-gap_samples / return_samples as f64) as f32;
        self.return_samples_left = return_samples;
        self.phase = Phase::Returning;
    }

    /// Rate multiplier and additive offset for this sample.
    ///
    /// The effective playhead increment is `base_rate * multiplier + offset`
    /// where base_rate is the track's timeline rate in samples per sample.
    pub fn tick(&mut self, sample_rate: f32) -> (f32, f32) {
        match self.phase {
            Phase::Idle => (1.0, 0.0),
            Phase::Active => {
                let smooth_ms = if self.tape_stop {
                    TAPE_STOP_MS
                } else {
                    GESTURE_SMOOTH_MS
                };
                let samples = (smooth_ms * 0.001 * sample_rate).max(1.0);
                let coeff = 1.0 - (-1.0 / samples).exp();
                self.multiplier += (self.target_multiplier - self.multiplier) * coeff;
                (self.multiplier, 0.0)
            }
            Phase::Returning => {
                if self.return_samples_left == 0 {
                    self.phase = Phase::Idle;
                    self.multiplier = 1.0;
                    self.finished = true;
                    return (1.0, 0.0);
                }
                self.return_samples_left -= 1;
                (1.0, self.return_rate_offset)
            }
        }
    }

    /// True exactly once when a gesture has fully resolved; the caller snaps
    /// the playhead to `timeline + phase_reference()` on that edge.
    pub fn take_finished(&mut self) -> bool {
        std::mem::take(&mut self.finished)
    }

    pub fn phase_reference(&self) -> f64 {
        self.phase_reference
    }

    /// Hard reset, used when the track changes mode mid-gesture.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.multiplier = 1.0;
        self.target_multiplier = 1.0;
        self.tape_stop = false;
        self.return_samples_left = 0;
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    #[test]
    fn gesture_rate_moves_smoothly_toward_target() {
        let mut scratch = ScratchState::new();
        scratch.set_amount(100.0);
        scratch.begin(0.0);
        scratch.set_gesture(1.0); // full forward scratch: multiplier -> 5.0

        let mut prev = 1.0;
        for _ in 0..SR as usize / 10 {
            let (m, _) = scratch.tick(SR);
            assert!(m >= prev - 1e-6, "rate must approach target monotonically");
            prev = m;
        }
        assert!((prev - 5.0).abs() < 0.1);
    }

    #[test]
    fn tape_stop_slews_to_zero() {
        let mut scratch = ScratchState::new();
        scratch.tape_stop();
        let mut m = 1.0;
        // The 250 ms one-pole needs a handful of time constants; two seconds
        // brings the residual under a percent.
        for _ in 0..2 * SR as usize {
            m = scratch.tick(SR).0;
        }
        assert!(m.abs() < 0.01, "tape stop should settle near zero, got {}", m);
    }

    #[test]
    fn release_with_gap_enters_return_then_resolves() {
        let mut scratch = ScratchState::new();
        scratch.begin(0.0);
        scratch.set_gesture(1.0);
        scratch.tick(SR);

        // 4800 samples ahead of the timeline.
        scratch.release(4_800.0, SR);
        assert!(scratch.is_returning());

        let mut walked = 0.0f64;
        for _ in 0..(RETURN_MS * 0.001 * SR) as usize + 2 {
            let (_, offset) = scratch.tick(SR);
            walked += offset as f64;
        }
        assert!(scratch.take_finished(), "return window must resolve");
        assert!(!scratch.is_active());
        // The additive offsets walk back the whole gap.
        assert!((walked + 4_800.0).abs() < 4.0, "walked {}", walked);
    }

    #[test]
    fn release_with_tiny_gap_snaps_immediately() {
        let mut scratch = ScratchState::new();
        scratch.begin(12.5);
        scratch.release(3.0, SR);
        assert!(!scratch.is_active());
        assert!(scratch.take_finished());
        assert_eq!(scratch.phase_reference(), 12.5);
        // The finished edge is consumed.
        assert!(!scratch.take_finished());
    }

    #[test]
    fn amount_setter_clamps_and_rejects_nan() {
        let mut scratch = ScratchState::new();
        scratch.set_amount(250.0);
        assert_eq!(scratch.amount(), 100.0);
        scratch.set_amount(f32::NAN);
        assert_eq!(scratch.amount(), 100.0);
        scratch.set_amount(-5.0);
        assert_eq!(scratch.amount(), 0.0);
    }
}
