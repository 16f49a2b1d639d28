/*
Crossfader
==========

A short linear gain ramp used to mask discontinuities: loop seams, mode
switches, retriggers, group mutes. One instance ramps a single gain value
between 0 and 1 over a fixed number of samples.

The total sample count is snapshotted when the fade starts, so the per-sample
step is constant for the whole ramp. Gain is monotonic over the fade and the
sample-to-sample change never exceeds 1/total_samples.
*/

use crate::MIN_TIME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

#[derive(Debug, Clone)]
pub struct Crossfader {
    gain: f32,
    step: f32,
    target: f32,
    samples_remaining: u32,
}

impl Default for Crossfader {
    fn default() -> Self {
        Self {
            gain: 1.0,
            step: 0.0,
            target: 1.0,
            samples_remaining: 0,
        }
    }
}

impl Crossfader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fade from the current gain toward 0 or 1 over `num_samples`.
    ///
    /// Starting from the current gain (not the far edge) avoids clicks when a
    /// new fade interrupts one still in flight.
    pub fn start_fade(&mut self, direction: FadeDirection, num_samples: u32) {
        let num_samples = num_samples.max(1);
        self.target = match direction {
            FadeDirection::In => 1.0,
            FadeDirection::Out => 0.0,
        };
        self.step = (self.target - self.gain) / num_samples as f32;
        self.samples_remaining = num_samples;
    }

    /// Jump straight to an edge, cancelling any active fade.
    pub fn snap_to(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
        self.target = self.gain;
        self.step = 0.0;
        self.samples_remaining = 0;
    }

    /// Advance one sample and return the gain to apply.
    pub fn next_gain(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.gain += self.step;
            self.samples_remaining -= 1;
            if self.samples_remaining == 0 {
                self.gain = self.target;
            }
        }
        debug_assert!((0.0..=1.0 + MIN_TIME).contains(&self.gain));
        self.gain.clamp(0.0, 1.0)
    }

    pub fn is_active(&self) -> bool {
        self.samples_remaining > 0
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

/// Complementary equal-sum gains for a seam crossfade at `progress` in 0..1.
///
/// Linear complementary ramps sum to exactly 1.0, which keeps the summed
/// amplitude across a loop-wrap seam free of level bumps.
#[inline]
pub fn seam_gains(progress: f32) -> (f32, f32) {
    let p = progress.clamp(0.0, 1.0);
    (1.0 - p, p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_in_is_monotonic_with_bounded_step() {
        let mut fader = Crossfader::new();
        fader.snap_to(0.0);
        let total = 64u32;
        fader.start_fade(FadeDirection::In, total);

        let mut prev = 0.0f32;
        let max_step = 1.0 / total as f32 + 1e-6;
        for _ in 0..total {
            let g = fader.next_gain();
            assert!(g >= prev, "fade-in gain must not decrease");
            assert!(g - prev <= max_step, "per-sample step exceeded ramp bound");
            prev = g;
        }
        assert!((prev - 1.0).abs() < 1e-6, "fade-in should land on 1.0");
    }

    #[test]
    fn fade_out_reaches_zero() {
        let mut fader = Crossfader::new();
        fader.start_fade(FadeDirection::Out, 32);
        let mut last = 1.0;
        for _ in 0..32 {
            last = fader.next_gain();
        }
        assert_eq!(last, 0.0);
        assert!(!fader.is_active());
    }

    #[test]
    fn interrupted_fade_restarts_from_current_gain() {
        let mut fader = Crossfader::new();
        fader.snap_to(0.0);
        fader.start_fade(FadeDirection::In, 100);
        for _ in 0..50 {
            fader.next_gain();
        }
        let midway = fader.gain();
        assert!(midway > 0.3 && midway < 0.7);

        // Reverse direction mid-flight; no jump allowed.
        fader.start_fade(FadeDirection::Out, 10);
        let first = fader.next_gain();
        assert!((first - midway).abs() <= midway / 10.0 + 1e-6);
    }

    #[test]
    fn seam_gains_sum_to_one() {
        for i in 0..=10 {
            let p = i as f32 / 10.0;
            let (out_gain, in_gain) = seam_gains(p);
            assert!((out_gain + in_gain - 1.0).abs() < 1e-6);
        }
    }
}
