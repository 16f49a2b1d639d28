/*
Master-bus peak limiter
=======================

Feed-forward design: measure the instantaneous peak of the stereo frame,
compute the gain that would bring it under the threshold, then smooth that
gain with a fast attack and a slower release. Attack is effectively
instantaneous (gain may drop within one sample), release recovers over a
fixed time constant so the tail does not pump.

Defensive by construction - a non-finite input frame is replaced with
silence rather than propagated.
*/

#[derive(Debug, Clone)]
pub struct Limiter {
    threshold: f32, // linear
    gain: f32,
    release_coeff: f32,
    enabled: bool,
}

const RELEASE_MS: f32 = 80.0;

impl Limiter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            threshold: 1.0,
            gain: 1.0,
            release_coeff: release_coeff(sample_rate),
            enabled: false,
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.release_coeff = release_coeff(sample_rate);
        self.gain = 1.0;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.gain = 1.0;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Threshold in dBFS, clamped to -24..0.
    pub fn set_threshold_db(&mut self, db: f32) {
        let db = if db.is_finite() { db.clamp(-24.0, 0.0) } else { 0.0 };
        self.threshold = 10.0f32.powf(db / 20.0);
    }

    #[inline]
    pub fn process_frame(&mut self, left: &mut f32, right: &mut f32) {
        if !left.is_finite() || !right.is_finite() {
            *left = 0.0;
            *right = 0.0;
            return;
        }
        if !self.enabled {
            return;
        }

        let peak = left.abs().max(right.abs());
        let target = if peak > self.threshold {
            self.threshold / peak
        } else {
            1.0
        };

        if target < self.gain {
            self.gain = target; // instant attack
        } else {
            self.gain += (target - self.gain) * self.release_coeff;
        }

        *left *= self.gain;
        *right *= self.gain;
    }
}

fn release_coeff(sample_rate: f32) -> f32 {
    1.0 - (-1.0 / (RELEASE_MS * 0.001 * sample_rate.max(1.0))).exp()
}
