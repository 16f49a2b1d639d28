/*
Modulation sequencers
=====================

Each track carries up to three independent step sequences driving one
parameter each. A sequence is 16 steps per bar over 1..8 bars, evaluated
against the shared transport beat once per block.

Per step: a value in 0..1, an optional sub-ramp (the step is cut into 1..16
subdivisions stepping toward an end value), giving staircase ramps inside a
single step. The sequence output passes through depth scaling, an optional
bipolar recentering around 0.5, and a one-pole smoother so a parameter like
filter cutoff glides instead of zipper-stepping.

The sequencer produces a NORMALIZED value in 0..1; ModTarget::map converts
it into the destination parameter's actual range. The track setters clamp
again on arrival, so a mis-mapped value can never corrupt playback state.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const MOD_STEPS_PER_BAR: usize = 16;
pub const MAX_MOD_BARS: usize = 8;
pub const MAX_MOD_STEPS: usize = MOD_STEPS_PER_BAR * MAX_MOD_BARS;

/// One sixteenth note per step.
const STEP_BEATS: f64 = 0.25;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModTarget {
    #[default]
    Volume,
    Pan,
    Pitch,
    Speed,
    FilterCutoff,
    FilterResonance,
    GrainSize,
    GrainDensity,
    GrainJitter,
    GrainSpread,
}

impl ModTarget {
    /// Map a normalized 0..1 modulation value into the target's range.
    pub fn map(&self, normalized: f32) -> f32 {
        let n = normalized.clamp(0.0, 1.0);
        match self {
            ModTarget::Volume => n * 2.0,
            ModTarget::Pan => n * 2.0 - 1.0,
            // 0.25..4.0, unity at center.
            ModTarget::Pitch => 0.25 * 16.0f32.powf(n),
            ModTarget::Speed => 0.125 * 32.0f32.powf(n),
            // 20 Hz..20 kHz over three decades.
            ModTarget::FilterCutoff => 20.0 * 10.0f32.powf(3.0 * n),
            ModTarget::FilterResonance => 0.1 + n * 9.9,
            ModTarget::GrainSize => 5.0 + n * 2_395.0,
            ModTarget::GrainDensity | ModTarget::GrainJitter | ModTarget::GrainSpread => n,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModStep {
    pub value: f32,
    /// Staircase subdivisions inside the step, 1..=16.
    pub subdivisions: u8,
    /// Value the sub-ramp steps toward across the subdivisions.
    pub end_value: f32,
}

impl Default for ModStep {
    fn default() -> Self {
        Self {
            value: 0.5,
            subdivisions: 1,
            end_value: 0.5,
        }
    }
}

impl ModStep {
    fn clamped(mut self) -> Self {
        let sane = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
        self.value = sane(self.value);
        self.end_value = sane(self.end_value);
        self.subdivisions = self.subdivisions.clamp(1, 16);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ModSequencer {
    enabled: bool,
    target: ModTarget,
    steps: [ModStep; MAX_MOD_STEPS],
    num_bars: usize,
    depth: f32,
    bipolar: bool,
    smoothing_ms: f32,
    current: f32,
}

impl Default for ModSequencer {
    fn default() -> Self {
        Self {
            enabled: false,
            target: ModTarget::Volume,
            steps: [ModStep::default(); MAX_MOD_STEPS],
            num_bars: 1,
            depth: 1.0,
            bipolar: false,
            smoothing_ms: 20.0,
            current: 0.5,
        }
    }
}

impl ModSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_target(&mut self, target: ModTarget) {
        self.target = target;
    }

    pub fn target(&self) -> ModTarget {
        self.target
    }

    pub fn set_num_bars(&mut self, bars: usize) {
        self.num_bars = bars.clamp(1, MAX_MOD_BARS);
    }

    pub fn set_depth(&mut self, depth: f32) {
        if depth.is_finite() {
            self.depth = depth.clamp(0.0, 1.0);
        }
    }

    pub fn set_bipolar(&mut self, bipolar: bool) {
        self.bipolar = bipolar;
    }

    pub fn set_smoothing_ms(&mut self, ms: f32) {
        if ms.is_finite() {
            self.smoothing_ms = ms.clamp(0.0, 2_000.0);
        }
    }

    pub fn set_step(&mut self, index: usize, step: ModStep) {
        if index < MAX_MOD_STEPS {
            self.steps[index] = step.clamped();
        }
    }

    pub fn step(&self, index: usize) -> ModStep {
        self.steps[index.min(MAX_MOD_STEPS - 1)]
    }

    pub fn num_steps(&self) -> usize {
        self.num_bars * MOD_STEPS_PER_BAR
    }

    /// Raw staircase value at a transport beat, before depth and smoothing.
    fn raw_value(&self, beat: f64) -> f32 {
        let total = self.num_steps();
        let pos = (beat / STEP_BEATS).rem_euclid(total as f64);
        let index = (pos as usize).min(total - 1);
        let step = self.steps[index];

        if step.subdivisions <= 1 {
            return step.value;
        }
        let frac = pos - index as f64;
        let sub = ((frac * step.subdivisions as f64) as usize)
            .min(step.subdivisions as usize - 1);
        let ramp = sub as f32 / (step.subdivisions - 1) as f32;
        step.value + (step.end_value - step.value) * ramp
    }

    /// Evaluate at `beat`, smoothing across `block_seconds`. Returns the
    /// normalized value to feed `target().map`, or None when disabled.
    pub fn evaluate(&mut self, beat: f64, block_seconds: f64) -> Option<f32> {
        if !self.enabled {
            return None;
        }
        let raw = self.raw_value(beat);
        let shaped = if self.bipolar {
            // Depth shrinks the swing around the 0.5 center.
            0.5 + (raw - 0.5) * self.depth
        } else {
            raw * self.depth
        };

        if self.smoothing_ms <= 0.0 {
            self.current = shaped;
        } else {
            let tau = self.smoothing_ms as f64 * 0.001;
            let coeff = 1.0 - (-block_seconds / tau).exp();
            self.current += (shaped - self.current) * coeff as f32;
        }
        Some(self.current.clamp(0.0, 1.0))
    }

    /// Snap the smoother, used when a sequencer is first enabled.
    pub fn reset_to(&mut self, value: f32) {
        self.current = value.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_seq() -> ModSequencer {
        let mut seq = ModSequencer::new();
        seq.set_enabled(true);
        seq.set_smoothing_ms(0.0);
        seq
    }

    #[test]
    fn disabled_sequencer_yields_nothing() {
        let mut seq = ModSequencer::new();
        assert_eq!(seq.evaluate(0.0, 0.01), None);
    }

    #[test]
    fn steps_advance_at_sixteenth_notes() {
        let mut seq = enabled_seq();
        seq.set_step(0, ModStep { value: 0.1, ..ModStep::default() });
        seq.set_step(1, ModStep { value: 0.9, ..ModStep::default() });
        assert_eq!(seq.evaluate(0.0, 0.01), Some(0.1));
        assert_eq!(seq.evaluate(0.25, 0.01), Some(0.9));
        // Wraps after num_bars.
        assert_eq!(seq.evaluate(4.0, 0.01), Some(0.1));
    }

    #[test]
    fn sub_ramp_staircases_toward_end_value() {
        let mut seq = enabled_seq();
        seq.set_step(
            0,
            ModStep {
                value: 0.0,
                subdivisions: 4,
                end_value: 0.75,
            },
        );
        assert_eq!(seq.evaluate(0.0, 0.01), Some(0.0));
        assert_eq!(seq.evaluate(0.25 * 0.3, 0.01), Some(0.25));
        assert_eq!(seq.evaluate(0.25 * 0.8, 0.01), Some(0.75));
    }

    #[test]
    fn bipolar_depth_shrinks_swing_around_center() {
        let mut seq = enabled_seq();
        seq.set_bipolar(true);
        seq.set_depth(0.5);
        seq.set_step(0, ModStep { value: 1.0, ..ModStep::default() });
        // Full-scale step at half depth lands halfway between center and max.
        assert_eq!(seq.evaluate(0.0, 0.01), Some(0.75));
    }

    #[test]
    fn multi_bar_sequences_wrap_at_bar_count() {
        let mut seq = enabled_seq();
        seq.set_num_bars(2);
        seq.set_step(16, ModStep { value: 0.2, ..ModStep::default() });
        // Step 16 is bar 2 step 0, at beat 4.
        assert_eq!(seq.evaluate(4.0, 0.01), Some(0.2));
        // One full pass later (8 beats) it repeats.
        assert_eq!(seq.evaluate(12.0, 0.01), Some(0.2));
    }

    #[test]
    fn smoothing_glides_toward_the_step_value() {
        let mut seq = enabled_seq();
        seq.set_smoothing_ms(100.0);
        seq.reset_to(0.0);
        seq.set_step(0, ModStep { value: 1.0, ..ModStep::default() });

        let first = seq.evaluate(0.0, 0.01).unwrap();
        assert!(first < 0.2, "10ms into a 100ms smoother stays low");
        let mut last = first;
        for _ in 0..100 {
            last = seq.evaluate(0.0, 0.01).unwrap();
        }
        assert!(last > 0.95, "smoother must converge, got {}", last);
    }

    #[test]
    fn target_mapping_covers_documented_ranges() {
        assert_eq!(ModTarget::Volume.map(0.5), 1.0);
        assert_eq!(ModTarget::Pan.map(0.0), -1.0);
        assert!((ModTarget::Pitch.map(0.5) - 1.0).abs() < 1e-6);
        assert!((ModTarget::FilterCutoff.map(0.0) - 20.0).abs() < 1e-3);
        assert!((ModTarget::FilterCutoff.map(1.0) - 20_000.0).abs() < 1.0);
        assert_eq!(ModTarget::GrainDensity.map(2.0), 1.0, "input clamps");
    }

    #[test]
    fn step_setter_clamps_values() {
        let mut seq = ModSequencer::new();
        seq.set_step(
            0,
            ModStep {
                value: 5.0,
                subdivisions: 0,
                end_value: f32::NAN,
            },
        );
        let step = seq.step(0);
        assert_eq!(step.value, 1.0);
        assert_eq!(step.subdivisions, 1);
        assert_eq!(step.end_value, 0.5);
    }
}
