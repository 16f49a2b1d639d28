use std::f32::consts::TAU;

/*
Per-track filter: a TPT state-variable core, duplicated per channel so the
stereo image stays phase-coherent. One update computes all three responses;
the track picks the one matching its filter type.

| type      | passes          | rejects      |
| --------- | --------------- | ------------ |
| low-pass  | below cutoff    | above cutoff |
| band-pass | around cutoff   | outside      |
| high-pass | above cutoff    | below cutoff |
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    BandPass,
    HighPass,
}

#[derive(Debug, Clone, Copy, Default)]
struct SvfState {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory
}

impl SvfState {
    #[inline]
    fn tick(&mut self, sample: f32, g: f32, k: f32) -> (f32, f32, f32) {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        let lowpass = v2;
        let bandpass = v1;
        let highpass = sample - k * v1 - v2;
        (lowpass, bandpass, highpass)
    }
}

#[derive(Debug, Clone)]
pub struct TrackFilter {
    left: SvfState,
    right: SvfState,
    cutoff_hz: f32,
    resonance: f32,
    filter_type: FilterType,
    enabled: bool,
}

pub const CUTOFF_MIN_HZ: f32 = 20.0;
pub const CUTOFF_MAX_HZ: f32 = 20_000.0;
pub const RESONANCE_MIN: f32 = 0.1;
pub const RESONANCE_MAX: f32 = 10.0;

impl Default for TrackFilter {
    fn default() -> Self {
        Self {
            left: SvfState::default(),
            right: SvfState::default(),
            cutoff_hz: CUTOFF_MAX_HZ,
            resonance: 0.707,
            filter_type: FilterType::LowPass,
            enabled: false,
        }
    }
}

impl TrackFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Setting a cutoff below fully open auto-enables the filter.
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.cutoff_hz = if cutoff_hz.is_finite() {
            cutoff_hz.clamp(CUTOFF_MIN_HZ, CUTOFF_MAX_HZ)
        } else {
            CUTOFF_MAX_HZ
        };
        if self.cutoff_hz < CUTOFF_MAX_HZ {
            self.enabled = true;
        }
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        self.resonance = if resonance.is_finite() {
            resonance.clamp(RESONANCE_MIN, RESONANCE_MAX)
        } else {
            0.707
        };
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.reset();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Filter one stereo frame in place.
    #[inline]
    pub fn process_frame(&mut self, left: &mut f32, right: &mut f32, sample_rate: f32) {
        if !self.enabled {
            return;
        }
        // Pre-warped cutoff; computed per frame so modulated cutoffs track.
        let g = (TAU * self.cutoff_hz / (2.0 * sample_rate)).tan();
        let k = 1.0 / self.resonance.max(RESONANCE_MIN);

        let (lp_l, bp_l, hp_l) = self.left.tick(*left, g, k);
        let (lp_r, bp_r, hp_r) = self.right.tick(*right, g, k);

        match self.filter_type {
            FilterType::LowPass => {
                *left = lp_l;
                *right = lp_r;
            }
            FilterType::BandPass => {
                *left = bp_l;
                *right = bp_r;
            }
            FilterType::HighPass => {
                *left = hp_l;
                *right = hp_r;
            }
        }
    }

    pub fn reset(&mut self) {
        self.left = SvfState::default();
        self.right = SvfState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn sine(freq: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (TAU * freq * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    fn peak_after_transient(buffer: &[f32]) -> f32 {
        buffer[buffer.len().min(64)..]
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    fn run(filter: &mut TrackFilter, input: &[f32]) -> Vec<f32> {
        input
            .iter()
            .map(|&s| {
                let mut l = s;
                let mut r = s;
                filter.process_frame(&mut l, &mut r, SAMPLE_RATE);
                l
            })
            .collect()
    }

    #[test]
    fn lowpass_attenuates_high_frequencies() {
        let mut filter = TrackFilter::new();
        filter.set_cutoff(500.0);
        let out = run(&mut filter, &sine(8_000.0, 512));
        assert!(
            peak_after_transient(&out) < 0.1,
            "8kHz through a 500Hz lowpass should be heavily attenuated"
        );
    }

    #[test]
    fn highpass_attenuates_low_frequencies() {
        let mut filter = TrackFilter::new();
        filter.set_cutoff(5_000.0);
        filter.set_filter_type(FilterType::HighPass);
        let out = run(&mut filter, &sine(100.0, 2048));
        assert!(
            peak_after_transient(&out) < 0.1,
            "100Hz through a 5kHz highpass should be heavily attenuated"
        );
    }

    #[test]
    fn disabled_filter_is_transparent() {
        let mut filter = TrackFilter::new();
        let input = sine(1_000.0, 128);
        let out = run(&mut filter, &input);
        assert_eq!(out, input);
    }

    #[test]
    fn setters_clamp_to_valid_domain() {
        let mut filter = TrackFilter::new();
        filter.set_cutoff(1.0e9);
        assert_eq!(filter.cutoff(), CUTOFF_MAX_HZ);
        filter.set_cutoff(-5.0);
        assert_eq!(filter.cutoff(), CUTOFF_MIN_HZ);
        filter.set_resonance(f32::NAN);
        assert!((filter.resonance() - 0.707).abs() < 1e-6);
        filter.set_resonance(100.0);
        assert_eq!(filter.resonance(), RESONANCE_MAX);
    }

    #[test]
    fn lowering_cutoff_auto_enables() {
        let mut filter = TrackFilter::new();
        assert!(!filter.is_enabled());
        filter.set_cutoff(2_000.0);
        assert!(filter.is_enabled());
    }
}
