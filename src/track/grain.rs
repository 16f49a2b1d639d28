/*
Granular sub-engine
===================

Sprays short enveloped fragments ("grains") read from the track's sample
buffer around a moving center position. Each grain carries its own pitch,
pan and envelope; the sum of many overlapping grains is the output texture.

The voice pool is a fixed array of MAX_GRAIN_VOICES. Spawning when the pool
is full recycles the OLDEST grain (smallest birth stamp), so a dense cloud
degrades by shortening its tail rather than dropping new onsets.

Macro controls:

  size         grain length in ms, 5..2400.
  density      spawn rate, 0..1 mapped to roughly 1..60 grains per second,
               or to 1..16 grains per beat when tempo-synced.
  pitch        per-grain playback ratio, 0.25..4.
  pitch jitter random per-grain detune, up to +-12 semitones.
  spread       stereo width: each grain lands at a random pan within
               +-spread.
  jitter       random offset of the grain start around the center position.
  shape        envelope morph, 0 = clicky near-rectangular, 1 = full raised
               cosine.
  tempo sync   locks the spawn cadence to the transport beat instead of
               wall-clock Hz.

No allocation anywhere: the pool, the RNG and the resampler are all inline
state. Rendering is additive into the caller's block buffers.
*/

use rand::{rngs::SmallRng, Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::{Quality, Resampler};
use crate::track::sample::SampleBuffer;
use crate::MAX_GRAIN_VOICES;

pub const GRAIN_SIZE_MIN_MS: f32 = 5.0;
pub const GRAIN_SIZE_MAX_MS: f32 = 2_400.0;
pub const GRAIN_PITCH_MIN: f32 = 0.25;
pub const GRAIN_PITCH_MAX: f32 = 4.0;
pub const GRAIN_PITCH_JITTER_MAX: f32 = 12.0;

/// Spawn rate in grains per second at density extremes.
const MIN_SPAWN_HZ: f32 = 1.0;
const MAX_SPAWN_HZ: f32 = 60.0;
/// Spawn rate in grains per beat at density extremes when tempo-synced.
const MIN_SPAWN_PER_BEAT: f32 = 1.0;
const MAX_SPAWN_PER_BEAT: f32 = 16.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainParams {
    pub size_ms: f32,
    pub density: f32,
    pub pitch: f32,
    /// Random per-grain detune span in semitones, 0..=12.
    pub pitch_jitter: f32,
    pub spread: f32,
    pub jitter: f32,
    pub shape: f32,
    /// Spawn cadence follows the transport beat instead of wall-clock Hz.
    pub tempo_sync: bool,
}

impl Default for GrainParams {
    fn default() -> Self {
        Self {
            size_ms: 1_240.0,
            density: 0.05,
            pitch: 1.0,
            pitch_jitter: 0.0,
            spread: 0.5,
            jitter: 0.2,
            shape: 1.0,
            tempo_sync: false,
        }
    }
}

impl GrainParams {
    pub fn clamped(mut self) -> Self {
        let sane = |v: f32, lo: f32, hi: f32, fallback: f32| {
            if v.is_finite() {
                v.clamp(lo, hi)
            } else {
                fallback
            }
        };
        self.size_ms = sane(self.size_ms, GRAIN_SIZE_MIN_MS, GRAIN_SIZE_MAX_MS, 1_240.0);
        self.density = sane(self.density, 0.0, 1.0, 0.05);
        self.pitch = sane(self.pitch, GRAIN_PITCH_MIN, GRAIN_PITCH_MAX, 1.0);
        self.pitch_jitter = sane(self.pitch_jitter, 0.0, GRAIN_PITCH_JITTER_MAX, 0.0);
        self.spread = sane(self.spread, 0.0, 1.0, 0.5);
        self.jitter = sane(self.jitter, 0.0, 1.0, 0.2);
        self.shape = sane(self.shape, 0.0, 1.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Grain {
    active: bool,
    birth: u64,
    position: f64,
    rate: f64,
    length: u32,
    elapsed: u32,
    gain_l: f32,
    gain_r: f32,
}

#[derive(Debug)]
pub struct GrainEngine {
    params: GrainParams,
    grains: [Grain; MAX_GRAIN_VOICES],
    spawn_phase: f32,
    next_birth: u64,
    gate: bool,
    rng: SmallRng,
    resampler: Resampler,
}

impl GrainEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            params: GrainParams::default(),
            grains: [Grain::default(); MAX_GRAIN_VOICES],
            spawn_phase: 0.0,
            next_birth: 0,
            gate: false,
            rng: SmallRng::seed_from_u64(seed),
            // Grains repitch constantly; linear reads keep 32 voices cheap.
            resampler: Resampler::new(Quality::Linear),
        }
    }

    pub fn set_params(&mut self, params: GrainParams) {
        self.params = params.clamped();
    }

    pub fn params(&self) -> GrainParams {
        self.params
    }

    pub fn gate_on(&mut self) {
        self.gate = true;
        // A full accumulator forces the first grain onto the first gated
        // frame; a press never waits out a whole spawn interval.
        self.spawn_phase = 1.0;
    }

    /// Stop spawning; live grains ring out on their own envelopes.
    pub fn gate_off(&mut self) {
        self.gate = false;
    }

    pub fn is_gated(&self) -> bool {
        self.gate
    }

    pub fn active_count(&self) -> usize {
        self.grains.iter().filter(|g| g.active).count()
    }

    pub fn is_silent(&self) -> bool {
        !self.gate && self.active_count() == 0
    }

    pub fn reset(&mut self) {
        self.gate = false;
        self.spawn_phase = 0.0;
        for grain in &mut self.grains {
            grain.active = false;
        }
    }

    fn spawn_interval_samples(&self, sample_rate: f32, samples_per_beat: f64) -> f32 {
        if self.params.tempo_sync {
            let per_beat = MIN_SPAWN_PER_BEAT
                + self.params.density * (MAX_SPAWN_PER_BEAT - MIN_SPAWN_PER_BEAT);
            (samples_per_beat as f32 / per_beat).max(1.0)
        } else {
            let hz = MIN_SPAWN_HZ + self.params.density * (MAX_SPAWN_HZ - MIN_SPAWN_HZ);
            sample_rate / hz
        }
    }

    /// Free slot, or the oldest active grain when the pool is full.
    fn alloc_slot(&mut self) -> usize {
        let mut oldest = 0;
        let mut oldest_birth = u64::MAX;
        for (i, grain) in self.grains.iter().enumerate() {
            if !grain.active {
                return i;
            }
            if grain.birth < oldest_birth {
                oldest_birth = grain.birth;
                oldest = i;
            }
        }
        oldest
    }

    fn spawn(&mut self, sample: &SampleBuffer, center: f64, sample_rate: f32) {
        let length = ((self.params.size_ms * 0.001 * sample_rate) as u32).max(1);
        let jitter_span = self.params.jitter as f64 * length as f64 * 2.0;
        let offset = if jitter_span > 0.0 {
            self.rng.gen_range(-jitter_span..=jitter_span)
        } else {
            0.0
        };
        let position = (center + offset).clamp(0.0, sample.len().saturating_sub(1) as f64);

        let rate = if self.params.pitch_jitter > 0.0 {
            let semitones = self
                .rng
                .gen_range(-self.params.pitch_jitter..=self.params.pitch_jitter);
            (self.params.pitch * (semitones / 12.0).exp2())
                .clamp(GRAIN_PITCH_MIN, GRAIN_PITCH_MAX)
        } else {
            self.params.pitch
        };

        let pan = if self.params.spread > 0.0 {
            self.rng.gen_range(-self.params.spread..=self.params.spread)
        } else {
            0.0
        };
        // Equal-power pan law.
        let angle = (pan * 0.5 + 0.5) * std::f32::consts::FRAC_PI_2;

        let slot = self.alloc_slot();
        self.grains[slot] = Grain {
            active: true,
            birth: self.next_birth,
            position,
            rate: rate as f64,
            length,
            elapsed: 0,
            gain_l: angle.cos(),
            gain_r: angle.sin(),
        };
        self.next_birth += 1;
    }

    #[inline]
    fn envelope(&self, grain: &Grain) -> f32 {
        let t = grain.elapsed as f32 / grain.length as f32;
        let hann = (std::f32::consts::PI * t).sin();
        // shape morphs the window exponent: low shape flattens the curve
        // toward a near-rectangle, high shape keeps the full raised cosine.
        let exponent = 0.1 + 1.9 * self.params.shape;
        hann.max(0.0).powf(exponent)
    }

    /// Render one block additively into `out_l`/`out_r`, spawning grains
    /// around `center` while gated. `samples_per_beat` drives the cadence
    /// when the params are tempo-synced.
    pub fn render(
        &mut self,
        sample: &SampleBuffer,
        center: f64,
        out_l: &mut [f32],
        out_r: &mut [f32],
        sample_rate: f32,
        samples_per_beat: f64,
    ) {
        if sample.is_empty() {
            return;
        }
        let num_samples = out_l.len().min(out_r.len());
        let interval = self.spawn_interval_samples(sample_rate, samples_per_beat);

        for frame in 0..num_samples {
            if self.gate {
                self.spawn_phase += 1.0 / interval;
                if self.spawn_phase >= 1.0 {
                    self.spawn_phase -= 1.0;
                    self.spawn(sample, center, sample_rate);
                }
            }

            let mut acc_l = 0.0f32;
            let mut acc_r = 0.0f32;
            for i in 0..MAX_GRAIN_VOICES {
                let env;
                let pos;
                let gain_l;
                let gain_r;
                {
                    let grain = &self.grains[i];
                    if !grain.active {
                        continue;
                    }
                    env = self.envelope(grain);
                    pos = grain.position;
                    gain_l = grain.gain_l;
                    gain_r = grain.gain_r;
                }
                acc_l += self.resampler.read(sample.left(), pos) * env * gain_l;
                acc_r += self.resampler.read(sample.right(), pos) * env * gain_r;

                let grain = &mut self.grains[i];
                grain.position += grain.rate;
                grain.elapsed += 1;
                if grain.elapsed >= grain.length || grain.position >= sample.len() as f64 {
                    grain.active = false;
                }
            }
            out_l[frame] += acc_l;
            out_r[frame] += acc_r;
        }
    }
}
