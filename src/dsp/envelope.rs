/*
Step envelope
=============

Amplitude envelope for step-sequencer voices: attack, decay toward zero,
release on gate-off. Sustain is pinned at zero - a step hit is a percussive
one-shot, so the decay stage runs all the way out unless the gate closes
first.

Linear ramps throughout. Release snapshots the level at gate-off and
interpolates down from there, so releasing mid-attack cannot click.

    Level
      1.0 |    /\
          |   /  \
          |  /    \
      0.0 |_/      \______  -> time
          Attack  Decay (to 0)

Times are set in milliseconds and clamped to the ranges the step engine
exposes: attack 0..400, decay 1..4000, release 1..4000.
*/

use crate::MIN_TIME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Release,
}

#[derive(Debug, Clone)]
pub struct StepEnvelope {
    attack_ms: f32,
    decay_ms: f32,
    release_ms: f32,

    stage: EnvelopeStage,
    level: f32,
    peak: f32, // velocity-scaled attack target

    release_start_level: f32,
    release_total_samples: u32,
    release_elapsed_samples: u32,
}

impl Default for StepEnvelope {
    fn default() -> Self {
        Self {
            attack_ms: 0.0,
            decay_ms: 4000.0,
            release_ms: 110.0,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            peak: 1.0,
            release_start_level: 0.0,
            release_total_samples: 1,
            release_elapsed_samples: 0,
        }
    }
}

impl StepEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = ms.clamp(0.0, 400.0);
    }

    pub fn set_decay_ms(&mut self, ms: f32) {
        self.decay_ms = ms.clamp(1.0, 4000.0);
    }

    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.clamp(1.0, 4000.0);
    }

    pub fn attack_ms(&self) -> f32 {
        self.attack_ms
    }

    pub fn decay_ms(&self) -> f32 {
        self.decay_ms
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Gate on: restart from zero with a velocity-scaled peak.
    pub fn gate_on(&mut self, velocity: f32) {
        self.level = 0.0;
        self.peak = velocity.clamp(0.0, 1.0);
        self.stage = EnvelopeStage::Attack;
        self.release_elapsed_samples = 0;
    }

    /// Gate off: release from wherever the level currently is.
    pub fn gate_off(&mut self, sample_rate: f32) {
        if self.stage == EnvelopeStage::Idle {
            return;
        }
        self.release_start_level = self.level;
        self.release_total_samples =
            ((self.release_ms * 0.001 * sample_rate).round() as u32).max(1);
        self.release_elapsed_samples = 0;
        self.stage = EnvelopeStage::Release;
    }

    pub fn next_sample(&mut self, sample_rate: f32) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }
            EnvelopeStage::Attack => {
                let attack_s = (self.attack_ms * 0.001).max(MIN_TIME);
                self.level += self.peak / (attack_s * sample_rate);
                if self.level >= self.peak {
                    self.level = self.peak;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                let decay_s = (self.decay_ms * 0.001).max(MIN_TIME);
                self.level -= self.peak / (decay_s * sample_rate);
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
            EnvelopeStage::Release => {
                let progress =
                    self.release_elapsed_samples as f32 / self.release_total_samples as f32;
                self.level = (self.release_start_level * (1.0 - progress)).max(0.0);
                self.release_elapsed_samples = self.release_elapsed_samples.saturating_add(1);
                if self.release_elapsed_samples >= self.release_total_samples {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }
        self.level
    }

    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.release_elapsed_samples = 0;
        self.release_start_level = 0.0;
    }
}
