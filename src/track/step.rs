/*
Step sequencer
==============

A clock-driven step pattern: up to 64 steps, each carrying an enable flag, a
sub-trigger count (1..16 retriggers inside the step with a velocity ramp) and
a firing probability. Steps advance at a fixed musical size (a sixteenth note
by default) against the shared transport beat, never a private timer, so a
step track stays locked to the host even across tempo changes.

Probability is rolled once per step occurrence. A step that passes the roll
fires all of its sub-triggers; a step that fails fires none. Rolling per
sub-trigger would turn a ratchet into noise.

Arming aligns the first step to the next whole-beat boundary. Arming while
the transport is already running takes effect immediately, the sequencer does
not wait for a future transport start edge.
*/

use rand::{rngs::SmallRng, Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const MAX_STEPS: usize = 64;
pub const MAX_SUBDIVISIONS: u8 = 16;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepConfig {
    pub enabled: bool,
    /// Retriggers inside the step, 1..=16.
    pub subdivisions: u8,
    pub start_velocity: f32,
    pub end_velocity: f32,
    /// Chance this step occurrence fires at all, 0..=1.
    pub probability: f32,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            subdivisions: 1,
            start_velocity: 1.0,
            end_velocity: 1.0,
            probability: 1.0,
        }
    }
}

impl StepConfig {
    fn clamped(mut self) -> Self {
        self.subdivisions = self.subdivisions.clamp(1, MAX_SUBDIVISIONS);
        self.start_velocity = self.start_velocity.clamp(0.0, 1.0);
        self.end_velocity = self.end_velocity.clamp(0.0, 1.0);
        self.probability = if self.probability.is_finite() {
            self.probability.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self
    }
}

/// One sub-trigger emitted by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepTrigger {
    pub step: usize,
    pub sub_index: u8,
    /// Absolute transport beat at which this sub-trigger fires.
    pub beat: f64,
    /// Length of this sub-trigger's slot in beats.
    pub duration_beats: f64,
    pub velocity: f32,
}

#[derive(Debug, Clone)]
pub struct StepSequencer {
    steps: [StepConfig; MAX_STEPS],
    num_steps: usize,
    /// Musical size of one step in beats.
    step_beats: f64,

    armed: bool,
    /// Absolute beat of step 0 of the current pass.
    anchor_beat: f64,
    /// Index of the first step occurrence not yet fully emitted.
    next_occurrence: u64,
    /// Probability outcome for `next_occurrence`, held while its sub-triggers
    /// straddle more than one window.
    pending_roll: Option<bool>,
    rng: SmallRng,
}

impl StepSequencer {
    pub fn new(seed: u64) -> Self {
        Self {
            steps: [StepConfig::default(); MAX_STEPS],
            num_steps: 16,
            step_beats: 0.25,
            armed: false,
            anchor_beat: 0.0,
            next_occurrence: 0,
            pending_roll: None,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn set_num_steps(&mut self, num_steps: usize) {
        self.num_steps = num_steps.clamp(1, MAX_STEPS);
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn set_step_beats(&mut self, beats: f64) {
        if beats.is_finite() && beats > 0.0 {
            self.step_beats = beats.clamp(1.0 / 16.0, 4.0);
        }
    }

    pub fn step_beats(&self) -> f64 {
        self.step_beats
    }

    pub fn set_step(&mut self, index: usize, config: StepConfig) {
        if index < MAX_STEPS {
            self.steps[index] = config.clamped();
        }
    }

    pub fn step(&self, index: usize) -> StepConfig {
        self.steps[index.min(MAX_STEPS - 1)]
    }

    pub fn toggle_step(&mut self, index: usize) {
        if index < MAX_STEPS {
            self.steps[index].enabled = !self.steps[index].enabled;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Current step cursor for display, based on the transport beat.
    pub fn cursor(&self, current_beat: f64) -> usize {
        if !self.armed || current_beat < self.anchor_beat {
            return 0;
        }
        let occurrence = ((current_beat - self.anchor_beat) / self.step_beats) as u64;
        (occurrence % self.num_steps as u64) as usize
    }

    /// Arm playback; step 0 lands on the next whole-beat boundary. If the
    /// transport is already mid-beat this still arms now, the sequencer never
    /// waits for a transport start edge.
    pub fn arm(&mut self, current_beat: f64) {
        self.anchor_beat = current_beat.ceil();
        self.next_occurrence = 0;
        self.pending_roll = None;
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Emit every sub-trigger with a firing beat in `[from, to)`.
    ///
    /// Probability is rolled once when a step occurrence is first reached, so
    /// a ratcheted step either fires its whole burst or stays silent.
    pub fn process_window<F>(&mut self, from: f64, to: f64, mut emit: F)
    where
        F: FnMut(StepTrigger),
    {
        if !self.armed || to <= from {
            return;
        }

        loop {
            let step_start = self.anchor_beat + self.next_occurrence as f64 * self.step_beats;
            if step_start >= to {
                break;
            }
            let step_end = step_start + self.step_beats;
            if step_end <= from {
                // Whole occurrence already behind the window.
                self.next_occurrence += 1;
                self.pending_roll = None;
                continue;
            }

            let step = (self.next_occurrence % self.num_steps as u64) as usize;
            let config = self.steps[step];
            let fires = match self.pending_roll {
                Some(fires) => fires,
                None => {
                    let fires = config.enabled
                        && (config.probability >= 1.0
                            || self.rng.gen_bool(config.probability as f64));
                    self.pending_roll = Some(fires);
                    fires
                }
            };

            if fires {
                let subs = config.subdivisions.max(1);
                let sub_beats = self.step_beats / subs as f64;
                for sub in 0..subs {
                    let beat = step_start + sub as f64 * sub_beats;
                    if beat < from || beat >= to {
                        continue;
                    }
                    let ramp = if subs > 1 {
                        sub as f32 / (subs - 1) as f32
                    } else {
                        0.0
                    };
                    let velocity = config.start_velocity
                        + (config.end_velocity - config.start_velocity) * ramp;
                    emit(StepTrigger {
                        step,
                        sub_index: sub,
                        beat,
                        duration_beats: sub_beats,
                        velocity,
                    });
                }
            }

            // An occurrence is consumed only once the window has covered it
            // whole; a partially covered one resumes in the next window with
            // the same roll.
            if step_end <= to {
                self.next_occurrence += 1;
                self.pending_roll = None;
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequencer_with_steps(enabled: &[usize]) -> StepSequencer {
        let mut seq = StepSequencer::new(1);
        for &i in enabled {
            let mut config = StepConfig::default();
            config.enabled = true;
            seq.set_step(i, config);
        }
        seq
    }

    fn collect(seq: &mut StepSequencer, from: f64, to: f64) -> Vec<StepTrigger> {
        let mut out = Vec::new();
        seq.process_window(from, to, |t| out.push(t));
        out
    }

    #[test]
    fn first_step_lands_on_next_beat_boundary() {
        let mut seq = sequencer_with_steps(&[0]);
        seq.arm(2.3); // mid-beat: step 0 anchors at beat 3
        let triggers = collect(&mut seq, 2.3, 3.5);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].beat, 3.0);
        assert_eq!(triggers[0].step, 0);
    }

    #[test]
    fn pattern_wraps_over_num_steps() {
        let mut seq = sequencer_with_steps(&[0, 2]);
        seq.set_num_steps(4); // one bar per pass at sixteenth steps
        seq.arm(0.0);
        let triggers = collect(&mut seq, 0.0, 2.0);
        // Two passes of [0, 2]: beats 0.0, 0.5, 1.0, 1.5.
        let beats: Vec<f64> = triggers.iter().map(|t| t.beat).collect();
        assert_eq!(beats, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn subdivisions_ramp_velocity_start_to_end() {
        let mut seq = StepSequencer::new(1);
        seq.set_step(
            0,
            StepConfig {
                enabled: true,
                subdivisions: 4,
                start_velocity: 1.0,
                end_velocity: 0.25,
                probability: 1.0,
            },
        );
        seq.arm(0.0);
        let triggers = collect(&mut seq, 0.0, 0.25);
        assert_eq!(triggers.len(), 4);
        assert_eq!(triggers[0].velocity, 1.0);
        assert_eq!(triggers[3].velocity, 0.25);
        assert!(triggers[1].velocity > triggers[2].velocity);
        // Sub-triggers split the step evenly.
        assert_eq!(triggers[1].beat, 0.0625);
    }

    #[test]
    fn probability_gates_whole_occurrence_not_sub_triggers() {
        let mut seq = StepSequencer::new(9);
        seq.set_step(
            0,
            StepConfig {
                enabled: true,
                subdivisions: 3,
                start_velocity: 1.0,
                end_velocity: 1.0,
                probability: 0.5,
            },
        );
        seq.set_num_steps(1);
        seq.arm(0.0);
        let triggers = collect(&mut seq, 0.0, 64.0 * 0.25);
        // Every occurrence that fired carries its full ratchet of 3.
        assert_eq!(triggers.len() % 3, 0);
        let fired = triggers.len() / 3;
        assert!(fired > 10 && fired < 54, "p=0.5 fired {} of 64", fired);
    }

    #[test]
    fn zero_probability_step_never_fires() {
        let mut seq = StepSequencer::new(1);
        seq.set_step(
            0,
            StepConfig {
                enabled: true,
                subdivisions: 1,
                start_velocity: 1.0,
                end_velocity: 1.0,
                probability: 0.0,
            },
        );
        seq.set_num_steps(1);
        seq.arm(0.0);
        assert!(collect(&mut seq, 0.0, 16.0).is_empty());
    }

    #[test]
    fn adjacent_windows_fire_each_trigger_once() {
        let mut seq = sequencer_with_steps(&[0, 1, 2, 3]);
        seq.set_num_steps(4);
        seq.arm(0.0);
        let mut all = Vec::new();
        // Ten windows tiling exactly [0, 1); bounds derived from the index so
        // float accumulation cannot leak an eleventh window past beat 1.
        for i in 0..10 {
            let from = i as f64 * 0.1;
            all.extend(collect(&mut seq, from, from + 0.1));
        }
        assert_eq!(all.len(), 4, "one trigger per step in one pass");
    }

    #[test]
    fn ratchet_straddling_short_windows_fires_every_sub_trigger() {
        let mut seq = StepSequencer::new(1);
        seq.set_step(
            0,
            StepConfig {
                enabled: true,
                subdivisions: 4,
                start_velocity: 1.0,
                end_velocity: 1.0,
                probability: 1.0,
            },
        );
        seq.set_num_steps(1);
        seq.arm(0.0);
        // Windows a fifth of the step: later sub-triggers land in later
        // windows and must not be dropped with the consumed occurrence.
        let mut beats = Vec::new();
        for i in 0..5 {
            let from = i as f64 * 0.05;
            seq.process_window(from, from + 0.05, |t| beats.push(t.beat));
        }
        assert_eq!(beats, vec![0.0, 0.0625, 0.125, 0.1875]);
    }

    #[test]
    fn probability_roll_holds_across_window_splits() {
        let mut seq = StepSequencer::new(7);
        seq.set_step(
            0,
            StepConfig {
                enabled: true,
                subdivisions: 4,
                start_velocity: 1.0,
                end_velocity: 1.0,
                probability: 0.5,
            },
        );
        seq.set_num_steps(1);
        seq.arm(0.0);
        // 64 occurrences chopped into five windows each: every occurrence
        // still fires its whole ratchet or none of it.
        let mut count = 0usize;
        for i in 0..64 * 5 {
            let from = i as f64 * 0.05;
            let to = (i + 1) as f64 * 0.05;
            seq.process_window(from, to, |_| count += 1);
        }
        assert_eq!(count % 4, 0, "a split occurrence must keep one roll");
        assert!(count > 0);
    }

    #[test]
    fn config_setter_clamps_ranges() {
        let mut seq = StepSequencer::new(1);
        seq.set_step(
            0,
            StepConfig {
                enabled: true,
                subdivisions: 99,
                start_velocity: 3.0,
                end_velocity: -1.0,
                probability: f32::NAN,
            },
        );
        let config = seq.step(0);
        assert_eq!(config.subdivisions, 16);
        assert_eq!(config.start_velocity, 1.0);
        assert_eq!(config.end_velocity, 0.0);
        assert_eq!(config.probability, 1.0);
    }
}
