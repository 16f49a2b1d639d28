/*
Track - the sampler voice state machine
=======================================

One track owns one sample buffer and turns triggers into audio through five
playback modes:

  OneShot   play from the triggered column to the loop end, then stop.
  Loop      play the loop region forever, crossfading the wrap seam.
  Gate      like Loop, but stops the moment the button is released.
  Step      clock-driven slice sequencer (see step.rs).
  Grain     granular cloud around a moving center (see grain.rs).

Vocabulary:

  column     one of 16 grid columns, each mapping to 1/16th of the buffer.
  loop region  the sample range covered by columns loop_start..loop_end.
  timeline position  where the playhead WOULD be if it had run undisturbed
             since its anchor beat. Scratch gestures and mute/unmute
             reconcile against this so the track stays phase-locked to the
             session.
  natural rate  the playhead increment (samples per output sample) that makes
             the loop region span exactly beats_per_loop transport beats.

Rendering is block-based into track-local buffers; volume, pan, filter and
the declick fade apply there before the engine sums tracks. Everything on
the render path is fixed-size state. The only Vecs are sized once at
construction and never grow on the audio thread.

Mode switches are transition-table style: entering a mode resets the other
modes' sub-state, and entering Step while the transport runs arms the
sequencer immediately so the track is never left waiting for a transport
edge that already happened.
*/

pub mod direction;
pub mod grain;
pub mod sample;
pub mod scratch;
pub mod step;

pub use direction::{DirectionMode, DirectionState};
pub use grain::{GrainEngine, GrainParams};
pub use sample::SampleBuffer;
pub use scratch::ScratchState;
pub use step::{StepConfig, StepSequencer, StepTrigger};

use crate::dsp::{Crossfader, FadeDirection, Resampler, StepEnvelope, TrackFilter};
use crate::timing::speed;
use crate::{MAX_BLOCK_SIZE, NUM_COLUMNS};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    OneShot,
    #[default]
    Loop,
    Gate,
    Step,
    Grain,
}

/// Per-block timing context handed down by the engine.
#[derive(Debug, Clone, Copy)]
pub struct BlockContext {
    pub sample_rate: f32,
    pub tempo: f64,
    pub block_start_beat: f64,
    pub beat_delta: f64,
    pub transport_playing: bool,
}

impl BlockContext {
    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / self.tempo
    }
}

pub const CROSSFADE_MIN_MS: f32 = 1.0;
pub const CROSSFADE_MAX_MS: f32 = 50.0;
pub const VOLUME_MAX: f32 = 2.0;

/// Declick ramp on trigger/stop edges.
const DECLICK_MS: f32 = 3.0;
/// Bounded queue of step sub-triggers resolved per block.
const STEP_EVENT_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy)]
struct QueuedStep {
    offset: u32,
    /// Envelope gate length in frames: the sub-trigger's slot.
    gate_frames: u32,
    column: usize,
    velocity: f32,
}

#[derive(Debug)]
pub struct Track {
    index: usize,
    sample: Option<SampleBuffer>,
    resampler: Resampler,

    play_mode: PlayMode,
    direction_mode: DirectionMode,
    direction: DirectionState,

    position: f64,
    playing: bool,
    stopping: bool,
    gate_held: bool,
    current_column: usize,

    speed_ratio: f32,
    recording_bars: u32,
    volume: f32,
    pan: f32,
    loop_start: usize,
    loop_end: usize,
    crossfade_ms: f32,

    /// Beat at which the playhead sat on loop phase zero.
    timeline_anchor_beat: f64,

    filter: TrackFilter,
    fade: Crossfader,
    step: StepSequencer,
    step_env: StepEnvelope,
    step_events: Vec<QueuedStep>,
    /// Frames until the sounding step's gate closes and the envelope
    /// releases. Survives block boundaries.
    step_gate_frames: Option<u32>,
    grain: GrainEngine,
    scratch: ScratchState,

    buf_l: Vec<f32>,
    buf_r: Vec<f32>,
}

impl Track {
    pub fn new(index: usize) -> Self {
        // Distinct seeds keep tracks decorrelated but runs reproducible.
        let seed = 0x9e37_79b9 ^ (index as u64).wrapping_mul(0x85eb_ca6b);
        Self {
            index,
            sample: None,
            resampler: Resampler::default(),
            play_mode: PlayMode::Loop,
            direction_mode: DirectionMode::Normal,
            direction: DirectionState::new(seed),
            position: 0.0,
            playing: false,
            stopping: false,
            gate_held: false,
            current_column: 0,
            speed_ratio: 1.0,
            recording_bars: 1,
            volume: 1.0,
            pan: 0.0,
            loop_start: 0,
            loop_end: NUM_COLUMNS,
            crossfade_ms: 10.0,
            timeline_anchor_beat: 0.0,
            filter: TrackFilter::new(),
            fade: Crossfader::new(),
            step: StepSequencer::new(seed.rotate_left(17)),
            step_env: StepEnvelope::new(),
            step_events: Vec::with_capacity(STEP_EVENT_CAPACITY),
            step_gate_frames: None,
            grain: GrainEngine::new(seed.rotate_left(33)),
            scratch: ScratchState::new(),
            buf_l: vec![0.0; MAX_BLOCK_SIZE],
            buf_r: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    // ---- sample ----------------------------------------------------------

    /// Replace the sample wholesale. Stops playback; the old buffer drops on
    /// the caller's thread, never the audio thread.
    pub fn load_sample(&mut self, sample: SampleBuffer) -> Option<SampleBuffer> {
        self.playing = false;
        self.stopping = false;
        self.position = 0.0;
        self.grain.reset();
        self.step_env.reset();
        self.step_gate_frames = None;
        self.sample.replace(sample)
    }

    pub fn clear_sample(&mut self) -> Option<SampleBuffer> {
        self.playing = false;
        self.sample.take()
    }

    pub fn has_sample(&self) -> bool {
        self.sample.as_ref().is_some_and(|s| !s.is_empty())
    }

    // ---- queries ---------------------------------------------------------

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    pub fn direction_mode(&self) -> DirectionMode {
        self.direction_mode
    }

    pub fn current_column(&self) -> usize {
        self.current_column
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn step_sequencer(&mut self) -> &mut StepSequencer {
        &mut self.step
    }

    pub fn step_cursor(&self, current_beat: f64) -> usize {
        self.step.cursor(current_beat)
    }

    // ---- parameter surface (all setters clamp) ---------------------------

    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, VOLUME_MAX);
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_pan(&mut self, pan: f32) {
        if pan.is_finite() {
            self.pan = pan.clamp(-1.0, 1.0);
        }
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    /// Snaps to the musical ratio table; arbitrary rates are never used.
    pub fn set_speed_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() {
            self.speed_ratio = speed::quantize_ratio(ratio);
        }
    }

    pub fn speed_ratio(&self) -> f32 {
        self.speed_ratio
    }

    pub fn set_recording_bars(&mut self, bars: u32) {
        self.recording_bars = match bars {
            0 | 1 => 1,
            2 => 2,
            3 | 4 => 4,
            _ => 8,
        };
    }

    /// Loop points in columns; enforces `start < end <= 16`.
    pub fn set_loop_points(&mut self, start: usize, end: usize) {
        let start = start.min(NUM_COLUMNS - 1);
        let end = end.clamp(start + 1, NUM_COLUMNS);
        self.loop_start = start;
        self.loop_end = end;
    }

    pub fn loop_points(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    pub fn set_crossfade_ms(&mut self, ms: f32) {
        if ms.is_finite() {
            self.crossfade_ms = ms.clamp(CROSSFADE_MIN_MS, CROSSFADE_MAX_MS);
        }
    }

    pub fn set_filter_cutoff(&mut self, hz: f32) {
        self.filter.set_cutoff(hz);
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        self.filter.set_resonance(resonance);
    }

    pub fn filter_mut(&mut self) -> &mut TrackFilter {
        &mut self.filter
    }

    pub fn set_grain_params(&mut self, params: GrainParams) {
        self.grain.set_params(params);
    }

    pub fn grain_params(&self) -> GrainParams {
        self.grain.params()
    }

    pub fn set_grain_pitch(&mut self, pitch: f32) {
        let mut params = self.grain.params();
        params.pitch = pitch;
        self.grain.set_params(params);
    }

    pub fn set_scratch_amount(&mut self, amount: f32) {
        self.scratch.set_amount(amount);
    }

    pub fn set_envelope_times(&mut self, attack_ms: f32, decay_ms: f32, release_ms: f32) {
        self.step_env.set_attack_ms(attack_ms);
        self.step_env.set_decay_ms(decay_ms);
        self.step_env.set_release_ms(release_ms);
    }

    // ---- mode transitions ------------------------------------------------

    /// Switch playback mode, resetting the sub-state the old mode left
    /// behind. Entering Step while the transport runs arms the sequencer at
    /// once; the first step fires on the next beat boundary.
    pub fn set_play_mode(&mut self, mode: PlayMode, transport_playing: bool, current_beat: f64) {
        if mode == self.play_mode {
            return;
        }
        self.scratch.reset();
        self.grain.reset();
        self.step.disarm();
        self.step_env.reset();
        self.step_gate_frames = None;
        self.direction.reset();
        self.gate_held = false;
        self.stopping = false;

        self.play_mode = mode;
        match mode {
            PlayMode::Step => {
                if transport_playing {
                    self.step.arm(current_beat);
                    self.playing = true;
                    self.fade.snap_to(1.0);
                }
            }
            PlayMode::Grain => {
                // Cloud center continues from wherever playback sat.
            }
            _ => {}
        }
    }

    pub fn set_direction_mode(&mut self, mode: DirectionMode) {
        if mode != self.direction_mode {
            self.direction_mode = mode;
            self.direction.reset();
        }
    }

    // ---- triggers --------------------------------------------------------

    /// Column press. Returns false when ignored (no sample loaded).
    pub fn trigger_column(&mut self, requested: usize, beat: f64, sample_rate: f32) -> bool {
        if !self.has_sample() {
            return false;
        }
        let column = self.direction.choose_column(
            self.direction_mode,
            requested.min(NUM_COLUMNS - 1),
            self.loop_start,
            self.loop_end,
        );

        match self.play_mode {
            PlayMode::OneShot | PlayMode::Loop | PlayMode::Gate => {
                self.start_at_column(column, beat, sample_rate);
                if self.play_mode == PlayMode::Gate {
                    self.gate_held = true;
                }
            }
            PlayMode::Step => {
                // Columns toggle steps; playback stays clock-driven.
                self.step.toggle_step(column);
                if !self.step.is_armed() {
                    self.step.arm(beat);
                    self.playing = true;
                    self.fade.snap_to(1.0);
                }
            }
            PlayMode::Grain => {
                if let Some(sample) = self.sample.as_ref() {
                    self.position = sample.column_start(column);
                }
                self.current_column = column;
                self.grain.gate_on();
                self.playing = true;
                self.fade.snap_to(0.0);
                self.fade
                    .start_fade(FadeDirection::In, declick_samples(sample_rate));
            }
        }
        true
    }

    /// Column release. Gate stops, Grain closes its gate, others ignore.
    pub fn release_column(&mut self, _column: usize, sample_rate: f32) {
        match self.play_mode {
            PlayMode::Gate => {
                self.gate_held = false;
                if self.playing {
                    self.begin_stop(sample_rate);
                }
            }
            PlayMode::Grain => {
                self.grain.gate_off();
            }
            _ => {}
        }
    }

    fn start_at_column(&mut self, column: usize, beat: f64, sample_rate: f32) {
        let Some(sample) = self.sample.as_ref() else {
            return;
        };
        self.position = sample.column_start(column);
        self.current_column = column;
        self.playing = true;
        self.stopping = false;
        self.anchor_timeline(beat);
        self.fade.snap_to(0.0);
        self.fade
            .start_fade(FadeDirection::In, declick_samples(sample_rate));
    }

    /// Stop now (group mute) or with a declick ramp (gate release, one-shot
    /// end).
    pub fn stop(&mut self, immediate: bool, sample_rate: f32) {
        if immediate {
            self.playing = false;
            self.stopping = false;
            self.fade.snap_to(0.0);
            self.grain.reset();
            self.step_env.reset();
            self.step_gate_frames = None;
        } else if self.playing {
            self.begin_stop(sample_rate);
        }
    }

    fn begin_stop(&mut self, sample_rate: f32) {
        self.stopping = true;
        self.fade
            .start_fade(FadeDirection::Out, declick_samples(sample_rate));
    }

    /// Resume after a group unmute: the playhead jumps to where the timeline
    /// says it should be, not back to column zero.
    pub fn resume_at_timeline(&mut self, beat: f64) {
        if !self.has_sample() {
            return;
        }
        self.position = self.timeline_position(beat);
        self.current_column = self
            .sample
            .as_ref()
            .map(|s| s.column_at(self.position))
            .unwrap_or(0);
        self.playing = true;
        self.stopping = false;
        self.fade.snap_to(1.0);
    }

    // ---- timeline --------------------------------------------------------

    pub fn beats_per_loop(&self) -> f64 {
        speed::beats_per_loop_from_ratio(self.speed_ratio, self.recording_bars) as f64
    }

    fn anchor_timeline(&mut self, beat: f64) {
        let Some(sample) = self.sample.as_ref() else {
            return;
        };
        let (ls, le) = sample.loop_bounds(self.loop_start, self.loop_end);
        let span = (le - ls).max(1.0);
        let phase = ((self.position - ls) / span).clamp(0.0, 1.0);
        self.timeline_anchor_beat = beat - phase * self.beats_per_loop();
    }

    /// Where the playhead belongs at `beat` if nothing had disturbed it.
    pub fn timeline_position(&self, beat: f64) -> f64 {
        let Some(sample) = self.sample.as_ref() else {
            return 0.0;
        };
        let (ls, le) = sample.loop_bounds(self.loop_start, self.loop_end);
        let period = self.beats_per_loop().max(1e-6);
        let phase = ((beat - self.timeline_anchor_beat) / period).rem_euclid(1.0);
        ls + phase * (le - ls)
    }

    // ---- scratch gestures ------------------------------------------------

    pub fn scratch_begin(&mut self, beat: f64) {
        if !self.playing {
            return;
        }
        let offset = self.position - self.timeline_position(beat);
        self.scratch.begin(offset);
    }

    pub fn scratch_gesture(&mut self, value: f32) {
        self.scratch.set_gesture(value);
    }

    pub fn tape_stop(&mut self) {
        if self.playing {
            self.scratch.tape_stop();
        }
    }

    pub fn scratch_release(&mut self, beat: f64, sample_rate: f32) {
        let expected = self.timeline_position(beat) + self.scratch.phase_reference();
        let gap = self.position - expected;
        self.scratch.release(gap, sample_rate);
    }

    pub fn scratch_active(&self) -> bool {
        self.scratch.is_active()
    }

    // ---- rendering -------------------------------------------------------

    /// Render one block additively into the engine's mix buffers.
    pub fn render(&mut self, out_l: &mut [f32], out_r: &mut [f32], ctx: &BlockContext) {
        let num_samples = out_l.len().min(out_r.len()).min(MAX_BLOCK_SIZE);
        if num_samples == 0 || !self.has_sample() {
            return;
        }
        let keep_running = match self.play_mode {
            PlayMode::Grain => self.playing && !self.grain.is_silent(),
            _ => self.playing,
        };
        if !keep_running {
            return;
        }

        self.buf_l[..num_samples].fill(0.0);
        self.buf_r[..num_samples].fill(0.0);

        match self.play_mode {
            PlayMode::OneShot | PlayMode::Loop | PlayMode::Gate => {
                self.render_playhead(num_samples, ctx);
            }
            PlayMode::Step => self.render_step(num_samples, ctx),
            PlayMode::Grain => self.render_grain(num_samples, ctx),
        }

        // Shared post chain: filter, then pan/volume into the mix.
        let sr = ctx.sample_rate;
        let angle = (self.pan * 0.5 + 0.5) * std::f32::consts::FRAC_PI_2;
        let gain_l = angle.cos() * self.volume;
        let gain_r = angle.sin() * self.volume;
        for frame in 0..num_samples {
            let mut l = self.buf_l[frame];
            let mut r = self.buf_r[frame];
            self.filter.process_frame(&mut l, &mut r, sr);
            out_l[frame] += l * gain_l;
            out_r[frame] += r * gain_r;
        }
    }

    fn render_playhead(&mut self, num_samples: usize, ctx: &BlockContext) {
        let Some(sample) = self.sample.take() else {
            return;
        };
        let (ls, le) = sample.loop_bounds(self.loop_start, self.loop_end);
        let span = le - ls;
        let base_rate = self.natural_rate_for(&sample, ctx);
        let fade_len =
            (self.crossfade_ms as f64 * 0.001 * ctx.sample_rate as f64).min(span * 0.5);
        let beat_per_sample = ctx.beat_delta / num_samples as f64;

        for frame in 0..num_samples {
            let forward = match self.direction_mode {
                DirectionMode::Reverse => false,
                DirectionMode::PingPong => self.direction.ping_forward(),
                _ => true,
            };
            let (l, r) = read_seam(
                &self.resampler,
                &sample,
                self.position,
                ls,
                le,
                fade_len,
                forward,
            );
            let gain = self.fade.next_gain();
            self.buf_l[frame] = l * gain;
            self.buf_r[frame] = r * gain;

            // Advance: base rate, direction sign, scratch bend.
            let (mult, offset) = self.scratch.tick(ctx.sample_rate);
            let sign = if forward { 1.0 } else { -1.0 };
            self.position += base_rate * sign * mult as f64 + offset as f64;

            if self.scratch.take_finished() {
                let beat_now = ctx.block_start_beat + (frame + 1) as f64 * beat_per_sample;
                // Final correction: reapply the phase reference captured at
                // gesture start so accumulated blend drift cannot persist.
                self.position = self.timeline_pos_with(&sample, beat_now)
                    + self.scratch.phase_reference();
            }

            self.wrap_position(ls, le, fade_len, ctx.sample_rate);
            if self.stopping && !self.fade.is_active() {
                self.playing = false;
                self.stopping = false;
                break;
            }
            if !self.playing {
                break;
            }
        }

        self.current_column = sample.column_at(self.position);
        self.sample = Some(sample);
    }

    fn wrap_position(&mut self, ls: f64, le: f64, fade_len: f64, sample_rate: f32) {
        let span = (le - ls).max(1.0);
        match self.play_mode {
            PlayMode::OneShot => {
                if self.position >= le || self.position < ls {
                    if !self.stopping {
                        self.begin_stop(sample_rate);
                    }
                    self.position = self.position.clamp(ls, (le - 1.0).max(ls));
                }
            }
            _ => match self.direction_mode {
                DirectionMode::PingPong => {
                    if self.position >= le {
                        self.position = le - (self.position - le).min(span);
                        self.direction.bounce();
                    } else if self.position < ls {
                        self.position = ls + (ls - self.position).min(span);
                        self.direction.bounce();
                    }
                }
                DirectionMode::Reverse => {
                    if self.position < ls {
                        self.position = le - fade_len - (ls - self.position) % span;
                    } else if self.position >= le {
                        self.position = ls + (self.position - le) % span;
                    }
                }
                _ => {
                    if self.position >= le {
                        // The seam blend already previewed the loop head, so
                        // landing past it keeps continuity.
                        self.position = ls + fade_len + (self.position - le) % span;
                    } else if self.position < ls {
                        self.position = le - (ls - self.position) % span;
                    }
                }
            },
        }
    }

    fn render_step(&mut self, num_samples: usize, ctx: &BlockContext) {
        let Some(sample) = self.sample.take() else {
            return;
        };
        // Resolve this block's sub-triggers to sample offsets up front.
        self.step_events.clear();
        let from = ctx.block_start_beat;
        let to = ctx.block_start_beat + ctx.beat_delta;
        let span_beats = (to - from).max(1e-12);
        let loop_start = self.loop_start;
        let loop_end = self.loop_end;
        let direction_mode = self.direction_mode;
        let direction = &mut self.direction;
        let events = &mut self.step_events;
        self.step.process_window(from, to, |trigger| {
            if events.len() >= STEP_EVENT_CAPACITY {
                return;
            }
            let span = loop_end - loop_start;
            let requested = loop_start + trigger.step % span.max(1);
            let column = if direction_mode.is_random() {
                direction.choose_column(direction_mode, requested, loop_start, loop_end)
            } else if direction_mode == DirectionMode::Reverse {
                loop_end - 1 - trigger.step % span.max(1)
            } else {
                requested
            };
            let offset =
                ((trigger.beat - from) / span_beats * num_samples as f64) as u32;
            let gate_frames =
                (trigger.duration_beats / span_beats * num_samples as f64).round() as u32;
            events.push(QueuedStep {
                offset: offset.min(num_samples as u32 - 1),
                gate_frames: gate_frames.max(1),
                column,
                velocity: trigger.velocity,
            });
        });

        let base_rate = self.natural_rate_for(&sample, ctx);
        let mut next_event = 0;
        for frame in 0..num_samples {
            while next_event < self.step_events.len()
                && self.step_events[next_event].offset == frame as u32
            {
                let event = self.step_events[next_event];
                self.position = sample.column_start(event.column);
                self.current_column = event.column;
                self.step_env.gate_on(event.velocity);
                self.step_gate_frames = Some(event.gate_frames);
                next_event += 1;
            }
            // Close the gate when the slot elapses; release_ms then shapes
            // the tail instead of the decay running on into the next slot.
            if let Some(frames) = self.step_gate_frames.as_mut() {
                if *frames == 0 {
                    self.step_env.gate_off(ctx.sample_rate);
                    self.step_gate_frames = None;
                } else {
                    *frames -= 1;
                }
            }
            let env = self.step_env.next_sample(ctx.sample_rate);
            if env > 0.0 {
                self.buf_l[frame] = self.resampler.read(sample.left(), self.position) * env;
                self.buf_r[frame] = self.resampler.read(sample.right(), self.position) * env;
                self.position += base_rate;
            }
        }
        self.sample = Some(sample);
    }

    fn render_grain(&mut self, num_samples: usize, ctx: &BlockContext) {
        let Some(sample) = self.sample.take() else {
            return;
        };
        let (ls, le) = sample.loop_bounds(self.loop_start, self.loop_end);
        let span = (le - ls).max(1.0);
        let center = self.position;
        self.grain.render(
            &sample,
            center,
            &mut self.buf_l[..num_samples],
            &mut self.buf_r[..num_samples],
            ctx.sample_rate,
            ctx.samples_per_beat(),
        );
        // Apply the declick fade on top of the grain sum.
        for frame in 0..num_samples {
            let gain = self.fade.next_gain();
            self.buf_l[frame] *= gain;
            self.buf_r[frame] *= gain;
        }
        // The cloud center keeps crawling along the loop at the natural rate.
        let rate = self.natural_rate_for(&sample, ctx);
        self.position = ls + (center + rate * num_samples as f64 - ls).rem_euclid(span);
        self.current_column = sample.column_at(self.position);
        self.sample = Some(sample);
    }

    fn natural_rate_for(&self, sample: &SampleBuffer, ctx: &BlockContext) -> f64 {
        let (ls, le) = sample.loop_bounds(self.loop_start, self.loop_end);
        (le - ls) / (self.beats_per_loop() * ctx.samples_per_beat())
    }

    fn timeline_pos_with(&self, sample: &SampleBuffer, beat: f64) -> f64 {
        let (ls, le) = sample.loop_bounds(self.loop_start, self.loop_end);
        let period = self.beats_per_loop().max(1e-6);
        let phase = ((beat - self.timeline_anchor_beat) / period).rem_euclid(1.0);
        ls + phase * (le - ls)
    }
}

fn declick_samples(sample_rate: f32) -> u32 {
    ((DECLICK_MS * 0.001 * sample_rate) as u32).max(1)
}

/// Read one stereo frame with the loop-seam crossfade applied.
///
/// Inside the fade zone before the loop end (or after the loop start when
/// playing backward) the tail is blended with the loop head using
/// complementary gains, so the summed amplitude across the wrap never jumps.
fn read_seam(
    resampler: &Resampler,
    sample: &SampleBuffer,
    position: f64,
    ls: f64,
    le: f64,
    fade_len: f64,
    forward: bool,
) -> (f32, f32) {
    let tail_l = resampler.read(sample.left(), position);
    let tail_r = resampler.read(sample.right(), position);
    if fade_len <= 0.0 {
        return (tail_l, tail_r);
    }

    let (progress, head_pos) = if forward {
        let zone_start = le - fade_len;
        if position < zone_start || position >= le {
            return (tail_l, tail_r);
        }
        let p = (position - zone_start) / fade_len;
        (p, ls + (position - zone_start))
    } else {
        let zone_end = ls + fade_len;
        if position >= zone_end || position < ls {
            return (tail_l, tail_r);
        }
        let p = (zone_end - position) / fade_len;
        (p, le - (zone_end - position))
    };

    let (tail_gain, head_gain) = crate::dsp::crossfader::seam_gains(progress as f32);
    let head_l = resampler.read(sample.left(), head_pos);
    let head_r = resampler.read(sample.right(), head_pos);
    (
        tail_l * tail_gain + head_l * head_gain,
        tail_r * tail_gain + head_r * head_gain,
    )
}
