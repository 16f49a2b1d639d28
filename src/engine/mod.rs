/*
Engine - the per-block orchestrator
===================================

Owns the fixed arrays of tracks, groups, patterns and modulation sequencers.
Nothing outside holds references to them; external callers address them by
index through the command queue and read state back through the session
snapshot.

One audio block runs this fixed sequence:

  1. drain the command queue and apply every command
  2. reconcile the transport with the host (or integrate tempo)
  3. pin the quantization clock to the block-start beat
  4. fire due quantized triggers into their tracks
  5. dispatch due pattern events as synthetic button gestures
  6. evaluate modulation sequencers and push values into track parameters
  7. render every track, scale by group gain, limit, publish the snapshot

Steps 1 and 4 are deliberately ordered: a command that clears a pending
trigger (mode switch, stop-all) runs before the fire step of the same block
can see it, so a cleared trigger never fires.

The whole path is allocation-free: the due-trigger and pattern scratch Vecs
are bounded and pre-reserved, the mix buffers are sized at construction, and
commands arrive through a lock-free SPSC ring.
*/

pub mod command;
pub mod session;

pub use command::{Command, ControlError, COMMAND_QUEUE_CAPACITY};
#[cfg(feature = "rtrb")]
pub use command::EngineHandle;
pub use session::{SessionState, TrackSnapshot, BRIGHTNESS_MAX};

use std::sync::Arc;

use crate::dsp::Limiter;
use crate::group::GroupBank;
use crate::modseq::{ModSequencer, ModTarget};
use crate::pattern::{PatternRecorder, PatternSnapshot};
use crate::timing::{HostPosition, QuantizationClock, QuantizedTrigger, Transport};
use crate::track::{BlockContext, PlayMode, SampleBuffer, Track};
use crate::{MAX_BLOCK_SIZE, MOD_SEQUENCERS_PER_TRACK, NUM_PATTERNS, NUM_TRACKS};

/// Pattern events resolved per block; bounded, drained every block.
const PATTERN_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
struct DuePatternEvent {
    beat: f64,
    track: usize,
    column: usize,
    is_on: bool,
}

pub struct Engine {
    transport: Transport,
    clock: QuantizationClock,
    quantize_enabled: bool,

    tracks: [Track; NUM_TRACKS],
    groups: GroupBank,
    /// Which tracks a group mute silenced, so unmute resumes exactly those.
    muted_resume: [bool; NUM_TRACKS],
    patterns: [PatternRecorder; NUM_PATTERNS],
    mod_seqs: [[ModSequencer; MOD_SEQUENCERS_PER_TRACK]; NUM_TRACKS],
    limiter: Limiter,

    session: Arc<SessionState>,
    #[cfg(feature = "rtrb")]
    commands: rtrb::Consumer<Command>,

    due: Vec<QuantizedTrigger>,
    pattern_due: Vec<DuePatternEvent>,
    mix_l: Vec<f32>,
    mix_r: Vec<f32>,
    sample_rate: f32,
}

impl Engine {
    #[cfg(feature = "rtrb")]
    pub fn new(sample_rate: f32) -> (Self, EngineHandle) {
        let (producer, consumer) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);
        let session = Arc::new(SessionState::new());
        let handle = EngineHandle::new(producer, Arc::clone(&session));
        let engine = Self::build(sample_rate, session, consumer);
        (engine, handle)
    }

    #[cfg(not(feature = "rtrb"))]
    pub fn new(sample_rate: f32) -> Self {
        Self::build(sample_rate, Arc::new(SessionState::new()))
    }

    fn build(
        sample_rate: f32,
        session: Arc<SessionState>,
        #[cfg(feature = "rtrb")] commands: rtrb::Consumer<Command>,
    ) -> Self {
        let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            48_000.0
        };
        Self {
            transport: Transport::new(sample_rate as f64),
            clock: QuantizationClock::new(sample_rate as f64),
            quantize_enabled: true,
            tracks: std::array::from_fn(Track::new),
            groups: GroupBank::new(),
            muted_resume: [false; NUM_TRACKS],
            patterns: std::array::from_fn(|_| PatternRecorder::new()),
            mod_seqs: std::array::from_fn(|_| std::array::from_fn(|_| ModSequencer::new())),
            limiter: Limiter::new(sample_rate),
            session,
            #[cfg(feature = "rtrb")]
            commands,
            due: Vec::with_capacity(NUM_TRACKS),
            pattern_due: Vec::with_capacity(PATTERN_EVENT_CAPACITY),
            mix_l: vec![0.0; MAX_BLOCK_SIZE],
            mix_r: vec![0.0; MAX_BLOCK_SIZE],
            sample_rate,
        }
    }

    /// Reconfigure for a new sample rate. Not realtime-safe by contract;
    /// call with audio stopped.
    pub fn prepare(&mut self, sample_rate: f32) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.sample_rate = sample_rate;
            self.transport.prepare(sample_rate as f64);
            self.clock.set_sample_rate(sample_rate as f64);
            self.limiter.prepare(sample_rate);
        }
    }

    // ---- non-realtime setup surface --------------------------------------

    /// Replace a track's sample wholesale, returning the old buffer so it
    /// drops on the caller's thread.
    pub fn load_sample(&mut self, track: usize, sample: SampleBuffer) -> Option<SampleBuffer> {
        if track >= NUM_TRACKS {
            return None;
        }
        tracing::info!(track, frames = sample.len(), "loading sample");
        self.clock.clear_pending_for_track(track);
        self.tracks[track].load_sample(sample)
    }

    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index.min(NUM_TRACKS - 1)]
    }

    pub fn track_mut(&mut self, index: usize) -> &mut Track {
        &mut self.tracks[index.min(NUM_TRACKS - 1)]
    }

    pub fn session(&self) -> Arc<SessionState> {
        Arc::clone(&self.session)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn pattern_snapshot(&self, pattern: usize) -> PatternSnapshot {
        self.patterns[pattern.min(NUM_PATTERNS - 1)].snapshot()
    }

    pub fn restore_pattern(&mut self, pattern: usize, snapshot: &PatternSnapshot) {
        self.patterns[pattern.min(NUM_PATTERNS - 1)].restore(snapshot);
    }

    // ---- control application ---------------------------------------------

    /// Apply one command. Runs on the audio thread at the top of a block;
    /// also callable directly when no command ring is in use.
    pub fn apply(&mut self, command: Command) {
        if command::validate(&command).is_err() {
            return;
        }
        let beat = self.transport.beat();
        let sr = self.sample_rate;
        use Command::*;
        match command {
            ButtonDown { track, column } => {
                self.record_gesture(track, column, true, beat);
                self.button_down(track, column);
            }
            ButtonUp { track, column } => {
                self.record_gesture(track, column, false, beat);
                self.button_up(track, column);
            }
            StopTrack { track } => {
                self.clock.clear_pending_for_track(track);
                self.tracks[track].stop(false, sr);
            }
            StopAll => {
                self.clock.clear_pending_triggers();
                for track in &mut self.tracks {
                    track.stop(true, sr);
                }
            }

            SetPlayMode { track, mode } => {
                // Pending triggers must not fire into the new mode's state.
                self.clock.clear_pending_for_track(track);
                self.tracks[track].set_play_mode(mode, self.transport.is_playing(), beat);
            }
            SetDirectionMode { track, mode } => self.tracks[track].set_direction_mode(mode),
            SetVolume { track, value } => self.tracks[track].set_volume(value),
            SetPan { track, value } => self.tracks[track].set_pan(value),
            SetSpeedRatio { track, value } => self.tracks[track].set_speed_ratio(value),
            SetLoopPoints { track, start, end } => self.tracks[track].set_loop_points(start, end),
            SetCrossfadeMs { track, value } => self.tracks[track].set_crossfade_ms(value),
            SetFilterCutoff { track, value } => self.tracks[track].set_filter_cutoff(value),
            SetFilterResonance { track, value } => {
                self.tracks[track].set_filter_resonance(value)
            }
            SetEnvelopeTimes {
                track,
                attack_ms,
                decay_ms,
                release_ms,
            } => self.tracks[track].set_envelope_times(attack_ms, decay_ms, release_ms),
            SetStep {
                track,
                index,
                config,
            } => self.tracks[track].step_sequencer().set_step(index, config),

            SetScratchAmount { track, value } => self.tracks[track].set_scratch_amount(value),
            ScratchBegin { track } => self.tracks[track].scratch_begin(beat),
            ScratchGesture { track, value } => self.tracks[track].scratch_gesture(value),
            ScratchRelease { track } => self.tracks[track].scratch_release(beat, sr),
            TapeStop { track } => self.tracks[track].tape_stop(),

            SetGrainParams { track, params } => self.tracks[track].set_grain_params(params),

            SetQuantizeDivision { division } => self.clock.set_division(division),
            SetQuantizeEnabled { enabled } => {
                self.quantize_enabled = enabled;
                if !enabled {
                    self.clock.clear_pending_triggers();
                }
            }

            AssignGroup { track, group } => self.groups.assign(track, group),
            RemoveFromGroup { track } => self.groups.remove(track),
            SetGroupMuted { group, muted } => self.set_group_muted(group, muted, beat),
            SetGroupVolume { group, value } => self.groups.set_volume(group, value),

            PatternRecord { pattern } => {
                if pattern < NUM_PATTERNS {
                    self.patterns[pattern].start_recording(beat);
                }
            }
            PatternStopRecord { pattern } => {
                if pattern < NUM_PATTERNS {
                    self.patterns[pattern].stop_recording();
                }
            }
            PatternPlay { pattern } => {
                if pattern < NUM_PATTERNS {
                    self.patterns[pattern].start_playback(beat);
                }
            }
            PatternStop { pattern } => {
                if pattern < NUM_PATTERNS {
                    self.patterns[pattern].stop_playback();
                }
            }
            PatternClear { pattern } => {
                if pattern < NUM_PATTERNS {
                    self.patterns[pattern].clear();
                }
            }
            SetPatternLength { pattern, beats } => {
                if pattern < NUM_PATTERNS {
                    self.patterns[pattern].set_length_beats(beats);
                }
            }

            SetModEnabled {
                track,
                slot,
                enabled,
            } => {
                if slot < MOD_SEQUENCERS_PER_TRACK {
                    self.mod_seqs[track][slot].set_enabled(enabled);
                }
            }
            SetModTarget {
                track,
                slot,
                target,
            } => {
                if slot < MOD_SEQUENCERS_PER_TRACK {
                    self.mod_seqs[track][slot].set_target(target);
                }
            }
            SetModStep {
                track,
                slot,
                index,
                step,
            } => {
                if slot < MOD_SEQUENCERS_PER_TRACK {
                    self.mod_seqs[track][slot].set_step(index, step);
                }
            }
            SetModDepth { track, slot, value } => {
                if slot < MOD_SEQUENCERS_PER_TRACK {
                    self.mod_seqs[track][slot].set_depth(value);
                }
            }
            SetModBipolar {
                track,
                slot,
                bipolar,
            } => {
                if slot < MOD_SEQUENCERS_PER_TRACK {
                    self.mod_seqs[track][slot].set_bipolar(bipolar);
                }
            }
            SetModBars { track, slot, bars } => {
                if slot < MOD_SEQUENCERS_PER_TRACK {
                    self.mod_seqs[track][slot].set_num_bars(bars);
                }
            }
            SetModSmoothing { track, slot, ms } => {
                if slot < MOD_SEQUENCERS_PER_TRACK {
                    self.mod_seqs[track][slot].set_smoothing_ms(ms);
                }
            }

            SetLimiterEnabled { enabled } => self.limiter.set_enabled(enabled),
            SetLimiterThresholdDb { db } => self.limiter.set_threshold_db(db),
        }
    }

    fn record_gesture(&mut self, track: usize, column: usize, is_on: bool, beat: f64) {
        for pattern in &mut self.patterns {
            if pattern.is_recording() {
                pattern.record_event(track, column, is_on, beat);
            }
        }
    }

    fn button_down(&mut self, track: usize, column: usize) {
        let beat = self.transport.beat();
        let quantized = self.quantize_enabled
            && matches!(
                self.tracks[track].play_mode(),
                PlayMode::OneShot | PlayMode::Loop | PlayMode::Gate
            );
        if quantized {
            self.clock
                .schedule_trigger(track, column, self.clock.current_ppq());
        } else {
            self.tracks[track].trigger_column(column, beat, self.sample_rate);
        }
    }

    fn button_up(&mut self, track: usize, column: usize) {
        // A quantized gate press released before firing must never fire.
        if self.tracks[track].play_mode() == PlayMode::Gate {
            self.clock.clear_pending_for_track(track);
        }
        self.tracks[track].release_column(column, self.sample_rate);
    }

    fn set_group_muted(&mut self, group: usize, muted: bool, beat: f64) {
        if !self.groups.set_muted(group, muted) {
            return;
        }
        let sr = self.sample_rate;
        if muted {
            for t in 0..NUM_TRACKS {
                if self.groups.group(group).contains(t) {
                    self.muted_resume[t] = self.tracks[t].is_playing();
                    self.tracks[t].stop(true, sr);
                }
            }
        } else {
            for t in 0..NUM_TRACKS {
                if self.groups.group(group).contains(t) && self.muted_resume[t] {
                    self.muted_resume[t] = false;
                    self.tracks[t].resume_at_timeline(beat);
                }
            }
        }
    }

    // ---- audio -----------------------------------------------------------

    /// Render one audio callback in place. `host` carries the transport
    /// contract; None means free-running at the last known tempo.
    pub fn process(
        &mut self,
        out_l: &mut [f32],
        out_r: &mut [f32],
        host: Option<&HostPosition>,
    ) {
        let total = out_l.len().min(out_r.len());
        let mut done = 0;
        let mut host = host;
        while done < total {
            let n = (total - done).min(MAX_BLOCK_SIZE);
            self.process_block(&mut out_l[done..done + n], &mut out_r[done..done + n], host);
            // Only the first chunk gets the host position; later chunks
            // integrate from it.
            host = None;
            done += n;
        }
    }

    fn process_block(
        &mut self,
        out_l: &mut [f32],
        out_r: &mut [f32],
        host: Option<&HostPosition>,
    ) {
        let num_samples = out_l.len();
        out_l.fill(0.0);
        out_r.fill(0.0);
        if num_samples == 0 {
            return;
        }

        // 1. Apply queued control intent before anything can fire.
        #[cfg(feature = "rtrb")]
        while let Ok(cmd) = self.commands.pop() {
            self.apply(cmd);
        }

        // 2-3. Transport and clock.
        let (from_beat, to_beat) = self.transport.update(host, num_samples);
        self.clock.set_tempo(self.transport.tempo());
        self.clock.update_from_ppq(from_beat, 0);
        let block_start = self.clock.current_sample();
        let block_end = block_start + num_samples as u64;

        // 4. Fire due quantized triggers.
        self.due.clear();
        self.clock.take_due(block_start, block_end, &mut self.due);
        for i in 0..self.due.len() {
            let t = self.due[i];
            self.tracks[t.track].trigger_column(t.column, t.target_ppq, self.sample_rate);
        }

        // 5. Pattern playback dispatch.
        self.pattern_due.clear();
        for pattern in &mut self.patterns {
            pattern.update_recording(to_beat);
            let events = &mut self.pattern_due;
            pattern.process_window(from_beat, to_beat, |beat, e| {
                if events.len() < PATTERN_EVENT_CAPACITY {
                    events.push(DuePatternEvent {
                        beat,
                        track: e.track,
                        column: e.column,
                        is_on: e.is_on,
                    });
                }
            });
        }
        for i in 0..self.pattern_due.len() {
            let e = self.pattern_due[i];
            if e.track >= NUM_TRACKS {
                continue;
            }
            if e.is_on {
                // Replayed events were grid-aligned when recorded; they fire
                // at their stored beat without re-quantization.
                self.tracks[e.track].trigger_column(e.column, e.beat, self.sample_rate);
            } else {
                self.tracks[e.track].release_column(e.column, self.sample_rate);
            }
        }

        // 6. Modulation sequencers into track parameters.
        let block_seconds = num_samples as f64 / self.sample_rate as f64;
        for track_index in 0..NUM_TRACKS {
            for slot in 0..MOD_SEQUENCERS_PER_TRACK {
                let seq = &mut self.mod_seqs[track_index][slot];
                if let Some(normalized) = seq.evaluate(from_beat, block_seconds) {
                    let target = seq.target();
                    apply_modulation(&mut self.tracks[track_index], target, target.map(normalized));
                }
            }
        }

        // 7. Render, group-scale, limit, publish.
        let ctx = BlockContext {
            sample_rate: self.sample_rate,
            tempo: self.transport.tempo(),
            block_start_beat: from_beat,
            beat_delta: to_beat - from_beat,
            transport_playing: self.transport.is_playing(),
        };
        for track_index in 0..NUM_TRACKS {
            let gain = self.groups.track_gain(track_index);
            if gain <= 0.0 {
                continue;
            }
            self.mix_l[..num_samples].fill(0.0);
            self.mix_r[..num_samples].fill(0.0);
            self.tracks[track_index].render(
                &mut self.mix_l[..num_samples],
                &mut self.mix_r[..num_samples],
                &ctx,
            );
            for frame in 0..num_samples {
                out_l[frame] += self.mix_l[frame] * gain;
                out_r[frame] += self.mix_r[frame] * gain;
            }
        }
        for frame in 0..num_samples {
            self.limiter
                .process_frame(&mut out_l[frame], &mut out_r[frame]);
        }

        self.clock.update_from_ppq(to_beat, num_samples);
        self.publish_session(to_beat);
    }

    fn publish_session(&self, beat: f64) {
        for (i, track) in self.tracks.iter().enumerate() {
            let (loop_start, loop_end) = track.loop_points();
            self.session.publish_track(
                i,
                TrackSnapshot {
                    playing: track.is_playing(),
                    current_column: track.current_column(),
                    play_mode: track.play_mode(),
                    loop_start,
                    loop_end,
                    step_cursor: track.step_cursor(beat),
                },
            );
        }
        let mut playing = [false; NUM_PATTERNS];
        let mut recording = [false; NUM_PATTERNS];
        for (i, pattern) in self.patterns.iter().enumerate() {
            playing[i] = pattern.is_playing();
            recording[i] = pattern.is_recording();
        }
        self.session.publish_patterns(playing, recording);
    }
}

fn apply_modulation(track: &mut Track, target: ModTarget, value: f32) {
    match target {
        ModTarget::Volume => track.set_volume(value),
        ModTarget::Pan => track.set_pan(value),
        ModTarget::Pitch => track.set_grain_pitch(value),
        ModTarget::Speed => track.set_speed_ratio(value),
        ModTarget::FilterCutoff => track.set_filter_cutoff(value),
        ModTarget::FilterResonance => track.set_filter_resonance(value),
        ModTarget::GrainSize => {
            let mut params = track.grain_params();
            params.size_ms = value;
            track.set_grain_params(params);
        }
        ModTarget::GrainDensity => {
            let mut params = track.grain_params();
            params.density = value;
            track.set_grain_params(params);
        }
        ModTarget::GrainJitter => {
            let mut params = track.grain_params();
            params.jitter = value;
            track.set_grain_params(params);
        }
        ModTarget::GrainSpread => {
            let mut params = track.grain_params();
            params.spread = value;
            track.set_grain_params(params);
        }
    }
}
