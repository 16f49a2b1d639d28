/*
Pattern recorder
================

Captures button gestures as (track, column, on/off, beat) events and loops
them back over a fixed bar length.

Recording is grid-aligned: asking to record arms the recorder, and capture
actually begins on the next whole-beat boundary. Event times are stored
relative to that anchor, so a snapshot replayed elsewhere starts from beat
zero of the pattern, not from wherever the performer happened to press record.

Playback anchors pattern-beat zero to an absolute transport beat and emits
each event exactly once per pass of the loop. The `last_processed_beat` guard
makes overlapping windows safe: a caller that processes [2.0, 2.1) twice gets
the events once.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const MIN_PATTERN_BEATS: u32 = 1;
pub const MAX_PATTERN_BEATS: u32 = 32;

/// Capacity reserved up front so recording on the audio thread cannot
/// reallocate mid-performance.
const EVENT_CAPACITY: usize = 512;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternEvent {
    pub track: usize,
    pub column: usize,
    pub is_on: bool,
    /// Beat offset inside the pattern, `0.0 <= beat < length_beats`.
    pub beat: f64,
}

/// Persistence surface: round-tripping a snapshot reproduces identical
/// playback.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSnapshot {
    pub events: Vec<PatternEvent>,
    pub length_beats: u32,
}

#[derive(Debug)]
pub struct PatternRecorder {
    events: Vec<PatternEvent>,
    length_beats: u32,

    recording: bool,
    record_armed: bool,
    record_start_beat: f64,

    playing: bool,
    playback_anchor_beat: f64,
    last_processed_beat: f64,
}

impl Default for PatternRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRecorder {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(EVENT_CAPACITY),
            length_beats: 4,
            recording: false,
            record_armed: false,
            record_start_beat: -1.0,
            playing: false,
            playback_anchor_beat: 0.0,
            last_processed_beat: f64::NEG_INFINITY,
        }
    }

    pub fn set_length_beats(&mut self, beats: u32) {
        self.length_beats = beats.clamp(MIN_PATTERN_BEATS, MAX_PATTERN_BEATS);
    }

    pub fn length_beats(&self) -> u32 {
        self.length_beats
    }

    pub fn is_recording(&self) -> bool {
        self.recording || self.record_armed
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Arm recording; capture begins at the next whole-beat boundary.
    pub fn start_recording(&mut self, current_beat: f64) {
        self.events.clear();
        self.record_start_beat = current_beat.ceil();
        self.record_armed = true;
        self.recording = false;
    }

    pub fn stop_recording(&mut self) {
        self.recording = false;
        self.record_armed = false;
    }

    /// Auto-stop once the configured length has elapsed. Returns true if the
    /// recorder stopped during this update.
    pub fn update_recording(&mut self, current_beat: f64) -> bool {
        if self.record_armed && current_beat >= self.record_start_beat {
            self.record_armed = false;
            self.recording = true;
        }
        if self.recording && current_beat >= self.record_start_beat + self.length_beats as f64 {
            self.recording = false;
            return true;
        }
        false
    }

    /// Record one gesture. Events before the quantized start beat are
    /// dropped; events past the pattern length stop the recording.
    pub fn record_event(&mut self, track: usize, column: usize, is_on: bool, current_beat: f64) {
        self.update_recording(current_beat);
        if !self.recording {
            return;
        }
        let rel = current_beat - self.record_start_beat;
        if rel < 0.0 {
            return;
        }
        if rel >= self.length_beats as f64 {
            self.recording = false;
            return;
        }
        if self.events.len() == self.events.capacity() {
            return; // full: drop rather than allocate on the audio thread
        }
        let event = PatternEvent {
            track,
            column,
            is_on,
            beat: rel,
        };
        // Keep events time-ordered on insert.
        let idx = self
            .events
            .partition_point(|e| e.beat <= event.beat);
        self.events.insert(idx, event);
    }

    /// Anchor pattern-beat zero at `current_beat` and start looping.
    pub fn start_playback(&mut self, current_beat: f64) {
        self.playing = true;
        self.playback_anchor_beat = current_beat;
        self.last_processed_beat = f64::NEG_INFINITY;
    }

    pub fn stop_playback(&mut self) {
        self.playing = false;
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.recording = false;
        self.record_armed = false;
        self.playing = false;
        self.last_processed_beat = f64::NEG_INFINITY;
    }

    /// Current position inside the pattern, for display.
    pub fn playback_position(&self, current_beat: f64) -> f64 {
        if !self.playing {
            return 0.0;
        }
        (current_beat - self.playback_anchor_beat).rem_euclid(self.length_beats as f64)
    }

    /// Emit every event whose absolute firing beat falls in `[from, to)`,
    /// in time order, exactly once per loop pass. The callback receives the
    /// absolute beat the event fires at alongside the event itself.
    pub fn process_window<F>(&mut self, from_beat: f64, to_beat: f64, mut emit: F)
    where
        F: FnMut(f64, &PatternEvent),
    {
        if !self.playing || self.events.is_empty() || to_beat <= from_beat {
            return;
        }
        // Overlapping-window guard: never re-process beats already handled.
        let from = from_beat.max(self.last_processed_beat);
        if to_beat <= from {
            return;
        }
        self.last_processed_beat = to_beat;

        let length = self.length_beats as f64;
        let pass_from = ((from - self.playback_anchor_beat) / length).floor() as i64;
        let pass_to = ((to_beat - self.playback_anchor_beat) / length).floor() as i64;

        for pass in pass_from..=pass_to {
            let pass_start = self.playback_anchor_beat + pass as f64 * length;
            for event in &self.events {
                let t = pass_start + event.beat;
                if t >= from && t < to_beat {
                    emit(t, event);
                }
            }
        }
    }

    pub fn snapshot(&self) -> PatternSnapshot {
        PatternSnapshot {
            events: self.events.clone(),
            length_beats: self.length_beats,
        }
    }

    pub fn restore(&mut self, snapshot: &PatternSnapshot) {
        self.events.clear();
        self.events
            .extend(snapshot.events.iter().copied().filter(|e| {
                e.beat >= 0.0 && e.beat < snapshot.length_beats as f64
            }));
        self.events
            .sort_by(|a, b| a.beat.partial_cmp(&b.beat).unwrap_or(std::cmp::Ordering::Equal));
        self.set_length_beats(snapshot.length_beats);
        self.recording = false;
        self.record_armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_events(
        recorder: &mut PatternRecorder,
        from: f64,
        to: f64,
    ) -> Vec<(usize, usize, bool, f64)> {
        let mut out = Vec::new();
        recorder.process_window(from, to, |_, e| {
            out.push((e.track, e.column, e.is_on, e.beat))
        });
        out
    }

    fn demo_pattern() -> PatternRecorder {
        let mut p = PatternRecorder::new();
        p.set_length_beats(4);
        p.start_recording(0.3); // arms; capture starts at beat 1.0
        p.record_event(0, 3, true, 1.0);
        p.record_event(0, 3, false, 1.5);
        p.record_event(2, 7, true, 3.25);
        p.stop_recording();
        p
    }

    #[test]
    fn recording_start_is_deferred_to_beat_boundary() {
        let mut p = PatternRecorder::new();
        p.start_recording(0.3);
        // Event before the boundary is dropped.
        p.record_event(0, 0, true, 0.5);
        assert_eq!(p.event_count(), 0);
        // Event on the boundary lands at pattern beat 0.
        p.record_event(0, 1, true, 1.0);
        assert_eq!(p.event_count(), 1);
        assert_eq!(p.snapshot().events[0].beat, 0.0);
    }

    #[test]
    fn recording_auto_stops_after_length() {
        let mut p = PatternRecorder::new();
        p.set_length_beats(2);
        p.start_recording(0.0);
        p.record_event(0, 0, true, 0.5);
        assert!(p.is_recording());
        assert!(p.update_recording(2.5), "length elapsed should stop recording");
        assert!(!p.is_recording());
    }

    #[test]
    fn playback_emits_events_in_window() {
        let mut p = demo_pattern();
        p.start_playback(8.0);
        // Pattern beats 0 and 0.5 map to absolute 8.0 and 8.5.
        let events = collect_events(&mut p, 8.0, 9.0);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], (0, 3, true, 0.0));
        assert_eq!(events[1], (0, 3, false, 0.5));
    }

    #[test]
    fn overlapping_windows_never_double_fire() {
        let mut p = demo_pattern();
        p.start_playback(0.0);
        let first = collect_events(&mut p, 0.0, 0.25);
        assert_eq!(first.len(), 1);
        // Same window again: the guard suppresses the duplicate.
        let again = collect_events(&mut p, 0.0, 0.25);
        assert!(again.is_empty(), "re-processing a window must not re-fire");
    }

    #[test]
    fn playback_loops_over_length() {
        let mut p = demo_pattern();
        p.start_playback(0.0);
        let pass1 = collect_events(&mut p, 0.0, 4.0);
        let pass2 = collect_events(&mut p, 4.0, 8.0);
        assert_eq!(pass1.len(), 3);
        assert_eq!(pass1, pass2, "each pass must replay identically");
    }

    #[test]
    fn replay_from_zero_is_idempotent() {
        let mut p = demo_pattern();
        p.start_playback(0.0);
        let first = collect_events(&mut p, 0.0, 4.0);
        p.start_playback(0.0);
        let second = collect_events(&mut p, 0.0, 4.0);
        assert_eq!(first, second);
    }

    #[test]
    fn window_wrapping_loop_end_emits_tail_then_head() {
        let mut p = demo_pattern();
        p.start_playback(0.0);
        collect_events(&mut p, 0.0, 3.9);
        // Window spans the loop seam: 3.9..4.1 covers beat 0 of pass 2.
        let events = collect_events(&mut p, 3.9, 4.1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].3, 0.0);
    }

    #[test]
    fn snapshot_round_trip_reproduces_playback() {
        let mut original = demo_pattern();
        let snapshot = original.snapshot();

        let mut restored = PatternRecorder::new();
        restored.restore(&snapshot);

        original.start_playback(0.0);
        restored.start_playback(0.0);
        let a = collect_events(&mut original, 0.0, 8.0);
        let b = collect_events(&mut restored, 0.0, 8.0);
        assert_eq!(a, b);
        assert_eq!(snapshot, restored.snapshot());
    }
}
