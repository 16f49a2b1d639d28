/*
Trigger quantization
====================

Button presses land at arbitrary moments; music wants them on the grid. The
QuantizationClock keeps two views of "now" - an absolute sample counter that
only ever moves forward, and the current musical position in beats - and
converts a trigger request into the absolute sample of the next grid boundary.

The grid is expressed as divisions per 4 beats (1, 2, 4, 8, 16, 32), so a
division of 8 is an eighth-note grid: boundaries every 0.5 beats.

Pending triggers are bounded: one per track, a new request replaces the old
one. That keeps the storage at NUM_TRACKS entries, pre-reserved, so scheduling
from the audio thread never allocates.

A paused host never advances the musical position, which simply means pending
triggers never come due. There is no wall-clock timeout.
*/

use crate::NUM_TRACKS;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizedTrigger {
    pub track: usize,
    pub column: usize,
    /// Absolute sample at which the trigger fires.
    pub target_sample: u64,
    /// Exact grid beat the trigger lands on (for timeline anchoring).
    pub target_ppq: f64,
}

#[derive(Debug)]
pub struct QuantizationClock {
    tempo: f64,
    sample_rate: f64,
    division: u32,
    current_sample: u64,
    current_ppq: f64,
    pending: Vec<QuantizedTrigger>,
}

// A request this close past a boundary still counts as on it.
const GRID_EPSILON: f64 = 1e-9;

impl QuantizationClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            tempo: 120.0,
            sample_rate: sample_rate.max(1.0),
            division: 8,
            current_sample: 0,
            current_ppq: 0.0,
            pending: Vec::with_capacity(NUM_TRACKS),
        }
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        if bpm.is_finite() && bpm > 0.0 {
            self.tempo = bpm;
        }
    }

    /// Grid divisions per 4 beats, clamped to 1..=32.
    pub fn set_division(&mut self, division: u32) {
        self.division = division.clamp(1, 32);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.sample_rate = sample_rate;
        }
    }

    pub fn reset(&mut self) {
        self.current_sample = 0;
        self.current_ppq = 0.0;
        self.pending.clear();
    }

    /// Grid size in beats.
    pub fn quant_beats(&self) -> f64 {
        4.0 / self.division as f64
    }

    pub fn current_sample(&self) -> u64 {
        self.current_sample
    }

    pub fn current_ppq(&self) -> f64 {
        self.current_ppq
    }

    /// Advance by integrating tempo (host reported no position).
    pub fn advance(&mut self, num_samples: usize) {
        self.current_sample += num_samples as u64;
        self.current_ppq += num_samples as f64 / self.sample_rate * self.tempo / 60.0;
    }

    /// Advance, locking position to the host-reported PPQ.
    pub fn update_from_ppq(&mut self, ppq: f64, num_samples: usize) {
        self.current_sample += num_samples as u64;
        if ppq.is_finite() {
            self.current_ppq = ppq;
        }
    }

    /// Schedule a trigger on the next grid boundary at or after `request_ppq`.
    ///
    /// The target sample is measured from the clock's own position, so two
    /// requests resolving to the same boundary land on the same sample. A
    /// pending trigger for the same track is replaced, not accumulated.
    pub fn schedule_trigger(&mut self, track: usize, column: usize, request_ppq: f64) {
        let ppq = if request_ppq.is_finite() {
            request_ppq
        } else {
            self.current_ppq
        };
        let grid = self.quant_beats();
        let target_ppq = ((ppq - GRID_EPSILON) / grid).ceil().max(0.0) * grid;
        let target_ppq = target_ppq.max(ppq);

        let delta_beats = target_ppq - self.current_ppq;
        let delta_samples = (delta_beats * 60.0 / self.tempo * self.sample_rate).round();
        let target_sample = self.current_sample + delta_samples.max(0.0) as u64;

        let trigger = QuantizedTrigger {
            track,
            column,
            target_sample,
            target_ppq,
        };

        if let Some(existing) = self.pending.iter_mut().find(|t| t.track == track) {
            *existing = trigger;
        } else {
            self.pending.push(trigger);
        }
    }

    pub fn has_pending_trigger(&self, track: usize) -> bool {
        self.pending.iter().any(|t| t.track == track)
    }

    pub fn clear_pending_triggers(&mut self) {
        self.pending.clear();
    }

    /// Void a track's pending trigger. A cleared trigger must never fire, so
    /// this runs before the fire step of the same block can see it.
    pub fn clear_pending_for_track(&mut self, track: usize) {
        self.pending.retain(|t| t.track != track);
    }

    /// Remove and yield all pending triggers due in `[block_start, block_end)`,
    /// ascending by target sample, ties broken by ascending track index.
    pub fn take_due(&mut self, block_start: u64, block_end: u64, out: &mut Vec<QuantizedTrigger>) {
        let mut i = 0;
        while i < self.pending.len() {
            let t = self.pending[i];
            if t.target_sample >= block_start && t.target_sample < block_end {
                out.push(t);
                self.pending.swap_remove(i);
            } else {
                i += 1;
            }
        }
        out.sort_unstable_by(|a, b| {
            a.target_sample
                .cmp(&b.target_sample)
                .then(a.track.cmp(&b.track))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44_100.0;

    fn clock() -> QuantizationClock {
        let mut c = QuantizationClock::new(SR);
        c.set_tempo(120.0);
        c.set_division(8); // eighth-note grid: 0.5-beat boundaries
        c
    }

    #[test]
    fn schedules_on_next_grid_boundary() {
        let mut c = clock();
        // Eighth-note grid, 120 BPM, position 0.10 beats.
        c.update_from_ppq(0.10, 0);
        c.schedule_trigger(2, 3, 0.10);

        let mut due = Vec::new();
        c.take_due(0, u64::MAX, &mut due);
        assert_eq!(due.len(), 1);
        // Next 0.5-beat boundary from 0.10 is 0.5.
        assert!((due[0].target_ppq - 0.5).abs() < 1e-9);
        // 0.4 beats at 120 BPM = 0.2s = 8_820 samples at 44.1kHz.
        assert_eq!(due[0].target_sample, 8_820);
    }

    #[test]
    fn finest_grid_fires_at_the_exact_sample() {
        let mut c = clock();
        c.set_division(32); // 0.125-beat boundaries
        c.update_from_ppq(0.10, 0);
        c.schedule_trigger(0, 0, 0.10);

        let mut due = Vec::new();
        c.take_due(0, u64::MAX, &mut due);
        assert_eq!(due.len(), 1);
        assert!((due[0].target_ppq - 0.125).abs() < 1e-9);
        // 0.025 beats at 120 BPM = 12.5ms = 551.25 samples, rounded.
        assert_eq!(due[0].target_sample, 551);
    }

    #[test]
    fn target_is_exact_grid_multiple_and_never_early() {
        let mut c = clock();
        for &ppq in &[0.0, 0.124, 0.5, 1.37, 7.999] {
            c.schedule_trigger(0, 0, ppq);
            let mut due = Vec::new();
            c.take_due(0, u64::MAX, &mut due);
            let t = due[0];
            assert!(t.target_ppq >= ppq - 1e-9, "fired before request at {}", ppq);
            let grid = c.quant_beats();
            let remainder = (t.target_ppq / grid).fract();
            assert!(
                remainder < 1e-6 || remainder > 1.0 - 1e-6,
                "target {} not on grid",
                t.target_ppq
            );
            assert!(t.target_sample >= c.current_sample());
        }
    }

    #[test]
    fn request_on_the_line_fires_immediately() {
        let mut c = clock();
        c.update_from_ppq(2.0, 0);
        c.schedule_trigger(0, 5, 2.0);
        let mut due = Vec::new();
        c.take_due(0, 1, &mut due);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].target_sample, c.current_sample());
    }

    #[test]
    fn duplicate_pending_trigger_is_replaced() {
        let mut c = clock();
        c.schedule_trigger(1, 3, 0.1);
        c.schedule_trigger(1, 9, 0.1);
        let mut due = Vec::new();
        c.take_due(0, u64::MAX, &mut due);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].column, 9);
    }

    #[test]
    fn cleared_trigger_never_fires() {
        let mut c = clock();
        c.schedule_trigger(4, 0, 0.1);
        c.clear_pending_for_track(4);
        let mut due = Vec::new();
        c.take_due(0, u64::MAX, &mut due);
        assert!(due.is_empty());
    }

    #[test]
    fn due_events_sorted_by_sample_then_track() {
        let mut c = clock();
        c.update_from_ppq(0.0, 0);
        // Same boundary for all three; ties break by track index.
        c.schedule_trigger(3, 0, 0.1);
        c.schedule_trigger(1, 0, 0.1);
        c.schedule_trigger(2, 0, 0.2);
        let mut due = Vec::new();
        c.take_due(0, u64::MAX, &mut due);
        let tracks: Vec<usize> = due.iter().map(|t| t.track).collect();
        assert_eq!(tracks, vec![1, 2, 3]);
    }

    #[test]
    fn same_boundary_requests_share_one_target_sample() {
        let mut c = clock();
        c.update_from_ppq(0.0, 0);
        // Different request positions, same 0.5-beat boundary.
        c.schedule_trigger(0, 0, 0.1);
        c.schedule_trigger(1, 0, 0.3);
        let mut due = Vec::new();
        c.take_due(0, u64::MAX, &mut due);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].target_sample, due[1].target_sample);
    }

    #[test]
    fn out_of_range_events_stay_pending() {
        let mut c = clock();
        c.update_from_ppq(0.1, 0);
        c.schedule_trigger(0, 0, 0.1); // due at sample 8_820
        let mut due = Vec::new();
        c.take_due(0, 512, &mut due);
        assert!(due.is_empty());
        assert!(c.has_pending_trigger(0));
        c.take_due(8_800, 9_000, &mut due);
        assert_eq!(due.len(), 1);
        assert!(!c.has_pending_trigger(0));
    }

    #[test]
    fn paused_clock_never_fires() {
        let mut c = clock();
        c.schedule_trigger(0, 0, 0.1);
        // Clock does not advance; the due window never reaches the target.
        for _ in 0..100 {
            let mut due = Vec::new();
            let now = c.current_sample();
            c.take_due(now, now, &mut due);
            assert!(due.is_empty());
        }
    }
}
