/*
Host transport reconciliation
=============================

The engine clock has two possible masters:

  1. The host transport, which reports tempo and musical position (PPQ,
     quarter-note units) once per block.
  2. Our own integration: beats += samples / sample_rate * tempo / 60.

Host data always wins when present - integrated position is discarded in its
favor, never averaged, so resumed host reporting cannot double-count beats.
Invalid host data (NaN, zero or negative tempo) falls back to the last
known-good tempo instead of letting a NaN reach sample-rate math.
*/

pub const DEFAULT_TEMPO: f64 = 120.0;

/// What the host reports at the top of a block, if anything.
#[derive(Debug, Clone, Copy)]
pub struct HostPosition {
    pub tempo: f64,
    /// Musical position in quarter-note units; `None` when the host does not
    /// report position and the engine must integrate.
    pub ppq: Option<f64>,
    pub playing: bool,
}

#[derive(Debug, Clone)]
pub struct Transport {
    sample_rate: f64,
    tempo: f64,
    beat: f64,
    playing: bool,
    host_ppq_valid: bool,
}

impl Transport {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate: sample_rate.max(1.0),
            tempo: DEFAULT_TEMPO,
            beat: 0.0,
            playing: true,
            host_ppq_valid: false,
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.sample_rate = sample_rate;
        }
    }

    /// Advance the transport across one block.
    ///
    /// Returns the beat window `(from, to)` this block spans.
    pub fn update(&mut self, host: Option<&HostPosition>, num_samples: usize) -> (f64, f64) {
        let from = self.beat;

        if let Some(host) = host {
            if host.tempo.is_finite() && host.tempo > 0.0 {
                self.tempo = host.tempo;
            }
            self.playing = host.playing;

            match host.ppq {
                Some(ppq) if ppq.is_finite() => {
                    // Host position takes precedence over anything we
                    // integrated while it was absent. The transport still
                    // advances to the block end, so a hostless follow-up
                    // block starts where this one stopped.
                    self.beat = ppq;
                    self.host_ppq_valid = true;
                    if self.playing {
                        self.beat += self.beat_delta(num_samples);
                    }
                    return (ppq, self.beat);
                }
                _ => self.host_ppq_valid = false,
            }
        }

        if self.playing {
            self.beat += self.beat_delta(num_samples);
        }
        (from, self.beat)
    }

    /// Beats covered by `num_samples` at the current tempo.
    pub fn beat_delta(&self, num_samples: usize) -> f64 {
        num_samples as f64 / self.sample_rate * self.tempo / 60.0
    }

    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate * 60.0 / self.tempo
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn beat(&self) -> f64 {
        self.beat
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn host_ppq_valid(&self) -> bool {
        self.host_ppq_valid
    }

    pub fn reset(&mut self) {
        self.beat = 0.0;
        self.host_ppq_valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48_000.0;

    #[test]
    fn integrates_position_without_host() {
        let mut transport = Transport::new(SR);
        // 120 BPM: one beat = 24_000 samples.
        transport.update(None, 24_000);
        assert!((transport.beat() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn host_ppq_overrides_integrated_position() {
        let mut transport = Transport::new(SR);
        transport.update(None, 24_000); // drift to beat 1
        let host = HostPosition {
            tempo: 120.0,
            ppq: Some(16.25),
            playing: true,
        };
        let (from, to) = transport.update(Some(&host), 512);
        assert_eq!(from, 16.25);
        assert!((to - (16.25 + 512.0 / SR * 2.0)).abs() < 1e-12);
        assert_eq!(transport.beat(), to);
    }

    #[test]
    fn host_block_then_hostless_block_tile_without_overlap() {
        let mut transport = Transport::new(SR);
        let host = HostPosition {
            tempo: 120.0,
            ppq: Some(0.0),
            playing: true,
        };
        let (a_from, a_to) = transport.update(Some(&host), 512);
        let (b_from, b_to) = transport.update(None, 512);
        assert_eq!(a_from, 0.0);
        assert_eq!(b_from, a_to, "windows must be contiguous");
        assert!((b_to - 2.0 * a_to).abs() < 1e-12, "no beat may be replayed");
    }

    #[test]
    fn invalid_tempo_falls_back_to_last_known_good() {
        let mut transport = Transport::new(SR);
        let good = HostPosition {
            tempo: 140.0,
            ppq: Some(0.0),
            playing: true,
        };
        transport.update(Some(&good), 0);
        assert_eq!(transport.tempo(), 140.0);

        let bad = HostPosition {
            tempo: f64::NAN,
            ppq: None,
            playing: true,
        };
        transport.update(Some(&bad), 0);
        assert_eq!(transport.tempo(), 140.0);

        let negative = HostPosition {
            tempo: -3.0,
            ppq: None,
            playing: true,
        };
        transport.update(Some(&negative), 0);
        assert_eq!(transport.tempo(), 140.0);
    }

    #[test]
    fn stopped_transport_does_not_advance() {
        let mut transport = Transport::new(SR);
        let stopped = HostPosition {
            tempo: 120.0,
            ppq: None,
            playing: false,
        };
        transport.update(Some(&stopped), 48_000);
        assert_eq!(transport.beat(), 0.0);
    }
}
