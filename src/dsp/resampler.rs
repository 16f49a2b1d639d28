/*
Fractional-position sample reads
================================

Playback and grain rendering never land on integer sample indices: a playhead
moving at a musical speed ratio (2/3, 9/8, ...) produces fractional positions
every sample. The resampler turns a fractional position into an amplitude by
interpolating between neighbouring samples.

Three quality tiers, cheapest to best:

  Linear   2-point. Fine for previews and LED metering.
  Cubic    4-point Catmull-Rom. The default for playback; no audible stepping
           at musical speed ratios.
  Sinc     16-tap windowed sinc. Noticeably cleaner on extreme pitch-down;
           costs roughly 8x a cubic read.

All reads are pure functions of the buffer contents - no state, no allocation,
safe on the audio thread. Positions outside the buffer read as silence.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Linear,
    Cubic,
    Sinc,
}

#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    quality: Quality,
}

impl Default for Resampler {
    fn default() -> Self {
        Self {
            quality: Quality::Cubic,
        }
    }
}

impl Resampler {
    pub fn new(quality: Quality) -> Self {
        Self { quality }
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Read one channel at a fractional position.
    pub fn read(&self, data: &[f32], position: f64) -> f32 {
        if data.is_empty() || !position.is_finite() || position < 0.0 {
            return 0.0;
        }
        let index = position as usize;
        if index >= data.len() {
            return 0.0;
        }
        let frac = (position - index as f64) as f32;

        match self.quality {
            Quality::Linear => {
                let a = data[index];
                let b = if index + 1 < data.len() {
                    data[index + 1]
                } else {
                    0.0
                };
                a + (b - a) * frac
            }
            Quality::Cubic => {
                let at = |i: isize| -> f32 {
                    if i < 0 || i as usize >= data.len() {
                        0.0
                    } else {
                        data[i as usize]
                    }
                };
                let i = index as isize;
                catmull_rom(at(i - 1), at(i), at(i + 1), at(i + 2), frac)
            }
            Quality::Sinc => sinc_read(data, index, frac),
        }
    }
}

#[inline]
fn catmull_rom(y0: f32, y1: f32, y2: f32, y3: f32, t: f32) -> f32 {
    // Standard Catmull-Rom spline: passes exactly through y1 and y2.
    let a = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
    let b = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let c = -0.5 * y0 + 0.5 * y2;
    ((a * t + b) * t + c) * t + y1
}

const SINC_TAPS: isize = 16;

fn sinc_read(data: &[f32], index: usize, frac: f32) -> f32 {
    let center = index as isize;
    let mut acc = 0.0f64;
    let mut weight_sum = 0.0f64;

    for tap in (-SINC_TAPS / 2 + 1)..=(SINC_TAPS / 2) {
        let i = center + tap;
        if i < 0 || i as usize >= data.len() {
            continue;
        }
        let x = tap as f64 - frac as f64;
        let sinc = if x.abs() < 1e-9 {
            1.0
        } else {
            let px = std::f64::consts::PI * x;
            px.sin() / px
        };
        // Hann window over the tap span tames ringing at the kernel edges.
        let w = 0.5 + 0.5 * (std::f64::consts::PI * x / (SINC_TAPS as f64 / 2.0)).cos();
        let coeff = sinc * w;
        acc += data[i as usize] as f64 * coeff;
        weight_sum += coeff;
    }

    if weight_sum.abs() < 1e-12 {
        0.0
    } else {
        (acc / weight_sum) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_midpoint_is_average() {
        let r = Resampler::new(Quality::Linear);
        let data = [0.0, 1.0];
        assert!((r.read(&data, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cubic_passes_through_samples() {
        let r = Resampler::new(Quality::Cubic);
        let data = [0.1, -0.4, 0.8, 0.2, -0.3];
        for (i, &s) in data.iter().enumerate() {
            assert!(
                (r.read(&data, i as f64) - s).abs() < 1e-6,
                "cubic should reproduce sample {} exactly",
                i
            );
        }
    }

    #[test]
    fn sinc_reproduces_integer_positions() {
        let r = Resampler::new(Quality::Sinc);
        let data: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin()).collect();
        for i in 8..56 {
            let got = r.read(&data, i as f64);
            assert!(
                (got - data[i]).abs() < 1e-3,
                "sinc at integer position {} drifted: {} vs {}",
                i,
                got,
                data[i]
            );
        }
    }

    #[test]
    fn out_of_range_reads_silence() {
        let r = Resampler::default();
        let data = [1.0, 1.0, 1.0];
        assert_eq!(r.read(&data, -1.0), 0.0);
        assert_eq!(r.read(&data, 3.0), 0.0);
        assert_eq!(r.read(&data, f64::NAN), 0.0);
        assert_eq!(r.read(&[], 0.0), 0.0);
    }
}
