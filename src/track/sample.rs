//! Sample buffer owned by a track.
//!
//! Always stored as two planar channels. Mono material is duplicated on load
//! so the render loop never branches on channel count.

use crate::NUM_COLUMNS;

#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
    source_sample_rate: f32,
}

impl SampleBuffer {
    pub fn from_mono(data: Vec<f32>, source_sample_rate: f32) -> Self {
        let right = data.clone();
        Self {
            left: data,
            right,
            source_sample_rate: source_sample_rate.max(1.0),
        }
    }

    pub fn from_stereo(left: Vec<f32>, mut right: Vec<f32>, source_sample_rate: f32) -> Self {
        right.resize(left.len(), 0.0);
        Self {
            left,
            right,
            source_sample_rate: source_sample_rate.max(1.0),
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    pub fn source_sample_rate(&self) -> f32 {
        self.source_sample_rate
    }

    /// First sample of a grid column's slice.
    pub fn column_start(&self, column: usize) -> f64 {
        let column = column.min(NUM_COLUMNS);
        self.len() as f64 * column as f64 / NUM_COLUMNS as f64
    }

    /// Sample range `[start, end)` covered by columns `loop_start..loop_end`.
    ///
    /// Degenerate loop points self-correct to the full buffer.
    pub fn loop_bounds(&self, loop_start: usize, loop_end: usize) -> (f64, f64) {
        if loop_start >= loop_end || loop_end > NUM_COLUMNS {
            return (0.0, self.len() as f64);
        }
        (self.column_start(loop_start), self.column_start(loop_end))
    }

    /// Which column a sample position falls in.
    pub fn column_at(&self, position: f64) -> usize {
        if self.is_empty() || !position.is_finite() || position < 0.0 {
            return 0;
        }
        let col = (position / self.len() as f64 * NUM_COLUMNS as f64) as usize;
        col.min(NUM_COLUMNS - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_duplicates_to_both_channels() {
        let buffer = SampleBuffer::from_mono(vec![0.5, -0.5], 44_100.0);
        assert_eq!(buffer.left(), buffer.right());
    }

    #[test]
    fn column_bounds_split_buffer_evenly() {
        let buffer = SampleBuffer::from_mono(vec![0.0; 1600], 44_100.0);
        assert_eq!(buffer.column_start(0), 0.0);
        assert_eq!(buffer.column_start(4), 400.0);
        assert_eq!(buffer.column_start(16), 1600.0);
        assert_eq!(buffer.loop_bounds(2, 6), (200.0, 600.0));
    }

    #[test]
    fn degenerate_loop_points_fall_back_to_full_buffer() {
        let buffer = SampleBuffer::from_mono(vec![0.0; 160], 44_100.0);
        assert_eq!(buffer.loop_bounds(9, 3), (0.0, 160.0));
        assert_eq!(buffer.loop_bounds(5, 5), (0.0, 160.0));
    }

    #[test]
    fn column_at_inverts_column_start() {
        let buffer = SampleBuffer::from_mono(vec![0.0; 1600], 44_100.0);
        for col in 0..16 {
            assert_eq!(buffer.column_at(buffer.column_start(col) + 1.0), col);
        }
        assert_eq!(buffer.column_at(1_599.9), 15);
        assert_eq!(buffer.column_at(f64::NAN), 0);
    }
}
