//! Quantized playhead speed ratios.
//!
//! The playhead never advances at arbitrary continuous rates: speed snaps to a
//! table of musical ratios so a loop stays in a sensible rhythmic relationship
//! with the host tempo. Column 8 is unity.

pub const SPEED_RATIOS: [f32; 16] = [
    0.125,     // 1/8
    0.166_666_7, // 1/6
    0.25,      // 1/4
    0.333_333_3, // 1/3
    0.5,       // 1/2
    0.666_666_7, // 2/3
    0.75,      // 3/4
    0.875,     // 7/8
    1.0,       // 1
    1.125,     // 9/8
    1.25,      // 5/4
    1.333_333_3, // 4/3
    1.5,       // 3/2
    2.0,       // 2
    3.0,       // 3
    4.0,       // 4
];

pub const SPEED_LABELS: [&str; 16] = [
    "1/8", "1/6", "1/4", "1/3", "1/2", "2/3", "3/4", "7/8", "1", "9/8", "5/4", "4/3", "3/2", "2",
    "3", "4",
];

pub fn nearest_speed_index(ratio: f32) -> usize {
    let mut best = f32::MAX;
    let mut best_index = 0;
    for (i, &r) in SPEED_RATIOS.iter().enumerate() {
        let diff = (ratio - r).abs();
        if diff < best {
            best = diff;
            best_index = i;
        }
    }
    best_index
}

pub fn ratio_from_column(column: usize) -> f32 {
    SPEED_RATIOS[column.min(SPEED_RATIOS.len() - 1)]
}

pub fn quantize_ratio(ratio: f32) -> f32 {
    SPEED_RATIOS[nearest_speed_index(ratio)]
}

pub fn label_for_ratio(ratio: f32) -> &'static str {
    SPEED_LABELS[nearest_speed_index(ratio)]
}

/// Base beats represented by a track's recording-bars setting (1/2/4/8 bars in
/// 4/4).
pub fn base_beats_for_bars(recording_bars: u32) -> f32 {
    if recording_bars <= 1 {
        4.0
    } else if recording_bars <= 2 {
        8.0
    } else if recording_bars <= 4 {
        16.0
    } else {
        32.0
    }
}

pub fn beats_per_loop_from_ratio(ratio: f32, recording_bars: u32) -> f32 {
    base_beats_for_bars(recording_bars) / ratio.max(0.125)
}

pub fn ratio_from_beats_per_loop(beats_per_loop: f32, recording_bars: u32) -> f32 {
    if !(beats_per_loop > 0.0) || !beats_per_loop.is_finite() {
        return 1.0;
    }
    base_beats_for_bars(recording_bars) / beats_per_loop
}
