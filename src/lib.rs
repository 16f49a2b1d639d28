pub mod dsp;
pub mod engine; // Orchestrator and cross-thread control surface
pub mod group;
pub mod modseq; // Per-track modulation sequencers
pub mod pattern;
pub mod timing; // Musical clock, quantization and speed ratios
pub mod track;

pub const MAX_BLOCK_SIZE: usize = 2048;

/// Number of sampler tracks owned by the engine.
pub const NUM_TRACKS: usize = 6;
/// Grid columns per track (one slice each).
pub const NUM_COLUMNS: usize = 16;
pub const NUM_GROUPS: usize = 4;
pub const NUM_PATTERNS: usize = 4;
pub const MOD_SEQUENCERS_PER_TRACK: usize = 3;
pub const MAX_GRAIN_VOICES: usize = 32;

pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
