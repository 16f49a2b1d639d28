//! Low-level DSP primitives used by the track playback engine.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside track and grain-voice structs. They intentionally stay
//! focused on the signal-processing math so the track state machine can layer
//! on orchestration and modulation.

/// Short gain ramps masking loop-seam and mode-switch discontinuities.
pub mod crossfader;
/// Attack/decay/release envelope generator for step voices.
pub mod envelope;
/// Per-track state-variable filter.
pub mod filter;
/// Master-bus peak limiter.
pub mod limiter;
/// Fractional-position interpolated sample reads.
pub mod resampler;

pub use crossfader::{Crossfader, FadeDirection};
pub use envelope::{EnvelopeStage, StepEnvelope};
pub use filter::{FilterType, TrackFilter};
pub use limiter::Limiter;
pub use resampler::{Quality, Resampler};
