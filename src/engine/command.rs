/*
Cross-thread control surface
============================

Control code (the grid driver, a plugin editor, tests) never touches the
engine directly while audio runs. It sends Commands through a bounded SPSC
ring; the audio thread drains the ring once at the top of each block and
applies every command before rendering, so no intent is ever half-applied
mid-block.

Sending never blocks. A full ring returns ControlError::QueueFull and the
command is dropped; the caller decides whether to retry on the next UI tick.

With the `rtrb` feature disabled the handle type disappears and callers use
`Engine::apply` directly from the audio thread's own context.
*/

use thiserror::Error;

use crate::modseq::{ModStep, ModTarget};
use crate::track::{DirectionMode, GrainParams, PlayMode, StepConfig};

/// Commands ring capacity; drained every block, so this covers bursts of a
/// whole grid sweep with room to spare.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    // Grid gestures.
    ButtonDown { track: usize, column: usize },
    ButtonUp { track: usize, column: usize },
    StopTrack { track: usize },
    StopAll,

    // Track state.
    SetPlayMode { track: usize, mode: PlayMode },
    SetDirectionMode { track: usize, mode: DirectionMode },
    SetVolume { track: usize, value: f32 },
    SetPan { track: usize, value: f32 },
    SetSpeedRatio { track: usize, value: f32 },
    SetLoopPoints { track: usize, start: usize, end: usize },
    SetCrossfadeMs { track: usize, value: f32 },
    SetFilterCutoff { track: usize, value: f32 },
    SetFilterResonance { track: usize, value: f32 },
    SetEnvelopeTimes { track: usize, attack_ms: f32, decay_ms: f32, release_ms: f32 },
    SetStep { track: usize, index: usize, config: StepConfig },

    // Scratch and tape gestures.
    SetScratchAmount { track: usize, value: f32 },
    ScratchBegin { track: usize },
    ScratchGesture { track: usize, value: f32 },
    ScratchRelease { track: usize },
    TapeStop { track: usize },

    // Granular.
    SetGrainParams { track: usize, params: GrainParams },

    // Quantization.
    SetQuantizeDivision { division: u32 },
    SetQuantizeEnabled { enabled: bool },

    // Groups.
    AssignGroup { track: usize, group: usize },
    RemoveFromGroup { track: usize },
    SetGroupMuted { group: usize, muted: bool },
    SetGroupVolume { group: usize, value: f32 },

    // Patterns.
    PatternRecord { pattern: usize },
    PatternStopRecord { pattern: usize },
    PatternPlay { pattern: usize },
    PatternStop { pattern: usize },
    PatternClear { pattern: usize },
    SetPatternLength { pattern: usize, beats: u32 },

    // Modulation sequencers.
    SetModEnabled { track: usize, slot: usize, enabled: bool },
    SetModTarget { track: usize, slot: usize, target: ModTarget },
    SetModStep { track: usize, slot: usize, index: usize, step: ModStep },
    SetModDepth { track: usize, slot: usize, value: f32 },
    SetModBipolar { track: usize, slot: usize, bipolar: bool },
    SetModBars { track: usize, slot: usize, bars: usize },
    SetModSmoothing { track: usize, slot: usize, ms: f32 },

    // Output stage.
    SetLimiterEnabled { enabled: bool },
    SetLimiterThresholdDb { db: f32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("control queue full, command dropped")]
    QueueFull,
    #[error("track index {0} out of range")]
    BadTrack(usize),
    #[error("group index {0} out of range")]
    BadGroup(usize),
}

/// Control-thread handle to a running engine.
#[cfg(feature = "rtrb")]
#[derive(Debug)]
pub struct EngineHandle {
    producer: rtrb::Producer<Command>,
    session: std::sync::Arc<super::session::SessionState>,
}

#[cfg(feature = "rtrb")]
impl EngineHandle {
    pub(crate) fn new(
        producer: rtrb::Producer<Command>,
        session: std::sync::Arc<super::session::SessionState>,
    ) -> Self {
        Self { producer, session }
    }

    /// Queue a command for the next audio block. Never blocks.
    pub fn send(&mut self, command: Command) -> Result<(), ControlError> {
        validate(&command)?;
        self.producer.push(command).map_err(|_| {
            tracing::warn!(?command, "control queue full, dropping command");
            ControlError::QueueFull
        })
    }

    /// Read-only visualization snapshot, safe at UI-tick cadence.
    pub fn session(&self) -> &super::session::SessionState {
        &self.session
    }
}

/// Index sanity checks run on the control thread so the audio thread can
/// apply commands without bounds branches failing mid-block.
pub(crate) fn validate(command: &Command) -> Result<(), ControlError> {
    use Command::*;
    let track = match *command {
        ButtonDown { track, .. }
        | ButtonUp { track, .. }
        | StopTrack { track }
        | SetPlayMode { track, .. }
        | SetDirectionMode { track, .. }
        | SetVolume { track, .. }
        | SetPan { track, .. }
        | SetSpeedRatio { track, .. }
        | SetLoopPoints { track, .. }
        | SetCrossfadeMs { track, .. }
        | SetFilterCutoff { track, .. }
        | SetFilterResonance { track, .. }
        | SetEnvelopeTimes { track, .. }
        | SetStep { track, .. }
        | SetScratchAmount { track, .. }
        | ScratchBegin { track }
        | ScratchGesture { track, .. }
        | ScratchRelease { track }
        | TapeStop { track }
        | SetGrainParams { track, .. }
        | AssignGroup { track, .. }
        | RemoveFromGroup { track }
        | SetModEnabled { track, .. }
        | SetModTarget { track, .. }
        | SetModStep { track, .. }
        | SetModDepth { track, .. }
        | SetModBipolar { track, .. }
        | SetModBars { track, .. }
        | SetModSmoothing { track, .. } => Some(track),
        _ => None,
    };
    if let Some(track) = track {
        if track >= crate::NUM_TRACKS {
            return Err(ControlError::BadTrack(track));
        }
    }
    let group = match *command {
        AssignGroup { group, .. }
        | SetGroupMuted { group, .. }
        | SetGroupVolume { group, .. } => Some(group),
        _ => None,
    };
    if let Some(g) = group {
        if g >= crate::NUM_GROUPS {
            return Err(ControlError::BadGroup(g));
        }
    }
    Ok(())
}
