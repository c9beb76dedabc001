//! Output contracts from the engine.
//!
//! Each tick yields the track positions written this tick and a separate list of
//! semantic events. Hosts mirror the changes into their project state.

use serde::{Deserialize, Serialize};
use spatial_motion_core::{AnimationId, DeviceId, Position, SessionId, TrackId};

use crate::state::PlaybackState;
use crate::transition::TransitionKind;

/// One track position written this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionChange {
    pub track: TrackId,
    pub position: Position,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Explicit `stop()`
    Stopped,
    /// A non-looping session ran to its end
    Completed,
    /// Replaced by a newer `play()`
    Superseded,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EngineEvent {
    StateChanged {
        from: PlaybackState,
        to: PlaybackState,
    },
    PlaybackStarted {
        session: SessionId,
        animation: AnimationId,
    },
    SessionStopped {
        session: SessionId,
        animation: AnimationId,
        reason: StopReason,
    },
    TransitionCancelled {
        kind: TransitionKind,
    },
    /// A session track has no entry in the animation's transform map.
    TransformPassthrough {
        session: SessionId,
        track: TrackId,
    },
    InvalidPosition {
        track: TrackId,
        local_time: f64,
    },
    TrackMissing {
        track: TrackId,
    },
    BatchDropped {
        device: DeviceId,
        messages: usize,
        reason: String,
    },
    DispatchFailed {
        device: DeviceId,
        error: String,
    },
    Error {
        message: String,
    },
}

/// Outputs returned by [`crate::MotionEngine::tick`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineOutputs {
    #[serde(default)]
    pub changes: Vec<PositionChange>,
    #[serde(default)]
    pub events: Vec<EngineEvent>,
}

impl EngineOutputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, track: TrackId, position: Position) {
        self.changes.push(PositionChange { track, position });
    }

    #[inline]
    pub fn push_event(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }

    /// Move everything out, leaving the buffers empty.
    pub fn take(&mut self) -> EngineOutputs {
        std::mem::take(self)
    }
}
