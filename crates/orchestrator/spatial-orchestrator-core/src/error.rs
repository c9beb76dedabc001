//! Controller and engine errors.

use spatial_motion_core::{AnimationId, MotionError, TrackId};
use spatial_osc::OscError;

use crate::state::PlaybackState;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum EngineError {
    #[error("Unknown animation: {0}")]
    UnknownAnimation(AnimationId),

    #[error("Unknown track: {0}")]
    UnknownTrack(TrackId),

    #[error("Cannot play animation {0} with no tracks")]
    EmptyTrackSet(AnimationId),

    #[error("No active session")]
    NoActiveSession,

    #[error("Cannot {command} while {}", state.name())]
    InvalidTransition {
        command: &'static str,
        state: PlaybackState,
    },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error(transparent)]
    Osc(#[from] OscError),

    #[error("Scheduler is not running")]
    SchedulerStopped,
}

impl EngineError {
    /// Whether the engine remains usable after this error.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::SchedulerStopped => false,
            Self::Osc(e) => e.is_recoverable(),
            _ => true,
        }
    }

    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownAnimation(_) | Self::UnknownTrack(_) | Self::EmptyTrackSet(_) => {
                "lookup"
            }
            Self::NoActiveSession | Self::InvalidTransition { .. } => "state",
            Self::InvalidParameter { .. } | Self::Config(_) => "validation",
            Self::Motion(e) => e.category(),
            Self::Osc(e) => e.category(),
            Self::SchedulerStopped => "lifecycle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_error_names_state() {
        let err = EngineError::InvalidTransition {
            command: "pause",
            state: PlaybackState::Idle,
        };
        assert_eq!(err.to_string(), "Cannot pause while idle");
        assert_eq!(err.category(), "state");
        assert!(err.is_recoverable());
        assert!(!EngineError::Config("bad".into()).is_recoverable());
    }
}
