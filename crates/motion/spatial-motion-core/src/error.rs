//! Error types for the motion core

use crate::ids::{AnimationId, TrackId};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MotionError {
    /// Animation failed validation
    #[error("Invalid animation {animation}: {reason}")]
    InvalidAnimation {
        animation: AnimationId,
        reason: String,
    },

    /// A plugin motion model name was not registered
    #[error("Motion model not registered: {name}")]
    UnknownModel { name: String },

    /// Plugin factory rejected its parameters
    #[error("Invalid parameters for motion model {name}: {reason}")]
    InvalidParameters { name: String, reason: String },

    /// Model produced a NaN or infinite coordinate
    #[error("Non-finite position for track {track} at t={time}")]
    NonFinitePosition { track: TrackId, time: f64 },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl MotionError {
    /// Errors that only affect one tick of one track.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonFinitePosition { .. })
    }

    /// Get error category for logging/metrics
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidAnimation { .. } | Self::InvalidParameters { .. } => "validation",
            Self::UnknownModel { .. } => "model",
            Self::NonFinitePosition { .. } => "evaluation",
            Self::Serialization { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for MotionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
