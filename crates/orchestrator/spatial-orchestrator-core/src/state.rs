use serde::{Deserialize, Serialize};

/// Playback controller states.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    /// No session and no transition
    #[default]
    Idle,
    /// Interpolating tracks to their start pose; the session clock is not advancing
    GoingToStart,
    Playing,
    Paused,
    /// Interpolating tracks back to where they were before the first play
    ReturningToInitial,
}

impl PlaybackState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::GoingToStart => "going to start",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::ReturningToInitial => "returning to initial",
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::GoingToStart | Self::ReturningToInitial)
    }

    #[inline]
    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Playing)
    }

    #[inline]
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused)
    }

    #[inline]
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused | Self::GoingToStart)
    }

    /// Seek and go-to-start need a settled session.
    #[inline]
    pub fn can_seek(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_only_valid_with_a_live_session() {
        assert!(PlaybackState::GoingToStart.can_stop());
        assert!(PlaybackState::Paused.can_stop());
        assert!(!PlaybackState::Idle.can_stop());
        assert!(!PlaybackState::ReturningToInitial.can_stop());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&PlaybackState::ReturningToInitial).unwrap();
        assert_eq!(json, "\"returningToInitial\"");
    }
}
