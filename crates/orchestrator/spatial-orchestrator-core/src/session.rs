//! Session and per-track runtime state.

use std::sync::Arc;

use hashbrown::HashSet;
use indexmap::IndexSet;
use spatial_motion_core::timeline::{self, LocalTime};
use spatial_motion_core::{Animation, MotionModel, Position, SessionId, TrackId};

/// An animation with its instantiated motion model.
#[derive(Debug)]
pub struct LoadedAnimation {
    pub animation: Animation,
    pub model: Arc<dyn MotionModel>,
}

impl LoadedAnimation {
    /// Local time for one track at the given global time.
    #[inline]
    pub fn local_time(&self, global_time: f64, track: &TrackId) -> LocalTime {
        timeline::resolve(
            global_time,
            self.animation.time_shift(track),
            self.animation.timing(),
        )
    }
}

#[derive(Debug)]
pub struct PlayingSession {
    pub id: SessionId,
    pub animation: Arc<LoadedAnimation>,
    pub tracks: IndexSet<TrackId>,
    /// Seconds.
    pub global_time: f64,
    pub playback_speed: f64,
    /// Highest loop index reached by any track.
    pub loop_count: u32,
    pub is_reversed: bool,
    pub is_playing: bool,
    /// Natural completion time over this session's own tracks.
    span: f64,
    /// Set once the first go-to-start has finished.
    pub(crate) started: bool,
    /// Tracks already reported once this session (passthrough, missing).
    pub(crate) reported_passthrough: HashSet<TrackId>,
    pub(crate) reported_missing: HashSet<TrackId>,
}

impl PlayingSession {
    pub fn new(id: SessionId, animation: Arc<LoadedAnimation>, tracks: IndexSet<TrackId>) -> Self {
        let span = animation.animation.span_for(&tracks);
        Self {
            id,
            animation,
            tracks,
            global_time: 0.0,
            playback_speed: 1.0,
            loop_count: 0,
            is_reversed: false,
            is_playing: false,
            span,
            started: false,
            reported_passthrough: HashSet::new(),
            reported_missing: HashSet::new(),
        }
    }

    /// Global time at which every track of a non-looping session has finished.
    #[inline]
    pub fn span(&self) -> f64 {
        self.span
    }

    /// Advance the clock by `dt_ms` of wall time, honouring speed and direction.
    pub fn advance(&mut self, dt_ms: f64) {
        if !dt_ms.is_finite() || dt_ms <= 0.0 {
            return;
        }
        let direction = if self.is_reversed { -1.0 } else { 1.0 };
        self.global_time += dt_ms / 1000.0 * self.playback_speed * direction;
        if self.is_reversed {
            self.global_time =
                timeline::wrap_global(self.global_time, self.animation.animation.timing());
        }
    }

    pub fn is_complete(&self) -> bool {
        timeline::is_complete(
            self.global_time,
            self.span(),
            self.animation.animation.loop_mode(),
            self.is_reversed,
        )
    }

    /// Clamp the clock into `[0, span]` for non-looping animations and at 0 otherwise.
    pub fn clamp_time(&self, time: f64) -> f64 {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        if self.animation.animation.loop_mode().is_looping() {
            time
        } else {
            time.min(self.span())
        }
    }
}

/// What the engine remembers about a track across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackRuntimeState {
    pub track: TrackId,
    pub device_channel: Option<u32>,
    /// Captured at first play; the return-to-initial target.
    pub initial_position: Position,
    pub current_position: Position,
}
