//! Time-bounded, cancellable interpolations (go-to-start and return-to-initial).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use spatial_motion_core::{Easing, Position, TrackId};

use crate::state::PlaybackState;

/// Cooperative cancellation flag shared between the controller and a transition.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
    GoToStart,
    ReturnToInitial,
}

#[derive(Clone, Debug)]
struct Leg {
    track: TrackId,
    from: Position,
    to: Position,
}

/// Where a transition leaves the controller once it completes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Start (or restart) the session clock at 0 in the given state.
    StartSession(PlaybackState),
    Idle,
}

#[derive(Debug)]
pub struct Transition {
    kind: TransitionKind,
    legs: Vec<Leg>,
    duration_ms: f64,
    elapsed_ms: f64,
    easing: Easing,
    token: CancellationToken,
    completion: Completion,
}

/// One interpolation step: positions to write, and whether this was the last.
#[derive(Debug, Default)]
pub struct Step {
    pub positions: Vec<(TrackId, Position)>,
    pub finished: bool,
}

impl Transition {
    pub fn new(
        kind: TransitionKind,
        duration_ms: f64,
        easing: Easing,
        token: CancellationToken,
        completion: Completion,
    ) -> Self {
        Self {
            kind,
            legs: Vec::new(),
            duration_ms: if duration_ms.is_finite() {
                duration_ms.max(0.0)
            } else {
                0.0
            },
            elapsed_ms: 0.0,
            easing,
            token,
            completion,
        }
    }

    pub fn with_leg(mut self, track: TrackId, from: Position, to: Position) -> Self {
        self.legs.push(Leg { track, from, to });
        self
    }

    #[inline]
    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    #[inline]
    pub fn completion(&self) -> Completion {
        self.completion
    }

    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn progress(&self) -> f64 {
        if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
        }
    }

    /// Advance by `dt_ms`. Returns `None` once the token has been cancelled; a
    /// cancelled transition never writes another position.
    pub fn step(&mut self, dt_ms: f64) -> Option<Step> {
        if self.token.is_cancelled() {
            return None;
        }
        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.elapsed_ms += dt_ms;
        }
        let t = self.progress();
        let finished = t >= 1.0;
        let eased = if finished { 1.0 } else { self.easing.apply(t) };
        let positions = self
            .legs
            .iter()
            .map(|leg| {
                let p = if finished {
                    leg.to
                } else {
                    leg.from.lerp(&leg.to, eased)
                };
                (leg.track.clone(), p)
            })
            .collect();
        Some(Step {
            positions,
            finished,
        })
    }
}
