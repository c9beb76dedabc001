//! Per-track timeline resolution.
//!
//! Every track of a session shares the global clock, but each one wraps its own
//! local time: a track delayed by `time_shift` starts its first cycle later and
//! therefore loops and reverses on its own schedule.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Loop,
    PingPong,
}

impl LoopMode {
    /// `ping_pong` only has an effect on looping animations.
    #[inline]
    pub fn from_flags(looping: bool, ping_pong: bool) -> Self {
        match (looping, ping_pong) {
            (true, true) => LoopMode::PingPong,
            (true, false) => LoopMode::Loop,
            (false, _) => LoopMode::Once,
        }
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        !matches!(self, LoopMode::Once)
    }
}

/// Cycle parameters of an animation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Seconds.
    pub duration: f64,
    pub mode: LoopMode,
}

/// A track's evaluation time within the animation and the cycle it falls in.
#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalTime {
    pub time: f64,
    pub loop_index: u32,
}

fn fmod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    let m = a % b;
    if m < 0.0 {
        m + b
    } else {
        m
    }
}

/// Map global session time to a track's local evaluation time.
///
/// `local_raw = max(0, global - time_shift)`; looping wraps by the duration,
/// ping-pong reflects odd cycles, otherwise the time clamps at the end.
/// Zero-length animations always evaluate at 0.
pub fn resolve(global_time: f64, time_shift: f64, timing: Timing) -> LocalTime {
    let shift = if time_shift.is_finite() {
        time_shift.max(0.0)
    } else {
        0.0
    };
    let raw = global_time - shift;
    let local_raw = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
    let duration = timing.duration;

    if duration <= 0.0 || !duration.is_finite() || local_raw == 0.0 {
        return LocalTime::default();
    }

    match timing.mode {
        LoopMode::PingPong => {
            let cycle = (local_raw / duration).floor();
            let phase = fmod(local_raw, duration);
            let time = if cycle as u64 % 2 == 1 {
                duration - phase
            } else {
                phase
            };
            LocalTime {
                time,
                loop_index: cycle as u32,
            }
        }
        LoopMode::Loop => LocalTime {
            time: fmod(local_raw, duration),
            loop_index: (local_raw / duration).floor() as u32,
        },
        LoopMode::Once => LocalTime {
            time: local_raw.min(duration),
            loop_index: 0,
        },
    }
}

/// Global time at which every track of a non-looping session has finished.
#[inline]
pub fn session_span(duration: f64, max_time_shift: f64) -> f64 {
    duration.max(0.0) + max_time_shift.max(0.0)
}

/// Fold a negative global time back into a looping timeline.
///
/// Reversed looping playback runs through 0 into the previous cycle instead of
/// stalling there. The period is one duration for `Loop` and two for
/// `PingPong`, so every track keeps its phase and direction. Non-looping and
/// non-negative times are returned unchanged.
pub fn wrap_global(global_time: f64, timing: Timing) -> f64 {
    let period = match timing.mode {
        LoopMode::Once => return global_time,
        LoopMode::Loop => timing.duration,
        LoopMode::PingPong => timing.duration * 2.0,
    };
    if global_time >= 0.0 {
        return global_time;
    }
    if !global_time.is_finite() || !period.is_finite() || period <= 0.0 {
        return 0.0;
    }
    global_time.rem_euclid(period)
}

/// Whether a session has run to its natural end.
///
/// Looping sessions never complete. Forward playback completes once the
/// slowest track has reached its end; reversed playback completes at time 0.
pub fn is_complete(global_time: f64, span: f64, mode: LoopMode, reversed: bool) -> bool {
    if mode.is_looping() {
        return false;
    }
    if reversed {
        global_time <= 0.0
    } else {
        global_time >= span
    }
}
