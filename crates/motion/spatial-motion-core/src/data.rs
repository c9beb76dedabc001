//! Animation data model.
//!
//! An [`Animation`] names a motion model (with typed parameters), a duration and
//! cycle flags, and optionally a multi-track [`AnimationTransform`] describing how
//! each participating track derives its world position from the shared motion.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::MotionError;
use crate::ids::{AnimationId, TrackId};
use crate::model::MotionParams;
use crate::position::Position;
use crate::timeline::{self, LoopMode, Timing};

/// Per-track transform entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackTransform {
    /// Meaning depends on the transform mode (see [`TransformMode`]).
    #[serde(default)]
    pub offset: Position,
    /// Phase delay in seconds, >= 0.
    #[serde(default, rename = "timeShift")]
    pub time_shift: f64,
}

impl TrackTransform {
    pub fn new(offset: Position, time_shift: f64) -> Self {
        Self { offset, time_shift }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormationPattern {
    /// Offsets rotate with the motion so the group keeps its shape.
    Rigid,
    /// Offsets stay fixed around the moving anchor.
    Spherical,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TransformMode {
    /// `world = base + offset`
    Relative,
    /// `world = anchor + base + offset'` where `offset'` depends on the pattern.
    Formation {
        anchor: Position,
        pattern: FormationPattern,
    },
}

/// Multi-track transform descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationTransform {
    #[serde(flatten)]
    pub mode: TransformMode,
    #[serde(default)]
    pub tracks: HashMap<TrackId, TrackTransform>,
}

impl AnimationTransform {
    pub fn relative() -> Self {
        Self {
            mode: TransformMode::Relative,
            tracks: HashMap::new(),
        }
    }

    pub fn formation(anchor: Position, pattern: FormationPattern) -> Self {
        Self {
            mode: TransformMode::Formation { anchor, pattern },
            tracks: HashMap::new(),
        }
    }

    pub fn with_track(mut self, track: impl Into<TrackId>, entry: TrackTransform) -> Self {
        self.tracks.insert(track.into(), entry);
        self
    }

    #[inline]
    pub fn track(&self, track: &TrackId) -> Option<&TrackTransform> {
        self.tracks.get(track)
    }

    /// Largest phase delay across all per-track entries.
    pub fn max_time_shift(&self) -> f64 {
        self.tracks
            .values()
            .map(|t| t.time_shift)
            .fold(0.0, f64::max)
    }

    /// Session tracks that have no per-track entry (they will pass through unchanged).
    pub fn validate_for<'a>(
        &self,
        tracks: impl IntoIterator<Item = &'a TrackId>,
    ) -> Vec<TrackId> {
        tracks
            .into_iter()
            .filter(|t| !self.tracks.contains_key(*t))
            .cloned()
            .collect()
    }
}

/// A choreography: one motion model shared by every track of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub id: AnimationId,
    #[serde(default)]
    pub name: String,
    pub motion: MotionParams,
    /// Seconds.
    pub duration: f64,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default, rename = "pingPong")]
    pub ping_pong: bool,
    #[serde(default)]
    pub transform: Option<AnimationTransform>,
}

impl Animation {
    pub fn new(id: impl Into<AnimationId>, motion: MotionParams, duration: f64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            motion,
            duration,
            looping: false,
            ping_pong: false,
            transform: None,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn ping_pong(mut self, ping_pong: bool) -> Self {
        self.ping_pong = ping_pong;
        self
    }

    pub fn with_transform(mut self, transform: AnimationTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    #[inline]
    pub fn loop_mode(&self) -> LoopMode {
        LoopMode::from_flags(self.looping, self.ping_pong)
    }

    #[inline]
    pub fn timing(&self) -> Timing {
        Timing {
            duration: self.duration,
            mode: self.loop_mode(),
        }
    }

    /// Phase delay for a track; tracks without an entry start immediately.
    pub fn time_shift(&self, track: &TrackId) -> f64 {
        self.transform
            .as_ref()
            .and_then(|t| t.track(track))
            .map(|t| t.time_shift)
            .unwrap_or(0.0)
    }

    pub fn max_time_shift(&self) -> f64 {
        self.transform
            .as_ref()
            .map(AnimationTransform::max_time_shift)
            .unwrap_or(0.0)
    }

    /// Global time at which a non-looping session over every mapped track completes.
    pub fn span(&self) -> f64 {
        timeline::session_span(self.duration, self.max_time_shift())
    }

    /// Completion time for a session that only plays `tracks`.
    pub fn span_for<'a>(&self, tracks: impl IntoIterator<Item = &'a TrackId>) -> f64 {
        let shift = tracks
            .into_iter()
            .map(|t| self.time_shift(t))
            .fold(0.0, f64::max);
        timeline::session_span(self.duration, shift)
    }

    /// Validate basic invariants (finite non-negative duration and time shifts, finite offsets).
    pub fn validate_basic(&self) -> Result<(), MotionError> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(MotionError::InvalidAnimation {
                animation: self.id.clone(),
                reason: format!("duration must be finite and >= 0, got {}", self.duration),
            });
        }
        let Some(transform) = &self.transform else {
            return Ok(());
        };
        if let TransformMode::Formation { anchor, .. } = &transform.mode {
            if !anchor.is_finite() {
                return Err(MotionError::InvalidAnimation {
                    animation: self.id.clone(),
                    reason: "formation anchor must be finite".into(),
                });
            }
        }
        for (track, entry) in transform.tracks.iter() {
            if !entry.time_shift.is_finite() || entry.time_shift < 0.0 {
                return Err(MotionError::InvalidAnimation {
                    animation: self.id.clone(),
                    reason: format!(
                        "timeShift for '{}' must be finite and >= 0, got {}",
                        track, entry.time_shift
                    ),
                });
            }
            if !entry.offset.is_finite() {
                return Err(MotionError::InvalidAnimation {
                    animation: self.id.clone(),
                    reason: format!("offset for '{}' must be finite", track),
                });
            }
        }
        Ok(())
    }

    /// Parse an animation from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, MotionError> {
        let anim: Animation = serde_json::from_str(json)?;
        anim.validate_basic()?;
        Ok(anim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle() -> MotionParams {
        MotionParams::Circular {
            center: Position::ORIGIN,
            radius: 1.0,
            plane: crate::model::RotationPlane::Xy,
            start_angle: 0.0,
            end_angle: 360.0,
        }
    }

    #[test]
    fn parses_formation_transform_json() {
        let json = r#"{
            "id": "orbit",
            "motion": { "type": "circular", "center": {"x":0,"y":0,"z":0}, "radius": 2.0,
                        "plane": "xy", "startAngle": 0, "endAngle": 360 },
            "duration": 8.0,
            "loop": true,
            "transform": {
                "mode": "formation",
                "anchor": {"x": 1, "y": 0, "z": 0},
                "pattern": "rigid",
                "tracks": {
                    "a": { "offset": {"x": 0.5, "y": 0, "z": 0} },
                    "b": { "offset": {"x": -0.5, "y": 0, "z": 0}, "timeShift": 0.25 }
                }
            }
        }"#;
        let anim = Animation::from_json_str(json).expect("parse");
        assert!(anim.looping);
        assert!(!anim.ping_pong);
        let transform = anim.transform.as_ref().expect("transform");
        assert_eq!(
            transform.mode,
            TransformMode::Formation {
                anchor: Position::new(1.0, 0.0, 0.0),
                pattern: FormationPattern::Rigid
            }
        );
        assert_eq!(anim.time_shift(&TrackId::from("b")), 0.25);
        assert_eq!(anim.time_shift(&TrackId::from("missing")), 0.0);
        assert_eq!(anim.span(), 8.25);
        assert_eq!(anim.span_for([&TrackId::from("a")]), 8.0);
        assert_eq!(
            anim.span_for([&TrackId::from("a"), &TrackId::from("b")]),
            8.25
        );
    }

    #[test]
    fn rejects_negative_time_shift() {
        let anim = Animation::new("a", circle(), 4.0).with_transform(
            AnimationTransform::relative()
                .with_track("t", TrackTransform::new(Position::ORIGIN, -1.0)),
        );
        assert!(matches!(
            anim.validate_basic(),
            Err(MotionError::InvalidAnimation { .. })
        ));
    }

    #[test]
    fn rejects_non_finite_duration() {
        let anim = Animation::new("a", circle(), f64::NAN);
        assert!(anim.validate_basic().is_err());
    }

    #[test]
    fn lists_tracks_without_transform_entry() {
        let transform = AnimationTransform::relative()
            .with_track("a", TrackTransform::default());
        let tracks = [TrackId::from("a"), TrackId::from("b")];
        assert_eq!(transform.validate_for(tracks.iter()), vec![TrackId::from("b")]);
    }
}
