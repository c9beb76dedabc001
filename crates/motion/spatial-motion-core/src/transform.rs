//! Transform applier: model-local position to world position per track.

use crate::data::{AnimationTransform, FormationPattern, TransformMode};
use crate::ids::TrackId;
use crate::model::{MotionModel, RotationPlane, SampleContext};
use crate::position::Position;

/// Why a base position went through unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Passthrough {
    /// The animation has no transform (single-track / absolute case).
    NoTransform,
    /// The animation has a transform but no entry for this track.
    MissingTrackEntry,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TransformOutcome {
    pub position: Position,
    pub passthrough: Option<Passthrough>,
}

impl TransformOutcome {
    #[inline]
    fn transformed(position: Position) -> Self {
        Self {
            position,
            passthrough: None,
        }
    }

    #[inline]
    fn passthrough(position: Position, why: Passthrough) -> Self {
        Self {
            position,
            passthrough: Some(why),
        }
    }
}

/// Rotate `offset` by `angle` radians within `plane`. The axis left out of the
/// plane is untouched, so the offset's length is preserved.
pub fn rotate(offset: Position, angle: f64, plane: RotationPlane) -> Position {
    let (s, c) = angle.sin_cos();
    match plane {
        RotationPlane::Xy => Position::new(
            offset.x * c - offset.y * s,
            offset.x * s + offset.y * c,
            offset.z,
        ),
        RotationPlane::Xz => Position::new(
            offset.x * c - offset.z * s,
            offset.y,
            offset.x * s + offset.z * c,
        ),
        RotationPlane::Yz => Position::new(
            offset.x,
            offset.y * c - offset.z * s,
            offset.y * s + offset.z * c,
        ),
    }
}

/// Apply an animation's multi-track transform to one track's base position.
///
/// Rigid formations rotate the offset by the model's own swept angle; a model
/// without the rotation capability leaves the offset unrotated.
pub fn apply_transform(
    base: Position,
    track: &TrackId,
    transform: Option<&AnimationTransform>,
    model: &dyn MotionModel,
    ctx: &SampleContext,
) -> TransformOutcome {
    let Some(transform) = transform else {
        return TransformOutcome::passthrough(base, Passthrough::NoTransform);
    };
    let Some(entry) = transform.track(track) else {
        return TransformOutcome::passthrough(base, Passthrough::MissingTrackEntry);
    };

    match &transform.mode {
        TransformMode::Relative => TransformOutcome::transformed(base + entry.offset),
        TransformMode::Formation {
            anchor,
            pattern: FormationPattern::Spherical,
        } => TransformOutcome::transformed(*anchor + base + entry.offset),
        TransformMode::Formation {
            anchor,
            pattern: FormationPattern::Rigid,
        } => {
            let offset = match model.rotation() {
                Some(rot) => rotate(entry.offset, rot.rotation_angle(ctx), rot.rotation_plane()),
                None => entry.offset,
            };
            TransformOutcome::transformed(*anchor + base + offset)
        }
    }
}
