//! Motion model plug-in interface.
//!
//! A motion model is a pure, deterministic function from local time to a raw
//! (usually origin-centered) position. Models that sweep an angle can also report
//! that angle through [`RotatingMotion`], which rigid formations use to rotate
//! per-track offsets together with the group.
//!
//! Parameters are a tagged variant per motion type. Only a few reference shapes
//! are built in; anything else is a `plugin` resolved through [`MotionLibrary`].

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::MotionError;
use crate::position::Position;

/// Inputs of one model evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct SampleContext {
    /// Local time in seconds, within `[0, duration]`.
    pub time: f64,
    pub loop_index: u32,
    pub duration: f64,
}

impl SampleContext {
    /// Normalized progress in `[0, 1]`.
    #[inline]
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPlane {
    #[default]
    Xy,
    Xz,
    Yz,
}

pub trait MotionModel: Send + Sync + fmt::Debug {
    fn position(&self, ctx: &SampleContext) -> Position;

    /// Angular capability; `None` for models that do not rotate.
    fn rotation(&self) -> Option<&dyn RotatingMotion> {
        None
    }
}

pub trait RotatingMotion {
    /// Radians swept since local time 0.
    fn rotation_angle(&self, ctx: &SampleContext) -> f64;
    fn rotation_plane(&self) -> RotationPlane;
}

/// Typed parameters, one variant per motion type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MotionParams {
    Static {
        position: Position,
    },
    Linear {
        from: Position,
        to: Position,
    },
    #[serde(rename_all = "camelCase")]
    Circular {
        center: Position,
        radius: f64,
        #[serde(default)]
        plane: RotationPlane,
        /// Degrees.
        start_angle: f64,
        /// Degrees.
        end_angle: f64,
    },
    Plugin {
        name: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

impl MotionParams {
    pub fn kind(&self) -> &str {
        match self {
            Self::Static { .. } => "static",
            Self::Linear { .. } => "linear",
            Self::Circular { .. } => "circular",
            Self::Plugin { name, .. } => name.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaticModel {
    pub position: Position,
}

impl MotionModel for StaticModel {
    fn position(&self, _ctx: &SampleContext) -> Position {
        self.position
    }
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    pub from: Position,
    pub to: Position,
}

impl MotionModel for LinearModel {
    fn position(&self, ctx: &SampleContext) -> Position {
        self.from.lerp(&self.to, ctx.progress())
    }
}

#[derive(Debug, Clone)]
pub struct CircularModel {
    pub center: Position,
    pub radius: f64,
    pub plane: RotationPlane,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl CircularModel {
    fn angle_deg(&self, ctx: &SampleContext) -> f64 {
        self.start_angle + (self.end_angle - self.start_angle) * ctx.progress()
    }
}

impl MotionModel for CircularModel {
    fn position(&self, ctx: &SampleContext) -> Position {
        let a = self.angle_deg(ctx).to_radians();
        let (u, v) = (self.radius * a.cos(), self.radius * a.sin());
        let c = self.center;
        match self.plane {
            RotationPlane::Xy => Position::new(c.x + u, c.y + v, c.z),
            RotationPlane::Xz => Position::new(c.x + u, c.y, c.z + v),
            RotationPlane::Yz => Position::new(c.x, c.y + u, c.z + v),
        }
    }

    fn rotation(&self) -> Option<&dyn RotatingMotion> {
        Some(self)
    }
}

impl RotatingMotion for CircularModel {
    fn rotation_angle(&self, ctx: &SampleContext) -> f64 {
        (self.angle_deg(ctx) - self.start_angle).to_radians()
    }

    fn rotation_plane(&self) -> RotationPlane {
        self.plane
    }
}

pub type ModelFactory =
    Box<dyn Fn(&serde_json::Value) -> Result<Arc<dyn MotionModel>, MotionError> + Send + Sync>;

/// Resolves [`MotionParams`] into model instances. Plugin models register a
/// factory under their name.
#[derive(Default)]
pub struct MotionLibrary {
    plugins: HashMap<String, ModelFactory>,
}

impl fmt::Debug for MotionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.plugins.keys().collect();
        names.sort();
        f.debug_struct("MotionLibrary")
            .field("plugins", &names)
            .finish()
    }
}

impl MotionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn MotionModel>, MotionError>
            + Send
            + Sync
            + 'static,
    {
        self.plugins.insert(name.into(), Box::new(factory));
    }

    pub fn instantiate(&self, params: &MotionParams) -> Result<Arc<dyn MotionModel>, MotionError> {
        match params {
            MotionParams::Static { position } => Ok(Arc::new(StaticModel {
                position: *position,
            })),
            MotionParams::Linear { from, to } => Ok(Arc::new(LinearModel {
                from: *from,
                to: *to,
            })),
            MotionParams::Circular {
                center,
                radius,
                plane,
                start_angle,
                end_angle,
            } => {
                if !radius.is_finite() || !start_angle.is_finite() || !end_angle.is_finite() {
                    return Err(MotionError::InvalidParameters {
                        name: "circular".into(),
                        reason: "radius and angles must be finite".into(),
                    });
                }
                Ok(Arc::new(CircularModel {
                    center: *center,
                    radius: *radius,
                    plane: *plane,
                    start_angle: *start_angle,
                    end_angle: *end_angle,
                }))
            }
            MotionParams::Plugin { name, params } => {
                let factory = self
                    .plugins
                    .get(name.as_str())
                    .ok_or_else(|| MotionError::UnknownModel { name: name.clone() })?;
                factory(params)
            }
        }
    }
}
