//! Spatial motion core (engine-agnostic)
//!
//! Data model and pure evaluation pieces of the motion dispatch engine: track
//! positions, animation descriptors, the motion model plug-in interface, the
//! per-track timeline resolver and the transform applier. Nothing in here owns a
//! clock or a socket; the orchestrator crate drives these per tick.

pub mod data;
pub mod easing;
pub mod error;
pub mod ids;
pub mod model;
pub mod position;
pub mod registry;
pub mod timeline;
pub mod transform;

// Re-exports for consumers (orchestrator, hosts)
pub use data::{Animation, AnimationTransform, FormationPattern, TrackTransform, TransformMode};
pub use easing::Easing;
pub use error::MotionError;
pub use ids::{AnimationId, DeviceId, SessionId, TrackId};
pub use model::{
    MotionLibrary, MotionModel, MotionParams, RotatingMotion, RotationPlane, SampleContext,
};
pub use position::Position;
pub use registry::{InMemoryTrackRegistry, SharedTrackRegistry, TrackInfo, TrackRegistry};
pub use timeline::{LocalTime, LoopMode, Timing};
pub use transform::{apply_transform, rotate, Passthrough, TransformOutcome};
