//! spatial-orchestrator
//!
//! The real-time side of the motion dispatch engine: playback controller,
//! cancellable transitions, the per-track evaluation pipeline and the tick
//! scheduler thread. Hosts either drive [`MotionEngine::tick`] themselves or hand
//! the engine to a [`TickScheduler`] and talk to it through an [`EngineHandle`].

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod outputs;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod transition;

pub use crate::config::{EngineConfig, ThrottleConfig, TransitionConfig};
pub use crate::engine::MotionEngine;
pub use crate::error::EngineError;
pub use crate::metrics::EngineMetrics;
pub use crate::outputs::{EngineEvent, EngineOutputs, PositionChange, StopReason};
pub use crate::scheduler::{EngineCommand, EngineHandle, EngineUpdate, TickScheduler};
pub use crate::session::{LoadedAnimation, PlayingSession, TrackRuntimeState};
pub use crate::state::PlaybackState;
pub use crate::transition::{CancellationToken, TransitionKind};
