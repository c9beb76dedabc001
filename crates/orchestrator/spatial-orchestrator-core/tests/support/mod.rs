#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use spatial_motion_core::{
    Animation, DeviceId, InMemoryTrackRegistry, Position, SharedTrackRegistry, TrackId,
};
use spatial_orchestrator::{EngineConfig, EngineEvent, EngineOutputs, MotionEngine};
use spatial_osc::{DeviceTransport, InFlightPermit, OscError, OutgoingBatch};

/// What reached the transport, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Wire {
    Batch {
        device: DeviceId,
        messages: Vec<(u32, Position)>,
    },
    Cleared(DeviceId),
}

/// Transport that records everything and releases permits immediately.
#[derive(Default)]
pub struct RecordingTransport {
    pub log: Mutex<Vec<Wire>>,
}

impl RecordingTransport {
    pub fn batches(&self) -> Vec<Vec<(u32, Position)>> {
        self.log
            .lock()
            .iter()
            .filter_map(|w| match w {
                Wire::Batch { messages, .. } => Some(messages.clone()),
                Wire::Cleared(_) => None,
            })
            .collect()
    }

    /// Entries recorded after the last buffer clear.
    pub fn after_last_clear(&self) -> Vec<Wire> {
        let log = self.log.lock();
        let start = log
            .iter()
            .rposition(|w| matches!(w, Wire::Cleared(_)))
            .map_or(0, |i| i + 1);
        log[start..].to_vec()
    }
}

impl DeviceTransport for RecordingTransport {
    fn submit(
        &self,
        device: &DeviceId,
        batch: OutgoingBatch,
        _permit: InFlightPermit,
    ) -> Result<(), OscError> {
        let messages = batch
            .iter()
            .map(|m| (m.device_channel, m.position))
            .collect();
        self.log.lock().push(Wire::Batch {
            device: device.clone(),
            messages,
        });
        Ok(())
    }

    fn clear_device_buffer(&self, device: &DeviceId) -> Result<(), OscError> {
        self.log.lock().push(Wire::Cleared(device.clone()));
        Ok(())
    }
}

pub struct Rig {
    pub engine: MotionEngine,
    pub registry: SharedTrackRegistry,
    pub transport: Arc<RecordingTransport>,
    pub now: Instant,
}

impl Rig {
    pub fn new(config_fixture: &str, registry_fixture: &str) -> Self {
        let config: EngineConfig =
            spatial_test_fixtures::configs::load(config_fixture).expect("config fixture");
        Self::with_config(config, registry_fixture)
    }

    pub fn with_config(config: EngineConfig, registry_fixture: &str) -> Self {
        let registry: InMemoryTrackRegistry =
            spatial_test_fixtures::registries::load(registry_fixture).expect("registry fixture");
        let registry = registry.into_shared();
        let transport = Arc::new(RecordingTransport::default());
        let engine = MotionEngine::new(config, registry.clone(), transport.clone())
            .expect("engine");
        Self {
            engine,
            registry,
            transport,
            now: Instant::now(),
        }
    }

    pub fn load(&mut self, animation_fixture: &str) -> Animation {
        let json = spatial_test_fixtures::animations::json(animation_fixture).expect("fixture");
        let animation = Animation::from_json_str(&json).expect("animation");
        self.engine
            .load_animation(animation.clone())
            .expect("load animation");
        animation
    }

    /// One tick of `dt_ms`; returns its outputs.
    pub fn tick(&mut self, dt_ms: f64) -> EngineOutputs {
        self.now += Duration::from_secs_f64(dt_ms / 1000.0);
        self.engine.tick(self.now, dt_ms).clone()
    }

    /// Tick `total_ms` in `step_ms` increments, collecting every output.
    pub fn run(&mut self, total_ms: f64, step_ms: f64) -> Vec<EngineOutputs> {
        let steps = (total_ms / step_ms).ceil() as usize;
        (0..steps).map(|_| self.tick(step_ms)).collect()
    }

    pub fn position(&self, track: &str) -> Position {
        self.registry
            .position(&TrackId::from(track))
            .expect("track in registry")
    }
}

pub fn tracks(ids: &[&str]) -> Vec<TrackId> {
    ids.iter().map(|id| TrackId::from(*id)).collect()
}

pub fn events(outputs: &[EngineOutputs]) -> Vec<EngineEvent> {
    outputs.iter().flat_map(|o| o.events.iter().cloned()).collect()
}

pub fn assert_close(actual: Position, expected: Position) {
    assert!(
        actual.distance(&expected) < 1e-9,
        "expected {expected:?}, got {actual:?}"
    );
}
