use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spatial_motion_core::{
    Animation, AnimationId, AnimationTransform, DeviceId, InMemoryTrackRegistry, MotionParams,
    Position, RotationPlane, TrackId, TrackInfo, TrackTransform,
};
use spatial_orchestrator::{EngineConfig, MotionEngine};
use spatial_osc::{CoordinateSystem, DeviceConfig, DeviceTransport, InFlightPermit, OscError, OutgoingBatch};

struct NullTransport;

impl DeviceTransport for NullTransport {
    fn submit(
        &self,
        _device: &DeviceId,
        batch: OutgoingBatch,
        _permit: InFlightPermit,
    ) -> Result<(), OscError> {
        black_box(batch);
        Ok(())
    }

    fn clear_device_buffer(&self, _device: &DeviceId) -> Result<(), OscError> {
        Ok(())
    }
}

fn playing_engine(track_count: u32) -> MotionEngine {
    let mut registry = InMemoryTrackRegistry::new();
    let mut transform = AnimationTransform::relative();
    for i in 0..track_count {
        let id = format!("t{i}");
        registry.insert(id.as_str(), TrackInfo::new(Some(i + 1), Position::ORIGIN));
        let offset = Position::new(f64::from(i % 8), f64::from(i / 8), 0.0);
        transform =
            transform.with_track(id.as_str(), TrackTransform::new(offset, f64::from(i) * 0.05));
    }
    let animation = Animation::new(
        "orbit",
        MotionParams::Circular {
            center: Position::ORIGIN,
            radius: 4.0,
            plane: RotationPlane::Xy,
            start_angle: 0.0,
            end_angle: 360.0,
        },
        8.0,
    )
    .looping(true)
    .with_transform(transform);

    let mut config = EngineConfig::default();
    config.transitions.go_to_start_ms = 0.0;
    config.max_in_flight = usize::MAX;
    config.devices = vec![
        DeviceConfig::new("renderer", "127.0.0.1", 4003),
        DeviceConfig::new("monitor", "127.0.0.1", 4004)
            .with_coordinate_system(CoordinateSystem::Polar),
    ];
    let mut engine =
        MotionEngine::new(config, registry, Arc::new(NullTransport)).expect("engine");
    engine.load_animation(animation).expect("load");
    engine
        .play(
            &AnimationId::from("orbit"),
            (0..track_count).map(|i| TrackId::new(format!("t{i}"))),
        )
        .expect("play");
    engine
}

fn bench_tick(c: &mut Criterion) {
    for tracks in [8, 64, 256] {
        let mut engine = playing_engine(tracks);
        let mut now = Instant::now();
        engine.tick(now, 0.0);
        c.bench_function(&format!("dispatch_tick_{tracks}_tracks"), |b| {
            b.iter(|| {
                now += Duration::from_micros(16_667);
                black_box(engine.tick(now, 16.667).changes.len());
            });
        });
    }
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
