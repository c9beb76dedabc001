mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use spatial_motion_core::{Animation, InMemoryTrackRegistry, Position};
use spatial_orchestrator::{
    EngineConfig, EngineError, EngineEvent, EngineUpdate, MotionEngine, PlaybackState,
    StopReason, TickScheduler,
};
use support::{tracks, RecordingTransport};

fn engine() -> (MotionEngine, Arc<RecordingTransport>) {
    let config: EngineConfig =
        spatial_test_fixtures::configs::load("fast-transitions").expect("config");
    let registry: InMemoryTrackRegistry =
        spatial_test_fixtures::registries::load("quartet").expect("registry");
    let transport = Arc::new(RecordingTransport::default());
    let engine = MotionEngine::new(config, registry, transport.clone()).expect("engine");
    (engine, transport)
}

fn wait_for(
    handle: &spatial_orchestrator::EngineHandle,
    timeout: Duration,
    mut done: impl FnMut(&EngineUpdate) -> bool,
) -> Vec<EngineUpdate> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        if let Ok(update) = handle.updates().recv_timeout(Duration::from_millis(50)) {
            let finished = done(&update);
            seen.push(update);
            if finished {
                return seen;
            }
        }
    }
    panic!("timed out after {} updates", seen.len());
}

#[test]
fn scheduler_plays_an_animation_to_completion() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (engine, transport) = engine();
    let scheduler = TickScheduler::spawn(engine).expect("spawn");
    let handle = scheduler.handle();

    let json = spatial_test_fixtures::animations::json("one-shot-line").expect("fixture");
    handle
        .load_animation(Animation::from_json_str(&json).expect("animation"))
        .expect("send load");
    handle.play("one-shot-line", tracks(&["a"])).expect("send play");

    let seen = wait_for(&handle, Duration::from_secs(10), |u| {
        matches!(
            u,
            EngineUpdate::Event(EngineEvent::SessionStopped {
                reason: StopReason::Completed,
                ..
            })
        )
    });
    assert!(seen
        .iter()
        .any(|u| matches!(u, EngineUpdate::Position(_))));

    let engine = scheduler.join().expect("join");
    assert_eq!(engine.state(), PlaybackState::Idle);
    let last = transport.batches().pop().expect("final flush");
    assert_eq!(last, vec![(1, Position::new(4.0, 0.0, 0.0))]);
}

#[test]
fn rejected_commands_surface_as_error_events() {
    let (engine, _transport) = engine();
    let scheduler = TickScheduler::spawn(engine).expect("spawn");
    let handle = scheduler.handle();

    handle.pause().expect("send pause");
    let seen = wait_for(&handle, Duration::from_secs(5), |u| {
        matches!(u, EngineUpdate::Event(EngineEvent::Error { .. }))
    });
    let Some(EngineUpdate::Event(EngineEvent::Error { message })) = seen.last() else {
        panic!("no error event");
    };
    assert!(message.starts_with("pause"), "{message}");

    drop(scheduler);
    assert!(!handle.is_running());
    assert!(matches!(handle.stop(), Err(EngineError::SchedulerStopped)));
}
