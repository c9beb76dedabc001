//! Streams the orbit-formation fixture to a local renderer over OSC/UDP.
//!
//! `RUST_LOG=debug cargo run -p spatial-orchestrator-core --example orbit_demo [port]`

use std::time::{Duration, Instant};

use spatial_motion_core::{Animation, InMemoryTrackRegistry, TrackId};
use spatial_orchestrator::{
    EngineConfig, EngineEvent, EngineUpdate, MotionEngine, PlaybackState, TickScheduler,
};
use spatial_osc::DeviceConfig;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let port: u16 = std::env::args()
        .nth(1)
        .map(|p| p.parse())
        .transpose()?
        .unwrap_or(4003);

    let mut config: EngineConfig = spatial_test_fixtures::configs::load("default")?;
    config.devices = vec![DeviceConfig::new("renderer", "127.0.0.1", port)];
    let registry: InMemoryTrackRegistry = spatial_test_fixtures::registries::load("quartet")?;
    let animation =
        Animation::from_json_str(&spatial_test_fixtures::animations::json("orbit-formation")?)?;

    let engine = MotionEngine::with_network(config, registry)?;
    let scheduler = TickScheduler::spawn(engine)?;
    let handle = scheduler.handle();
    handle.load_animation(animation)?;
    handle.play(
        "orbit-formation",
        ["a", "b", "c"].into_iter().map(TrackId::from),
    )?;

    let run_until = Instant::now() + Duration::from_secs(10);
    let mut positions = 0usize;
    let mut stopped = false;
    loop {
        match handle.updates().recv_timeout(Duration::from_millis(100)) {
            Ok(EngineUpdate::Position(_)) => positions += 1,
            Ok(EngineUpdate::Event(event)) => {
                println!("{}", serde_json::to_string(&event)?);
                if matches!(
                    event,
                    EngineEvent::StateChanged {
                        to: PlaybackState::Idle,
                        ..
                    }
                ) && stopped
                {
                    break;
                }
            }
            Err(_) => {}
        }
        if !stopped && Instant::now() >= run_until {
            handle.stop()?;
            stopped = true;
        }
    }

    let engine = scheduler.join()?;
    println!(
        "{positions} position updates, {} ticks, {} dropped batches",
        engine.metrics().ticks,
        engine.metrics().batches_dropped
    );
    Ok(())
}
