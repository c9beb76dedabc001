//! Free-running tick scheduler.
//!
//! The engine moves onto a dedicated thread that ticks at `tick_rate_hz`
//! regardless of what the host UI is doing. Hosts talk to it through a
//! clonable [`EngineHandle`]: commands are fire-and-forget, results come back
//! on the updates channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use spatial_motion_core::{Animation, AnimationId, TrackId};

use crate::engine::MotionEngine;
use crate::error::EngineError;
use crate::outputs::{EngineEvent, PositionChange};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum EngineCommand {
    LoadAnimation {
        animation: Animation,
    },
    Play {
        animation: AnimationId,
        tracks: Vec<TrackId>,
    },
    Pause,
    Resume,
    Stop,
    Seek {
        time: f64,
    },
    GoToStart {
        #[serde(default, rename = "durationMs")]
        duration_ms: Option<f64>,
        #[serde(default)]
        tracks: Option<Vec<TrackId>>,
    },
    SetSpeed {
        speed: f64,
    },
    SetReversed {
        reversed: bool,
    },
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadAnimation { .. } => "loadAnimation",
            Self::Play { .. } => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Seek { .. } => "seek",
            Self::GoToStart { .. } => "goToStart",
            Self::SetSpeed { .. } => "setSpeed",
            Self::SetReversed { .. } => "setReversed",
        }
    }
}

impl MotionEngine {
    /// Apply one host command.
    pub fn apply(&mut self, command: EngineCommand) -> Result<(), EngineError> {
        match command {
            EngineCommand::LoadAnimation { animation } => self.load_animation(animation),
            EngineCommand::Play { animation, tracks } => self.play(&animation, tracks).map(|_| ()),
            EngineCommand::Pause => self.pause(),
            EngineCommand::Resume => self.resume(),
            EngineCommand::Stop => self.stop(),
            EngineCommand::Seek { time } => self.seek(time),
            EngineCommand::GoToStart {
                duration_ms,
                tracks,
            } => self.go_to_start(duration_ms, tracks),
            EngineCommand::SetSpeed { speed } => self.set_speed(speed),
            EngineCommand::SetReversed { reversed } => self.set_reversed(reversed),
        }
    }
}

/// What the scheduler thread publishes each tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineUpdate {
    Position(PositionChange),
    Event(EngineEvent),
}

#[derive(Clone, Debug)]
pub struct EngineHandle {
    commands: Sender<EngineCommand>,
    updates: Receiver<EngineUpdate>,
    running: Arc<AtomicBool>,
}

impl EngineHandle {
    pub fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::SchedulerStopped);
        }
        self.commands
            .send(command)
            .map_err(|_| EngineError::SchedulerStopped)
    }

    pub fn load_animation(&self, animation: Animation) -> Result<(), EngineError> {
        self.send(EngineCommand::LoadAnimation { animation })
    }

    pub fn play(
        &self,
        animation: impl Into<AnimationId>,
        tracks: impl IntoIterator<Item = TrackId>,
    ) -> Result<(), EngineError> {
        self.send(EngineCommand::Play {
            animation: animation.into(),
            tracks: tracks.into_iter().collect(),
        })
    }

    pub fn pause(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Resume)
    }

    pub fn stop(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Stop)
    }

    pub fn seek(&self, time: f64) -> Result<(), EngineError> {
        self.send(EngineCommand::Seek { time })
    }

    pub fn go_to_start(
        &self,
        duration_ms: Option<f64>,
        tracks: Option<Vec<TrackId>>,
    ) -> Result<(), EngineError> {
        self.send(EngineCommand::GoToStart {
            duration_ms,
            tracks,
        })
    }

    pub fn set_speed(&self, speed: f64) -> Result<(), EngineError> {
        self.send(EngineCommand::SetSpeed { speed })
    }

    pub fn set_reversed(&self, reversed: bool) -> Result<(), EngineError> {
        self.send(EngineCommand::SetReversed { reversed })
    }

    /// Position changes and events, in tick order.
    pub fn updates(&self) -> &Receiver<EngineUpdate> {
        &self.updates
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the scheduler thread to exit after its current tick.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Owns the scheduler thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct TickScheduler {
    handle: EngineHandle,
    thread: Option<JoinHandle<MotionEngine>>,
}

impl TickScheduler {
    pub fn spawn(engine: MotionEngine) -> Result<Self, EngineError> {
        let capacity = engine.config().update_channel_capacity;
        let (command_tx, command_rx) = unbounded();
        let (update_tx, update_rx) = bounded(capacity);
        let running = Arc::new(AtomicBool::new(true));

        let worker_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("motion-tick".into())
            .spawn(move || run(engine, command_rx, update_tx, worker_running))
            .map_err(|e| EngineError::Config(format!("failed to start scheduler thread: {e}")))?;

        Ok(Self {
            handle: EngineHandle {
                commands: command_tx,
                updates: update_rx,
                running,
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop ticking and hand the engine back.
    pub fn join(mut self) -> anyhow::Result<MotionEngine> {
        self.handle.shutdown();
        let thread = self
            .thread
            .take()
            .ok_or_else(|| anyhow::anyhow!("scheduler already joined"))?;
        thread
            .join()
            .map_err(|_| anyhow::anyhow!("scheduler thread panicked"))
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("scheduler thread panicked");
            }
        }
    }
}

fn publish(updates: &Sender<EngineUpdate>, update: EngineUpdate, dropped: &mut u64) {
    match updates.try_send(update) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(_)) => *dropped += 1,
    }
}

fn run(
    mut engine: MotionEngine,
    commands: Receiver<EngineCommand>,
    updates: Sender<EngineUpdate>,
    running: Arc<AtomicBool>,
) -> MotionEngine {
    let period = engine.config().tick_period();
    let mut last = Instant::now();
    let mut deadline = last + period;
    let mut dropped_updates = 0u64;
    log::info!(
        "tick scheduler started at {} Hz",
        engine.config().tick_rate_hz
    );

    while running.load(Ordering::Acquire) {
        for command in commands.try_iter() {
            let name = command.name();
            if let Err(err) = engine.apply(command) {
                log::warn!("{name} rejected: {err}");
                publish(
                    &updates,
                    EngineUpdate::Event(EngineEvent::Error {
                        message: format!("{name}: {err}"),
                    }),
                    &mut dropped_updates,
                );
            }
        }

        let now = Instant::now();
        let dt_ms = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
        last = now;
        let outputs = engine.tick(now, dt_ms);
        for change in &outputs.changes {
            publish(
                &updates,
                EngineUpdate::Position(change.clone()),
                &mut dropped_updates,
            );
        }
        for event in &outputs.events {
            publish(
                &updates,
                EngineUpdate::Event(event.clone()),
                &mut dropped_updates,
            );
        }

        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
            deadline += period;
        } else {
            // overran: skip missed ticks instead of bursting to catch up
            deadline = now + period;
        }
    }

    if dropped_updates > 0 {
        log::warn!("{dropped_updates} scheduler update(s) dropped: receiver not keeping up");
    }
    log::info!("tick scheduler stopped");
    engine
}
