//! Engine context and playback controller.
//!
//! `MotionEngine` owns the loaded animations, the active session, per-track
//! runtime state and the OSC batch manager. Every mutation goes through the
//! controller commands below or through [`MotionEngine::tick`]; nothing else
//! touches session state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use indexmap::IndexSet;
use spatial_motion_core::ids::IdAllocator;
use spatial_motion_core::timeline::LocalTime;
use spatial_motion_core::{
    apply_transform, Animation, AnimationId, DeviceId, MotionLibrary, Passthrough, Position,
    SampleContext, SessionId, TrackId, TrackInfo, TrackRegistry, TransformMode,
    TransformOutcome,
};
use spatial_osc::{
    BatchStats, CoordinateSystem, DeviceTransport, DispatchReport, FlushOutcome,
    NetworkDispatcher, OscBatchManager, OutgoingMessage, RateLimitedWarning,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::EngineMetrics;
use crate::outputs::{EngineEvent, EngineOutputs, StopReason};
use crate::session::{LoadedAnimation, PlayingSession, TrackRuntimeState};
use crate::state::PlaybackState;
use crate::transition::{CancellationToken, Completion, Transition, TransitionKind};

/// Evaluate the per-track pipeline (timeline, model, transform) at a global time.
fn sample(
    loaded: &LoadedAnimation,
    track: &TrackId,
    global_time: f64,
) -> (LocalTime, TransformOutcome) {
    let local = loaded.local_time(global_time, track);
    let ctx = SampleContext {
        time: local.time,
        loop_index: local.loop_index,
        duration: loaded.animation.duration,
    };
    let base = loaded.model.position(&ctx);
    let outcome = apply_transform(
        base,
        track,
        loaded.animation.transform.as_ref(),
        loaded.model.as_ref(),
        &ctx,
    );
    (local, outcome)
}

pub struct MotionEngine {
    config: EngineConfig,
    library: MotionLibrary,
    animations: HashMap<AnimationId, Arc<LoadedAnimation>>,
    registry: Box<dyn TrackRegistry>,
    batches: OscBatchManager,
    devices: Vec<(DeviceId, CoordinateSystem)>,
    state: PlaybackState,
    session: Option<PlayingSession>,
    transition: Option<Transition>,
    tracks: HashMap<TrackId, TrackRuntimeState>,
    ids: IdAllocator,
    /// Accumulates between ticks; swapped into `outputs` at the end of each tick.
    pending: EngineOutputs,
    outputs: EngineOutputs,
    metrics: EngineMetrics,
    invalid_warning: RateLimitedWarning,
    last_tick: Instant,
}

impl std::fmt::Debug for MotionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionEngine")
            .field("state", &self.state)
            .field("session", &self.session.as_ref().map(|s| s.id))
            .field("animations", &self.animations.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl MotionEngine {
    /// Build an engine around any transport (tests inject recording transports).
    pub fn new(
        config: EngineConfig,
        registry: impl TrackRegistry + 'static,
        transport: Arc<dyn DeviceTransport>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let batches = OscBatchManager::new(config.batch_config(), transport);
        let devices = config
            .devices
            .iter()
            .map(|d| (d.id.clone(), d.coordinate_system))
            .collect();
        Ok(Self {
            library: MotionLibrary::new(),
            animations: HashMap::new(),
            registry: Box::new(registry),
            batches,
            devices,
            state: PlaybackState::Idle,
            session: None,
            transition: None,
            tracks: HashMap::new(),
            ids: IdAllocator::new(),
            pending: EngineOutputs::default(),
            outputs: EngineOutputs::default(),
            metrics: EngineMetrics::default(),
            invalid_warning: RateLimitedWarning::new(Duration::from_secs(5)),
            last_tick: Instant::now(),
            config,
        })
    }

    /// Build an engine that sends to the configured devices over UDP.
    pub fn with_network(
        config: EngineConfig,
        registry: impl TrackRegistry + 'static,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let dispatcher = NetworkDispatcher::new(&config.devices, config.dispatcher_config())?;
        Self::new(config, registry, Arc::new(dispatcher))
    }

    // ----- accessors -----

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&PlayingSession> {
        self.session.as_ref()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn batch_stats(&self) -> &BatchStats {
        self.batches.stats()
    }

    pub fn track_state(&self, track: &TrackId) -> Option<&TrackRuntimeState> {
        self.tracks.get(track)
    }

    pub fn track(&self, track: &TrackId) -> Option<TrackInfo> {
        self.registry.track(track)
    }

    /// Register plugin motion models before loading animations that use them.
    pub fn library_mut(&mut self) -> &mut MotionLibrary {
        &mut self.library
    }

    pub fn outputs(&self) -> &EngineOutputs {
        &self.outputs
    }

    // ----- animations -----

    /// Validate an animation and instantiate its motion model. Replaces any
    /// animation with the same id; a running session keeps the old one.
    pub fn load_animation(&mut self, animation: Animation) -> Result<(), EngineError> {
        animation.validate_basic()?;
        let model = self.library.instantiate(&animation.motion)?;
        log::debug!(
            "loaded animation {} ({}, {}s)",
            animation.id,
            animation.motion.kind(),
            animation.duration
        );
        self.animations.insert(
            animation.id.clone(),
            Arc::new(LoadedAnimation { animation, model }),
        );
        Ok(())
    }

    pub fn has_animation(&self, id: &AnimationId) -> bool {
        self.animations.contains_key(id)
    }

    // ----- controller commands -----

    /// Start a session. Tracks first interpolate to their start pose; the
    /// session clock starts once that finishes. Supersedes any existing
    /// session or transition.
    pub fn play(
        &mut self,
        animation: &AnimationId,
        tracks: impl IntoIterator<Item = TrackId>,
    ) -> Result<SessionId, EngineError> {
        let loaded = self
            .animations
            .get(animation)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAnimation(animation.clone()))?;
        let tracks: IndexSet<TrackId> = tracks.into_iter().collect();
        if tracks.is_empty() {
            return Err(EngineError::EmptyTrackSet(animation.clone()));
        }
        let mut infos = Vec::with_capacity(tracks.len());
        for track in &tracks {
            let info = self
                .registry
                .track(track)
                .ok_or_else(|| EngineError::UnknownTrack(track.clone()))?;
            infos.push(info);
        }

        self.cancel_transition();
        if let Some(previous) = self.session.take() {
            self.end_session(previous, StopReason::Superseded);
        }

        for (track, info) in tracks.iter().zip(&infos) {
            let runtime = self
                .tracks
                .entry(track.clone())
                .or_insert_with(|| TrackRuntimeState {
                    track: track.clone(),
                    device_channel: info.device_channel,
                    initial_position: info.position,
                    current_position: info.position,
                });
            runtime.device_channel = info.device_channel;
            runtime.current_position = info.position;
        }

        let id = self.ids.alloc_session();
        let mut session = PlayingSession::new(id, Arc::clone(&loaded), tracks);
        if let Some(transform) = &loaded.animation.transform {
            let mode = match transform.mode {
                TransformMode::Relative => "relative",
                TransformMode::Formation { .. } => "formation",
            };
            for track in transform.validate_for(session.tracks.iter()) {
                log::warn!(
                    "{id}: track {track} has no entry in the {mode} transform of {}; it will move untransformed",
                    loaded.animation.id
                );
                self.pending.push_event(EngineEvent::TransformPassthrough {
                    session: id,
                    track: track.clone(),
                });
                session.reported_passthrough.insert(track);
            }
        }

        let mut transition = Transition::new(
            TransitionKind::GoToStart,
            self.config.transitions.go_to_start_ms,
            self.config.transitions.easing,
            CancellationToken::new(),
            Completion::StartSession(PlaybackState::Playing),
        );
        for (track, info) in session.tracks.iter().zip(&infos) {
            if let Some(target) = self.start_pose(&loaded, track) {
                transition = transition.with_leg(track.clone(), info.position, target);
            }
        }

        log::info!(
            "{id}: playing {} on {} track(s)",
            loaded.animation.id,
            session.tracks.len()
        );
        self.metrics.sessions_started += 1;
        self.session = Some(session);
        self.transition = Some(transition);
        self.set_state(PlaybackState::GoingToStart);
        Ok(id)
    }

    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.require(PlaybackState::can_pause, "pause")?;
        if let Some(session) = self.session.as_mut() {
            session.is_playing = false;
        }
        self.set_state(PlaybackState::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.require(PlaybackState::can_resume, "resume")?;
        if let Some(session) = self.session.as_mut() {
            session.is_playing = true;
        }
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// End the session and smoothly return its tracks to their initial positions.
    ///
    /// Pending messages are discarded and every device buffer is purged before
    /// the return interpolation starts writing.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        self.require(PlaybackState::can_stop, "stop")?;
        self.cancel_transition();

        self.batches.clear_batch();
        let devices: Vec<DeviceId> = self.devices.iter().map(|(d, _)| d.clone()).collect();
        for device in devices {
            if let Err(err) = self.batches.clear_device_buffer(&device) {
                log::warn!("failed to clear buffer for {device}: {err}");
                self.pending.push_event(EngineEvent::DispatchFailed {
                    device,
                    error: err.to_string(),
                });
            }
        }

        let Some(session) = self.session.take() else {
            self.set_state(PlaybackState::Idle);
            return Ok(());
        };

        let mut transition = Transition::new(
            TransitionKind::ReturnToInitial,
            self.config.transitions.return_ms,
            self.config.transitions.easing,
            CancellationToken::new(),
            Completion::Idle,
        );
        for track in &session.tracks {
            if let Some(runtime) = self.tracks.get(track) {
                transition = transition.with_leg(
                    track.clone(),
                    runtime.current_position,
                    runtime.initial_position,
                );
            }
        }
        self.end_session(session, StopReason::Stopped);
        self.transition = Some(transition);
        self.set_state(PlaybackState::ReturningToInitial);
        Ok(())
    }

    /// Jump the session clock and write the pose at the new time.
    pub fn seek(&mut self, time: f64) -> Result<(), EngineError> {
        self.require(PlaybackState::can_seek, "seek")?;
        if !time.is_finite() {
            return Err(EngineError::InvalidParameter {
                name: "time",
                reason: format!("must be finite, got {time}"),
            });
        }
        if let Some(session) = self.session.as_mut() {
            session.global_time = session.clamp_time(time);
            log::debug!("{}: seek to {:.3}s", session.id, session.global_time);
        }
        let now = self.last_tick;
        self.evaluate_session(now);
        Ok(())
    }

    /// Interpolate tracks (default: the whole session) to their local t=0 pose,
    /// then restart the session clock at 0 in the state it was in.
    pub fn go_to_start(
        &mut self,
        duration_ms: Option<f64>,
        tracks: Option<Vec<TrackId>>,
    ) -> Result<(), EngineError> {
        self.require(PlaybackState::can_seek, "go to start")?;
        let duration = duration_ms.unwrap_or(self.config.transitions.go_to_start_ms);
        if !duration.is_finite() || duration < 0.0 {
            return Err(EngineError::InvalidParameter {
                name: "durationMs",
                reason: format!("must be finite and >= 0, got {duration}"),
            });
        }
        let Some(session) = self.session.as_ref() else {
            return Err(EngineError::NoActiveSession);
        };
        let chosen: Vec<TrackId> = match tracks {
            Some(list) => {
                if let Some(stray) = list.iter().find(|t| !session.tracks.contains(*t)) {
                    return Err(EngineError::UnknownTrack(stray.clone()));
                }
                list
            }
            None => session.tracks.iter().cloned().collect(),
        };
        let loaded = Arc::clone(&session.animation);
        let resume_to = self.state;

        self.cancel_transition();
        let mut transition = Transition::new(
            TransitionKind::GoToStart,
            duration,
            self.config.transitions.easing,
            CancellationToken::new(),
            Completion::StartSession(resume_to),
        );
        for track in chosen {
            let from = self.current_position(&track);
            if let Some(target) = self.start_pose(&loaded, &track) {
                transition = transition.with_leg(track, from, target);
            }
        }
        if let Some(session) = self.session.as_mut() {
            session.is_playing = false;
        }
        self.transition = Some(transition);
        self.set_state(PlaybackState::GoingToStart);
        Ok(())
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), EngineError> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(EngineError::InvalidParameter {
                name: "speed",
                reason: format!("must be finite and >= 0, got {speed}"),
            });
        }
        let session = self.session.as_mut().ok_or(EngineError::NoActiveSession)?;
        session.playback_speed = speed;
        Ok(())
    }

    pub fn set_reversed(&mut self, reversed: bool) -> Result<(), EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NoActiveSession)?;
        session.is_reversed = reversed;
        Ok(())
    }

    // ----- tick -----

    /// Run one scheduler tick: advance the active transition or session clock,
    /// evaluate every active track, and flush the OSC batch if it is due.
    pub fn tick(&mut self, now: Instant, dt_ms: f64) -> &EngineOutputs {
        self.metrics.ticks += 1;
        self.last_tick = now;
        self.collect_reports();

        match self.state {
            PlaybackState::GoingToStart | PlaybackState::ReturningToInitial => {
                self.step_transition(now, dt_ms)
            }
            PlaybackState::Playing => self.step_session(now, dt_ms),
            PlaybackState::Idle | PlaybackState::Paused => {}
        }

        for outcome in self.batches.maybe_flush(now) {
            self.record_flush(outcome);
        }

        std::mem::swap(&mut self.outputs, &mut self.pending);
        self.pending.clear();
        &self.outputs
    }

    fn step_transition(&mut self, now: Instant, dt_ms: f64) {
        let Some(transition) = self.transition.as_mut() else {
            let fallback = if self.session.is_some() {
                PlaybackState::Paused
            } else {
                PlaybackState::Idle
            };
            self.set_state(fallback);
            return;
        };
        let completion = transition.completion();
        let Some(step) = transition.step(dt_ms) else {
            self.transition = None;
            return;
        };
        for (track, position) in step.positions {
            let channel = self.device_channel(&track);
            self.commit(&track, position, channel, now);
        }
        if !step.finished {
            return;
        }
        self.transition = None;
        match completion {
            Completion::Idle => {
                for outcome in self.batches.force_flush(now) {
                    self.record_flush(outcome);
                }
                self.set_state(PlaybackState::Idle);
            }
            Completion::StartSession(state) => self.start_session(state),
        }
    }

    fn start_session(&mut self, state: PlaybackState) {
        let Some(session) = self.session.as_mut() else {
            self.set_state(PlaybackState::Idle);
            return;
        };
        session.global_time = 0.0;
        session.is_playing = state.is_playing();
        let first = !session.started;
        session.started = true;
        let (id, animation) = (session.id, session.animation.animation.id.clone());
        self.set_state(state);
        if first {
            self.pending
                .push_event(EngineEvent::PlaybackStarted { session: id, animation });
        }
    }

    fn step_session(&mut self, now: Instant, dt_ms: f64) {
        let Some(session) = self.session.as_mut() else {
            self.set_state(PlaybackState::Idle);
            return;
        };
        session.advance(dt_ms);
        let completed = session.is_complete();
        if completed {
            session.global_time = if session.is_reversed {
                0.0
            } else {
                session.span()
            };
        }
        self.evaluate_session(now);

        if completed {
            for outcome in self.batches.force_flush(now) {
                self.record_flush(outcome);
            }
            if let Some(session) = self.session.take() {
                self.end_session(session, StopReason::Completed);
            }
            self.set_state(PlaybackState::Idle);
        }
    }

    /// Per-track pipeline for every session track at the current session time.
    fn evaluate_session(&mut self, now: Instant) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let loaded = Arc::clone(&session.animation);
        let global_time = session.global_time;
        let lookups: Vec<(TrackId, Option<TrackInfo>)> = session
            .tracks
            .iter()
            .map(|t| (t.clone(), self.registry.track(t)))
            .collect();
        let any_solo = lookups
            .iter()
            .any(|(_, info)| info.as_ref().is_some_and(|i| i.solo));

        let mut max_loop = 0;
        for (track, info) in lookups {
            let Some(info) = info else {
                self.metrics.missing_tracks += 1;
                self.report_missing(&track);
                continue;
            };
            if info.muted || (any_solo && !info.solo) {
                continue;
            }
            self.metrics.tracks_evaluated += 1;

            let (local, outcome) = sample(&loaded, &track, global_time);
            max_loop = max_loop.max(local.loop_index);
            if !outcome.position.is_finite() {
                self.metrics.invalid_positions += 1;
                if let Some(suppressed) = self.invalid_warning.check(now) {
                    log::warn!(
                        "non-finite position for {track} at local t={:.3}s; skipped ({suppressed} more suppressed)",
                        local.time
                    );
                }
                self.pending.push_event(EngineEvent::InvalidPosition {
                    track,
                    local_time: local.time,
                });
                continue;
            }
            if outcome.passthrough == Some(Passthrough::MissingTrackEntry) {
                self.report_passthrough(&track);
            }
            self.commit(&track, outcome.position, info.device_channel, now);
        }
        if let Some(session) = self.session.as_mut() {
            session.loop_count = max_loop;
        }
    }

    /// Write a position back to the registry and, if the track has a channel,
    /// queue it for every device.
    fn commit(&mut self, track: &TrackId, position: Position, channel: Option<u32>, now: Instant) {
        if !self.registry.set_position(track, position) {
            log::trace!("{track} vanished from the registry before write-back");
        }
        if let Some(runtime) = self.tracks.get_mut(track) {
            runtime.current_position = position;
        }
        self.pending.push_change(track.clone(), position);

        let Some(channel) = channel.filter(|c| *c >= 1) else {
            return;
        };
        let mut outcomes = Vec::new();
        for (device, system) in &self.devices {
            let message = OutgoingMessage {
                device_channel: channel,
                position,
                coordinate_system: *system,
            };
            outcomes.extend(self.batches.add_message(device, message, now));
        }
        for outcome in outcomes {
            self.record_flush(outcome);
        }
    }

    // ----- helpers -----

    fn require(
        &self,
        allowed: fn(&PlaybackState) -> bool,
        command: &'static str,
    ) -> Result<(), EngineError> {
        if allowed(&self.state) {
            return Ok(());
        }
        if self.session.is_none() && !self.state.is_transitioning() {
            return Err(EngineError::NoActiveSession);
        }
        Err(EngineError::InvalidTransition {
            command,
            state: self.state,
        })
    }

    /// World position of a track at its own local t=0.
    fn start_pose(&mut self, loaded: &LoadedAnimation, track: &TrackId) -> Option<Position> {
        let (local, outcome) = sample(loaded, track, 0.0);
        if outcome.position.is_finite() {
            Some(outcome.position)
        } else {
            self.metrics.invalid_positions += 1;
            self.pending.push_event(EngineEvent::InvalidPosition {
                track: track.clone(),
                local_time: local.time,
            });
            None
        }
    }

    fn current_position(&self, track: &TrackId) -> Position {
        self.tracks
            .get(track)
            .map(|r| r.current_position)
            .or_else(|| self.registry.track(track).map(|i| i.position))
            .unwrap_or_default()
    }

    fn device_channel(&self, track: &TrackId) -> Option<u32> {
        match self.registry.track(track) {
            Some(info) => info.device_channel,
            None => self.tracks.get(track).and_then(|r| r.device_channel),
        }
    }

    fn set_state(&mut self, to: PlaybackState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        log::debug!("playback {} -> {}", from.name(), to.name());
        self.pending
            .push_event(EngineEvent::StateChanged { from, to });
    }

    fn cancel_transition(&mut self) {
        if let Some(transition) = self.transition.take() {
            transition.token().cancel();
            self.metrics.transitions_cancelled += 1;
            log::debug!("cancelled {:?} transition", transition.kind());
            self.pending.push_event(EngineEvent::TransitionCancelled {
                kind: transition.kind(),
            });
        }
    }

    fn end_session(&mut self, session: PlayingSession, reason: StopReason) {
        if reason == StopReason::Completed {
            self.metrics.sessions_completed += 1;
        }
        log::info!(
            "{}: {} ended ({reason:?}) at {:.3}s",
            session.id,
            session.animation.animation.id,
            session.global_time
        );
        self.pending.push_event(EngineEvent::SessionStopped {
            session: session.id,
            animation: session.animation.animation.id.clone(),
            reason,
        });
    }

    fn report_missing(&mut self, track: &TrackId) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.reported_missing.insert(track.clone()) {
            log::error!("{}: session track {track} is missing from the registry", session.id);
            self.pending.push_event(EngineEvent::TrackMissing {
                track: track.clone(),
            });
        }
    }

    fn report_passthrough(&mut self, track: &TrackId) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.reported_passthrough.insert(track.clone()) {
            log::warn!("{}: track {track} passes through untransformed", session.id);
            self.pending.push_event(EngineEvent::TransformPassthrough {
                session: session.id,
                track: track.clone(),
            });
        }
    }

    fn record_flush(&mut self, outcome: FlushOutcome) {
        if let FlushOutcome::Dropped {
            device,
            messages,
            error,
        } = outcome
        {
            self.metrics.batches_dropped += 1;
            self.metrics.messages_dropped += messages as u64;
            self.pending.push_event(EngineEvent::BatchDropped {
                device,
                messages,
                reason: error.to_string(),
            });
        }
    }

    fn collect_reports(&mut self) {
        for report in self.batches.transport().drain_reports() {
            match report {
                DispatchReport::Sent { .. } => {}
                DispatchReport::Failed { device, error, .. } => {
                    self.metrics.dispatch_failures += 1;
                    self.pending
                        .push_event(EngineEvent::DispatchFailed { device, error });
                }
                DispatchReport::Discarded { device, messages } => {
                    self.metrics.stale_batches_discarded += 1;
                    log::debug!("discarded {messages} stale message(s) for {device}");
                }
                DispatchReport::BufferCleared { device } => {
                    log::debug!("send buffer cleared for {device}");
                }
            }
        }
    }
}
