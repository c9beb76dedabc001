//! OSC batch manager: coalescing, throttled flushing and backpressure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use serde::Serialize;
use spatial_motion_core::DeviceId;

use crate::error::OscError;
use crate::inflight::InFlightTracker;
use crate::message::{OutgoingBatch, OutgoingMessage};
use crate::throttle::{AdaptiveThrottle, RateLimitedWarning};
use crate::transport::DeviceTransport;

#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// When false every message is submitted on its own as soon as it is added.
    pub enabled: bool,
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub adaptive: bool,
    /// A pending batch this large is flushed without waiting for the interval.
    pub max_batch_size: usize,
    /// Per-device cap on messages submitted but not yet written.
    pub max_in_flight: usize,
    pub warning_period: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_interval: Duration::from_millis(33),
            max_interval: Duration::from_millis(100),
            adaptive: true,
            max_batch_size: 64,
            max_in_flight: 128,
            warning_period: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub batches_sent: u64,
    pub batches_dropped: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    /// Drop warnings actually logged (the rest were rate-limited away).
    pub overflow_warnings: u64,
    pub current_interval_ms: f64,
}

#[derive(Debug)]
pub enum FlushOutcome {
    Submitted { device: DeviceId, messages: usize },
    Dropped {
        device: DeviceId,
        messages: usize,
        error: OscError,
    },
}

impl FlushOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped { .. })
    }
}

pub struct OscBatchManager {
    config: BatchConfig,
    transport: Arc<dyn DeviceTransport>,
    pending: HashMap<DeviceId, OutgoingBatch>,
    in_flight: HashMap<DeviceId, InFlightTracker>,
    throttle: AdaptiveThrottle,
    overflow_warning: RateLimitedWarning,
    stats: BatchStats,
}

impl std::fmt::Debug for OscBatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OscBatchManager")
            .field("config", &self.config)
            .field("pending_devices", &self.pending.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl OscBatchManager {
    pub fn new(config: BatchConfig, transport: Arc<dyn DeviceTransport>) -> Self {
        let throttle =
            AdaptiveThrottle::new(config.base_interval, config.max_interval, config.adaptive);
        let overflow_warning = RateLimitedWarning::new(config.warning_period);
        let stats = BatchStats {
            current_interval_ms: config.base_interval.as_secs_f64() * 1000.0,
            ..BatchStats::default()
        };
        Self {
            config,
            transport,
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            throttle,
            overflow_warning,
            stats,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Queue one track update. Replaces any pending update for the same channel.
    ///
    /// Returns the flush outcomes when the add itself triggered a send (batching
    /// disabled or the batch reached `max_batch_size`); empty otherwise.
    pub fn add_message(
        &mut self,
        device: &DeviceId,
        message: OutgoingMessage,
        now: Instant,
    ) -> Vec<FlushOutcome> {
        if !self.config.enabled {
            let mut single = OutgoingBatch::new(now);
            single.upsert(message);
            return vec![self.submit(device.clone(), single, now)];
        }

        let batch = self
            .pending
            .entry(device.clone())
            .or_insert_with(|| OutgoingBatch::new(now));
        batch.upsert(message);
        if batch.len() >= self.config.max_batch_size.max(1) {
            let outcomes = self.flush_device(device, now);
            self.throttle.mark_flushed(now);
            return outcomes;
        }
        Vec::new()
    }

    /// Flush every non-empty pending batch if the throttle interval has elapsed.
    pub fn maybe_flush(&mut self, now: Instant) -> Vec<FlushOutcome> {
        if !self.has_pending() || !self.throttle.is_due(now) {
            return Vec::new();
        }
        self.flush_all(now)
    }

    /// Flush everything pending regardless of the throttle.
    pub fn force_flush(&mut self, now: Instant) -> Vec<FlushOutcome> {
        if !self.has_pending() {
            return Vec::new();
        }
        self.flush_all(now)
    }

    /// Discard pending, unflushed messages for every device.
    pub fn clear_batch(&mut self) -> usize {
        let discarded: usize = self.pending.values().map(OutgoingBatch::len).sum();
        self.pending.clear();
        if discarded > 0 {
            log::debug!("discarded {discarded} pending OSC messages");
        }
        discarded
    }

    pub fn clear_device_buffer(&mut self, device: &DeviceId) -> Result<(), OscError> {
        self.pending.remove(device);
        self.transport.clear_device_buffer(device)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.values().any(|b| !b.is_empty())
    }

    pub fn pending_len(&self, device: &DeviceId) -> usize {
        self.pending.get(device).map_or(0, OutgoingBatch::len)
    }

    pub fn in_flight(&self, device: &DeviceId) -> usize {
        self.in_flight
            .get(device)
            .map_or(0, InFlightTracker::in_flight)
    }

    #[inline]
    pub fn current_interval(&self) -> Duration {
        self.throttle.interval()
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn transport(&self) -> &Arc<dyn DeviceTransport> {
        &self.transport
    }

    fn flush_all(&mut self, now: Instant) -> Vec<FlushOutcome> {
        let devices: Vec<DeviceId> = self
            .pending
            .iter()
            .filter(|(_, b)| !b.is_empty())
            .map(|(d, _)| d.clone())
            .collect();
        let outcomes = devices
            .iter()
            .flat_map(|d| self.flush_device(d, now))
            .collect();
        self.throttle.mark_flushed(now);
        outcomes
    }

    /// Submit a device's pending batch, split so no single submit can exceed
    /// the in-flight cap on its own.
    fn flush_device(&mut self, device: &DeviceId, now: Instant) -> Vec<FlushOutcome> {
        let Some(batch) = self.pending.remove(device).filter(|b| !b.is_empty()) else {
            return Vec::new();
        };
        batch
            .into_chunks(self.config.max_in_flight.max(1))
            .into_iter()
            .map(|chunk| self.submit(device.clone(), chunk, now))
            .collect()
    }

    fn submit(&mut self, device: DeviceId, batch: OutgoingBatch, now: Instant) -> FlushOutcome {
        let messages = batch.len();
        let tracker = self
            .in_flight
            .entry(device.clone())
            .or_insert_with(|| InFlightTracker::new(self.config.max_in_flight))
            .clone();
        let cap = tracker.cap();

        let result = match tracker.try_acquire(messages) {
            Some(permit) => self.transport.submit(&device, batch, permit),
            None => Err(OscError::InFlightLimit {
                device: device.clone(),
                in_flight: tracker.in_flight(),
                cap,
            }),
        };

        self.throttle.observe(tracker.in_flight(), cap);
        self.stats.current_interval_ms = self.throttle.interval().as_secs_f64() * 1000.0;

        match result {
            Ok(()) => {
                self.stats.batches_sent += 1;
                self.stats.messages_sent += messages as u64;
                FlushOutcome::Submitted { device, messages }
            }
            Err(error) => {
                self.stats.batches_dropped += 1;
                self.stats.messages_dropped += messages as u64;
                if let Some(suppressed) = self.overflow_warning.check(now) {
                    self.stats.overflow_warnings += 1;
                    log::warn!(
                        "dropping OSC batch of {messages} message(s) for {device}: {error} \
                         ({suppressed} similar drops suppressed)"
                    );
                }
                FlushOutcome::Dropped {
                    device,
                    messages,
                    error,
                }
            }
        }
    }
}
