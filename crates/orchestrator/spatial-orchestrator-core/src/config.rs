//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use spatial_motion_core::Easing;
use spatial_osc::{BatchConfig, DeviceConfig, DispatcherConfig};

use crate::error::EngineError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThrottleConfig {
    pub base_interval_ms: f64,
    pub max_interval_ms: f64,
    pub adaptive: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 33.0,
            max_interval_ms: 100.0,
            adaptive: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransitionConfig {
    pub go_to_start_ms: f64,
    pub return_ms: f64,
    pub easing: Easing,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            go_to_start_ms: 400.0,
            return_ms: 1000.0,
            easing: Easing::EaseInOutCubic,
        }
    }
}

/// Everything the engine and its scheduler thread need to run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub tick_rate_hz: f64,
    pub throttle: ThrottleConfig,
    pub batching_enabled: bool,
    pub max_batch_size: usize,
    /// Per-device cap on messages submitted but not yet written.
    pub max_in_flight: usize,
    pub dispatch_queue_capacity: usize,
    pub send_buffer_bytes: usize,
    /// Bound on undelivered scheduler updates before they are dropped.
    pub update_channel_capacity: usize,
    pub transitions: TransitionConfig,
    pub devices: Vec<DeviceConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            throttle: ThrottleConfig::default(),
            batching_enabled: true,
            max_batch_size: 64,
            max_in_flight: 128,
            dispatch_queue_capacity: 256,
            send_buffer_bytes: 64 * 1024,
            update_channel_capacity: 4096,
            transitions: TransitionConfig::default(),
            devices: Vec::new(),
        }
    }
}

fn positive(name: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{name} must be finite and > 0, got {value}"
        )))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{name} must be finite and >= 0, got {value}"
        )))
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        positive("tickRateHz", self.tick_rate_hz)?;
        positive("throttle.baseIntervalMs", self.throttle.base_interval_ms)?;
        positive("throttle.maxIntervalMs", self.throttle.max_interval_ms)?;
        if self.throttle.max_interval_ms < self.throttle.base_interval_ms {
            return Err(EngineError::Config(
                "throttle.maxIntervalMs must be >= throttle.baseIntervalMs".into(),
            ));
        }
        non_negative("transitions.goToStartMs", self.transitions.go_to_start_ms)?;
        non_negative("transitions.returnMs", self.transitions.return_ms)?;
        for (name, value) in [
            ("maxBatchSize", self.max_batch_size),
            ("maxInFlight", self.max_in_flight),
            ("dispatchQueueCapacity", self.dispatch_queue_capacity),
            ("sendBufferBytes", self.send_buffer_bytes),
            ("updateChannelCapacity", self.update_channel_capacity),
        ] {
            if value == 0 {
                return Err(EngineError::Config(format!("{name} must be > 0")));
            }
        }
        if self.max_batch_size > self.max_in_flight {
            return Err(EngineError::Config(format!(
                "maxBatchSize ({}) must not exceed maxInFlight ({})",
                self.max_batch_size, self.max_in_flight
            )));
        }
        let mut seen = hashbrown::HashSet::new();
        for device in &self.devices {
            if device.port == 0 {
                return Err(EngineError::Config(format!(
                    "device {} has no port",
                    device.id
                )));
            }
            if !seen.insert(&device.id) {
                return Err(EngineError::Config(format!(
                    "device {} configured twice",
                    device.id
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            enabled: self.batching_enabled,
            base_interval: Duration::from_secs_f64(self.throttle.base_interval_ms / 1000.0),
            max_interval: Duration::from_secs_f64(self.throttle.max_interval_ms / 1000.0),
            adaptive: self.throttle.adaptive,
            max_batch_size: self.max_batch_size,
            max_in_flight: self.max_in_flight,
            ..BatchConfig::default()
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.dispatch_queue_capacity,
            send_buffer_bytes: self.send_buffer_bytes,
            ..DispatcherConfig::default()
        }
    }
}
