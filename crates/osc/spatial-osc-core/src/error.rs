//! Error types for OSC batching and dispatch

use spatial_motion_core::DeviceId;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum OscError {
    /// Packet encoding failed
    #[error("Failed to encode OSC packet: {reason}")]
    Encode { reason: String },

    /// Socket-level failure
    #[error("Network error on device {device}: {source}")]
    Io {
        device: DeviceId,
        #[source]
        source: std::io::Error,
    },

    /// Device host/port did not resolve to a socket address
    #[error("Cannot resolve address {host}:{port} for device {device}")]
    Resolve {
        device: DeviceId,
        host: String,
        port: u16,
    },

    /// No socket configured for the device
    #[error("Unknown device: {device}")]
    UnknownDevice { device: DeviceId },

    /// Too many messages sent but not yet written for this device
    #[error("In-flight limit reached for device {device}: {in_flight} of {cap}")]
    InFlightLimit {
        device: DeviceId,
        in_flight: usize,
        cap: usize,
    },

    /// The dispatcher work queue is at capacity
    #[error("Dispatch queue full for device {device}")]
    QueueFull { device: DeviceId },

    /// The dispatcher worker has shut down
    #[error("Dispatcher is shut down")]
    Disconnected,

    /// The dispatcher worker thread could not be started
    #[error("Failed to start dispatcher worker: {source}")]
    Worker {
        #[source]
        source: std::io::Error,
    },
}

impl OscError {
    /// Errors after which the next batch may well go through.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::QueueFull { .. } | Self::InFlightLimit { .. } | Self::Io { .. }
        )
    }

    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Encode { .. } => "encoding",
            Self::Io { .. } | Self::Resolve { .. } => "network",
            Self::UnknownDevice { .. } => "config",
            Self::QueueFull { .. } | Self::InFlightLimit { .. } => "backpressure",
            Self::Disconnected | Self::Worker { .. } => "lifecycle",
        }
    }
}

impl From<rosc::OscError> for OscError {
    fn from(err: rosc::OscError) -> Self {
        Self::Encode {
            reason: err.to_string(),
        }
    }
}
