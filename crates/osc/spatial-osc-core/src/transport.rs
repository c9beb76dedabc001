//! Seam between the batch manager and whatever delivers batches to devices.

use serde::{Deserialize, Serialize};
use spatial_motion_core::DeviceId;

use crate::error::OscError;
use crate::inflight::InFlightPermit;
use crate::message::OutgoingBatch;

/// Result of one unit of dispatcher work, reported back to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DispatchReport {
    Sent {
        device: DeviceId,
        messages: usize,
        bytes: usize,
    },
    Failed {
        device: DeviceId,
        messages: usize,
        error: String,
    },
    /// Queued before a buffer clear for the device; never sent.
    Discarded { device: DeviceId, messages: usize },
    BufferCleared { device: DeviceId },
}

impl DispatchReport {
    pub fn device(&self) -> &DeviceId {
        match self {
            Self::Sent { device, .. }
            | Self::Failed { device, .. }
            | Self::Discarded { device, .. }
            | Self::BufferCleared { device } => device,
        }
    }
}

/// Non-blocking delivery of batches to devices.
///
/// `submit` must return without waiting on the network. The permit travels with
/// the batch and is dropped once the batch is written, fails or is discarded.
pub trait DeviceTransport: Send + Sync {
    fn submit(
        &self,
        device: &DeviceId,
        batch: OutgoingBatch,
        permit: InFlightPermit,
    ) -> Result<(), OscError>;

    /// Purge anything still queued for the device.
    fn clear_device_buffer(&self, device: &DeviceId) -> Result<(), OscError>;

    fn drain_reports(&self) -> Vec<DispatchReport> {
        Vec::new()
    }
}
