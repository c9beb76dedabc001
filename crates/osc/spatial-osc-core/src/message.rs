//! Outgoing message and batch types.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use spatial_motion_core::Position;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Cartesian,
    Polar,
}

impl CoordinateSystem {
    /// Trailing address segment: `xyz` or `aed`.
    #[inline]
    pub fn address_tag(&self) -> &'static str {
        match self {
            Self::Cartesian => "xyz",
            Self::Polar => "aed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMessage {
    pub device_channel: u32,
    pub position: Position,
    pub coordinate_system: CoordinateSystem,
}

impl OutgoingMessage {
    /// `/track/<channel>/<xyz|aed>`
    pub fn address(&self) -> String {
        format!(
            "/track/{}/{}",
            self.device_channel,
            self.coordinate_system.address_tag()
        )
    }

    /// The three float arguments: x,y,z or azimuth,elevation,distance.
    pub fn args(&self) -> [f32; 3] {
        match self.coordinate_system {
            CoordinateSystem::Cartesian => [
                self.position.x as f32,
                self.position.y as f32,
                self.position.z as f32,
            ],
            CoordinateSystem::Polar => {
                let (a, e, d) = self.position.to_polar();
                [a as f32, e as f32, d as f32]
            }
        }
    }
}

/// Coalesced updates for one device: at most one message per channel.
#[derive(Clone, Debug)]
pub struct OutgoingBatch {
    pub messages: BTreeMap<u32, OutgoingMessage>,
    pub timestamp: Instant,
}

impl OutgoingBatch {
    pub fn new(timestamp: Instant) -> Self {
        Self {
            messages: BTreeMap::new(),
            timestamp,
        }
    }

    /// Insert or replace the channel's message (last write wins).
    pub fn upsert(&mut self, message: OutgoingMessage) {
        self.messages.insert(message.device_channel, message);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutgoingMessage> {
        self.messages.values()
    }

    /// Split into batches of at most `size` messages, in channel order.
    pub fn into_chunks(self, size: usize) -> Vec<OutgoingBatch> {
        let size = size.max(1);
        if self.messages.len() <= size {
            return vec![self];
        }
        let mut chunks = Vec::with_capacity(self.messages.len().div_ceil(size));
        let mut current = OutgoingBatch::new(self.timestamp);
        for (channel, message) in self.messages {
            if current.len() == size {
                chunks.push(std::mem::replace(
                    &mut current,
                    OutgoingBatch::new(self.timestamp),
                ));
            }
            current.messages.insert(channel, message);
        }
        chunks.push(current);
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn address_follows_channel_and_system() {
        let msg = OutgoingMessage {
            device_channel: 7,
            position: Position::new(0.0, 1.0, 0.0),
            coordinate_system: CoordinateSystem::Polar,
        };
        assert_eq!(msg.address(), "/track/7/aed");
        let [a, e, d] = msg.args();
        assert_abs_diff_eq!(a, 90.0, epsilon = 1e-4);
        assert_abs_diff_eq!(e, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn upsert_keeps_last_write_per_channel() {
        let mut batch = OutgoingBatch::new(Instant::now());
        for x in 0..3 {
            batch.upsert(OutgoingMessage {
                device_channel: 1,
                position: Position::new(x as f64, 0.0, 0.0),
                coordinate_system: CoordinateSystem::Cartesian,
            });
        }
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.messages[&1].position.x, 2.0);
    }
}
