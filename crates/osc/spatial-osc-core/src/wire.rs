//! OSC wire codec: one bundle per batch, immediate time tag.

use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};

use crate::error::OscError;
use crate::message::OutgoingBatch;

/// Immediate timetag (0,1): apply as soon as received.
pub const IMMEDIATE: OscTime = OscTime {
    seconds: 0,
    fractional: 1,
};

pub fn to_packet(batch: &OutgoingBatch) -> OscPacket {
    let content = batch
        .iter()
        .map(|msg| {
            OscPacket::Message(OscMessage {
                addr: msg.address(),
                args: msg.args().iter().map(|v| OscType::Float(*v)).collect(),
            })
        })
        .collect();
    OscPacket::Bundle(OscBundle {
        timetag: IMMEDIATE,
        content,
    })
}

/// Encode a batch into a single datagram payload.
pub fn encode_batch(batch: &OutgoingBatch) -> Result<Vec<u8>, OscError> {
    Ok(rosc::encoder::encode(&to_packet(batch))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CoordinateSystem, OutgoingMessage};
    use spatial_motion_core::Position;
    use std::time::Instant;

    #[test]
    fn bundle_round_trips_through_rosc() {
        let mut batch = OutgoingBatch::new(Instant::now());
        batch.upsert(OutgoingMessage {
            device_channel: 2,
            position: Position::new(1.0, 2.0, 3.0),
            coordinate_system: CoordinateSystem::Cartesian,
        });
        batch.upsert(OutgoingMessage {
            device_channel: 1,
            position: Position::new(-1.0, 0.5, 0.0),
            coordinate_system: CoordinateSystem::Cartesian,
        });
        let bytes = encode_batch(&batch).expect("encode");
        let (_, packet) = rosc::decoder::decode_udp(&bytes).expect("decode");
        let OscPacket::Bundle(bundle) = packet else {
            panic!("expected bundle");
        };
        assert_eq!(bundle.timetag, IMMEDIATE);
        let addrs: Vec<String> = bundle
            .content
            .iter()
            .map(|p| match p {
                OscPacket::Message(m) => m.addr.clone(),
                OscPacket::Bundle(_) => String::new(),
            })
            .collect();
        assert_eq!(addrs, vec!["/track/1/xyz", "/track/2/xyz"]);
        match &bundle.content[1] {
            OscPacket::Message(m) => assert_eq!(
                m.args,
                vec![OscType::Float(1.0), OscType::Float(2.0), OscType::Float(3.0)]
            ),
            OscPacket::Bundle(_) => panic!("nested bundle"),
        }
    }
}
