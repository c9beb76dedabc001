use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use spatial_motion_core::{DeviceId, Position};
use spatial_osc::{
    BatchConfig, CoordinateSystem, DeviceTransport, FlushOutcome, InFlightPermit,
    OscBatchManager, OscError, OutgoingBatch, OutgoingMessage,
};

/// Holds every permit it is given, like a device that never drains.
#[derive(Default)]
struct StalledTransport {
    held: Mutex<Vec<(OutgoingBatch, InFlightPermit)>>,
}

impl DeviceTransport for StalledTransport {
    fn submit(
        &self,
        _device: &DeviceId,
        batch: OutgoingBatch,
        permit: InFlightPermit,
    ) -> Result<(), OscError> {
        self.held.lock().push((batch, permit));
        Ok(())
    }

    fn clear_device_buffer(&self, _device: &DeviceId) -> Result<(), OscError> {
        self.held.lock().clear();
        Ok(())
    }
}

fn message(channel: u32, x: f64) -> OutgoingMessage {
    OutgoingMessage {
        device_channel: channel,
        position: Position::new(x, 0.0, 0.0),
        coordinate_system: CoordinateSystem::Cartesian,
    }
}

#[test]
fn in_flight_cap_drops_excess_instead_of_queueing() {
    let transport = Arc::new(StalledTransport::default());
    let config = BatchConfig {
        max_in_flight: 50,
        ..BatchConfig::default()
    };
    let mut mgr = OscBatchManager::new(config, transport.clone());
    let device = DeviceId::new("renderer");
    let start = Instant::now();

    let mut dropped = 0;
    for i in 0..200u32 {
        let now = start + Duration::from_micros(u64::from(i));
        mgr.add_message(&device, message(1, f64::from(i)), now);
        for outcome in mgr.force_flush(now) {
            if let FlushOutcome::Dropped { error, .. } = outcome {
                assert!(matches!(error, OscError::InFlightLimit { cap: 50, .. }));
                dropped += 1;
            }
        }
        assert!(mgr.in_flight(&device) <= 50);
    }

    assert_eq!(transport.held.lock().len(), 50);
    assert_eq!(dropped, 150);
    assert_eq!(mgr.stats().batches_sent, 50);
    assert_eq!(mgr.stats().messages_dropped, 150);
    // one warning for the whole burst; the rest fall inside the warning period
    assert_eq!(mgr.stats().overflow_warnings, 1);
    assert!(!mgr.has_pending());
}

#[test]
fn slots_free_up_once_the_transport_releases() {
    let transport = Arc::new(StalledTransport::default());
    let config = BatchConfig {
        max_in_flight: 2,
        ..BatchConfig::default()
    };
    let mut mgr = OscBatchManager::new(config, transport.clone());
    let device = DeviceId::new("renderer");
    let now = Instant::now();

    for i in 0..3 {
        mgr.add_message(&device, message(1, f64::from(i)), now);
        mgr.force_flush(now);
    }
    assert_eq!(mgr.in_flight(&device), 2);

    mgr.clear_device_buffer(&device).expect("clear");
    assert_eq!(mgr.in_flight(&device), 0);

    mgr.add_message(&device, message(1, 9.0), now);
    assert!(mgr.force_flush(now).iter().all(|o| !o.is_dropped()));
}

#[test]
fn pending_batch_keeps_one_message_per_channel() {
    let transport = Arc::new(StalledTransport::default());
    let mut mgr = OscBatchManager::new(BatchConfig::default(), transport.clone());
    let device = DeviceId::new("renderer");
    let now = Instant::now();

    for x in 0..5 {
        mgr.add_message(&device, message(1, f64::from(x)), now);
        mgr.add_message(&device, message(2, -f64::from(x)), now);
    }
    assert_eq!(mgr.pending_len(&device), 2);
    mgr.force_flush(now);

    let held = transport.held.lock();
    let (batch, permit) = &held[0];
    assert_eq!(permit.messages(), 2);
    assert_eq!(batch.messages[&1].position.x, 4.0);
    assert_eq!(batch.messages[&2].position.x, -4.0);
}

#[test]
fn interval_backs_off_under_sustained_pressure() {
    let transport = Arc::new(StalledTransport::default());
    let config = BatchConfig {
        max_in_flight: 10,
        ..BatchConfig::default()
    };
    let base = config.base_interval;
    let max = config.max_interval;
    let mut mgr = OscBatchManager::new(config, transport.clone());
    let device = DeviceId::new("renderer");
    let now = Instant::now();

    for i in 0..10 {
        mgr.add_message(&device, message(1, f64::from(i)), now);
        mgr.force_flush(now);
    }
    assert!(mgr.current_interval() > base);
    assert!(mgr.current_interval() <= max);
}
