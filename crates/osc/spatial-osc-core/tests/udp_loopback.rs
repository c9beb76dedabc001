use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rosc::{OscPacket, OscType};
use spatial_motion_core::{DeviceId, Position};
use spatial_osc::{
    BatchConfig, CoordinateSystem, DeviceConfig, DeviceTransport, DispatchReport,
    DispatcherConfig, NetworkDispatcher, OscBatchManager, OutgoingMessage,
};

fn receiver() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("timeout");
    let port = socket.local_addr().expect("addr").port();
    (socket, port)
}

fn wait_for_reports(transport: &dyn DeviceTransport, want: usize) -> Vec<DispatchReport> {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut reports = Vec::new();
    while reports.len() < want && Instant::now() < deadline {
        reports.extend(transport.drain_reports());
        std::thread::sleep(Duration::from_millis(5));
    }
    reports
}

#[test]
fn batch_arrives_as_one_bundle() {
    let (socket, port) = receiver();
    let device = DeviceId::new("renderer");
    let dispatcher = Arc::new(
        NetworkDispatcher::new(
            &[DeviceConfig::new(device.clone(), "127.0.0.1", port)],
            DispatcherConfig::default(),
        )
        .expect("dispatcher"),
    );
    let mut mgr = OscBatchManager::new(BatchConfig::default(), dispatcher.clone());
    let now = Instant::now();
    for (channel, x) in [(3u32, 1.0), (1, 2.0)] {
        mgr.add_message(
            &device,
            OutgoingMessage {
                device_channel: channel,
                position: Position::new(x, 0.0, -1.0),
                coordinate_system: CoordinateSystem::Cartesian,
            },
            now,
        );
    }
    assert_eq!(mgr.maybe_flush(now).len(), 1);

    let mut buf = [0u8; 2048];
    let (len, _) = socket.recv_from(&mut buf).expect("datagram");
    let (_, packet) = rosc::decoder::decode_udp(&buf[..len]).expect("decode");
    let OscPacket::Bundle(bundle) = packet else {
        panic!("expected a bundle");
    };
    assert_eq!(bundle.content.len(), 2);
    let OscPacket::Message(first) = &bundle.content[0] else {
        panic!("expected a message");
    };
    assert_eq!(first.addr, "/track/1/xyz");
    assert_eq!(
        first.args,
        vec![OscType::Float(2.0), OscType::Float(0.0), OscType::Float(-1.0)]
    );

    let reports = wait_for_reports(dispatcher.as_ref(), 1);
    assert!(matches!(
        reports.first(),
        Some(DispatchReport::Sent { messages: 2, .. })
    ));
    assert_eq!(mgr.in_flight(&device), 0);
}

#[test]
fn clearing_the_buffer_reports_and_keeps_sending() {
    let (socket, port) = receiver();
    let device = DeviceId::new("renderer");
    let dispatcher = NetworkDispatcher::new(
        &[DeviceConfig::new(device.clone(), "127.0.0.1", port)
            .with_coordinate_system(CoordinateSystem::Polar)],
        DispatcherConfig::default(),
    )
    .expect("dispatcher");

    dispatcher.clear_device_buffer(&device).expect("clear");
    let reports = wait_for_reports(&dispatcher, 1);
    assert_eq!(
        reports,
        vec![DispatchReport::BufferCleared {
            device: device.clone()
        }]
    );

    let transport: Arc<dyn DeviceTransport> = Arc::new(dispatcher);
    let mut mgr = OscBatchManager::new(BatchConfig::default(), transport);
    let now = Instant::now();
    mgr.add_message(
        &device,
        OutgoingMessage {
            device_channel: 2,
            position: Position::new(0.0, 2.0, 0.0),
            coordinate_system: CoordinateSystem::Polar,
        },
        now,
    );
    mgr.force_flush(now);

    let mut buf = [0u8; 1024];
    let (len, _) = socket.recv_from(&mut buf).expect("datagram");
    let (_, packet) = rosc::decoder::decode_udp(&buf[..len]).expect("decode");
    let OscPacket::Bundle(bundle) = packet else {
        panic!("expected a bundle");
    };
    let OscPacket::Message(msg) = &bundle.content[0] else {
        panic!("expected a message");
    };
    assert_eq!(msg.addr, "/track/2/aed");
}

#[test]
fn unknown_device_is_rejected() {
    let dispatcher =
        NetworkDispatcher::new(&[], DispatcherConfig::default()).expect("dispatcher");
    let err = dispatcher
        .clear_device_buffer(&DeviceId::new("ghost"))
        .expect_err("unknown");
    assert_eq!(err.category(), "config");
}
