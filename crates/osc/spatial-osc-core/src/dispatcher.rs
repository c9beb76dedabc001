//! Network dispatcher: one UDP socket per device, drained by a worker thread.
//!
//! The scheduler only ever enqueues. Encoding and the actual `send_to` happen on
//! the `osc-dispatch` worker. Clearing a device buffer bumps the device's
//! generation at once, so batches already queued for it are discarded, and the
//! worker then replaces the socket to drop whatever the kernel still holds.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use spatial_motion_core::DeviceId;

use crate::error::OscError;
use crate::inflight::InFlightPermit;
use crate::message::{CoordinateSystem, OutgoingBatch};
use crate::transport::{DeviceTransport, DispatchReport};
use crate::wire;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: DeviceId,
    pub host: String,
    pub port: u16,
    #[serde(default, rename = "coordinateSystem")]
    pub coordinate_system: CoordinateSystem,
}

impl DeviceConfig {
    pub fn new(id: impl Into<DeviceId>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            coordinate_system: CoordinateSystem::Cartesian,
        }
    }

    pub fn with_coordinate_system(mut self, system: CoordinateSystem) -> Self {
        self.coordinate_system = system;
        self
    }

    fn resolve(&self) -> Result<SocketAddr, OscError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| OscError::Io {
                device: self.id.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| OscError::Resolve {
                device: self.id.clone(),
                host: self.host.clone(),
                port: self.port,
            })
    }
}

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub report_capacity: usize,
    pub send_buffer_bytes: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            report_capacity: 1024,
            send_buffer_bytes: 64 * 1024,
        }
    }
}

struct Job {
    device: DeviceId,
    generation: u64,
    batch: OutgoingBatch,
    permit: InFlightPermit,
}

enum Control {
    ClearBuffer(DeviceId),
    Shutdown,
}

struct DeviceSocket {
    target: SocketAddr,
    socket: UdpSocket,
}

fn open_socket(target: &SocketAddr, send_buffer_bytes: usize) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(*target), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_send_buffer_size(send_buffer_bytes)?;
    socket.set_nonblocking(true)?;
    let local: SocketAddr = if target.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    socket.bind(&local.into())?;
    Ok(socket.into())
}

pub struct NetworkDispatcher {
    jobs: Sender<Job>,
    control: Sender<Control>,
    reports: Receiver<DispatchReport>,
    generations: Arc<HashMap<DeviceId, AtomicU64>>,
    devices: Vec<DeviceConfig>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for NetworkDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkDispatcher")
            .field("devices", &self.devices)
            .field("queued", &self.queued())
            .finish()
    }
}

impl NetworkDispatcher {
    /// Resolve and open every device socket, then start the worker.
    pub fn new(devices: &[DeviceConfig], config: DispatcherConfig) -> Result<Self, OscError> {
        let mut sockets = HashMap::with_capacity(devices.len());
        let mut generations = HashMap::with_capacity(devices.len());
        for device in devices {
            let target = device.resolve()?;
            let socket =
                open_socket(&target, config.send_buffer_bytes).map_err(|source| OscError::Io {
                    device: device.id.clone(),
                    source,
                })?;
            log::debug!("opened OSC socket for {} -> {target}", device.id);
            sockets.insert(device.id.clone(), DeviceSocket { target, socket });
            generations.insert(device.id.clone(), AtomicU64::new(0));
        }

        let (jobs_tx, jobs_rx) = bounded::<Job>(config.queue_capacity.max(1));
        let (control_tx, control_rx) = unbounded::<Control>();
        let (reports_tx, reports_rx) = bounded::<DispatchReport>(config.report_capacity.max(1));
        let generations = Arc::new(generations);

        let worker = Worker {
            sockets,
            generations: Arc::clone(&generations),
            send_buffer_bytes: config.send_buffer_bytes,
            reports: reports_tx,
        };
        let handle = thread::Builder::new()
            .name("osc-dispatch".into())
            .spawn(move || worker.run(jobs_rx, control_rx))
            .map_err(|source| OscError::Worker { source })?;

        Ok(Self {
            jobs: jobs_tx,
            control: control_tx,
            reports: reports_rx,
            generations,
            devices: devices.to_vec(),
            worker: Some(handle),
        })
    }

    /// Jobs waiting for the worker.
    pub fn queued(&self) -> usize {
        self.jobs.len()
    }

    fn generation(&self, device: &DeviceId) -> Result<&AtomicU64, OscError> {
        self.generations
            .get(device)
            .ok_or_else(|| OscError::UnknownDevice {
                device: device.clone(),
            })
    }
}

impl DeviceTransport for NetworkDispatcher {
    fn submit(
        &self,
        device: &DeviceId,
        batch: OutgoingBatch,
        permit: InFlightPermit,
    ) -> Result<(), OscError> {
        let generation = self.generation(device)?.load(Ordering::Acquire);
        let job = Job {
            device: device.clone(),
            generation,
            batch,
            permit,
        };
        match self.jobs.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(OscError::QueueFull {
                device: device.clone(),
            }),
            Err(TrySendError::Disconnected(_)) => Err(OscError::Disconnected),
        }
    }

    fn clear_device_buffer(&self, device: &DeviceId) -> Result<(), OscError> {
        self.generation(device)?.fetch_add(1, Ordering::AcqRel);
        self.control
            .send(Control::ClearBuffer(device.clone()))
            .map_err(|_| OscError::Disconnected)
    }

    fn drain_reports(&self) -> Vec<DispatchReport> {
        self.reports.try_iter().collect()
    }
}

impl Drop for NetworkDispatcher {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("osc-dispatch worker panicked");
            }
        }
    }
}

struct Worker {
    sockets: HashMap<DeviceId, DeviceSocket>,
    generations: Arc<HashMap<DeviceId, AtomicU64>>,
    send_buffer_bytes: usize,
    reports: Sender<DispatchReport>,
}

impl Worker {
    fn run(mut self, jobs: Receiver<Job>, control: Receiver<Control>) {
        loop {
            // control first, so a clear overtakes queued sends
            if !self.drain_control(&control) {
                return;
            }
            select! {
                recv(control) -> msg => match msg {
                    Ok(Control::ClearBuffer(device)) => self.clear(&device),
                    Ok(Control::Shutdown) | Err(_) => return,
                },
                recv(jobs) -> job => match job {
                    Ok(job) => {
                        if !self.drain_control(&control) {
                            return;
                        }
                        self.send(job);
                    }
                    Err(_) => return,
                },
            }
        }
    }

    /// Returns false on shutdown.
    fn drain_control(&mut self, control: &Receiver<Control>) -> bool {
        while let Ok(msg) = control.try_recv() {
            match msg {
                Control::ClearBuffer(device) => self.clear(&device),
                Control::Shutdown => return false,
            }
        }
        true
    }

    fn is_stale(&self, job: &Job) -> bool {
        self.generations
            .get(&job.device)
            .map_or(true, |g| g.load(Ordering::Acquire) != job.generation)
    }

    fn send(&mut self, job: Job) {
        let messages = job.batch.len();
        if self.is_stale(&job) {
            self.report(DispatchReport::Discarded {
                device: job.device,
                messages,
            });
            return;
        }
        let report = match self.write(&job) {
            Ok(bytes) => DispatchReport::Sent {
                device: job.device.clone(),
                messages,
                bytes,
            },
            Err(err) => {
                log::warn!("OSC send to {} failed: {err}", job.device);
                DispatchReport::Failed {
                    device: job.device.clone(),
                    messages,
                    error: err.to_string(),
                }
            }
        };
        // release the slots once the datagram is in the kernel (or lost)
        drop(job.permit);
        self.report(report);
    }

    fn write(&self, job: &Job) -> Result<usize, OscError> {
        let slot = self
            .sockets
            .get(&job.device)
            .ok_or_else(|| OscError::UnknownDevice {
                device: job.device.clone(),
            })?;
        let payload = wire::encode_batch(&job.batch)?;
        slot.socket
            .send_to(&payload, slot.target)
            .map_err(|source| OscError::Io {
                device: job.device.clone(),
                source,
            })
    }

    fn clear(&mut self, device: &DeviceId) {
        let Some(slot) = self.sockets.get_mut(device) else {
            log::warn!("buffer clear requested for unknown device {device}");
            return;
        };
        match open_socket(&slot.target, self.send_buffer_bytes) {
            Ok(fresh) => {
                // dropping the old socket discards its kernel send queue
                slot.socket = fresh;
                log::debug!("recreated OSC socket for {device}");
                self.report(DispatchReport::BufferCleared {
                    device: device.clone(),
                });
            }
            Err(err) => {
                log::error!("failed to recreate OSC socket for {device}: {err}");
                self.report(DispatchReport::Failed {
                    device: device.clone(),
                    messages: 0,
                    error: err.to_string(),
                });
            }
        }
    }

    fn report(&self, report: DispatchReport) {
        if self.reports.try_send(report).is_err() {
            log::trace!("dispatch report dropped: channel full");
        }
    }
}
