//! spatial-osc
//!
//! Outbound side of the motion engine. The [`batch::OscBatchManager`] coalesces
//! per-tick track updates and throttles them independently of the tick rate; the
//! [`dispatcher::NetworkDispatcher`] owns one UDP socket per device and turns each
//! batch into a single OSC bundle on a worker thread, so the scheduler never
//! waits on the network.

pub mod batch;
pub mod dispatcher;
pub mod error;
pub mod inflight;
pub mod message;
pub mod throttle;
pub mod transport;
pub mod wire;

pub use batch::{BatchConfig, BatchStats, FlushOutcome, OscBatchManager};
pub use dispatcher::{DeviceConfig, DispatcherConfig, NetworkDispatcher};
pub use error::OscError;
pub use inflight::{InFlightPermit, InFlightTracker};
pub use message::{CoordinateSystem, OutgoingBatch, OutgoingMessage};
pub use throttle::{AdaptiveThrottle, RateLimitedWarning};
pub use transport::{DeviceTransport, DispatchReport};
