use serde::Serialize;

/// Running counters since the engine was created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EngineMetrics {
    pub ticks: u64,
    pub tracks_evaluated: u64,
    pub invalid_positions: u64,
    pub missing_tracks: u64,
    pub batches_dropped: u64,
    pub messages_dropped: u64,
    pub dispatch_failures: u64,
    pub stale_batches_discarded: u64,
    pub transitions_cancelled: u64,
    pub sessions_started: u64,
    pub sessions_completed: u64,
}
