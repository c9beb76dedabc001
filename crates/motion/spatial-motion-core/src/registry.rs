//! Track registry contract consumed by the engine.
//!
//! The host project owns its tracks; the engine reads `TrackInfo` every tick and
//! writes the evaluated position back.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ids::TrackId;
use crate::position::Position;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Device channel (>= 1); `None` means the track is never dispatched.
    #[serde(default, rename = "deviceChannel")]
    pub device_channel: Option<u32>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
}

impl TrackInfo {
    pub fn new(device_channel: Option<u32>, position: Position) -> Self {
        Self {
            device_channel: device_channel.filter(|c| *c >= 1),
            position,
            muted: false,
            solo: false,
        }
    }
}

pub trait TrackRegistry: Send {
    fn track(&self, id: &TrackId) -> Option<TrackInfo>;

    /// Returns false when the track does not exist.
    fn set_position(&mut self, id: &TrackId, position: Position) -> bool;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryTrackRegistry {
    tracks: HashMap<TrackId, TrackInfo>,
}

impl InMemoryTrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<TrackId>, info: TrackInfo) -> Option<TrackInfo> {
        self.tracks.insert(id.into(), info)
    }

    pub fn remove(&mut self, id: &TrackId) -> Option<TrackInfo> {
        self.tracks.remove(id)
    }

    pub fn get(&self, id: &TrackId) -> Option<&TrackInfo> {
        self.tracks.get(id)
    }

    pub fn get_mut(&mut self, id: &TrackId) -> Option<&mut TrackInfo> {
        self.tracks.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TrackId, &TrackInfo)> {
        self.tracks.iter()
    }

    pub fn into_shared(self) -> SharedTrackRegistry {
        SharedTrackRegistry(Arc::new(RwLock::new(self)))
    }
}

impl TrackRegistry for InMemoryTrackRegistry {
    fn track(&self, id: &TrackId) -> Option<TrackInfo> {
        self.tracks.get(id).cloned()
    }

    fn set_position(&mut self, id: &TrackId, position: Position) -> bool {
        match self.tracks.get_mut(id) {
            Some(info) => {
                info.position = position;
                true
            }
            None => false,
        }
    }
}

/// Registry handle shared between the host and the scheduler thread.
#[derive(Clone, Debug, Default)]
pub struct SharedTrackRegistry(Arc<RwLock<InMemoryTrackRegistry>>);

impl SharedTrackRegistry {
    pub fn new(inner: InMemoryTrackRegistry) -> Self {
        inner.into_shared()
    }

    /// Run `f` with write access (host-side edits: mute, solo, channel changes).
    pub fn update<R>(&self, f: impl FnOnce(&mut InMemoryTrackRegistry) -> R) -> R {
        f(&mut self.0.write())
    }

    /// Run `f` with read access.
    pub fn read<R>(&self, f: impl FnOnce(&InMemoryTrackRegistry) -> R) -> R {
        f(&self.0.read())
    }

    pub fn position(&self, id: &TrackId) -> Option<Position> {
        self.0.read().get(id).map(|t| t.position)
    }
}

impl TrackRegistry for SharedTrackRegistry {
    fn track(&self, id: &TrackId) -> Option<TrackInfo> {
        self.0.read().track(id)
    }

    fn set_position(&mut self, id: &TrackId, position: Position) -> bool {
        self.0.write().set_position(id, position)
    }
}
