use crate::fabric::connection::Observer;
use argus_contracts::dashboard::ParticipantSummary;
use argus_contracts::frames::{DASHBOARD_ROOM, Frame, participant_room};
use argus_contracts::source::SourceAnalysisSummary;
use argus_core::SyncEvents;
use async_trait::async_trait;
use dashmap::DashMap;
use std::{fmt, sync::Arc};
use tracing::debug;
use uuid::Uuid;

/// Observer registry and room membership for the live channel.
///
/// Fan-out is best-effort unicast-to-room: no buffering beyond each
/// observer's bounded queue, no replay, and never any back-pressure on the
/// producing request.
#[derive(Clone, Default)]
pub struct FabricManager {
    /// Active observers mapped by connection ID
    observers: Arc<DashMap<Uuid, Arc<Observer>>>,
    /// Room name to member connection IDs
    rooms: Arc<DashMap<String, Vec<Uuid>>>,
}

impl fmt::Debug for FabricManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FabricManager")
            .field("observer_count", &self.observers.len())
            .field("room_count", &self.rooms.len())
            .finish()
    }
}

impl FabricManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer connection.
    pub fn add_observer(&self, observer: Arc<Observer>) {
        self.observers.insert(observer.id, observer);
    }

    /// Remove an observer and clean up room membership.
    pub fn remove_observer(&self, observer_id: Uuid) {
        self.observers.remove(&observer_id);
        for mut room in self.rooms.iter_mut() {
            room.value_mut().retain(|id| id != &observer_id);
        }
        self.rooms.retain(|_, members| !members.is_empty());
    }

    /// Add an observer to a room.
    pub fn join_room(&self, room: String, observer_id: Uuid) {
        let mut members = self.rooms.entry(room).or_default();
        if !members.contains(&observer_id) {
            members.push(observer_id);
        }
    }

    /// Number of observers currently joined to a room.
    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|members| members.len()).unwrap_or(0)
    }

    /// Push a frame to every member of a room. Slow observers lose the
    /// frame rather than slowing the caller.
    pub fn broadcast_to_room(&self, room: &str, frame: &Frame) {
        let members = match self.rooms.get(room) {
            Some(members) => members.clone(),
            None => return,
        };
        for observer_id in members {
            if let Some(observer) = self.observers.get(&observer_id) {
                if !observer.push(frame.clone()) {
                    debug!(%observer_id, room, "dropped frame for lagging observer");
                }
            }
        }
    }

    /// Fan out a participant update to the dashboard and the participant's
    /// own room.
    pub fn participant_updated(&self, summary: ParticipantSummary) {
        let room = participant_room(summary.id);
        let frame = Frame::ParticipantUpdated(summary);
        self.broadcast_to_room(DASHBOARD_ROOM, &frame);
        self.broadcast_to_room(&room, &frame);
    }

    /// Fan out an alert to the dashboard room.
    pub fn alert(&self, frame: Frame) {
        self.broadcast_to_room(DASHBOARD_ROOM, &frame);
    }
}

#[async_trait]
impl SyncEvents for FabricManager {
    async fn source_analysis_updated(&self, summary: SourceAnalysisSummary) {
        self.broadcast_to_room(DASHBOARD_ROOM, &Frame::SourceAnalysisUpdated(summary));
    }
}
