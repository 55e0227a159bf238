//! The live notification relay.
//!
//! Each connected client sits in a room keyed by its own account ID; state
//! transitions emit into the counterpart's room. Delivery is best-effort and
//! at-most-once: nothing is persisted here, lagged receivers drop frames,
//! and a client that is offline simply misses the push. Within one room,
//! frames arrive in emission order.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::event::application::ApplicationStatus;

/// Frames pushed to clients. The `event` tag matches what the frontend
/// listens for.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RelayEvent {
    NewApplication {
        event_id: Uuid,
        event_name: String,
        staff_id: Uuid,
        staff_name: String,
    },
    ApplicationCancelled {
        event_id: Uuid,
        event_name: String,
        staff_id: Uuid,
        staff_name: String,
    },
    ApplicationReviewed {
        event_id: Uuid,
        event_name: String,
        status: ApplicationStatus,
    },
    Message {
        text: String,
    },
}

impl RelayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayEvent::NewApplication { .. } => "new-application",
            RelayEvent::ApplicationCancelled { .. } => "application-cancelled",
            RelayEvent::ApplicationReviewed { .. } => "application-reviewed",
            RelayEvent::Message { .. } => "message",
        }
    }
}

const ROOM_CAPACITY: usize = 64;

pub struct Relay {
    rooms: RwLock<HashMap<Uuid, broadcast::Sender<String>>>,
    all: broadcast::Sender<String>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

impl Relay {
    pub fn new() -> Self {
        let (all, _) = broadcast::channel(ROOM_CAPACITY);

        Self {
            rooms: RwLock::new(HashMap::new()),
            all,
        }
    }

    /// Subscribes to the room for the given account, creating it on first
    /// join.
    pub async fn join(&self, room: Uuid) -> broadcast::Receiver<String> {
        let mut rooms = self.rooms.write().await;

        rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Subscribes to the channel every connected client receives.
    pub fn subscribe_all(&self) -> broadcast::Receiver<String> {
        self.all.subscribe()
    }

    /// Emits into one room. A room with no connected clients drops the frame
    /// on the floor; that is the contract.
    pub async fn emit(&self, room: Uuid, event: &RelayEvent) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!(%error, "failed to serialize relay frame");
                return;
            }
        };

        let mut rooms = self.rooms.write().await;
        if let Some(sender) = rooms.get(&room) {
            if sender.send(frame).is_err() {
                // the last subscriber hung up; drop the empty room
                rooms.remove(&room);
            }
        }
    }

    /// Broadcasts to every connected client, room membership aside.
    pub fn broadcast(&self, event: &RelayEvent) {
        if let Ok(frame) = serde_json::to_string(event) {
            // an Err here just means nobody is connected
            let _ = self.all.send(frame);
        }
    }
}
