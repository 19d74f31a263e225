use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::protocol::ServerMessage;
use crate::room::{Room, RoomId};

/// Errors reported back to a requesting connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,
}

/// What happened to a solved-claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This claim committed the winner and the result was broadcast.
    Accepted,
    /// A winner was already set; the claim was a no-op.
    AlreadyDecided,
    /// No such room; the claim was dropped.
    UnknownRoom,
}

/// The authoritative in-memory room table, plus the connection registry
/// mapping each live connection to its (room, participant) pair.
///
/// Rooms are independent, so each sits behind its own mutex; the outer
/// table lock is only held to look an `Arc` up or to insert/remove.
/// Winner arbitration and the result broadcast happen inside one room
/// lock hold, so every broadcast reflects the snapshot that committed
/// the winner.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<RoomId, Arc<Mutex<Room>>>>>,
    registry: Arc<RwLock<HashMap<ConnectionId, (RoomId, String)>>>,
    next_seq: Arc<AtomicU64>,
    retention: Option<Duration>,
}

impl RoomManager {
    /// Rooms are retained for the lifetime of the process.
    pub fn new() -> Self {
        Self::with_retention(None)
    }

    /// With `retention` set, a decided room is removed that long after
    /// the winner commit. Requires a tokio runtime when set.
    pub fn with_retention(retention: Option<Duration>) -> Self {
        RoomManager {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            registry: Arc::new(RwLock::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
            retention,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap().len()
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.read().unwrap().contains_key(room_id)
    }

    /// The decided winner of a room, if any.
    pub fn winner(&self, room_id: &RoomId) -> Option<String> {
        let room = self.room(room_id)?;
        let room = room.lock().unwrap();
        room.winner().map(str::to_string)
    }

    /// Creates a room for freshly paired players, each entering with
    /// their pairing-time connection. Participant order is arrival order.
    pub(crate) fn create_room(
        &self,
        players: impl IntoIterator<Item = (String, ConnectionHandle)>,
    ) -> RoomId {
        let room_id = RoomId::generate(self.next_seq.fetch_add(1, Ordering::Relaxed));
        let mut room = Room::new(room_id.clone());
        {
            let mut registry = self.registry.write().unwrap();
            for (username, handle) in players {
                registry.insert(handle.id(), (room_id.clone(), username.clone()));
                room.ensure_participant(&username).attach(handle);
            }
        }
        self.rooms
            .write()
            .unwrap()
            .insert(room_id.clone(), Arc::new(Mutex::new(room)));
        info!("room {room_id} created");
        room_id
    }

    fn room(&self, room_id: &RoomId) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().unwrap().get(room_id).cloned()
    }

    /// Registers a connection into a room under `username`, creating the
    /// participant record if the name is new to the room. Acknowledges
    /// with `joinedRoom`, and if the room is already decided, immediately
    /// sends this connection the matching `gameResult` so a late or
    /// reconnecting participant still learns the outcome.
    pub fn join_room(
        &self,
        room_id: &RoomId,
        username: &str,
        handle: ConnectionHandle,
    ) -> Result<(), RoomError> {
        let room = self.room(room_id).ok_or(RoomError::RoomNotFound)?;
        let mut room = room.lock().unwrap();

        self.registry
            .write()
            .unwrap()
            .insert(handle.id(), (room_id.clone(), username.to_string()));

        let caller = handle.clone();
        room.ensure_participant(username).attach(handle);

        caller.send(ServerMessage::JoinedRoom {
            room_id: room_id.clone(),
        });
        if let Some(result) = room.result_for(username) {
            caller.send(result);
        }
        Ok(())
    }

    /// Resolves a participant's claim that they satisfied the room's win
    /// condition. The first claim per room commits the winner and
    /// broadcasts the personalized `gameResult` to every open connection
    /// of every participant; every later claim is a no-op.
    pub fn claim_solved(&self, room_id: &RoomId, username: &str) -> ClaimOutcome {
        let Some(room) = self.room(room_id) else {
            debug!("solved claim by {username} for unknown room {room_id}, dropped");
            return ClaimOutcome::UnknownRoom;
        };
        let mut room = room.lock().unwrap();

        if !room.set_winner(username) {
            debug!(
                "solved claim by {username} in {room_id} ignored, already decided for {}",
                room.winner().unwrap_or("?")
            );
            return ClaimOutcome::AlreadyDecided;
        }

        info!("room {room_id} decided: {username} won");
        room.broadcast_result(username);
        drop(room);

        if let Some(ttl) = self.retention {
            self.schedule_removal(room_id.clone(), ttl);
        }
        ClaimOutcome::Accepted
    }

    fn schedule_removal(&self, room_id: RoomId, ttl: Duration) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            manager.remove_room(&room_id);
        });
    }

    /// Drops a room and every registry entry pointing at it.
    pub fn remove_room(&self, room_id: &RoomId) {
        if self.rooms.write().unwrap().remove(room_id).is_none() {
            return;
        }
        self.registry
            .write()
            .unwrap()
            .retain(|_, (registered, _)| *registered != *room_id);
        info!("room {room_id} expired and was removed");
    }

    /// Removes a closed connection from its registered participant.
    /// The participant record and the room persist; a participant with
    /// zero connections may still reconnect via `joinRoom`.
    pub fn handle_disconnect(&self, connection_id: ConnectionId) {
        let entry = self.registry.write().unwrap().remove(&connection_id);
        let Some((room_id, username)) = entry else {
            return;
        };
        if let Some(room) = self.room(&room_id) {
            let mut room = room.lock().unwrap();
            if let Some(participant) = room.participant_mut(&username) {
                participant.detach(connection_id);
            }
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
