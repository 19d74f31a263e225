use std::sync::{Arc, Mutex};

use log::debug;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::protocol::{PlayerEntry, ServerMessage};
use crate::room_manager::RoomManager;

struct WaitingPlayer {
    username: String,
    handle: ConnectionHandle,
}

/// What `enqueue` did with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Parked as the sole waiting player.
    Waiting,
    /// Paired with the previously waiting player into a new room.
    Paired(crate::room::RoomId),
}

/// Pairs anonymous players head-to-head.
///
/// Holds at most one waiting player. The whole check-and-swap on the
/// slot, including room creation and both `paired` sends, runs under the
/// slot lock, so two simultaneous enqueues can never both park and a
/// close event can never race the pairing.
#[derive(Clone)]
pub struct Matchmaker {
    rooms: RoomManager,
    waiting: Arc<Mutex<Option<WaitingPlayer>>>,
}

impl Matchmaker {
    pub fn new(rooms: RoomManager) -> Self {
        Matchmaker {
            rooms,
            waiting: Arc::new(Mutex::new(None)),
        }
    }

    /// Parks the caller if nobody is waiting, otherwise consumes the
    /// waiting slot and creates a room for both players. Each side is
    /// told the full player list in arrival order. A send failing here
    /// does not undo the pairing; a dead connection is expected to come
    /// back through `joinRoom`.
    pub fn enqueue(&self, username: &str, handle: ConnectionHandle) -> EnqueueOutcome {
        let mut waiting = self.waiting.lock().unwrap();

        let Some(first) = waiting.take() else {
            debug!("{username} parked in queue");
            handle.send(ServerMessage::Waiting);
            *waiting = Some(WaitingPlayer {
                username: username.to_string(),
                handle,
            });
            return EnqueueOutcome::Waiting;
        };

        let players = vec![
            PlayerEntry {
                username: first.username.clone(),
            },
            PlayerEntry {
                username: username.to_string(),
            },
        ];
        let room_id = self.rooms.create_room([
            (first.username.clone(), first.handle.clone()),
            (username.to_string(), handle.clone()),
        ]);
        debug!("paired {} with {username} in {room_id}", first.username);

        let paired = ServerMessage::Paired {
            room_id: room_id.clone(),
            players,
        };
        first.handle.send(paired.clone());
        handle.send(paired);

        EnqueueOutcome::Paired(room_id)
    }

    /// Clears the waiting slot iff it holds this connection. Called from
    /// the transport's close handler; takes the same lock as `enqueue`.
    pub fn cancel_waiting(&self, connection_id: ConnectionId) {
        let mut waiting = self.waiting.lock().unwrap();
        if waiting
            .as_ref()
            .is_some_and(|w| w.handle.id() == connection_id)
        {
            debug!("waiting player left the queue before pairing");
            *waiting = None;
        }
    }

    #[cfg(test)]
    fn waiting_count(&self) -> usize {
        usize::from(self.waiting.lock().unwrap().is_some())
    }
}
