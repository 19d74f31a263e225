use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionHandle, ConnectionId, deliver};
use crate::protocol::{Outcome, ServerMessage};

/// Identifier for a room, opaque to clients.
///
/// Time-based with a monotonic sequence suffix so that rooms created in
/// the same millisecond never collide. The sequence counter is owned by
/// the `RoomManager`, not a hidden static.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn generate(seq: u64) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        RoomId(format!("room-{millis}-{seq}"))
    }

    /// Wraps an existing identifier, e.g. one received on the wire.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        RoomId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One named player in a room, across however many connections they hold.
///
/// Identity is the self-declared username, matched by string equality.
/// There is no session token: anyone who joins the room under this name
/// is treated as this participant. That trust assumption is inherited
/// deliberately from the original design.
#[derive(Debug)]
pub struct Participant {
    username: String,
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl Participant {
    pub fn new(username: impl Into<String>) -> Self {
        Participant {
            username: username.into(),
            connections: HashMap::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn attach(&mut self, handle: ConnectionHandle) {
        self.connections.insert(handle.id(), handle);
    }

    /// Removes one connection. The participant record stays in its room
    /// even with zero connections so that a reconnect under the same name
    /// resumes where they left off.
    pub fn detach(&mut self, connection_id: ConnectionId) {
        self.connections.remove(&connection_id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnectionHandle> {
        self.connections.values()
    }
}

/// A head-to-head session: an ordered set of participants and a single
/// write-once winner slot.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    participants: Vec<Participant>,
    winner: Option<String>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Room {
            id,
            participants: Vec::new(),
            winner: None,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant_mut(&mut self, username: &str) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.username() == username)
    }

    /// Finds the participant by name, appending a new record if the name
    /// is not yet present. A client whose first contact is `joinRoom`
    /// (page reload, queue bypassed) lands here.
    pub fn ensure_participant(&mut self, username: &str) -> &mut Participant {
        if let Some(index) = self
            .participants
            .iter()
            .position(|p| p.username() == username)
        {
            &mut self.participants[index]
        } else {
            self.participants.push(Participant::new(username));
            self.participants.last_mut().expect("just pushed")
        }
    }

    /// Commits `username` as the winner iff no winner is set yet.
    /// Returns whether this call performed the commit. Once set, the
    /// winner is never overwritten.
    pub fn set_winner(&mut self, username: &str) -> bool {
        if self.winner.is_some() {
            return false;
        }
        self.winner = Some(username.to_string());
        true
    }

    /// Sends the decided outcome to every open connection of every
    /// participant, personalized per participant. Caller must hold the
    /// room lock so the broadcast reflects the same snapshot that
    /// committed the winner.
    pub fn broadcast_result(&self, winner: &str) {
        for participant in &self.participants {
            let result = if participant.username() == winner {
                Outcome::Won
            } else {
                Outcome::Lost
            };
            deliver(
                participant.connections(),
                &ServerMessage::GameResult {
                    result,
                    winner: winner.to_string(),
                },
            );
        }
    }

    /// The catch-up message for one participant, or `None` while the room
    /// is undecided.
    pub fn result_for(&self, username: &str) -> Option<ServerMessage> {
        self.winner.as_ref().map(|winner| ServerMessage::GameResult {
            result: if winner == username {
                Outcome::Won
            } else {
                Outcome::Lost
            },
            winner: winner.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle() -> (
        ConnectionHandle,
        mpsc::UnboundedReceiver<ServerMessage>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[test]
    fn test_room_ids_distinct_within_same_millisecond() {
        let a = RoomId::generate(0);
        let b = RoomId::generate(1);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("room-"));
    }

    #[test]
    fn test_winner_is_write_once() {
        let mut room = Room::new(RoomId::generate(0));
        assert!(room.set_winner("Alice"));
        assert!(!room.set_winner("Bob"));
        assert!(!room.set_winner("Alice"));
        assert_eq!(room.winner(), Some("Alice"));
    }

    #[test]
    fn test_ensure_participant_appends_once() {
        let mut room = Room::new(RoomId::generate(0));
        room.ensure_participant("Alice");
        room.ensure_participant("Bob");
        room.ensure_participant("Alice");
        assert_eq!(room.participants().len(), 2);
        assert_eq!(room.participants()[0].username(), "Alice");
        assert_eq!(room.participants()[1].username(), "Bob");
    }

    #[tokio::test]
    async fn test_detach_keeps_participant_in_room() {
        let mut room = Room::new(RoomId::generate(0));
        let (h, _rx) = handle();
        let id = h.id();
        room.ensure_participant("Alice").attach(h);
        room.participant_mut("Alice").unwrap().detach(id);

        let alice = room.participant_mut("Alice").unwrap();
        assert_eq!(alice.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_result_personalized() {
        let mut room = Room::new(RoomId::generate(0));
        let (alice_h, mut alice_rx) = handle();
        let (bob_h, mut bob_rx) = handle();
        room.ensure_participant("Alice").attach(alice_h);
        room.ensure_participant("Bob").attach(bob_h);

        room.set_winner("Alice");
        room.broadcast_result("Alice");

        assert_eq!(
            alice_rx.try_recv().unwrap(),
            ServerMessage::GameResult {
                result: Outcome::Won,
                winner: "Alice".to_string()
            }
        );
        assert_eq!(
            bob_rx.try_recv().unwrap(),
            ServerMessage::GameResult {
                result: Outcome::Lost,
                winner: "Alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_open_connection_of_a_participant() {
        let mut room = Room::new(RoomId::generate(0));
        let (tab1, mut rx1) = handle();
        let (tab2, mut rx2) = handle();
        {
            let alice = room.ensure_participant("Alice");
            alice.attach(tab1);
            alice.attach(tab2);
        }

        room.set_winner("Alice");
        room.broadcast_result("Alice");

        for rx in [&mut rx1, &mut rx2] {
            assert!(matches!(
                rx.try_recv().unwrap(),
                ServerMessage::GameResult {
                    result: Outcome::Won,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_result_for_undecided_room_is_none() {
        let room = Room::new(RoomId::generate(0));
        assert!(room.result_for("Alice").is_none());
    }
}
