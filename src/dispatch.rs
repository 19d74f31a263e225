use std::time::Duration;

use log::debug;

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::matchmaking::Matchmaker;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room_manager::RoomManager;

/// Entry point for the core: owns the room table and the matchmaker and
/// routes every inbound event (message or close) to them.
///
/// Nothing here is fatal: a malformed or misdirected message is dropped
/// or answered with an `error` event on the offending connection only.
#[derive(Clone)]
pub struct Dispatcher {
    rooms: RoomManager,
    matchmaker: Matchmaker,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_room_retention(None)
    }

    /// `retention` controls how long decided rooms outlive their result;
    /// `None` keeps them for the lifetime of the process.
    pub fn with_room_retention(retention: Option<Duration>) -> Self {
        let rooms = RoomManager::with_retention(retention);
        let matchmaker = Matchmaker::new(rooms.clone());
        Dispatcher { rooms, matchmaker }
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Parses and dispatches one raw inbound frame. Unparseable payloads
    /// and unknown tags are dropped silently; the connection stays open.
    pub fn handle_text(&self, handle: &ConnectionHandle, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(handle, message),
            Err(err) => debug!("dropping malformed message from {}: {err}", handle.id()),
        }
    }

    pub fn handle_message(&self, handle: &ConnectionHandle, message: ClientMessage) {
        match message {
            ClientMessage::JoinQueue { username } => {
                self.matchmaker.enqueue(&username, handle.clone());
            }
            ClientMessage::JoinRoom { room_id, username } => {
                if let Err(err) = self.rooms.join_room(&room_id, &username, handle.clone()) {
                    handle.send(ServerMessage::Error {
                        message: err.to_string(),
                    });
                }
            }
            ClientMessage::ProblemSolved {
                room_id,
                username,
                timestamp: _,
            } => {
                self.rooms.claim_solved(&room_id, &username);
            }
        }
    }

    /// Transport-level close: frees the waiting slot if this connection
    /// held it, then detaches the connection from its room participant.
    pub fn handle_close(&self, connection_id: ConnectionId) {
        self.matchmaker.cancel_waiting(connection_id);
        self.rooms.handle_disconnect(connection_id);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
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

    #[tokio::test]
    async fn test_malformed_payload_dropped_connection_untouched() {
        let dispatcher = Dispatcher::new();
        let (h, mut rx) = handle();

        dispatcher.handle_text(&h, "not json at all");
        dispatcher.handle_text(&h, r#"{"type":"unknownThing"}"#);
        dispatcher.handle_text(&h, r#"{"type":"joinRoom"}"#); // missing fields

        assert!(rx.try_recv().is_err());
        assert!(h.is_open());
    }

    #[tokio::test]
    async fn test_join_unknown_room_reports_error_to_caller_only() {
        let dispatcher = Dispatcher::new();
        let (h, mut rx) = handle();
        let (other, mut other_rx) = handle();

        dispatcher.handle_text(
            &h,
            r#"{"type":"joinRoom","roomId":"room-0-404","username":"Alice"}"#,
        );

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerMessage::Error {
                message: "room not found".to_string()
            }
        );
        assert!(other_rx.try_recv().is_err());
        drop(other);
    }

    #[tokio::test]
    async fn test_join_queue_over_the_wire() {
        let dispatcher = Dispatcher::new();
        let (h, mut rx) = handle();

        dispatcher.handle_text(&h, r#"{"type":"joinQueue","username":"Alice"}"#);
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::Waiting);
    }

    #[tokio::test]
    async fn test_solved_claim_for_unknown_room_silent() {
        let dispatcher = Dispatcher::new();
        let (h, mut rx) = handle();

        dispatcher.handle_text(
            &h,
            r#"{"type":"problemSolved","roomId":"room-0-404","username":"Alice","timestamp":1}"#,
        );
        // No client-visible error for a misdirected claim.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_clears_waiting_slot() {
        let dispatcher = Dispatcher::new();
        let (alice, _alice_rx) = handle();
        dispatcher.handle_text(&alice, r#"{"type":"joinQueue","username":"Alice"}"#);
        dispatcher.handle_close(alice.id());

        // Bob parks instead of being paired with the departed Alice.
        let (bob, mut bob_rx) = handle();
        dispatcher.handle_text(&bob, r#"{"type":"joinQueue","username":"Bob"}"#);
        assert_eq!(bob_rx.try_recv().unwrap(), ServerMessage::Waiting);
        assert_eq!(dispatcher.rooms().room_count(), 0);
    }
}
