use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerMessage;

/// Identifies one live client connection for the duration of its socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sending half of one client connection.
///
/// The transport layer owns the socket; the core only holds this handle.
/// A handle is open while the transport's writer task is still draining
/// the channel, and sends to a closed handle are silently skipped.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<ServerMessage>) -> Self {
        ConnectionHandle {
            id: ConnectionId::new(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Sends a message if the connection is still open. Closed connections
    /// are skipped, not retried: a client that missed a message recovers
    /// via the `joinRoom` catch-up, never via server-side redelivery.
    pub fn send(&self, message: ServerMessage) {
        let _ = self.sender.send(message);
    }
}

/// Fans a message out to every currently-open connection in the set.
pub fn deliver<'a, I>(connections: I, message: &ServerMessage)
where
    I: IntoIterator<Item = &'a ConnectionHandle>,
{
    for connection in connections {
        if connection.is_open() {
            connection.send(message.clone());
        }
    }
}
