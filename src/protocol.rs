use serde::{Deserialize, Serialize};

use crate::room::RoomId;

fn default_username() -> String {
    "Guest".to_string()
}

/// Messages accepted from clients. Unknown tags fail to parse and are
/// dropped by the dispatcher without closing the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinQueue {
        #[serde(default = "default_username")]
        username: String,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: RoomId, username: String },
    #[serde(rename_all = "camelCase")]
    ProblemSolved {
        room_id: RoomId,
        username: String,
        /// Client-side solve time. Carried on the wire but not used for
        /// arbitration; the first claim processed wins.
        #[serde(default)]
        timestamp: Option<u64>,
    },
}

/// A player entry inside a `paired` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub username: String,
}

/// A participant's view of a decided game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Won,
    Lost,
}

/// Messages sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Waiting,
    #[serde(rename_all = "camelCase")]
    Paired {
        room_id: RoomId,
        players: Vec<PlayerEntry>,
    },
    #[serde(rename_all = "camelCase")]
    JoinedRoom { room_id: RoomId },
    #[serde(rename_all = "camelCase")]
    GameResult { result: Outcome, winner: String },
    Error { message: String },
}

impl ServerMessage {
    /// Serializes the message to its wire representation.
    ///
    /// # Panics
    ///
    /// Panics if serialization fails, which cannot happen for these
    /// variants with the default JSON serializer.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).expect("server message serialization cannot fail")
    }
}
