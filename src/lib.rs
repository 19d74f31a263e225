//! Real-time 1v1 matchmaking and room-state synchronization.
//!
//! Two anonymous clients join a queue, get paired into a room, and race
//! to satisfy a shared win condition. The first accepted solved-claim
//! decides the room permanently, and the outcome is broadcast to every
//! open connection of every participant. Connections that join or rejoin
//! after the decision receive the result as a catch-up on `joinRoom`.
//!
//! The crate is transport-agnostic: connections are channel handles, and
//! the optional `server` feature provides an axum WebSocket binary that
//! feeds the [`dispatch::Dispatcher`].
//!
//! What this crate deliberately does not do: persist anything across
//! restarts, scale past one process, or verify identity. Usernames are
//! self-declared strings and a reconnect is matched purely by name, so
//! anyone who knows a room id and a participant's name can join as them.
//! That trust model is inherited from the original design.
//!
//! ## Example
//! ```
//! use codeduel::connection::ConnectionHandle;
//! use codeduel::dispatch::Dispatcher;
//! use codeduel::protocol::ServerMessage;
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = Dispatcher::new();
//!
//! let (tx, mut alice_rx) = mpsc::unbounded_channel();
//! let alice = ConnectionHandle::new(tx);
//! let (tx, mut bob_rx) = mpsc::unbounded_channel();
//! let bob = ConnectionHandle::new(tx);
//!
//! dispatcher.handle_text(&alice, r#"{"type":"joinQueue","username":"Alice"}"#);
//! assert_eq!(alice_rx.recv().await, Some(ServerMessage::Waiting));
//!
//! dispatcher.handle_text(&bob, r#"{"type":"joinQueue","username":"Bob"}"#);
//! assert!(matches!(alice_rx.recv().await, Some(ServerMessage::Paired { .. })));
//! assert!(matches!(bob_rx.recv().await, Some(ServerMessage::Paired { .. })));
//! # }
//! ```

pub mod connection;
pub mod dispatch;
pub mod matchmaking;
pub mod protocol;
pub mod room;
pub mod room_manager;

pub use connection::{ConnectionHandle, ConnectionId};
pub use dispatch::Dispatcher;
pub use matchmaking::{EnqueueOutcome, Matchmaker};
pub use protocol::{ClientMessage, Outcome, PlayerEntry, ServerMessage};
pub use room::{Participant, Room, RoomId};
pub use room_manager::{ClaimOutcome, RoomError, RoomManager};
