use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State as AxumState, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Json},
    routing::get,
};
use clap::Parser;
use codeduel::connection::ConnectionHandle;
use codeduel::dispatch::Dispatcher;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

#[derive(Parser, Debug)]
#[command(name = "codeduel-server", about = "1v1 matchmaking WebSocket server")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 4000)]
    port: u16,

    /// Seconds to keep a room after its winner is decided. Omit to keep
    /// rooms for the lifetime of the process.
    #[arg(long)]
    room_ttl_secs: Option<u64>,
}

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let dispatcher = Dispatcher::with_room_retention(args.room_ttl_secs.map(Duration::from_secs));
    let state = AppState { dispatcher };

    let app = Router::new()
        .route("/", get(health))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("matchmaking server listening on ws://{addr}/ws");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}

async fn health(AxumState(state): AxumState<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "active_rooms": state.dispatcher.rooms().room_count(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.dispatcher))
}

async fn handle_socket(socket: WebSocket, dispatcher: Dispatcher) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = ConnectionHandle::new(tx);
    let connection_id = handle.id();
    debug!("connection {connection_id} opened");

    // Drain the core's outbound channel into the socket.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(Message::Text(message.to_wire().into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => dispatcher.handle_text(&handle, text.as_str()),
            Message::Close(_) => break,
            // Binary frames and pings are not part of the protocol.
            _ => {}
        }
    }

    dispatcher.handle_close(connection_id);
    writer.abort();
    debug!("connection {connection_id} closed");
}
