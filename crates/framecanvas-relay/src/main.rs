//! FrameCanvas WebSocket Relay Server
//!
//! Fans canvas events out to every other client in the same room. The relay
//! never inspects event payloads and keeps no document state; late joiners
//! ask their peers for the current canvas.
//!
//! ## Protocol
//!
//! Client to server:
//! ```json
//! { "type": "join", "room": "room-id", "peer_id": "session-id" }
//! { "type": "leave" }
//! { "type": "event", "event": { "type": "canvas-sync", "sender": "...", "snapshot": "..." } }
//! ```
//!
//! Server to client: `joined`, `peer_joined`, `peer_left`, `event` (with
//! `from`) and `error`.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;
const ADDR_ENV: &str = "FRAMECANVAS_RELAY_ADDR";
const DEFAULT_ADDR: &str = "0.0.0.0:3030";

/// A message sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room. `peer_id` lets the client choose the id peers see.
    Join {
        room: String,
        #[serde(default)]
        peer_id: Option<String>,
    },
    /// Leave the current room.
    Leave,
    /// Opaque canvas event for the rest of the room.
    Event { event: serde_json::Value },
}

/// A message sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined { room: String, peer_count: usize },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    Event { from: String, event: serde_json::Value },
    Error { message: String },
}

type RoomSender = broadcast::Sender<(String, ServerMessage)>;
type RoomReceiver = broadcast::Receiver<(String, ServerMessage)>;

struct Room {
    tx: RoomSender,
    peers: HashSet<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Shared relay state: active rooms by name.
#[derive(Default)]
struct AppState {
    rooms: DashMap<String, Room>,
}

impl AppState {
    /// Add a peer to a room, creating it on first join.
    ///
    /// Returns `None` if another connection already holds `peer_id` there.
    fn join_room(&self, room_id: &str, peer_id: &str) -> Option<(RoomReceiver, usize)> {
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(Room::new);
        if !room.peers.insert(peer_id.to_string()) {
            return None;
        }
        Some((room.tx.subscribe(), room.peers.len()))
    }

    /// Remove a peer; empty rooms are dropped.
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        let now_empty = match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                room.peers.remove(peer_id);
                room.peers.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove(room_id);
            debug!("Room {} closed", room_id);
        }
    }

    fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            // No subscribers is fine.
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peers.len())
    }
}

/// Per-connection membership.
struct Session {
    peer_id: String,
    room: Option<String>,
    rx: Option<RoomReceiver>,
}

impl Session {
    fn new() -> Self {
        Self {
            peer_id: Uuid::new_v4().to_string(),
            room: None,
            rx: None,
        }
    }

    fn leave(&mut self, state: &AppState) {
        if let Some(room) = self.room.take() {
            state.leave_room(&room, &self.peer_id);
            state.broadcast(
                &room,
                &self.peer_id,
                ServerMessage::PeerLeft {
                    peer_id: self.peer_id.clone(),
                },
            );
            info!("Peer {} left room {}", self.peer_id, room);
        }
        self.rx = None;
    }

    /// Apply one client message. Returns a reply for this client, if any.
    fn handle(&mut self, state: &AppState, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Join { room, peer_id } => {
                self.leave(state);
                let peer_id = peer_id
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| self.peer_id.clone());
                let Some((rx, peer_count)) = state.join_room(&room, &peer_id) else {
                    warn!("Peer id {} already in room {}", peer_id, room);
                    return Some(ServerMessage::Error {
                        message: format!("Peer id {peer_id} is already in room {room}"),
                    });
                };
                self.peer_id = peer_id;
                self.rx = Some(rx);
                self.room = Some(room.clone());
                state.broadcast(
                    &room,
                    &self.peer_id,
                    ServerMessage::PeerJoined {
                        peer_id: self.peer_id.clone(),
                    },
                );
                info!("Peer {} joined room {} ({} peers)", self.peer_id, room, peer_count);
                Some(ServerMessage::Joined { room, peer_count })
            }
            ClientMessage::Leave => {
                self.leave(state);
                None
            }
            ClientMessage::Event { event } => match &self.room {
                Some(room) => {
                    state.broadcast(
                        room,
                        &self.peer_id,
                        ServerMessage::Event {
                            from: self.peer_id.clone(),
                            event,
                        },
                    );
                    None
                }
                None => Some(ServerMessage::Error {
                    message: "Join a room before sending events".to_string(),
                }),
            },
        }
    }
}

fn listen_addr() -> Result<SocketAddr, std::net::AddrParseError> {
    std::env::var(ADDR_ENV)
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framecanvas_relay=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::default());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = listen_addr()?;
    info!("FrameCanvas relay listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> &'static str {
    "FrameCanvas Relay Server - Connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!("Failed to encode server message: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let mut session = Session::new();
    info!("New connection: {}", session.peer_id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => session.handle(&state, client_msg),
                        Err(e) => {
                            warn!("Invalid message from {}: {}", session.peer_id, e);
                            Some(ServerMessage::Error {
                                message: format!("Invalid message: {}", e),
                            })
                        }
                    },
                    Some(Ok(Message::Binary(_))) => Some(ServerMessage::Error {
                        message: "Binary frames are not supported".to_string(),
                    }),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", session.peer_id, e);
                        break;
                    }
                };
                if let Some(out) = reply.as_ref().and_then(encode) {
                    if sender.send(out).await.is_err() {
                        break;
                    }
                }
            }

            msg = async {
                match &mut session.rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending::<Result<(String, ServerMessage), broadcast::error::RecvError>>().await,
                }
            } => {
                match msg {
                    Ok((from, server_msg)) => {
                        if from == session.peer_id {
                            continue;
                        }
                        if let Some(out) = encode(&server_msg) {
                            if sender.send(out).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Peer {} lagged, dropped {} messages", session.peer_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => session.rx = None,
                }
            }
        }
    }

    session.leave(&state);
    info!(
        "Connection closed: {} ({} rooms open)",
        session.peer_id,
        state.rooms.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn join(state: &AppState, room: &str, peer: &str) -> Session {
        let mut session = Session::new();
        session.handle(
            state,
            ClientMessage::Join {
                room: room.into(),
                peer_id: Some(peer.into()),
            },
        );
        session
    }

    #[test]
    fn test_parses_client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","room":"design"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join { peer_id: None, .. }));

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"event","event":{"type":"canvas-sync-request","sender":"a"}}"#,
        )
        .unwrap();
        let ClientMessage::Event { event } = msg else {
            panic!("expected event");
        };
        assert_eq!(event["sender"], "a");
    }

    #[test]
    fn test_server_message_shape() {
        let msg = ServerMessage::PeerLeft {
            peer_id: "a".into(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "peer_left", "peer_id": "a"})
        );
    }

    #[test]
    fn test_join_uses_requested_peer_id() {
        let state = AppState::default();
        let mut session = Session::new();
        let reply = session.handle(
            &state,
            ClientMessage::Join {
                room: "r".into(),
                peer_id: Some("alice".into()),
            },
        );
        assert_eq!(
            reply,
            Some(ServerMessage::Joined {
                room: "r".into(),
                peer_count: 1
            })
        );
        assert_eq!(session.peer_id, "alice");
    }

    #[test]
    fn test_events_reach_other_peers_tagged_with_sender() {
        let state = AppState::default();
        let mut alice = join(&state, "r", "alice");
        let mut bob = join(&state, "r", "bob");
        assert_eq!(state.peer_count("r"), 2);

        let event = json!({"type": "canvas-sync", "sender": "alice", "snapshot": "{}"});
        assert_eq!(
            alice.handle(&state, ClientMessage::Event { event: event.clone() }),
            None
        );

        let rx = bob.rx.as_mut().unwrap();
        let mut seen = Vec::new();
        while let Ok(item) = rx.try_recv() {
            seen.push(item);
        }
        assert_eq!(
            seen.last(),
            Some(&(
                "alice".to_string(),
                ServerMessage::Event {
                    from: "alice".into(),
                    event
                }
            ))
        );
    }

    #[test]
    fn test_event_outside_room_is_an_error() {
        let state = AppState::default();
        let mut session = Session::new();
        let reply = session.handle(&state, ClientMessage::Event { event: json!({}) });
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
    }

    #[test]
    fn test_leaving_last_peer_closes_room() {
        let state = AppState::default();
        let mut alice = join(&state, "r", "alice");
        let mut bob = join(&state, "r", "bob");
        bob.handle(&state, ClientMessage::Leave);
        assert_eq!(state.peer_count("r"), 1);

        let rx = alice.rx.as_mut().unwrap();
        let mut left = false;
        while let Ok((_, msg)) = rx.try_recv() {
            left |= msg == ServerMessage::PeerLeft { peer_id: "bob".into() };
        }
        assert!(left);

        alice.leave(&state);
        assert!(state.rooms.is_empty());
    }

    #[test]
    fn test_duplicate_peer_id_is_rejected() {
        let state = AppState::default();
        let mut first = join(&state, "r", "alice");
        let mut second = Session::new();
        let reply = second.handle(
            &state,
            ClientMessage::Join {
                room: "r".into(),
                peer_id: Some("alice".into()),
            },
        );
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
        assert!(second.room.is_none());
        assert!(second.rx.is_none());

        second.handle(&state, ClientMessage::Leave);
        assert_eq!(state.peer_count("r"), 1);
        first.leave(&state);
        assert!(state.rooms.is_empty());
    }

    #[test]
    fn test_rejoin_moves_between_rooms() {
        let state = AppState::default();
        let mut alice = join(&state, "a", "alice");
        alice.handle(
            &state,
            ClientMessage::Join {
                room: "b".into(),
                peer_id: None,
            },
        );
        assert_eq!(state.peer_count("a"), 0);
        assert_eq!(state.peer_count("b"), 1);
        assert_eq!(alice.room.as_deref(), Some("b"));
    }
}
