//! WebSocket client for the room relay.
//!
//! The socket lives on a background thread; the engine side only exchanges
//! messages through channels and never blocks.

use crate::error::{EngineError, EngineResult};
use crate::replication::{ChannelEvent, Inbound, RealtimeChannel};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::{Message, connect};
use url::Url;

/// Messages sent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room, announcing our session id as the peer id.
    Join {
        room: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        peer_id: Option<String>,
    },
    Leave,
    /// Fan an event out to the rest of the room.
    Event { event: ChannelEvent },
}

/// Messages received from the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined { room: String, peer_count: usize },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    Event { from: String, event: ChannelEvent },
    Error { message: String },
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// Commands sent to the socket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// What the socket thread reports back.
enum WireEvent {
    Connected,
    Disconnected,
    Received(Inbound),
    Failed(String),
}

/// [`RealtimeChannel`] backed by a relay connection.
pub struct WebSocketChannel {
    state: ConnectionState,
    cmd_tx: Sender<WsCommand>,
    event_rx: Receiver<WireEvent>,
    _thread: JoinHandle<()>,
}

impl WebSocketChannel {
    /// Connect to `url` and join `room` as `session`.
    pub fn connect(url: &str, room: &str, session: &str) -> EngineResult<Self> {
        let parsed = Url::parse(url).map_err(|e| EngineError::Channel(format!("Invalid URL: {e}")))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(EngineError::Channel(format!(
                "Invalid WebSocket URL scheme: {}",
                parsed.scheme()
            )));
        }
        let join = serde_json::to_string(&ClientMessage::Join {
            room: room.to_string(),
            peer_id: Some(session.to_string()),
        })
        .map_err(|e| EngineError::Channel(e.to_string()))?;

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<WireEvent>();
        let url = url.to_string();
        let handle = thread::spawn(move || run_socket(&url, join, &cmd_rx, &event_tx));

        Ok(Self {
            state: ConnectionState::Connecting,
            cmd_tx,
            event_rx,
            _thread: handle,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl RealtimeChannel for WebSocketChannel {
    fn broadcast(&mut self, event: &ChannelEvent) -> EngineResult<()> {
        let msg = serde_json::to_string(&ClientMessage::Event {
            event: event.clone(),
        })
        .map_err(|e| EngineError::Channel(e.to_string()))?;
        self.cmd_tx
            .send(WsCommand::Send(msg))
            .map_err(|e| EngineError::Channel(format!("Send failed: {e}")))
    }

    fn poll(&mut self) -> Vec<Inbound> {
        let mut inbound = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                WireEvent::Connected => self.state = ConnectionState::Connected,
                WireEvent::Disconnected => self.state = ConnectionState::Disconnected,
                WireEvent::Failed(message) => {
                    log::error!("Relay connection error: {message}");
                    self.state = ConnectionState::Error;
                }
                WireEvent::Received(item) => inbound.push(item),
            }
        }
        inbound
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

fn run_socket(url: &str, join: String, cmd_rx: &Receiver<WsCommand>, event_tx: &Sender<WireEvent>) {
    log::info!("Connecting to relay {url}");
    let (mut socket, response) = match connect(url) {
        Ok(connected) => connected,
        Err(e) => {
            let _ = event_tx.send(WireEvent::Failed(format!("Connection failed: {e}")));
            return;
        }
    };
    log::info!("Relay connected, status: {}", response.status());
    let _ = event_tx.send(WireEvent::Connected);

    #[allow(irrefutable_let_patterns)]
    if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
        let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
    }
    if let Err(e) = socket.send(Message::Text(join)) {
        let _ = event_tx.send(WireEvent::Failed(format!("Join failed: {e}")));
        return;
    }

    loop {
        match cmd_rx.try_recv() {
            Ok(WsCommand::Send(msg)) => {
                if let Err(e) = socket.send(Message::Text(msg)) {
                    log::error!("Relay send error: {e}");
                    break;
                }
            }
            Ok(WsCommand::Close) | Err(TryRecvError::Disconnected) => {
                let _ = socket.close(None);
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match socket.read() {
            Ok(Message::Text(txt)) => {
                if let Some(item) = translate(&txt) {
                    let _ = event_tx.send(WireEvent::Received(item));
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::error!("Relay read error: {e}");
                break;
            }
        }
    }
    log::info!("Relay connection closed");
    let _ = event_tx.send(WireEvent::Disconnected);
}

/// Map a relay message to something the engine consumes.
fn translate(txt: &str) -> Option<Inbound> {
    let msg = match serde_json::from_str::<ServerMessage>(txt) {
        Ok(msg) => msg,
        Err(e) => {
            log::warn!("Unreadable relay message: {e}");
            return None;
        }
    };
    match msg {
        ServerMessage::Event { event, .. } => Some(Inbound::Event(event)),
        ServerMessage::PeerLeft { peer_id } => Some(Inbound::PeerLeft { sender: peer_id }),
        ServerMessage::Joined { room, peer_count } => {
            log::info!("Joined room {room} with {peer_count} peer(s)");
            None
        }
        ServerMessage::PeerJoined { peer_id } => {
            log::debug!("Peer {peer_id} joined");
            None
        }
        ServerMessage::Error { message } => {
            log::warn!("Relay error: {message}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_message_shape() {
        let msg = ClientMessage::Join {
            room: "design".into(),
            peer_id: Some("s1".into()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"join","room":"design","peer_id":"s1"}"#);
    }

    #[test]
    fn test_event_message_nests_channel_event() {
        let msg = ClientMessage::Event {
            event: ChannelEvent::CanvasSyncRequest { sender: "s1".into() },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"event","event":{"type":"canvas-sync-request","sender":"s1"}}"#
        );
    }

    #[test]
    fn test_translate_relay_messages() {
        let event = translate(
            r#"{"type":"event","from":"p","event":{"type":"canvas-sync-request","sender":"p"}}"#,
        );
        assert_eq!(
            event,
            Some(Inbound::Event(ChannelEvent::CanvasSyncRequest { sender: "p".into() }))
        );
        assert_eq!(
            translate(r#"{"type":"peer_left","peer_id":"p"}"#),
            Some(Inbound::PeerLeft { sender: "p".into() })
        );
        assert_eq!(translate(r#"{"type":"joined","room":"r","peer_count":2}"#), None);
        assert_eq!(translate("not json"), None);
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        let result = WebSocketChannel::connect("http://localhost:3030", "r", "s");
        assert!(matches!(result, Err(EngineError::Channel(_))));
    }
}
