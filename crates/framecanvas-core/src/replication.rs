//! Snapshot replication: channel events, broadcast coalescing and the remote
//! apply queue.
//!
//! Replication is whole-document last-writer-wins. Every committed mutation
//! schedules a broadcast that is flushed on the next animation frame, reading
//! the live document at that moment. Received snapshots are queued and applied
//! one at a time in arrival order.

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Identifier of one engine instance on the channel.
pub type SessionId = String;

/// Create a fresh session identifier.
pub fn new_session_id() -> SessionId {
    Uuid::new_v4().to_string()
}

/// A cursor position in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Events exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChannelEvent {
    /// Full document snapshot.
    CanvasSync { sender: SessionId, snapshot: String },
    /// Ask peers to rebroadcast their document.
    CanvasSyncRequest { sender: SessionId },
    /// Ephemeral cursor and chat message.
    Presence {
        sender: SessionId,
        cursor: Option<CursorPosition>,
        message: Option<String>,
    },
    /// A reaction emoji dropped at a point.
    Reaction {
        sender: SessionId,
        x: f64,
        y: f64,
        value: String,
    },
}

impl ChannelEvent {
    pub fn sender(&self) -> &str {
        match self {
            ChannelEvent::CanvasSync { sender, .. }
            | ChannelEvent::CanvasSyncRequest { sender }
            | ChannelEvent::Presence { sender, .. }
            | ChannelEvent::Reaction { sender, .. } => sender,
        }
    }
}

/// Something received from the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(ChannelEvent),
    /// A peer disconnected; carries the peer's session id.
    PeerLeft { sender: SessionId },
}

/// Fire-and-forget pub/sub channel shared by all peers of a document.
pub trait RealtimeChannel {
    /// Send an event to every other peer.
    fn broadcast(&mut self, event: &ChannelEvent) -> EngineResult<()>;

    /// Drain everything received since the last poll.
    fn poll(&mut self) -> Vec<Inbound>;
}

/// Broadcast coalescing and remote apply queue for one session.
#[derive(Debug, Clone)]
pub struct Replicator {
    session: SessionId,
    pending: bool,
    force: bool,
    last_broadcast: Option<String>,
    remote_queue: VecDeque<String>,
}

impl Replicator {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            pending: false,
            force: false,
            last_broadcast: None,
            remote_queue: VecDeque::new(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// True for events this session sent itself.
    pub fn is_own(&self, event: &ChannelEvent) -> bool {
        event.sender() == self.session
    }

    /// Mark a broadcast as due on the next frame. `force` skips the
    /// unchanged-since-last-broadcast check.
    pub fn schedule(&mut self, force: bool) {
        self.pending = true;
        self.force |= force;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending flag and decide whether `current` must go out.
    pub fn take_due(&mut self, current: &str) -> Option<ChannelEvent> {
        if !std::mem::take(&mut self.pending) {
            return None;
        }
        let force = std::mem::take(&mut self.force);
        if !force && self.last_broadcast.as_deref() == Some(current) {
            return None;
        }
        self.last_broadcast = Some(current.to_string());
        Some(ChannelEvent::CanvasSync {
            sender: self.session.clone(),
            snapshot: current.to_string(),
        })
    }

    /// Record a snapshot every peer already has, so it is not sent back.
    pub fn mark_in_sync(&mut self, snapshot: String) {
        self.last_broadcast = Some(snapshot);
    }

    pub fn sync_request(&self) -> ChannelEvent {
        ChannelEvent::CanvasSyncRequest {
            sender: self.session.clone(),
        }
    }

    pub fn enqueue_remote(&mut self, snapshot: String) {
        self.remote_queue.push_back(snapshot);
    }

    pub fn next_remote(&mut self) -> Option<String> {
        self.remote_queue.pop_front()
    }

    pub fn queued_remote(&self) -> usize {
        self.remote_queue.len()
    }
}
