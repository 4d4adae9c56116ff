//! Ephemeral presence: local cursor mode, peer cursors and reactions.
//!
//! Nothing here is part of a document snapshot or of history.

use crate::replication::{ChannelEvent, CursorPosition, SessionId};
use kurbo::Point;
use std::collections::HashMap;

/// Minimum spacing between emitted reactions while the pointer is held.
pub const REACTION_INTERVAL_MS: u64 = 100;
/// Reactions disappear this long after they were created.
pub const REACTION_LIFETIME_MS: u64 = 4000;

/// What the local cursor is currently doing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CursorMode {
    #[default]
    Hidden,
    Chat {
        message: String,
        previous_message: Option<String>,
    },
    ReactionSelector,
    Reaction {
        reaction: String,
        pressed: bool,
    },
}

/// A reaction placed on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub point: Point,
    pub value: String,
    pub timestamp_ms: u64,
}

/// Last known presence of another peer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeerPresence {
    pub cursor: Option<Point>,
    pub message: Option<String>,
}

/// Local and remote presence state.
#[derive(Debug, Clone, Default)]
pub struct PresenceState {
    mode: CursorMode,
    cursor: Option<Point>,
    peers: HashMap<SessionId, PeerPresence>,
    reactions: Vec<Reaction>,
    last_emit_ms: Option<u64>,
    dirty: bool,
}

impl PresenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &CursorMode {
        &self.mode
    }

    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    pub fn peers(&self) -> &HashMap<SessionId, PeerPresence> {
        &self.peers
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    /// Keyboard shortcut. Returns true if the key was consumed.
    pub fn handle_key(&mut self, key: &str) -> bool {
        if matches!(self.mode, CursorMode::Chat { .. }) && key != "Escape" {
            return false;
        }
        match key {
            "/" => {
                self.mode = CursorMode::Chat {
                    message: String::new(),
                    previous_message: None,
                };
            }
            "Escape" => {
                self.mode = CursorMode::Hidden;
                self.dirty = true;
            }
            "e" => self.mode = CursorMode::ReactionSelector,
            _ => return false,
        }
        true
    }

    /// Update the draft chat message.
    pub fn set_chat_message(&mut self, text: &str) {
        if let CursorMode::Chat { message, .. } = &mut self.mode {
            *message = text.to_string();
            self.dirty = true;
        }
    }

    /// Send the draft: it becomes the previous message and the draft clears.
    pub fn submit_chat(&mut self) {
        if let CursorMode::Chat {
            message,
            previous_message,
        } = &mut self.mode
        {
            *previous_message = Some(std::mem::take(message));
            self.dirty = true;
        }
    }

    pub fn select_reaction(&mut self, value: &str) {
        self.mode = CursorMode::Reaction {
            reaction: value.to_string(),
            pressed: false,
        };
    }

    pub fn pointer_move(&mut self, point: Point) {
        if self.cursor.is_some() && self.mode == CursorMode::ReactionSelector {
            return;
        }
        self.cursor = Some(point);
        self.dirty = true;
    }

    pub fn pointer_down(&mut self, point: Point) {
        self.cursor = Some(point);
        self.dirty = true;
        if let CursorMode::Reaction { pressed, .. } = &mut self.mode {
            *pressed = true;
        }
    }

    pub fn pointer_up(&mut self) {
        if let CursorMode::Reaction { pressed, .. } = &mut self.mode {
            *pressed = false;
        }
    }

    pub fn pointer_leave(&mut self) {
        self.mode = CursorMode::Hidden;
        self.cursor = None;
        self.dirty = true;
    }

    /// Current chat text shared with peers.
    fn shared_message(&self) -> Option<String> {
        match &self.mode {
            CursorMode::Chat { message, .. } => Some(message.clone()),
            _ => None,
        }
    }

    /// Presence event to send, if anything changed since the last call.
    pub fn take_update(&mut self, sender: &str) -> Option<ChannelEvent> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        Some(ChannelEvent::Presence {
            sender: sender.to_string(),
            cursor: self.cursor.map(|p| CursorPosition { x: p.x, y: p.y }),
            message: self.shared_message(),
        })
    }

    /// Advance time: expire reactions and emit one while a reaction is held.
    pub fn tick(&mut self, now_ms: u64, sender: &str) -> Option<ChannelEvent> {
        self.reactions
            .retain(|r| r.timestamp_ms + REACTION_LIFETIME_MS > now_ms);

        let CursorMode::Reaction {
            reaction,
            pressed: true,
        } = &self.mode
        else {
            return None;
        };
        let cursor = self.cursor?;
        if self
            .last_emit_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < REACTION_INTERVAL_MS)
        {
            return None;
        }
        let value = reaction.clone();
        self.last_emit_ms = Some(now_ms);
        self.reactions.push(Reaction {
            point: cursor,
            value: value.clone(),
            timestamp_ms: now_ms,
        });
        Some(ChannelEvent::Reaction {
            sender: sender.to_string(),
            x: cursor.x,
            y: cursor.y,
            value,
        })
    }

    pub fn apply_presence(
        &mut self,
        sender: &str,
        cursor: Option<CursorPosition>,
        message: Option<String>,
    ) {
        let peer = self.peers.entry(sender.to_string()).or_default();
        peer.cursor = cursor.map(|c| Point::new(c.x, c.y));
        peer.message = message;
    }

    pub fn add_remote_reaction(&mut self, point: Point, value: String, now_ms: u64) {
        self.reactions.push(Reaction {
            point,
            value,
            timestamp_ms: now_ms,
        });
    }

    pub fn remove_peer(&mut self, sender: &str) {
        self.peers.remove(sender);
    }
}
