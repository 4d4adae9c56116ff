//! Recording fakes for the surface and channel contracts.
//!
//! Both fakes are cheap handles over shared state: keep a clone, hand the
//! other to the engine, and inspect what the engine did.

use crate::error::EngineResult;
use crate::objects::{ObjectId, SerializableColor};
use crate::replication::{ChannelEvent, Inbound, RealtimeChannel};
use crate::surface::DrawingSurface;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Default)]
struct ChannelLog {
    sent: Vec<ChannelEvent>,
    inbox: VecDeque<Inbound>,
}

/// Channel that records broadcasts and replays queued inbound items.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    log: Rc<RefCell<ChannelLog>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything broadcast so far.
    pub fn sent(&self) -> Vec<ChannelEvent> {
        self.log.borrow().sent.clone()
    }

    /// Number of `canvas-sync` broadcasts.
    pub fn broadcast_count(&self) -> usize {
        self.log
            .borrow()
            .sent
            .iter()
            .filter(|e| matches!(e, ChannelEvent::CanvasSync { .. }))
            .count()
    }

    /// Most recent `canvas-sync` snapshot.
    pub fn last_snapshot(&self) -> Option<String> {
        self.log.borrow().sent.iter().rev().find_map(|e| match e {
            ChannelEvent::CanvasSync { snapshot, .. } => Some(snapshot.clone()),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.log.borrow_mut().sent.clear();
    }

    /// Queue an item for the next poll.
    pub fn push_incoming(&self, inbound: Inbound) {
        self.log.borrow_mut().inbox.push_back(inbound);
    }
}

impl RealtimeChannel for RecordingChannel {
    fn broadcast(&mut self, event: &ChannelEvent) -> EngineResult<()> {
        self.log.borrow_mut().sent.push(event.clone());
        Ok(())
    }

    fn poll(&mut self) -> Vec<Inbound> {
        self.log.borrow_mut().inbox.drain(..).collect()
    }
}

#[derive(Debug, Default)]
struct SurfaceLog {
    redraws: usize,
    freehand: bool,
    selection: Vec<ObjectId>,
    text_edits: Vec<ObjectId>,
}

/// Surface that counts redraws and remembers mode switches.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    log: Rc<RefCell<SurfaceLog>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redraws(&self) -> usize {
        self.log.borrow().redraws
    }

    pub fn freehand_enabled(&self) -> bool {
        self.log.borrow().freehand
    }

    pub fn shown_selection(&self) -> Vec<ObjectId> {
        self.log.borrow().selection.clone()
    }

    pub fn text_edits(&self) -> Vec<ObjectId> {
        self.log.borrow().text_edits.clone()
    }
}

impl DrawingSurface for RecordingSurface {
    fn request_redraw(&mut self) {
        self.log.borrow_mut().redraws += 1;
    }

    fn set_freehand_mode(&mut self, enabled: bool, _color: SerializableColor, _width: f64) {
        self.log.borrow_mut().freehand = enabled;
    }

    fn show_selection(&mut self, ids: &[ObjectId]) {
        self.log.borrow_mut().selection = ids.to_vec();
    }

    fn begin_text_edit(&mut self, id: ObjectId) {
        self.log.borrow_mut().text_edits.push(id);
    }
}
