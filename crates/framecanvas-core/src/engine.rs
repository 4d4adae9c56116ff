//! The engine context: owns the scene and routes host actions, pointer input,
//! surface events and channel traffic through history and replication.
//!
//! Everything runs on the caller's event loop. Deferred work (broadcasts,
//! presence updates, reactions) is flushed by [`Engine::on_animation_frame`].

use crate::config::EngineConfig;
use crate::containment;
use crate::error::{EngineError, EngineResult};
use crate::history::History;
use crate::layers::{LayerExpansion, LayerNode, project_layers};
use crate::media;
use crate::objects::ObjectId;
use crate::presence::PresenceState;
use crate::replication::{ChannelEvent, Inbound, RealtimeChannel, Replicator, new_session_id};
use crate::scene::{DocumentSnapshot, Scene};
use crate::selection::{self, ActiveObjectAttributes, ObjectPatch, Selection, UpdateOptions};
use crate::surface::{DrawingSurface, PointerInput, SurfaceEvent};
use crate::tools::{GestureOutcome, SelectionUpdate, ToolInterpreter, ToolKind, ToolPointer};
use crate::viewport::WheelInput;
use kurbo::{Point, Size};
use serde::Serialize;

/// Why snapshot pushes and broadcasts are currently held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuppressionMode {
    #[default]
    None,
    /// An undo/redo snapshot is being restored.
    RestoringHistory,
    /// A peer's snapshot is being applied.
    ApplyingRemote,
    /// Several objects are changing as one history step.
    BatchMutation,
}

/// Read-only projection for the host UI, rebuilt after every mutation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    pub layers: Vec<LayerNode>,
    pub active_object: Option<ActiveObjectAttributes>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub active_tool: ToolKind,
    /// Increments on every republish.
    pub revision: u64,
}

/// Collaborative canvas engine.
pub struct Engine {
    config: EngineConfig,
    scene: Scene,
    surface: Option<Box<dyn DrawingSurface>>,
    channel: Option<Box<dyn RealtimeChannel>>,
    tools: ToolInterpreter,
    history: History,
    replicator: Replicator,
    selection: Selection,
    presence: PresenceState,
    layer_prefs: LayerExpansion,
    suppression: SuppressionMode,
    errors: Vec<EngineError>,
    view: HostView,
    screen_size: Size,
    clock_ms: u64,
}

impl Engine {
    /// Create an engine with an empty scene.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let scene = Scene::new();
        let mut history = History::new(config.max_history);
        history.reset(scene.serialize()?);
        let session = new_session_id();
        log::info!("Engine session {session} created");
        let mut engine = Self {
            config,
            scene,
            surface: None,
            channel: None,
            tools: ToolInterpreter::new(),
            history,
            replicator: Replicator::new(session),
            selection: Selection::None,
            presence: PresenceState::new(),
            layer_prefs: LayerExpansion::default(),
            suppression: SuppressionMode::None,
            errors: Vec::new(),
            view: HostView::default(),
            screen_size: Size::new(1280.0, 800.0),
            clock_ms: 0,
        };
        engine.republish();
        Ok(engine)
    }

    // --- Accessors ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn session_id(&self) -> &str {
        self.replicator.session()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn suppression(&self) -> SuppressionMode {
        self.suppression
    }

    pub fn tool(&self) -> ToolKind {
        self.tools.tool()
    }

    pub fn tool_interpreter(&self) -> &ToolInterpreter {
        &self.tools
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn presence(&self) -> &PresenceState {
        &self.presence
    }

    /// Current host projection.
    pub fn view(&self) -> &HostView {
        &self.view
    }

    /// Take the errors contained since the last call.
    pub fn drain_errors(&mut self) -> Vec<EngineError> {
        std::mem::take(&mut self.errors)
    }

    // --- Collaborators ---

    /// Attach the drawing surface. Gestures are ignored until one is attached.
    pub fn attach_surface(&mut self, mut surface: Box<dyn DrawingSurface>) {
        if self.tools.tool() == ToolKind::Freeform {
            surface.set_freehand_mode(true, self.config.freehand_color, self.config.freehand_width);
        }
        self.surface = Some(surface);
        self.republish();
    }

    pub fn detach_surface(&mut self) -> Option<Box<dyn DrawingSurface>> {
        self.tools.reset_gesture();
        self.surface.take()
    }

    /// Join a channel and ask peers for their document.
    pub fn connect_channel(&mut self, channel: Box<dyn RealtimeChannel>) {
        self.channel = Some(channel);
        let request = self.replicator.sync_request();
        self.send(&request);
    }

    pub fn disconnect_channel(&mut self) -> Option<Box<dyn RealtimeChannel>> {
        self.channel.take()
    }

    /// Size of the visible canvas in screen pixels.
    pub fn set_screen_size(&mut self, size: Size) {
        self.screen_size = size;
    }

    // --- Tools and pointer input ---

    pub fn set_tool(&mut self, tool: ToolKind) {
        let outcome = self.tools.set_tool(tool);
        self.apply_outcome(outcome);
    }

    pub fn pointer_down(&mut self, input: PointerInput) {
        let Some(pointer) = self.tool_pointer(input) else {
            return;
        };
        self.presence.pointer_down(pointer.world);
        let outcome = self.tools.pointer_down(&mut self.scene, &self.config, pointer);
        self.apply_outcome(outcome);
    }

    pub fn pointer_move(&mut self, input: PointerInput) {
        let Some(pointer) = self.tool_pointer(input) else {
            return;
        };
        self.presence.pointer_move(pointer.world);
        let outcome = self.tools.pointer_move(&mut self.scene, pointer);
        self.apply_outcome(outcome);
    }

    pub fn pointer_up(&mut self, input: PointerInput) {
        let Some(pointer) = self.tool_pointer(input) else {
            return;
        };
        self.presence.pointer_up();
        let outcome = self.tools.pointer_up(&mut self.scene, &self.config, pointer);
        self.apply_outcome(outcome);
    }

    pub fn pointer_leave(&mut self) {
        self.presence.pointer_leave();
    }

    /// Pan or zoom. Viewport changes never enter history.
    pub fn wheel(&mut self, wheel: WheelInput) {
        self.scene.viewport.handle_wheel(
            wheel,
            self.screen_size,
            self.config.min_zoom,
            self.config.max_zoom,
        );
        self.redraw();
    }

    fn tool_pointer(&self, input: PointerInput) -> Option<ToolPointer> {
        self.surface.as_ref()?;
        Some(ToolPointer {
            world: self.scene.viewport.screen_to_world(input.position),
            screen: input.position,
            alt: input.modifiers.alt,
        })
    }

    fn apply_outcome(&mut self, outcome: GestureOutcome) {
        match outcome.selection {
            SelectionUpdate::Keep => {}
            SelectionUpdate::Clear => self.selection = Selection::None,
            SelectionUpdate::Select(id) => self.selection = Selection::Single(id),
        }
        if let Some(enabled) = outcome.freehand {
            let (color, width) = (self.config.freehand_color, self.config.freehand_width);
            if let Some(surface) = self.surface.as_mut() {
                surface.set_freehand_mode(enabled, color, width);
            }
        }
        if outcome.commit {
            if let (Some(id), Some(surface)) = (self.tools.editing(), self.surface.as_mut()) {
                surface.begin_text_edit(id);
            }
            self.commit();
            return;
        }
        if outcome.scene_changed {
            self.schedule_broadcast(false);
        }
        if outcome.scene_changed || outcome.selection != SelectionUpdate::Keep || outcome.tool_changed {
            self.republish();
        } else if outcome.viewport_changed {
            self.redraw();
        }
    }

    /// Handle a lifecycle event raised by the surface.
    pub fn handle_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Modified { id, geometry } => {
                let patch = ObjectPatch {
                    left: Some(geometry.left),
                    top: Some(geometry.top),
                    width: Some(geometry.scaled_width()),
                    height: Some(geometry.scaled_height()),
                    angle: Some(geometry.angle),
                    ..ObjectPatch::default()
                };
                if let Err(e) = selection::apply_patch(&mut self.scene, id, &patch) {
                    self.contain(e);
                    return;
                }
                self.modify_end(id);
            }
            SurfaceEvent::SelectionChanged { ids } => {
                let live: Vec<ObjectId> =
                    ids.into_iter().filter(|id| self.scene.contains(*id)).collect();
                self.selection = Selection::from_ids(&live);
                self.republish();
            }
            SurfaceEvent::FreehandPathCompleted { points } => {
                if self.surface.is_none() {
                    return;
                }
                let outcome = self.tools.path_completed(&mut self.scene, &self.config, &points);
                self.apply_outcome(outcome);
            }
            SurfaceEvent::TextChanged { id, text } => {
                let patch = ObjectPatch {
                    text: Some(text),
                    ..ObjectPatch::default()
                };
                if let Err(e) = selection::apply_patch(&mut self.scene, id, &patch) {
                    self.contain(e);
                    return;
                }
                self.schedule_broadcast(false);
                self.republish();
            }
            SurfaceEvent::TextEditingExited { id } => {
                if self.tools.editing() == Some(id) {
                    self.tools.exit_editing();
                }
                self.commit();
            }
        }
    }

    /// Re-enter inline editing on an existing text object.
    pub fn edit_text(&mut self, id: ObjectId) {
        if self.scene.get(id).is_none_or(|o| o.text.is_none()) {
            return;
        }
        self.tools.begin_editing(id);
        self.selection = Selection::Single(id);
        if let Some(surface) = self.surface.as_mut() {
            surface.begin_text_edit(id);
        }
        self.republish();
    }

    // --- Host actions ---

    /// Target of a single-object action. Multi-selections are ignored.
    fn single_target(&self) -> Option<ObjectId> {
        match self.selection.require_single() {
            Ok(id) => id,
            Err(e) => {
                log::debug!("Ignoring action: {e}");
                None
            }
        }
    }

    /// Patch the active object. No-op unless exactly one object is selected.
    pub fn update_active_object(&mut self, patch: &ObjectPatch, options: UpdateOptions) {
        let Some(id) = self.single_target() else {
            return;
        };
        if let Err(e) = selection::apply_patch(&mut self.scene, id, patch) {
            self.contain(e);
            return;
        }
        if options.commit_history {
            self.modify_end(id);
            return;
        }
        self.schedule_broadcast(false);
        if options.sync_store {
            self.republish();
        } else {
            self.redraw();
        }
    }

    /// Delete the selection. A multi-selection is one history step.
    pub fn delete_selected(&mut self) {
        let ids = self.selection.ids();
        if ids.len() > 1 {
            self.suppression = SuppressionMode::BatchMutation;
            for id in &ids {
                self.delete_object(*id);
            }
            self.suppression = SuppressionMode::None;
            self.selection = Selection::None;
            self.commit();
        } else if let Some(id) = ids.first() {
            self.delete_object(*id);
        }
    }

    /// Delete one object (a frame takes its children).
    pub fn delete_object(&mut self, id: ObjectId) {
        let removed = containment::remove_with_children(&mut self.scene, id);
        if removed.is_empty() {
            return;
        }
        log::debug!("Deleted {} object(s)", removed.len());
        if self.suppression == SuppressionMode::None {
            self.commit();
        }
    }

    /// Clone the active object (frames with their children) and select the copy.
    pub fn duplicate_selected(&mut self) {
        let Some(id) = self.single_target() else {
            return;
        };
        match selection::duplicate(&mut self.scene, id, self.config.duplicate_offset) {
            Ok(copy) => {
                self.selection = Selection::Single(copy);
                self.commit();
            }
            Err(e) => self.contain(e),
        }
    }

    /// Remove every object.
    pub fn clear_canvas(&mut self) {
        self.scene.clear();
        self.selection = Selection::None;
        self.tools.reset_gesture();
        self.commit();
    }

    pub fn bring_to_front(&mut self) {
        if let Some(id) = self.single_target() {
            containment::bring_to_front(&mut self.scene, id);
            self.commit();
        }
    }

    pub fn send_to_back(&mut self) {
        if let Some(id) = self.single_target() {
            containment::send_to_back(&mut self.scene, id);
            self.commit();
        }
    }

    /// Select one object by id, e.g. from the layer panel.
    pub fn select_object_by_id(&mut self, id: ObjectId) {
        if self.scene.contains(id) {
            self.selection = Selection::Single(id);
            self.republish();
        }
    }

    /// Collapse or expand a frame row in the layer panel.
    pub fn toggle_layer_expanded(&mut self, id: ObjectId) {
        if let Err(e) = self.scene.frame(id) {
            log::debug!("Ignoring layer toggle: {e}");
            return;
        }
        self.layer_prefs.toggle(id);
        self.republish();
    }

    /// Insert an encoded image centred in the visible viewport.
    pub fn insert_image(&mut self, bytes: &[u8]) -> EngineResult<ObjectId> {
        let center = self
            .scene
            .viewport
            .visible_world_rect(self.screen_size)
            .center();
        let mut image = media::image_object(bytes, center, self.config.max_image_width)?;
        image.object_name = Some(self.scene.next_name(&image));
        let id = self.scene.add(image);
        containment::reparent_on_modify_end(&mut self.scene, id);
        self.selection = Selection::Single(id);
        self.commit();
        Ok(id)
    }

    /// Replace the document (including its viewport) and start a fresh history.
    pub fn load_document(&mut self, text: &str) -> EngineResult<()> {
        let snapshot = DocumentSnapshot::from_text(text)?;
        self.scene.load(snapshot);
        containment::reconcile_all(&mut self.scene);
        self.selection = Selection::None;
        self.tools.reset_gesture();
        self.history.reset(self.scene.serialize()?);
        self.schedule_broadcast(false);
        self.republish();
        Ok(())
    }

    /// Serialize the live document, including the local viewport.
    pub fn export_document(&self) -> EngineResult<String> {
        self.scene.export()
    }

    // --- History ---

    pub fn undo(&mut self) {
        if self.suppression != SuppressionMode::None {
            return;
        }
        if let Some(text) = self.history.undo().map(str::to_owned) {
            self.restore_history(&text);
        }
    }

    pub fn redo(&mut self) {
        if self.suppression != SuppressionMode::None {
            return;
        }
        if let Some(text) = self.history.redo().map(str::to_owned) {
            self.restore_history(&text);
        }
    }

    fn restore_history(&mut self, text: &str) {
        let previous = std::mem::replace(&mut self.suppression, SuppressionMode::RestoringHistory);
        let result = self.scene.restore(text);
        if result.is_ok() {
            containment::reconcile_all(&mut self.scene);
            self.selection = Selection::None;
            self.tools.reset_gesture();
        }
        self.suppression = previous;
        match result {
            Ok(()) => {
                log::debug!("Restored history entry {}", self.history.index());
                self.schedule_broadcast(false);
                self.republish();
            }
            Err(e) => self.contain(e),
        }
    }

    /// Reconcile, push a history entry, schedule a broadcast and republish.
    fn commit(&mut self) {
        containment::reconcile_all(&mut self.scene);
        self.selection.retain_live(&self.scene);
        if self.suppression == SuppressionMode::None {
            match self.scene.serialize() {
                Ok(text) => {
                    if self.history.push(text) {
                        log::debug!("Committed history entry {}", self.history.index());
                    }
                }
                Err(e) => self.contain(e),
            }
            self.schedule_broadcast(false);
        }
        self.republish();
    }

    fn modify_end(&mut self, id: ObjectId) {
        containment::reparent_on_modify_end(&mut self.scene, id);
        self.commit();
    }

    // --- Replication ---

    fn schedule_broadcast(&mut self, force: bool) {
        if matches!(
            self.suppression,
            SuppressionMode::ApplyingRemote | SuppressionMode::RestoringHistory
        ) {
            return;
        }
        self.replicator.schedule(force);
    }

    /// Process one received item.
    pub fn receive(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::PeerLeft { sender } => self.presence.remove_peer(&sender),
            Inbound::Event(event) => {
                if self.replicator.is_own(&event) {
                    return;
                }
                match event {
                    ChannelEvent::CanvasSync { snapshot, .. } => self.apply_remote_snapshot(snapshot),
                    ChannelEvent::CanvasSyncRequest { sender } => {
                        if self.scene.is_empty() {
                            log::debug!("Sync requested by {sender}, nothing to send");
                            return;
                        }
                        log::debug!("Sync requested by {sender}");
                        self.schedule_broadcast(true);
                    }
                    ChannelEvent::Presence {
                        sender,
                        cursor,
                        message,
                    } => self.presence.apply_presence(&sender, cursor, message),
                    ChannelEvent::Reaction { x, y, value, .. } => {
                        self.presence
                            .add_remote_reaction(Point::new(x, y), value, self.clock_ms);
                    }
                }
            }
        }
    }

    /// Queue a peer's snapshot and apply everything queued, oldest first.
    pub fn apply_remote_snapshot(&mut self, snapshot: String) {
        self.replicator.enqueue_remote(snapshot);
        self.process_remote_applies();
    }

    fn process_remote_applies(&mut self) {
        if self.suppression == SuppressionMode::ApplyingRemote {
            return;
        }
        let mut applied = false;
        while let Some(text) = self.replicator.next_remote() {
            let previous = std::mem::replace(&mut self.suppression, SuppressionMode::ApplyingRemote);
            let result = self.restore_remote(&text);
            self.suppression = previous;
            match result {
                Ok(()) => applied = true,
                Err(e) => self.contain(e),
            }
        }
        if applied {
            self.republish();
        }
    }

    fn restore_remote(&mut self, text: &str) -> EngineResult<()> {
        self.scene.restore(text)?;
        containment::reconcile_all(&mut self.scene);
        self.selection = Selection::None;
        self.tools.reset_gesture();
        let local = self.scene.serialize()?;
        self.history.reset(local.clone());
        self.replicator.mark_in_sync(local);
        log::info!("Applied remote snapshot ({} objects)", self.scene.len());
        Ok(())
    }

    /// Drain the channel into [`Engine::receive`].
    pub fn pump_channel(&mut self) {
        let inbound = self
            .channel
            .as_mut()
            .map(|channel| channel.poll())
            .unwrap_or_default();
        for item in inbound {
            self.receive(item);
        }
    }

    /// Per-frame tick: read the channel, flush a due broadcast, then presence.
    pub fn on_animation_frame(&mut self, now_ms: u64) {
        self.clock_ms = now_ms;
        self.pump_channel();
        self.process_remote_applies();
        self.flush_broadcast();

        let session = self.replicator.session().to_string();
        if let Some(update) = self.presence.take_update(&session) {
            self.send(&update);
        }
        if let Some(reaction) = self.presence.tick(now_ms, &session) {
            self.send(&reaction);
        }
    }

    fn flush_broadcast(&mut self) {
        if self.suppression != SuppressionMode::None || !self.replicator.is_pending() {
            return;
        }
        let current = match self.scene.serialize() {
            Ok(text) => text,
            Err(e) => {
                self.contain(e);
                return;
            }
        };
        if let Some(event) = self.replicator.take_due(&current) {
            log::debug!("Broadcasting snapshot ({} bytes)", current.len());
            self.send(&event);
        }
    }

    fn send(&mut self, event: &ChannelEvent) {
        let Some(channel) = self.channel.as_mut() else {
            return;
        };
        if let Err(e) = channel.broadcast(event) {
            self.contain(e);
        }
    }

    // --- Presence ---

    /// Presence shortcut keys (`/`, `e`, `Escape`). Returns true if consumed.
    pub fn handle_key(&mut self, key: &str) -> bool {
        self.presence.handle_key(key)
    }

    pub fn set_chat_message(&mut self, text: &str) {
        self.presence.set_chat_message(text);
    }

    pub fn submit_chat(&mut self) {
        self.presence.submit_chat();
    }

    pub fn select_reaction(&mut self, value: &str) {
        self.presence.select_reaction(value);
    }

    // --- Projection ---

    fn republish(&mut self) {
        self.layer_prefs.retain_live(&self.scene);
        let active_object = self
            .selection
            .single()
            .and_then(|id| self.scene.get(id))
            .and_then(ActiveObjectAttributes::of);
        self.view = HostView {
            layers: project_layers(&self.scene, &self.layer_prefs),
            active_object,
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            active_tool: self.tools.tool(),
            revision: self.view.revision + 1,
        };
        let ids = self.selection.ids();
        if let Some(surface) = self.surface.as_mut() {
            surface.show_selection(&ids);
        }
        self.redraw();
    }

    fn redraw(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.request_redraw();
        }
    }

    fn contain(&mut self, error: EngineError) {
        log::warn!("{error}");
        self.errors.push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingChannel, RecordingSurface};

    fn engine() -> (Engine, RecordingSurface, RecordingChannel) {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let surface = RecordingSurface::new();
        let channel = RecordingChannel::new();
        engine.attach_surface(Box::new(surface.clone()));
        engine.connect_channel(Box::new(channel.clone()));
        channel.clear();
        (engine, surface, channel)
    }

    fn drag(engine: &mut Engine, tool: ToolKind, from: (f64, f64), to: (f64, f64)) {
        engine.set_tool(tool);
        engine.pointer_down(PointerInput::at(from.0, from.1));
        engine.pointer_move(PointerInput::at(to.0, to.1));
        engine.pointer_up(PointerInput::at(to.0, to.1));
    }

    #[test]
    fn test_gestures_without_surface_are_noops() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.set_tool(ToolKind::FrameDesktop);
        engine.pointer_down(PointerInput::at(0.0, 0.0));
        assert!(engine.scene().is_empty());
    }

    #[test]
    fn test_commit_updates_view() {
        let (mut engine, surface, _) = engine();
        let before = engine.view().revision;
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        let view = engine.view();
        assert!(view.revision > before);
        assert!(view.can_undo);
        assert_eq!(view.layers.len(), 1);
        assert_eq!(view.active_object.as_ref().map(|a| a.kind.as_str()), Some("Rectangle"));
        assert_eq!(view.active_tool, ToolKind::Select);
        assert!(surface.redraws() > 0);
    }

    #[test]
    fn test_connect_sends_sync_request() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let channel = RecordingChannel::new();
        engine.connect_channel(Box::new(channel.clone()));
        assert_eq!(
            channel.sent(),
            vec![ChannelEvent::CanvasSyncRequest {
                sender: engine.session_id().to_string()
            }]
        );
    }

    #[test]
    fn test_broadcast_is_coalesced_to_frame() {
        let (mut engine, _, channel) = engine();
        engine.set_tool(ToolKind::Select);
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        engine.pointer_down(PointerInput::at(10.0, 10.0));
        for x in 11..30 {
            engine.pointer_move(PointerInput::at(f64::from(x), 10.0));
        }
        engine.pointer_up(PointerInput::at(30.0, 10.0));
        assert_eq!(channel.broadcast_count(), 0);
        engine.on_animation_frame(16);
        assert_eq!(channel.broadcast_count(), 1);
        engine.on_animation_frame(32);
        assert_eq!(channel.broadcast_count(), 1);
    }

    #[test]
    fn test_sync_request_forces_rebroadcast() {
        let (mut engine, _, channel) = engine();
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        engine.on_animation_frame(16);
        assert_eq!(channel.broadcast_count(), 1);
        engine.receive(Inbound::Event(ChannelEvent::CanvasSyncRequest {
            sender: "peer".into(),
        }));
        engine.on_animation_frame(32);
        assert_eq!(channel.broadcast_count(), 2);
    }

    #[test]
    fn test_empty_peer_ignores_sync_request() {
        let (mut engine, _, channel) = engine();
        engine.receive(Inbound::Event(ChannelEvent::CanvasSyncRequest {
            sender: "joiner".into(),
        }));
        engine.on_animation_frame(16);
        assert_eq!(channel.broadcast_count(), 0);
    }

    #[test]
    fn test_headless_peer_answers_sync_request() {
        let mut source = Scene::new();
        source.add(crate::objects::SceneObject::new(
            crate::objects::ObjectKind::Rectangle,
            crate::objects::Geometry::new(0.0, 0.0, 20.0, 20.0),
        ));
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let channel = RecordingChannel::new();
        engine.connect_channel(Box::new(channel.clone()));
        engine.load_document(&source.serialize().unwrap()).unwrap();
        engine.on_animation_frame(16);
        channel.clear();

        engine.receive(Inbound::Event(ChannelEvent::CanvasSyncRequest {
            sender: "joiner".into(),
        }));
        engine.on_animation_frame(32);
        assert_eq!(channel.broadcast_count(), 1);
        assert_eq!(channel.last_snapshot(), Some(source.serialize().unwrap()));
    }

    #[test]
    fn test_pan_does_not_truncate_redo() {
        let (mut engine, _, _) = engine();
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (40.0, 40.0));
        let first = engine.selection().single().unwrap();
        drag(&mut engine, ToolKind::Circle, (100.0, 100.0), (140.0, 140.0));
        engine.undo();
        assert!(engine.view().can_redo);

        engine.select_object_by_id(first);
        engine.wheel(WheelInput {
            position: Point::new(10.0, 10.0),
            delta: kurbo::Vec2::new(30.0, 30.0),
            mode: crate::viewport::WheelDeltaMode::Pixel,
            ctrl: false,
        });
        engine.bring_to_front();
        assert!(engine.view().can_redo);
        engine.redo();
        assert_eq!(engine.scene().len(), 2);
    }

    #[test]
    fn test_own_events_are_ignored() {
        let (mut engine, _, _) = engine();
        let own = ChannelEvent::CanvasSync {
            sender: engine.session_id().to_string(),
            snapshot: "garbage".into(),
        };
        engine.receive(Inbound::Event(own));
        assert!(engine.drain_errors().is_empty());
    }

    #[test]
    fn test_malformed_remote_is_contained() {
        let (mut engine, _, _) = engine();
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        let before = engine.export_document().unwrap();
        engine.apply_remote_snapshot("{\"objects\":".into());
        assert_eq!(engine.export_document().unwrap(), before);
        assert_eq!(engine.suppression(), SuppressionMode::None);
        let errors = engine.drain_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], EngineError::Snapshot(_)));
        assert!(engine.view().can_undo);
    }

    #[test]
    fn test_remote_apply_resets_history_and_selection() {
        let (mut engine, _, _) = engine();
        let mut peer = Engine::new(EngineConfig::default()).unwrap();
        peer.attach_surface(Box::new(RecordingSurface::new()));
        drag(&mut peer, ToolKind::Circle, (0.0, 0.0), (40.0, 40.0));
        let snapshot = peer.export_document().unwrap();

        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        assert!(!engine.selection().is_empty());
        engine.apply_remote_snapshot(snapshot);
        assert!(engine.selection().is_empty());
        assert!(!engine.view().can_undo);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.scene().ordered().next().unwrap().kind.label(), "Circle");
    }

    #[test]
    fn test_multi_delete_is_one_history_step() {
        let (mut engine, _, _) = engine();
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        drag(&mut engine, ToolKind::Rectangle, (100.0, 0.0), (150.0, 50.0));
        let ids: Vec<ObjectId> = engine.scene().z_order().to_vec();
        let entries = engine.history().len();
        engine.handle_surface_event(SurfaceEvent::SelectionChanged { ids });
        engine.delete_selected();
        assert!(engine.scene().is_empty());
        assert_eq!(engine.history().len(), entries + 1);
        assert_eq!(engine.suppression(), SuppressionMode::None);
        engine.undo();
        assert_eq!(engine.scene().len(), 2);
    }

    #[test]
    fn test_multi_selection_attribute_edit_is_noop() {
        let (mut engine, _, _) = engine();
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        drag(&mut engine, ToolKind::Rectangle, (100.0, 0.0), (150.0, 50.0));
        let ids: Vec<ObjectId> = engine.scene().z_order().to_vec();
        engine.handle_surface_event(SurfaceEvent::SelectionChanged { ids });
        let before = engine.export_document().unwrap();
        engine.update_active_object(
            &ObjectPatch {
                opacity: Some(0.5),
                ..ObjectPatch::default()
            },
            UpdateOptions::default(),
        );
        engine.duplicate_selected();
        engine.bring_to_front();
        assert_eq!(engine.export_document().unwrap(), before);
    }

    #[test]
    fn test_live_update_skips_history() {
        let (mut engine, _, _) = engine();
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        let entries = engine.history().len();
        let live = UpdateOptions {
            commit_history: false,
            sync_store: false,
        };
        for alpha in [10u8, 20, 30] {
            engine.update_active_object(
                &ObjectPatch {
                    fill: Some(crate::objects::SerializableColor::new(alpha, 0, 0, 255)),
                    ..ObjectPatch::default()
                },
                live,
            );
        }
        assert_eq!(engine.history().len(), entries);
        engine.update_active_object(&ObjectPatch::default(), UpdateOptions::default());
        assert_eq!(engine.history().len(), entries + 1);
    }

    #[test]
    fn test_insert_image_selects_it() {
        let (mut engine, _, _) = engine();
        let id = engine.insert_image(crate::media::tests::PIXEL_PNG).unwrap();
        assert_eq!(engine.selection().single(), Some(id));
        assert_eq!(
            engine.scene().get(id).unwrap().object_name.as_deref(),
            Some("Image 1")
        );
        let err = engine.insert_image(b"nope");
        assert!(matches!(err, Err(EngineError::ImageDecode(_))));
        assert_eq!(engine.scene().len(), 1);
    }

    #[test]
    fn test_freeform_round_trip_through_surface() {
        let (mut engine, surface, _) = engine();
        engine.set_tool(ToolKind::Freeform);
        assert!(surface.freehand_enabled());
        engine.handle_surface_event(SurfaceEvent::FreehandPathCompleted {
            points: vec![Point::new(0.0, 0.0), Point::new(20.0, 5.0)],
        });
        assert!(!surface.freehand_enabled());
        assert_eq!(engine.tool(), ToolKind::Select);
        assert_eq!(engine.scene().len(), 1);
    }

    #[test]
    fn test_presence_is_flushed_on_frame() {
        let (mut engine, _, channel) = engine();
        engine.pointer_move(PointerInput::at(5.0, 6.0));
        engine.on_animation_frame(16);
        let sent = channel.sent();
        assert!(sent.iter().any(|e| matches!(
            e,
            ChannelEvent::Presence { cursor: Some(c), .. } if (c.x - 5.0).abs() < f64::EPSILON
        )));
        assert!(engine.history().len() == 1);
    }

    #[test]
    fn test_wheel_does_not_commit() {
        let (mut engine, _, _) = engine();
        engine.wheel(WheelInput {
            position: Point::new(10.0, 10.0),
            delta: kurbo::Vec2::new(0.0, -200.0),
            mode: crate::viewport::WheelDeltaMode::Pixel,
            ctrl: true,
        });
        assert!(engine.scene().viewport.zoom > 1.0);
        assert!(!engine.view().can_undo);
    }

    #[test]
    fn test_edit_text_reenters_editing() {
        let (mut engine, surface, _) = engine();
        engine.set_tool(ToolKind::Text);
        engine.pointer_down(PointerInput::at(10.0, 10.0));
        let id = engine.selection().single().unwrap();
        assert_eq!(surface.text_edits(), vec![id]);

        engine.handle_surface_event(SurfaceEvent::TextEditingExited { id });
        assert_eq!(engine.tool_interpreter().editing(), None);
        engine.edit_text(id);
        assert_eq!(engine.tool_interpreter().editing(), Some(id));
        assert_eq!(surface.text_edits(), vec![id, id]);
    }

    #[test]
    fn test_clear_canvas_is_undoable() {
        let (mut engine, _, _) = engine();
        drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (50.0, 50.0));
        drag(&mut engine, ToolKind::Circle, (100.0, 100.0), (150.0, 150.0));
        engine.clear_canvas();
        assert!(engine.scene().is_empty());
        assert!(engine.selection().is_empty());
        engine.undo();
        assert_eq!(engine.scene().len(), 2);
    }
}
