//! Tool interpreter: turns the active tool plus a pointer gesture into scene
//! mutations.
//!
//! The interpreter never talks to the drawing surface or history directly.
//! Every transition returns a [`GestureOutcome`] describing what the caller
//! must do next (commit, change selection, toggle freehand ink, ...), which
//! keeps the state machine testable against a bare [`Scene`].

use crate::config::EngineConfig;
use crate::containment;
use crate::objects::{
    FramePreset, Geometry, ObjectId, ObjectKind, PolygonTemplate, SceneObject, TextRun,
};
use crate::scene::Scene;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    #[default]
    Select,
    Hand,
    Text,
    Rectangle,
    Circle,
    Triangle,
    Line,
    Diamond,
    Star,
    Arrow,
    Freeform,
    FrameDesktop,
    FrameTablet,
    FrameMobile,
    Image,
}

impl ToolKind {
    /// Frame preset placed by this tool, if it is a frame tool.
    pub fn frame_preset(&self) -> Option<FramePreset> {
        match self {
            ToolKind::FrameDesktop => Some(FramePreset::Desktop),
            ToolKind::FrameTablet => Some(FramePreset::Tablet),
            ToolKind::FrameMobile => Some(FramePreset::Mobile),
            _ => None,
        }
    }

    /// Tools that create a shape by dragging out its bounding box.
    pub fn is_shape(&self) -> bool {
        matches!(
            self,
            ToolKind::Rectangle
                | ToolKind::Circle
                | ToolKind::Triangle
                | ToolKind::Line
                | ToolKind::Diamond
                | ToolKind::Star
                | ToolKind::Arrow
        )
    }

    /// Tools that fall back to `Select` after placing one object.
    pub fn is_one_shot(&self) -> bool {
        self.is_shape() || self.frame_preset().is_some() || *self == ToolKind::Freeform
    }
}

/// State of the interpreter between pointer events.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ToolState {
    #[default]
    Idle,
    /// Live resize of a freshly created shape.
    Dragging { id: ObjectId, origin: Point },
    /// Select-tool move of an existing object.
    Moving { id: ObjectId, last: Point, moved: bool },
    /// Viewport pan (hand tool or alt-drag), in screen coordinates.
    Panning { last: Point },
    /// A text object is being edited.
    Editing { id: ObjectId },
    /// The surface is collecting a freehand stroke.
    Inking,
}

/// What should happen to the selection after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionUpdate {
    #[default]
    Keep,
    Clear,
    Select(ObjectId),
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GestureOutcome {
    /// Scene content changed (live or final).
    pub scene_changed: bool,
    /// A history entry should be committed.
    pub commit: bool,
    pub selection: SelectionUpdate,
    /// The active tool changed as a side effect.
    pub tool_changed: bool,
    /// Switch the surface's freehand ink mode on or off.
    pub freehand: Option<bool>,
    pub viewport_changed: bool,
}

impl GestureOutcome {
    fn committed(id: ObjectId) -> Self {
        Self {
            scene_changed: true,
            commit: true,
            selection: SelectionUpdate::Select(id),
            ..Self::default()
        }
    }
}

/// Pointer input already mapped to both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolPointer {
    pub world: Point,
    pub screen: Point,
    pub alt: bool,
}

/// Explicit tool state machine.
#[derive(Debug, Clone, Default)]
pub struct ToolInterpreter {
    tool: ToolKind,
    state: ToolState,
}

impl ToolInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn state(&self) -> &ToolState {
        &self.state
    }

    /// Switch tools, abandoning any gesture in progress.
    pub fn set_tool(&mut self, tool: ToolKind) -> GestureOutcome {
        let was_freeform = self.tool == ToolKind::Freeform;
        self.tool = tool;
        self.state = ToolState::Idle;
        let freehand = match (was_freeform, tool == ToolKind::Freeform) {
            (false, true) => Some(true),
            (true, false) => Some(false),
            _ => None,
        };
        GestureOutcome {
            tool_changed: true,
            freehand,
            ..GestureOutcome::default()
        }
    }

    /// Forget any gesture that referenced objects no longer in the scene.
    pub fn reset_gesture(&mut self) {
        if !matches!(self.state, ToolState::Inking) {
            self.state = ToolState::Idle;
        }
    }

    /// Start a text edit session on an existing text object.
    pub fn begin_editing(&mut self, id: ObjectId) {
        self.state = ToolState::Editing { id };
    }

    /// Id of the text object being edited.
    pub fn editing(&self) -> Option<ObjectId> {
        match self.state {
            ToolState::Editing { id } => Some(id),
            _ => None,
        }
    }

    pub fn exit_editing(&mut self) {
        if matches!(self.state, ToolState::Editing { .. }) {
            self.state = ToolState::Idle;
        }
    }

    pub fn pointer_down(
        &mut self,
        scene: &mut Scene,
        config: &EngineConfig,
        pointer: ToolPointer,
    ) -> GestureOutcome {
        if pointer.alt || self.tool == ToolKind::Hand {
            self.state = ToolState::Panning {
                last: pointer.screen,
            };
            return GestureOutcome::default();
        }
        if let ToolState::Editing { .. } = self.state {
            self.state = ToolState::Idle;
            return GestureOutcome {
                selection: SelectionUpdate::Clear,
                ..GestureOutcome::default()
            };
        }

        let world = pointer.world;
        if let Some(preset) = self.tool.frame_preset() {
            let id = place(scene, new_frame(config, preset, world));
            log::debug!("Placed {} frame {id}", preset.label());
            let mut outcome = GestureOutcome::committed(id);
            self.revert_to_select(&mut outcome);
            return outcome;
        }

        match self.tool {
            ToolKind::Select => match scene.hit_test(world, 0.0) {
                Some(id) => {
                    self.state = ToolState::Moving {
                        id,
                        last: world,
                        moved: false,
                    };
                    GestureOutcome {
                        selection: SelectionUpdate::Select(id),
                        ..GestureOutcome::default()
                    }
                }
                None => GestureOutcome {
                    selection: SelectionUpdate::Clear,
                    ..GestureOutcome::default()
                },
            },
            ToolKind::Text => {
                let id = place(scene, new_text(config, world));
                containment::reparent_on_modify_end(scene, id);
                self.state = ToolState::Editing { id };
                GestureOutcome::committed(id)
            }
            ToolKind::Freeform => {
                self.state = ToolState::Inking;
                GestureOutcome::default()
            }
            tool if tool.is_shape() => {
                let Some(shape) = new_shape(config, tool, world) else {
                    return GestureOutcome::default();
                };
                let id = place(scene, shape);
                self.state = ToolState::Dragging { id, origin: world };
                GestureOutcome {
                    scene_changed: true,
                    ..GestureOutcome::default()
                }
            }
            _ => GestureOutcome::default(),
        }
    }

    pub fn pointer_move(&mut self, scene: &mut Scene, pointer: ToolPointer) -> GestureOutcome {
        match &mut self.state {
            ToolState::Panning { last } => {
                let delta = pointer.screen - *last;
                *last = pointer.screen;
                scene.viewport.pan(delta);
                GestureOutcome {
                    viewport_changed: true,
                    ..GestureOutcome::default()
                }
            }
            ToolState::Dragging { id, origin } => {
                let (id, origin) = (*id, *origin);
                match scene.get_mut(id) {
                    Some(shape) => {
                        resize_to(shape, origin, pointer.world);
                        GestureOutcome {
                            scene_changed: true,
                            ..GestureOutcome::default()
                        }
                    }
                    None => {
                        self.state = ToolState::Idle;
                        GestureOutcome::default()
                    }
                }
            }
            ToolState::Moving { id, last, moved } => {
                let delta: Vec2 = pointer.world - *last;
                if delta.hypot2() < f64::EPSILON {
                    return GestureOutcome::default();
                }
                *last = pointer.world;
                *moved = true;
                let id = *id;
                containment::move_with_children(scene, id, delta);
                GestureOutcome {
                    scene_changed: true,
                    ..GestureOutcome::default()
                }
            }
            _ => GestureOutcome::default(),
        }
    }

    pub fn pointer_up(
        &mut self,
        scene: &mut Scene,
        config: &EngineConfig,
        pointer: ToolPointer,
    ) -> GestureOutcome {
        match std::mem::take(&mut self.state) {
            ToolState::Dragging { id, origin } => {
                if let Some(shape) = scene.get_mut(id) {
                    resize_to(shape, origin, pointer.world);
                }
                if scene.get(id).is_none_or(|s| is_degenerate(s, config.degenerate_threshold)) {
                    scene.remove(id);
                    log::debug!("Discarded degenerate shape {id}");
                    return GestureOutcome {
                        scene_changed: true,
                        ..GestureOutcome::default()
                    };
                }
                containment::reparent_on_modify_end(scene, id);
                let mut outcome = GestureOutcome::committed(id);
                self.revert_to_select(&mut outcome);
                outcome
            }
            ToolState::Moving { id, moved, .. } => {
                if !moved || !scene.contains(id) {
                    return GestureOutcome::default();
                }
                containment::reparent_on_modify_end(scene, id);
                GestureOutcome {
                    scene_changed: true,
                    commit: true,
                    ..GestureOutcome::default()
                }
            }
            ToolState::Editing { id } => {
                self.state = ToolState::Editing { id };
                GestureOutcome::default()
            }
            ToolState::Inking => {
                // The stroke arrives separately via `path_completed`.
                if self.tool == ToolKind::Freeform {
                    self.state = ToolState::Inking;
                }
                GestureOutcome::default()
            }
            ToolState::Panning { .. } | ToolState::Idle => GestureOutcome::default(),
        }
    }

    /// Handle a stroke finished by the surface's freehand mode.
    pub fn path_completed(
        &mut self,
        scene: &mut Scene,
        config: &EngineConfig,
        points: &[Point],
    ) -> GestureOutcome {
        if points.is_empty() {
            return GestureOutcome::default();
        }
        let mut path = SceneObject::path(points);
        path.paint.fill = None;
        path.paint.stroke = Some(config.freehand_color);
        path.paint.stroke_width = config.freehand_width;
        let id = place(scene, path);
        containment::reparent_on_modify_end(scene, id);
        self.state = ToolState::Idle;
        let mut outcome = GestureOutcome::committed(id);
        self.revert_to_select(&mut outcome);
        outcome
    }

    fn revert_to_select(&mut self, outcome: &mut GestureOutcome) {
        if !self.tool.is_one_shot() {
            return;
        }
        let switched = self.set_tool(ToolKind::Select);
        outcome.tool_changed = true;
        outcome.freehand = switched.freehand;
    }
}

/// Name and add an object, returning its id.
fn place(scene: &mut Scene, mut object: SceneObject) -> ObjectId {
    object.object_name = Some(scene.next_name(&object));
    scene.add(object)
}

fn new_frame(config: &EngineConfig, preset: FramePreset, at: Point) -> SceneObject {
    let size = config.frame_size(preset);
    let mut frame = SceneObject::frame(preset, at, size.width, size.height);
    frame.paint.fill = Some(config.frame_fill);
    frame.paint.stroke = None;
    frame.paint.stroke_width = 0.0;
    frame
}

fn new_text(config: &EngineConfig, at: Point) -> SceneObject {
    let mut text = SceneObject::text(
        at,
        TextRun {
            text: config.default_text.clone(),
            font_size: config.default_font_size,
            font_family: config.default_font_family.clone(),
            font_weight: "400".to_string(),
        },
    );
    text.paint.fill = Some(config.default_stroke);
    text.paint.stroke = None;
    text.paint.stroke_width = 0.0;
    text
}

/// Zero-size shape for a drag-out tool.
pub fn new_shape(config: &EngineConfig, tool: ToolKind, at: Point) -> Option<SceneObject> {
    let zero = Geometry::new(at.x, at.y, 0.0, 0.0);
    let polygon = |template: PolygonTemplate| {
        let mut geometry = Geometry::new(at.x, at.y, 1.0, 1.0);
        geometry.scale_x = 0.0;
        geometry.scale_y = 0.0;
        SceneObject::new(
            ObjectKind::Polygon {
                points: template.points(),
                template: Some(template),
            },
            geometry,
        )
    };
    let mut shape = match tool {
        ToolKind::Rectangle => SceneObject::new(ObjectKind::Rectangle, zero),
        ToolKind::Circle => SceneObject::new(ObjectKind::Ellipse, zero),
        ToolKind::Triangle => SceneObject::new(ObjectKind::Triangle, zero),
        ToolKind::Line => SceneObject::line(at, at),
        ToolKind::Diamond => polygon(PolygonTemplate::Diamond),
        ToolKind::Star => polygon(PolygonTemplate::Star),
        ToolKind::Arrow => polygon(PolygonTemplate::Arrow),
        _ => return None,
    };
    shape.paint.fill = if tool == ToolKind::Line {
        None
    } else {
        Some(config.default_fill)
    };
    shape.paint.stroke = Some(config.default_stroke);
    shape.paint.stroke_width = config.default_stroke_width;
    Some(shape)
}

/// Span a shape from `origin` to `current`, anchored at the min corner.
pub fn resize_to(shape: &mut SceneObject, origin: Point, current: Point) {
    let delta = current - origin;
    let left = origin.x.min(current.x);
    let top = origin.y.min(current.y);
    match shape.kind {
        ObjectKind::Line { .. } => shape.set_line_end(current),
        ObjectKind::Ellipse => {
            let radius = delta.x.abs().max(delta.y.abs()) / 2.0;
            shape.geometry = Geometry {
                angle: shape.geometry.angle,
                ..Geometry::new(left, top, radius * 2.0, radius * 2.0)
            };
        }
        ObjectKind::Polygon { .. } => {
            let g = &mut shape.geometry;
            g.left = left;
            g.top = top;
            g.width = 1.0;
            g.height = 1.0;
            g.scale_x = delta.x.abs();
            g.scale_y = delta.y.abs();
        }
        _ => {
            shape.geometry = Geometry {
                angle: shape.geometry.angle,
                ..Geometry::new(left, top, delta.x.abs(), delta.y.abs())
            };
        }
    }
}

/// Below the threshold on both axes. Lines compare their endpoints.
pub fn is_degenerate(shape: &SceneObject, threshold: f64) -> bool {
    if let Some((a, b)) = shape.line_endpoints() {
        return (a.x - b.x).abs() < threshold && (a.y - b.y).abs() < threshold;
    }
    let size = shape.dimensions();
    size.width < threshold && size.height < threshold
}
