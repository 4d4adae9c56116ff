//! Selection state and the single-object property editor.

use crate::containment;
use crate::error::{EngineError, EngineResult};
use crate::objects::{ObjectId, ObjectKind, SceneObject, SerializableColor};
use crate::scene::Scene;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Current selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Single(ObjectId),
    Multi(Vec<ObjectId>),
}

impl Selection {
    /// Build from a list of ids.
    pub fn from_ids(ids: &[ObjectId]) -> Self {
        match ids {
            [] => Selection::None,
            [one] => Selection::Single(*one),
            many => Selection::Multi(many.to_vec()),
        }
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        match self {
            Selection::None => Vec::new(),
            Selection::Single(id) => vec![*id],
            Selection::Multi(ids) => ids.clone(),
        }
    }

    /// The selected object if exactly one is selected.
    pub fn single(&self) -> Option<ObjectId> {
        match self {
            Selection::Single(id) => Some(*id),
            _ => None,
        }
    }

    /// The single target of an attribute or stacking action.
    ///
    /// `Ok(None)` when nothing is selected; a multi-selection is an error.
    pub fn require_single(&self) -> EngineResult<Option<ObjectId>> {
        match self {
            Selection::None => Ok(None),
            Selection::Single(id) => Ok(Some(*id)),
            Selection::Multi(_) => Err(EngineError::MultiSelection),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::None)
    }

    /// Drop ids that are no longer in the scene.
    pub fn retain_live(&mut self, scene: &Scene) {
        let live: Vec<ObjectId> = self.ids().into_iter().filter(|id| scene.contains(*id)).collect();
        *self = Selection::from_ids(&live);
    }
}

/// Partial attribute update; only present fields are applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectPatch {
    pub left: Option<f64>,
    pub top: Option<f64>,
    /// Scaled width.
    pub width: Option<f64>,
    /// Scaled height.
    pub height: Option<f64>,
    pub angle: Option<f64>,
    pub fill: Option<SerializableColor>,
    pub stroke: Option<SerializableColor>,
    pub stroke_width: Option<f64>,
    pub opacity: Option<f64>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<String>,
    pub font_family: Option<String>,
}

impl ObjectPatch {
    fn touches_geometry(&self) -> bool {
        self.left.is_some() || self.top.is_some() || self.width.is_some() || self.height.is_some()
    }
}

/// How an attribute update is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Commit a history entry (false for live drags such as a color picker).
    pub commit_history: bool,
    /// Republish layers and active-object attributes.
    pub sync_store: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            commit_history: true,
            sync_store: true,
        }
    }
}

/// Read-only attribute projection of the active object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveObjectAttributes {
    pub id: ObjectId,
    pub kind: String,
    pub name: Option<String>,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
    /// `#rrggbb[aa]`.
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: f64,
    pub opacity: f64,
    pub is_frame: bool,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<String>,
    pub font_family: Option<String>,
}

impl ActiveObjectAttributes {
    pub fn of(object: &SceneObject) -> Option<Self> {
        let id = object.id()?;
        let size = object.dimensions();
        let text = object.text.as_ref();
        Some(Self {
            id,
            kind: object.kind.label().to_string(),
            name: object.object_name.clone(),
            left: object.geometry.left,
            top: object.geometry.top,
            width: size.width,
            height: size.height,
            angle: object.geometry.angle,
            fill: object.paint.fill.map(|c| c.to_hex()),
            stroke: object.paint.stroke.map(|c| c.to_hex()),
            stroke_width: object.paint.stroke_width,
            opacity: object.paint.opacity,
            is_frame: object.is_frame(),
            text: text.map(|t| t.text.clone()),
            font_size: text.map(|t| t.font_size),
            font_weight: text.map(|t| t.font_weight.clone()),
            font_family: text.map(|t| t.font_family.clone()),
        })
    }
}

/// Apply a patch to one object.
///
/// Moving a frame carries its children; resizing a frame re-clips them.
pub fn apply_patch(scene: &mut Scene, id: ObjectId, patch: &ObjectPatch) -> EngineResult<()> {
    let object = scene.get(id).ok_or(EngineError::UnknownObject(id))?;
    let is_frame = object.is_frame();
    let delta = Vec2::new(
        patch.left.map_or(0.0, |left| left - object.geometry.left),
        patch.top.map_or(0.0, |top| top - object.geometry.top),
    );
    if delta != Vec2::ZERO {
        containment::move_with_children(scene, id, delta);
    }

    let object = scene.get_mut(id).ok_or(EngineError::UnknownObject(id))?;
    if patch.width.is_some() || patch.height.is_some() {
        resize(object, patch.width, patch.height);
    }
    if let Some(angle) = patch.angle {
        object.geometry.angle = angle;
    }
    if let Some(fill) = patch.fill {
        object.paint.fill = Some(fill);
    }
    if let Some(stroke) = patch.stroke {
        object.paint.stroke = Some(stroke);
    }
    if let Some(width) = patch.stroke_width {
        object.paint.stroke_width = width.max(0.0);
    }
    if let Some(opacity) = patch.opacity {
        object.paint.opacity = opacity.clamp(0.0, 1.0);
    }
    if let Some(run) = object.text.as_mut() {
        let mut relayout = false;
        if let Some(text) = &patch.text {
            run.text = text.clone();
            relayout = true;
        }
        if let Some(size) = patch.font_size {
            run.font_size = size.max(1.0);
            relayout = true;
        }
        if let Some(weight) = &patch.font_weight {
            run.font_weight = weight.clone();
        }
        if let Some(family) = &patch.font_family {
            run.font_family = family.clone();
            relayout = true;
        }
        if relayout {
            let (width, height) = run.estimated_size();
            object.geometry.width = width;
            object.geometry.height = height;
        }
    }

    if is_frame && patch.touches_geometry() {
        containment::sync_child_clipping(scene, id);
    }
    Ok(())
}

fn resize(object: &mut SceneObject, width: Option<f64>, height: Option<f64>) {
    if let Some((a, b)) = object.line_endpoints() {
        let origin = Point::new(a.x.min(b.x), a.y.min(b.y));
        let fx = ratio(width, (b.x - a.x).abs());
        let fy = ratio(height, (b.y - a.y).abs());
        let stretch = |p: Point| {
            Point::new(
                origin.x + (p.x - origin.x) * fx,
                origin.y + (p.y - origin.y) * fy,
            )
        };
        let start = stretch(a);
        object.kind = ObjectKind::Line {
            x1: start.x,
            y1: start.y,
            x2: b.x,
            y2: b.y,
        };
        object.set_line_end(stretch(b));
        return;
    }
    if let Some(width) = width {
        object.geometry.set_scaled_width(width);
    }
    if let Some(height) = height {
        object.geometry.set_scaled_height(height);
    }
}

/// Stretch factor to reach `new` from `old`; lines flat on an axis keep it.
fn ratio(new: Option<f64>, old: f64) -> f64 {
    match new {
        Some(new) if old > f64::EPSILON => new.max(0.0) / old,
        _ => 1.0,
    }
}

/// Deep-clone an object (and a frame's children) with fresh ids, offset by
/// `offset`. Clones land on top of the stack. Returns the new top-level id.
pub fn duplicate(scene: &mut Scene, id: ObjectId, offset: Vec2) -> EngineResult<ObjectId> {
    let original = scene.get(id).ok_or(EngineError::UnknownObject(id))?.clone();
    let children: Vec<SceneObject> = if original.is_frame() {
        scene
            .children_of(id)
            .into_iter()
            .filter_map(|child| scene.get(child).cloned())
            .collect()
    } else {
        Vec::new()
    };

    let mut copy = fresh_copy(&original, offset);
    copy.object_name = Some(scene.next_name(&copy));
    let copy_id = scene.add(copy);

    for child in children {
        let mut child_copy = fresh_copy(&child, offset);
        child_copy.parent_frame_id = Some(copy_id);
        scene.add(child_copy);
    }
    if original.is_frame() {
        containment::sync_child_clipping(scene, copy_id);
        containment::normalize_stack(scene, copy_id);
    }
    log::debug!("Duplicated {id} as {copy_id}");
    Ok(copy_id)
}

fn fresh_copy(object: &SceneObject, offset: Vec2) -> SceneObject {
    let mut copy = object.clone();
    copy.clear_id();
    copy.translate(offset);
    copy
}
