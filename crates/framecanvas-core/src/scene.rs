//! Scene arena and document snapshots.

use crate::error::{EngineError, EngineResult};
use crate::objects::{ObjectId, SceneObject, SerializableColor, ensure_id};
use crate::viewport::Viewport;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The whole scene at one instant, in z-order (back to front).
///
/// History and replication text carries no viewport. Exported documents do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub background: SerializableColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    pub objects: Vec<SceneObject>,
}

impl DocumentSnapshot {
    /// Serialize to snapshot text.
    pub fn to_text(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse snapshot text.
    pub fn from_text(text: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Owned arena of scene objects keyed by id, plus their z-order.
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: SerializableColor,
    pub viewport: Viewport,
    objects: HashMap<ObjectId, SceneObject>,
    /// Back to front.
    z_order: Vec<ObjectId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            background: SerializableColor::white(),
            viewport: Viewport::default(),
            objects: HashMap::new(),
            z_order: Vec::new(),
        }
    }

    /// Add an object on top of the stack, assigning its id if needed.
    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let index = self.z_order.len();
        self.insert_at(index, object)
    }

    /// Insert an object at a z-order position (clamped to the stack size).
    pub fn insert_at(&mut self, index: usize, mut object: SceneObject) -> ObjectId {
        let mut id = ensure_id(&mut object);
        if self.objects.contains_key(&id) {
            object.clear_id();
            id = ensure_id(&mut object);
        }
        let index = index.min(self.z_order.len());
        self.z_order.insert(index, id);
        self.objects.insert(id, object);
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.z_order.retain(|&other| other != id);
        self.objects.remove(&id)
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.z_order.clear();
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.z_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z_order.is_empty()
    }

    /// Ids back to front.
    pub fn z_order(&self) -> &[ObjectId] {
        &self.z_order
    }

    /// Replace the z-order with a permutation of the same ids.
    ///
    /// Anything that is not a permutation is ignored.
    pub(crate) fn set_z_order(&mut self, order: Vec<ObjectId>) {
        let unique: HashSet<_> = order.iter().collect();
        if order.len() != self.z_order.len()
            || unique.len() != order.len()
            || !order.iter().all(|id| self.objects.contains_key(id))
        {
            log::warn!("Rejected z-order that is not a permutation of the scene");
            return;
        }
        self.z_order = order;
    }

    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.z_order.iter().position(|&other| other == id)
    }

    /// Objects back to front.
    pub fn ordered(&self) -> impl DoubleEndedIterator<Item = &SceneObject> {
        self.z_order.iter().filter_map(|id| self.objects.get(id))
    }

    /// Frames back to front.
    pub fn frames(&self) -> impl DoubleEndedIterator<Item = &SceneObject> {
        self.ordered().filter(|o| o.is_frame())
    }

    /// Ids of objects whose `parent_frame_id` is `frame`, in z-order.
    pub fn children_of(&self, frame: ObjectId) -> Vec<ObjectId> {
        self.ordered()
            .filter(|o| o.parent_frame_id == Some(frame))
            .filter_map(|o| o.id())
            .collect()
    }

    /// Topmost object under a world point. Clipped-away regions do not hit.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> Option<ObjectId> {
        self.ordered()
            .rev()
            .filter(|o| o.clip().is_none_or(|clip| clip.contains(point)))
            .find(|o| o.hit_test(point, tolerance))
            .and_then(|o| o.id())
    }

    /// Bounding box of all objects.
    pub fn bounds(&self) -> Option<Rect> {
        self.ordered()
            .map(|o| o.bounds())
            .reduce(|acc, b| acc.union(b))
    }

    /// Display name for a new object.
    ///
    /// Frames are named after their preset, with a counter from the second
    /// one on. Everything else is `"<Kind> <n>"`.
    pub fn next_name(&self, object: &SceneObject) -> String {
        if let Some(preset) = object.frame_preset.filter(|_| object.is_frame()) {
            let existing = self
                .frames()
                .filter(|f| f.frame_preset == Some(preset))
                .count();
            return if existing == 0 {
                preset.label().to_string()
            } else {
                format!("{} {}", preset.label(), existing + 1)
            };
        }
        let label = object.kind.label();
        let existing = self
            .ordered()
            .filter(|o| o.kind.label() == label)
            .count();
        format!("{} {}", label, existing + 1)
    }

    /// Capture background and objects. This is what history and peers see.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            background: self.background,
            viewport: None,
            objects: self.ordered().cloned().collect(),
        }
    }

    /// Serialize the scene to snapshot text, without the viewport.
    pub fn serialize(&self) -> EngineResult<String> {
        self.snapshot().to_text()
    }

    /// Serialize the scene together with its viewport.
    pub fn export(&self) -> EngineResult<String> {
        DocumentSnapshot {
            viewport: Some(self.viewport),
            ..self.snapshot()
        }
        .to_text()
    }

    /// Replace objects and background from snapshot text.
    ///
    /// The local viewport is kept. On a parse error the scene is untouched.
    pub fn restore(&mut self, text: &str) -> EngineResult<()> {
        let snapshot = DocumentSnapshot::from_text(text)?;
        self.replace_objects(snapshot.background, snapshot.objects);
        Ok(())
    }

    /// Load a snapshot, adopting its viewport if it carries one.
    pub fn load(&mut self, snapshot: DocumentSnapshot) {
        if let Some(viewport) = snapshot.viewport {
            self.viewport = viewport;
        }
        self.replace_objects(snapshot.background, snapshot.objects);
    }

    fn replace_objects(&mut self, background: SerializableColor, objects: Vec<SceneObject>) {
        self.clear();
        self.background = background;
        for object in objects {
            self.add(object);
        }
    }

    /// Look up a frame by id.
    pub fn frame(&self, id: ObjectId) -> EngineResult<&SceneObject> {
        let object = self.get(id).ok_or(EngineError::UnknownObject(id))?;
        if !object.is_frame() {
            return Err(EngineError::NotAFrame(id));
        }
        Ok(object)
    }
}
