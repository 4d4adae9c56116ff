//! Layer tree projection for the host's layer panel.

use crate::containment;
use crate::objects::ObjectId;
use crate::scene::Scene;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One row of the layer panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerNode {
    pub id: ObjectId,
    pub name: String,
    pub kind: String,
    pub is_frame: bool,
    pub expanded: bool,
    pub children: Vec<LayerNode>,
}

/// Collapsed frames in the layer panel. Frames start expanded.
#[derive(Debug, Clone, Default)]
pub struct LayerExpansion {
    collapsed: HashSet<ObjectId>,
}

impl LayerExpansion {
    pub fn is_expanded(&self, id: ObjectId) -> bool {
        !self.collapsed.contains(&id)
    }

    pub fn toggle(&mut self, id: ObjectId) {
        if !self.collapsed.remove(&id) {
            self.collapsed.insert(id);
        }
    }

    /// Forget preferences for objects that no longer exist.
    pub fn retain_live(&mut self, scene: &Scene) {
        self.collapsed.retain(|id| scene.contains(*id));
    }
}

/// Build the layer forest, topmost first, children nested under their frame.
pub fn project_layers(scene: &Scene, expansion: &LayerExpansion) -> Vec<LayerNode> {
    let mut children: HashMap<ObjectId, Vec<LayerNode>> = HashMap::new();
    let mut roots = Vec::new();

    for object in scene.ordered().rev() {
        let Some(id) = object.id() else {
            continue;
        };
        let node = LayerNode {
            id,
            name: object
                .object_name
                .clone()
                .unwrap_or_else(|| object.kind.label().to_string()),
            kind: object.kind.label().to_string(),
            is_frame: object.is_frame(),
            expanded: object.is_frame() && expansion.is_expanded(id),
            children: Vec::new(),
        };
        let parent = containment::frame_of(scene, object)
            .filter(|_| !object.is_frame())
            .and_then(|f| f.id());
        match parent {
            Some(frame) => children.entry(frame).or_default().push(node),
            None => roots.push(node),
        }
    }

    for root in &mut roots {
        if let Some(nested) = children.remove(&root.id) {
            root.children = nested;
        }
    }
    roots
}
