//! Frame containment, clipping and stack blocks.
//!
//! Frames own their children only logically: a child carries the frame's id
//! in `parent_frame_id` and that key is resolved against the scene each time.
//! [`reconcile_all`] re-derives every clip and drops dangling references, so it
//! can run after any mutation regardless of how the scene got there.

use crate::objects::{ObjectId, SceneObject};
use crate::scene::Scene;
use kurbo::{Point, Vec2};
use std::collections::HashSet;

/// Topmost frame whose bounding box contains `point`.
///
/// `exclude` skips one object, so an object never finds itself.
pub fn frame_containing(scene: &Scene, point: Point, exclude: Option<ObjectId>) -> Option<ObjectId> {
    scene
        .frames()
        .rev()
        .filter(|f| f.id() != exclude)
        .find(|f| f.bounds().contains(point))
        .and_then(|f| f.id())
}

/// The live frame an object belongs to, or `None` if unparented or dangling.
pub fn frame_of<'a>(scene: &'a Scene, object: &SceneObject) -> Option<&'a SceneObject> {
    object
        .parent_frame_id
        .and_then(|id| scene.get(id))
        .filter(|f| f.is_frame())
}

/// Clip every child of `frame` to the frame's current bounds.
pub fn sync_child_clipping(scene: &mut Scene, frame: ObjectId) {
    let Some(bounds) = scene.get(frame).filter(|f| f.is_frame()).map(|f| f.bounds()) else {
        return;
    };
    for child in scene.children_of(frame) {
        if let Some(obj) = scene.get_mut(child) {
            obj.clip = Some(bounds);
        }
    }
}

/// Full pass: clear dangling or invalid parents, re-derive every clip and
/// make every frame's stack block contiguous.
pub fn reconcile_all(scene: &mut Scene) {
    let ids: Vec<ObjectId> = scene.z_order().to_vec();
    let mut healed = 0usize;
    for id in ids {
        let parent_bounds = scene
            .get(id)
            .and_then(|obj| frame_of(scene, obj).filter(|_| !obj.is_frame()))
            .map(|f| f.bounds());
        if let Some(obj) = scene.get_mut(id) {
            match parent_bounds {
                Some(bounds) => obj.clip = Some(bounds),
                None => {
                    if obj.parent_frame_id.take().is_some() {
                        healed += 1;
                    }
                    obj.clip = None;
                }
            }
        }
    }
    if healed > 0 {
        log::debug!("Cleared {healed} dangling frame references");
    }
    normalize_all(scene);
}

/// Move the children of `frame` directly after it, keeping their relative order.
pub fn normalize_stack(scene: &mut Scene, frame: ObjectId) {
    normalize_frames(scene, |id| id == frame);
}

/// Make every frame's stack block contiguous.
pub fn normalize_all(scene: &mut Scene) {
    normalize_frames(scene, |_| true);
}

fn normalize_frames(scene: &mut Scene, mut include: impl FnMut(ObjectId) -> bool) {
    let frames: HashSet<ObjectId> = scene
        .frames()
        .filter_map(|f| f.id())
        .filter(|&id| include(id))
        .collect();
    if frames.is_empty() {
        return;
    }
    let parent = |id: ObjectId| {
        scene
            .get(id)
            .filter(|o| !o.is_frame())
            .and_then(|o| o.parent_frame_id)
            .filter(|p| frames.contains(p))
    };
    let mut order = Vec::with_capacity(scene.len());
    for &id in scene.z_order() {
        if parent(id).is_some() {
            continue;
        }
        order.push(id);
        if frames.contains(&id) {
            order.extend(scene.z_order().iter().copied().filter(|&c| parent(c) == Some(id)));
        }
    }
    if order != scene.z_order() {
        scene.set_z_order(order);
    }
}

/// Re-parent an object after a drag or resize ends.
///
/// The object's centre decides membership. Frames only resync their
/// children's clips. Returns true if the parent changed.
pub fn reparent_on_modify_end(scene: &mut Scene, id: ObjectId) -> bool {
    let Some(obj) = scene.get(id) else {
        return false;
    };
    if obj.is_frame() {
        sync_child_clipping(scene, id);
        normalize_stack(scene, id);
        return false;
    }
    let old = obj.parent_frame_id;
    let new = frame_containing(scene, obj.center(), Some(id));
    let clip = new.and_then(|f| scene.get(f)).map(|f| f.bounds());
    if let Some(obj) = scene.get_mut(id) {
        obj.parent_frame_id = new;
        obj.clip = clip;
    }
    for frame in [old, new].into_iter().flatten() {
        normalize_stack(scene, frame);
    }
    if old != new {
        log::debug!("Reparented {id}: {old:?} -> {new:?}");
    }
    old != new
}

/// Translate an object; frames carry their children and resync clips.
pub fn move_with_children(scene: &mut Scene, id: ObjectId, delta: Vec2) {
    let Some(obj) = scene.get_mut(id) else {
        return;
    };
    obj.translate(delta);
    if !obj.is_frame() {
        return;
    }
    for child in scene.children_of(id) {
        if let Some(child) = scene.get_mut(child) {
            child.translate(delta);
        }
    }
    sync_child_clipping(scene, id);
}

/// Remove an object; a frame takes its children with it.
pub fn remove_with_children(scene: &mut Scene, id: ObjectId) -> Vec<SceneObject> {
    let mut removed = Vec::new();
    let is_frame = scene.get(id).is_some_and(|o| o.is_frame());
    if is_frame {
        for child in scene.children_of(id) {
            removed.extend(scene.remove(child));
        }
    }
    removed.extend(scene.remove(id));
    removed
}

/// Ids of a frame's stack block (frame first), or just `id` for other objects.
fn block_of(scene: &Scene, id: ObjectId) -> Vec<ObjectId> {
    let mut block = vec![id];
    if scene.get(id).is_some_and(|o| o.is_frame()) {
        block.extend(scene.children_of(id));
    }
    block
}

/// Raise an object to the top of the stack it may move within.
///
/// Frames move with their whole block; frame children stay inside their
/// frame's block.
pub fn bring_to_front(scene: &mut Scene, id: ObjectId) {
    restack(scene, id, true);
}

/// Lower an object to the bottom of the stack it may move within.
pub fn send_to_back(scene: &mut Scene, id: ObjectId) {
    restack(scene, id, false);
}

fn restack(scene: &mut Scene, id: ObjectId, to_front: bool) {
    let Some(obj) = scene.get(id) else {
        return;
    };
    let parent = frame_of(scene, obj).and_then(|f| f.id()).filter(|_| !obj.is_frame());
    normalize_all(scene);

    let mut order: Vec<ObjectId> = scene.z_order().to_vec();
    match parent {
        Some(frame) => {
            let siblings = scene.children_of(frame).len();
            let Some(start) = scene.index_of(frame) else {
                return;
            };
            order.retain(|&other| other != id);
            let target = if to_front { start + siblings } else { start + 1 };
            order.insert(target.min(order.len()), id);
        }
        None => {
            let block = block_of(scene, id);
            order.retain(|other| !block.contains(other));
            if to_front {
                order.extend(block);
            } else {
                order.splice(0..0, block);
            }
        }
    }
    scene.set_z_order(order);
}
