use framecanvas_core::objects::{FramePreset, Geometry};
use framecanvas_core::testing::{RecordingChannel, RecordingSurface};
use framecanvas_core::{
    Engine, EngineConfig, ObjectId, ObjectKind, PointerInput, Scene, SceneObject, SurfaceEvent,
    ToolKind,
};
use kurbo::{Point, Rect};
use pretty_assertions::assert_eq;

fn engine() -> Engine {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.attach_surface(Box::new(RecordingSurface::new()));
    engine.connect_channel(Box::new(RecordingChannel::new()));
    engine
}

fn click(engine: &mut Engine, tool: ToolKind, x: f64, y: f64) {
    engine.set_tool(tool);
    engine.pointer_down(PointerInput::at(x, y));
    engine.pointer_up(PointerInput::at(x, y));
}

fn drag(engine: &mut Engine, tool: ToolKind, from: (f64, f64), to: (f64, f64)) {
    engine.set_tool(tool);
    engine.pointer_down(PointerInput::at(from.0, from.1));
    engine.pointer_move(PointerInput::at(to.0, to.1));
    engine.pointer_up(PointerInput::at(to.0, to.1));
}

fn last_added(engine: &Engine) -> ObjectId {
    engine.selection().single().unwrap()
}

#[test]
fn moving_a_frame_carries_children_and_their_clip() {
    let mut engine = engine();
    click(&mut engine, ToolKind::FrameDesktop, 0.0, 0.0);
    let frame = last_added(&engine);
    drag(&mut engine, ToolKind::Rectangle, (100.0, 100.0), (200.0, 200.0));
    let rect = last_added(&engine);

    let child = engine.scene().get(rect).unwrap();
    assert_eq!(child.parent_frame_id, Some(frame));
    assert_eq!(child.clip(), Some(Rect::new(0.0, 0.0, 1440.0, 1024.0)));

    // Grab the frame away from the child and move it by (50, 50).
    drag(&mut engine, ToolKind::Select, (10.0, 10.0), (60.0, 60.0));

    let child = engine.scene().get(rect).unwrap();
    assert_eq!((child.geometry.left, child.geometry.top), (150.0, 150.0));
    assert_eq!(child.parent_frame_id, Some(frame));
    assert_eq!(child.clip(), Some(Rect::new(50.0, 50.0, 1490.0, 1074.0)));
    assert_eq!(engine.scene().get(frame).unwrap().bounds(), Rect::new(50.0, 50.0, 1490.0, 1074.0));
}

#[test]
fn ids_survive_undo_and_redo() {
    let mut engine = engine();
    drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (40.0, 40.0));
    let first = last_added(&engine);
    drag(&mut engine, ToolKind::Circle, (100.0, 100.0), (140.0, 140.0));
    let second = last_added(&engine);

    engine.undo();
    assert!(engine.scene().contains(first));
    assert!(!engine.scene().contains(second));
    engine.redo();
    assert_eq!(engine.scene().z_order(), &[first, second]);
}

#[test]
fn undo_redo_undo_is_byte_identical() {
    let mut engine = engine();
    drag(&mut engine, ToolKind::Rectangle, (0.0, 0.0), (40.0, 40.0));
    let before = engine.export_document().unwrap();
    drag(&mut engine, ToolKind::Triangle, (50.0, 50.0), (90.0, 90.0));
    let after = engine.export_document().unwrap();

    engine.undo();
    assert_eq!(engine.export_document().unwrap(), before);
    engine.redo();
    assert_eq!(engine.export_document().unwrap(), after);
    engine.undo();
    assert_eq!(engine.export_document().unwrap(), before);
}

#[test]
fn frame_children_stay_contiguous_above_their_frame() {
    let mut engine = engine();
    click(&mut engine, ToolKind::FrameMobile, 0.0, 0.0);
    let frame = last_added(&engine);
    drag(&mut engine, ToolKind::Rectangle, (900.0, 900.0), (950.0, 950.0));
    let loose = last_added(&engine);
    drag(&mut engine, ToolKind::Rectangle, (10.0, 10.0), (60.0, 60.0));
    let inside = last_added(&engine);

    assert_eq!(engine.scene().z_order(), &[frame, inside, loose]);

    // Moving the loose rectangle into the frame appends it to the block.
    drag(&mut engine, ToolKind::Select, (925.0, 925.0), (125.0, 125.0));
    assert_eq!(engine.scene().z_order(), &[frame, inside, loose]);
    assert_eq!(engine.scene().get(loose).unwrap().parent_frame_id, Some(frame));

    // And dragging it back out leaves the block.
    drag(&mut engine, ToolKind::Select, (125.0, 125.0), (925.0, 925.0));
    assert_eq!(engine.scene().get(loose).unwrap().parent_frame_id, None);
}

#[test]
fn loading_heals_dangling_parents() {
    let mut scene = Scene::new();
    let mut orphan = SceneObject::new(ObjectKind::Rectangle, Geometry::new(0.0, 0.0, 20.0, 20.0));
    orphan.parent_frame_id = Some(uuid::Uuid::new_v4());
    let orphan = scene.add(orphan);
    let plain = scene.add(SceneObject::new(ObjectKind::Ellipse, Geometry::new(50.0, 50.0, 20.0, 20.0)));
    let mut wrong = SceneObject::new(ObjectKind::Rectangle, Geometry::new(60.0, 60.0, 5.0, 5.0));
    wrong.parent_frame_id = Some(plain);
    let wrong = scene.add(wrong);

    let mut engine = engine();
    engine.load_document(&scene.serialize().unwrap()).unwrap();
    for id in [orphan, wrong] {
        let object = engine.scene().get(id).unwrap();
        assert_eq!(object.parent_frame_id, None);
        assert_eq!(object.clip(), None);
    }
    assert!(!engine.view().can_undo);
}

#[test]
fn clipped_child_is_not_hit_outside_its_frame() {
    let mut scene = Scene::new();
    let frame = scene.add(SceneObject::frame(FramePreset::Mobile, Point::ZERO, 100.0, 100.0));
    let child = scene.add(SceneObject::new(ObjectKind::Rectangle, Geometry::new(70.0, 70.0, 50.0, 50.0)));
    framecanvas_core::containment::reparent_on_modify_end(&mut scene, child);
    assert_eq!(scene.hit_test(Point::new(90.0, 90.0), 0.0), Some(child));
    assert_eq!(scene.hit_test(Point::new(110.0, 110.0), 0.0), None);
    assert_eq!(scene.hit_test(Point::new(10.0, 10.0), 0.0), Some(frame));
}

#[test]
fn degenerate_drags_leave_no_trace() {
    let mut engine = engine();
    let entries = engine.history().len();
    drag(&mut engine, ToolKind::Rectangle, (10.0, 10.0), (11.0, 11.0));
    drag(&mut engine, ToolKind::Line, (10.0, 10.0), (10.5, 10.0));
    assert!(engine.scene().is_empty());
    assert_eq!(engine.history().len(), entries);
    assert_eq!(engine.tool(), ToolKind::Line);
}

#[test]
fn deleting_a_frame_takes_its_children() {
    let mut engine = engine();
    click(&mut engine, ToolKind::FrameTablet, 0.0, 0.0);
    let frame = last_added(&engine);
    drag(&mut engine, ToolKind::Rectangle, (10.0, 10.0), (60.0, 60.0));
    engine.select_object_by_id(frame);
    engine.delete_selected();
    assert!(engine.scene().is_empty());
    engine.undo();
    assert_eq!(engine.scene().len(), 2);
}

#[test]
fn duplicating_a_frame_clones_its_children() {
    let mut engine = engine();
    click(&mut engine, ToolKind::FrameMobile, 0.0, 0.0);
    let frame = last_added(&engine);
    drag(&mut engine, ToolKind::Rectangle, (10.0, 10.0), (60.0, 60.0));
    engine.select_object_by_id(frame);
    engine.duplicate_selected();
    let copy = last_added(&engine);

    assert_ne!(copy, frame);
    assert_eq!(engine.scene().len(), 4);
    let copied_children = engine.scene().children_of(copy);
    assert_eq!(copied_children.len(), 1);
    let child = engine.scene().get(copied_children[0]).unwrap();
    assert_eq!((child.geometry.left, child.geometry.top), (30.0, 30.0));
}

#[test]
fn layer_view_nests_children_under_frames() {
    let mut engine = engine();
    click(&mut engine, ToolKind::FrameDesktop, 0.0, 0.0);
    let frame = last_added(&engine);
    drag(&mut engine, ToolKind::Rectangle, (10.0, 10.0), (60.0, 60.0));
    let rect = last_added(&engine);
    drag(&mut engine, ToolKind::Rectangle, (2000.0, 2000.0), (2050.0, 2050.0));

    let layers = &engine.view().layers;
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[1].id, frame);
    assert_eq!(layers[1].name, "Desktop");
    assert_eq!(layers[1].children.len(), 1);
    assert_eq!(layers[1].children[0].id, rect);
    assert_eq!(layers[0].name, "Rectangle 2");

    engine.toggle_layer_expanded(frame);
    assert!(!engine.view().layers[1].expanded);
}

#[test]
fn surface_transform_reparents_on_modify_end() {
    let mut engine = engine();
    click(&mut engine, ToolKind::FrameMobile, 0.0, 0.0);
    let frame = last_added(&engine);
    drag(&mut engine, ToolKind::Rectangle, (1000.0, 1000.0), (1040.0, 1040.0));
    let rect = last_added(&engine);

    let mut geometry = engine.scene().get(rect).unwrap().geometry;
    geometry.left = 100.0;
    geometry.top = 100.0;
    engine.handle_surface_event(SurfaceEvent::Modified { id: rect, geometry });
    assert_eq!(engine.scene().get(rect).unwrap().parent_frame_id, Some(frame));
    assert!(engine.view().can_undo);
}
