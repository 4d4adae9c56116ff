//! Drawing surface contract and the input events the engine consumes.
//!
//! The engine owns the scene; a surface renders it and reports what the user
//! did on it. Rasterization, resize handles and ink capture live behind this
//! trait.

use crate::objects::{Geometry, ObjectId, SerializableColor};
use kurbo::Point;

/// Retained-mode surface that displays the scene.
pub trait DrawingSurface {
    /// Repaint from the engine's scene.
    fn request_redraw(&mut self);

    /// Toggle ink capture. Strokes come back as [`SurfaceEvent::FreehandPathCompleted`].
    fn set_freehand_mode(&mut self, enabled: bool, color: SerializableColor, width: f64);

    /// Show selection handles for these objects.
    fn show_selection(&mut self, _ids: &[ObjectId]) {}

    /// Put a text object into inline editing.
    fn begin_text_edit(&mut self, _id: ObjectId) {}
}

/// Object lifecycle notifications raised by the surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// The user finished transforming an object with the surface's own handles.
    Modified { id: ObjectId, geometry: Geometry },
    /// The surface's selection changed (e.g. marquee select).
    SelectionChanged { ids: Vec<ObjectId> },
    /// An ink stroke finished, in world coordinates.
    FreehandPathCompleted { points: Vec<Point> },
    /// Inline text editing produced new content.
    TextChanged { id: ObjectId, text: String },
    /// Inline text editing ended.
    TextEditingExited { id: ObjectId },
}

/// Keyboard modifiers held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub position: Point,
    pub modifiers: Modifiers,
}

impl PointerInput {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_alt(mut self) -> Self {
        self.modifiers.alt = true;
        self
    }
}
