//! Scene object definitions.
//!
//! A [`SceneObject`] is one drawable primitive plus the metadata the engine
//! attaches to it: a stable identity, frame membership and a display name.

mod templates;

pub use templates::PolygonTemplate;

use kurbo::{Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for scene objects.
pub type ObjectId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. Returns `None` for anything else.
    pub fn from_hex(color: &str) -> Option<Self> {
        if color == "transparent" {
            return Some(Self::transparent());
        }
        let hex = color.trim().strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => Some(Self::new(
                channel(&hex[0..1])? * 17,
                channel(&hex[1..2])? * 17,
                channel(&hex[2..3])? * 17,
                255,
            )),
            6 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                255,
            )),
            8 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Device preset for frame containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FramePreset {
    Desktop,
    Tablet,
    Mobile,
}

impl FramePreset {
    pub fn all() -> &'static [FramePreset] {
        &[FramePreset::Desktop, FramePreset::Tablet, FramePreset::Mobile]
    }

    /// Display label, also used as the base of frame names.
    pub fn label(&self) -> &'static str {
        match self {
            FramePreset::Desktop => "Desktop",
            FramePreset::Tablet => "Tablet",
            FramePreset::Mobile => "Mobile",
        }
    }
}

/// Primitive type plus the data only that primitive needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ObjectKind {
    Rectangle,
    /// Circles are ellipses with equal width and height.
    Ellipse,
    Triangle,
    /// Absolute endpoints; geometry is kept as their bounding box.
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    /// Points in a unit box, stretched by the scale factors.
    Polygon {
        points: Vec<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<PolygonTemplate>,
    },
    /// Free-drawn stroke; points are relative to `left`/`top`.
    Path { points: Vec<Point> },
    Text,
    Image { src: String },
    Frame,
}

impl ObjectKind {
    /// Human-readable kind, used for object names and layer rows.
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Rectangle => "Rectangle",
            ObjectKind::Ellipse => "Circle",
            ObjectKind::Triangle => "Triangle",
            ObjectKind::Line { .. } => "Line",
            ObjectKind::Polygon { template, .. } => match template {
                Some(t) => t.label(),
                None => "Polygon",
            },
            ObjectKind::Path { .. } => "Path",
            ObjectKind::Text => "Text",
            ObjectKind::Image { .. } => "Image",
            ObjectKind::Frame => "Frame",
        }
    }
}

/// Position, size and transform factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    /// Unscaled width.
    pub width: f64,
    /// Unscaled height.
    pub height: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Geometry {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Scaled width, never negative.
    pub fn scaled_width(&self) -> f64 {
        (self.width * self.scale_x).max(0.0)
    }

    /// Scaled height, never negative.
    pub fn scaled_height(&self) -> f64 {
        (self.height * self.scale_y).max(0.0)
    }

    /// Set the scaled width, keeping the raw width when it is usable.
    pub fn set_scaled_width(&mut self, value: f64) {
        let value = value.max(0.0);
        if self.width > f64::EPSILON {
            self.scale_x = value / self.width;
        } else {
            self.width = value;
            self.scale_x = 1.0;
        }
    }

    /// Set the scaled height, keeping the raw height when it is usable.
    pub fn set_scaled_height(&mut self, value: f64) {
        let value = value.max(0.0);
        if self.height > f64::EPSILON {
            self.scale_y = value / self.height;
        } else {
            self.height = value;
            self.scale_y = 1.0;
        }
    }
}

/// Fill, stroke and opacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paint {
    #[serde(default)]
    pub fill: Option<SerializableColor>,
    #[serde(default)]
    pub stroke: Option<SerializableColor>,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: Some(SerializableColor::black()),
            stroke_width: 1.0,
            opacity: 1.0,
        }
    }
}

/// Text attributes for text objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    /// CSS-style weight, e.g. `"400"` or `"700"`.
    pub font_weight: String,
}

impl TextRun {
    /// Approximate layout box; the surface reports the real one on modify.
    pub fn estimated_size(&self) -> (f64, f64) {
        let longest = self
            .text
            .lines()
            .map(|l| l.chars().count())
            .max()
            .unwrap_or(0)
            .max(1);
        let lines = self.text.lines().count().max(1);
        (
            longest as f64 * self.font_size * 0.6,
            lines as f64 * self.font_size * 1.2,
        )
    }
}

/// A drawable primitive in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    /// Assigned once by [`ensure_id`]; absent until the engine first sees the object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) object_id: Option<ObjectId>,
    pub kind: ObjectKind,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(flatten)]
    pub paint: Paint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextRun>,
    /// Lookup-only back-reference to the containing frame.
    #[serde(default)]
    pub parent_frame_id: Option<ObjectId>,
    #[serde(default)]
    pub is_frame: bool,
    #[serde(default)]
    pub frame_preset: Option<FramePreset>,
    #[serde(default)]
    pub object_name: Option<String>,
    /// Visual clip region, derived from the parent frame on every reconcile pass.
    #[serde(skip)]
    pub(crate) clip: Option<Rect>,
}

impl SceneObject {
    /// Create an unidentified object of the given kind.
    pub fn new(kind: ObjectKind, geometry: Geometry) -> Self {
        let is_frame = matches!(kind, ObjectKind::Frame);
        Self {
            object_id: None,
            kind,
            geometry,
            paint: Paint::default(),
            text: None,
            parent_frame_id: None,
            is_frame,
            frame_preset: None,
            object_name: None,
            clip: None,
        }
    }

    /// Create a frame of a preset size.
    pub fn frame(preset: FramePreset, origin: Point, width: f64, height: f64) -> Self {
        let mut frame = Self::new(
            ObjectKind::Frame,
            Geometry::new(origin.x, origin.y, width, height),
        );
        frame.frame_preset = Some(preset);
        frame
    }

    /// Create a line between two points.
    pub fn line(start: Point, end: Point) -> Self {
        let mut line = Self::new(
            ObjectKind::Line {
                x1: start.x,
                y1: start.y,
                x2: end.x,
                y2: end.y,
            },
            Geometry::new(start.x, start.y, 0.0, 0.0),
        );
        line.sync_line_bounds();
        line
    }

    /// Create a free-drawn path from absolute points.
    pub fn path(points: &[Point]) -> Self {
        let bounds = points_bounds(points);
        let relative = points
            .iter()
            .map(|p| Point::new(p.x - bounds.x0, p.y - bounds.y0))
            .collect();
        Self::new(
            ObjectKind::Path { points: relative },
            Geometry::new(bounds.x0, bounds.y0, bounds.width(), bounds.height()),
        )
    }

    /// Create a text object at a point.
    pub fn text(origin: Point, run: TextRun) -> Self {
        let (width, height) = run.estimated_size();
        let mut text = Self::new(
            ObjectKind::Text,
            Geometry::new(origin.x, origin.y, width, height),
        );
        text.text = Some(run);
        text
    }

    /// The identifier, if one has been assigned.
    pub fn id(&self) -> Option<ObjectId> {
        self.object_id
    }

    /// Forget the identifier so the next [`ensure_id`] assigns a fresh one.
    pub(crate) fn clear_id(&mut self) {
        self.object_id = None;
    }

    pub fn is_frame(&self) -> bool {
        self.is_frame
    }

    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    /// Scaled bounding size.
    pub fn dimensions(&self) -> kurbo::Size {
        dimensions(self)
    }

    /// Axis-aligned bounding box in world coordinates (rotation is ignored).
    pub fn bounds(&self) -> Rect {
        let g = &self.geometry;
        Rect::new(
            g.left,
            g.top,
            g.left + g.scaled_width(),
            g.top + g.scaled_height(),
        )
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Move by a delta, keeping line endpoints in step with the geometry.
    pub fn translate(&mut self, delta: Vec2) {
        self.geometry.left += delta.x;
        self.geometry.top += delta.y;
        if let ObjectKind::Line { x1, y1, x2, y2 } = &mut self.kind {
            *x1 += delta.x;
            *y1 += delta.y;
            *x2 += delta.x;
            *y2 += delta.y;
        }
    }

    /// Move the second endpoint of a line.
    pub fn set_line_end(&mut self, end: Point) {
        if let ObjectKind::Line { x2, y2, .. } = &mut self.kind {
            *x2 = end.x;
            *y2 = end.y;
        }
        self.sync_line_bounds();
    }

    /// Endpoints of a line object.
    pub fn line_endpoints(&self) -> Option<(Point, Point)> {
        match self.kind {
            ObjectKind::Line { x1, y1, x2, y2 } => {
                Some((Point::new(x1, y1), Point::new(x2, y2)))
            }
            _ => None,
        }
    }

    fn sync_line_bounds(&mut self) {
        if let Some((a, b)) = self.line_endpoints() {
            self.geometry.left = a.x.min(b.x);
            self.geometry.top = a.y.min(b.y);
            self.geometry.width = (a.x - b.x).abs();
            self.geometry.height = (a.y - b.y).abs();
            self.geometry.scale_x = 1.0;
            self.geometry.scale_y = 1.0;
        }
    }

    /// Check if a point (in world coordinates) hits this object.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match &self.kind {
            ObjectKind::Line { .. } => {
                let Some((a, b)) = self.line_endpoints() else {
                    return false;
                };
                point_to_segment_dist(point, a, b)
                    <= tolerance + self.paint.stroke_width / 2.0
            }
            ObjectKind::Path { points } => {
                let origin = Vec2::new(self.geometry.left, self.geometry.top);
                let absolute: Vec<Point> = points.iter().map(|p| *p + origin).collect();
                point_to_polyline_dist(point, &absolute)
                    <= tolerance + self.paint.stroke_width / 2.0
            }
            _ => self.bounds().inflate(tolerance, tolerance).contains(point),
        }
    }
}

/// Assign an identifier on first call; later calls return the same one.
pub fn ensure_id(object: &mut SceneObject) -> ObjectId {
    *object.object_id.get_or_insert_with(Uuid::new_v4)
}

/// Scaled bounding size of an object, clamped to non-negative.
pub fn dimensions(object: &SceneObject) -> kurbo::Size {
    kurbo::Size::new(
        object.geometry.scaled_width(),
        object.geometry.scaled_height(),
    )
}

fn points_bounds(points: &[Point]) -> Rect {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return Rect::ZERO;
    };
    iter.fold(Rect::from_points(*first, *first), |rect, p| {
        rect.union_pt(*p)
    })
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    if let [only] = points {
        return (point - *only).hypot();
    }
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}
