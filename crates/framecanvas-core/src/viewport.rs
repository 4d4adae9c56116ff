//! Viewport pan/zoom transform.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Unit of a wheel delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDeltaMode {
    /// Trackpads and precise devices.
    Pixel,
    /// Notched mouse wheels.
    Line,
}

/// A wheel or trackpad scroll in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub position: Point,
    pub delta: Vec2,
    pub mode: WheelDeltaMode,
    /// Pinch gestures arrive as ctrl+wheel.
    pub ctrl: bool,
}

/// The canvas transform: world → screen is `translate(offset) * scale(zoom)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub offset: Vec2,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    /// World to screen.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Screen to world.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Set zoom (clamped to `[min, max]`), keeping the given screen point fixed.
    pub fn zoom_to(&mut self, screen_point: Point, zoom: f64, min: f64, max: f64) {
        let new_zoom = zoom.clamp(min, max);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;
        let new_screen = self.world_to_screen(world_point);
        self.offset += screen_point - new_screen;
    }

    /// Apply a wheel event.
    ///
    /// Ctrl zooms to the cursor, a line-mode wheel zooms around the centre of
    /// `screen`, and a plain pixel-mode scroll pans.
    pub fn handle_wheel(&mut self, wheel: WheelInput, screen: Size, min: f64, max: f64) {
        let target = self.zoom * 0.999_f64.powf(wheel.delta.y);
        if wheel.ctrl {
            self.zoom_to(wheel.position, target, min, max);
        } else if wheel.mode == WheelDeltaMode::Line {
            let center = Point::new(screen.width / 2.0, screen.height / 2.0);
            self.zoom_to(center, target, min, max);
        } else {
            self.pan(-wheel.delta);
        }
    }

    /// World-space rectangle visible on a screen of the given size.
    pub fn visible_world_rect(&self, screen: Size) -> Rect {
        let a = self.screen_to_world(Point::ZERO);
        let b = self.screen_to_world(Point::new(screen.width, screen.height));
        Rect::from_points(a, b)
    }
}
