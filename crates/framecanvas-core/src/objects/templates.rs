//! Unit-box outlines for template polygons.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Named polygon outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolygonTemplate {
    Diamond,
    Star,
    Arrow,
}

impl PolygonTemplate {
    pub fn label(&self) -> &'static str {
        match self {
            PolygonTemplate::Diamond => "Diamond",
            PolygonTemplate::Star => "Star",
            PolygonTemplate::Arrow => "Arrow",
        }
    }

    /// Outline points inside the unit box `(0,0)-(1,1)`.
    pub fn points(&self) -> Vec<Point> {
        match self {
            PolygonTemplate::Diamond => vec![
                Point::new(0.5, 0.0),
                Point::new(1.0, 0.5),
                Point::new(0.5, 1.0),
                Point::new(0.0, 0.5),
            ],
            PolygonTemplate::Star => star_points(5, 0.5, 0.2),
            PolygonTemplate::Arrow => vec![
                Point::new(0.0, 0.3),
                Point::new(0.6, 0.3),
                Point::new(0.6, 0.0),
                Point::new(1.0, 0.5),
                Point::new(0.6, 1.0),
                Point::new(0.6, 0.7),
                Point::new(0.0, 0.7),
            ],
        }
    }
}

fn star_points(spikes: usize, outer: f64, inner: f64) -> Vec<Point> {
    let center = Point::new(0.5, 0.5);
    (0..spikes * 2)
        .map(|i| {
            let radius = if i % 2 == 0 { outer } else { inner };
            let angle = -PI / 2.0 + i as f64 * PI / spikes as f64;
            Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}
