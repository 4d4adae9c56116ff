//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use crate::objects::{FramePreset, SerializableColor};
use kurbo::{Size, Vec2};
use serde::{Deserialize, Serialize};

/// Tunables for gestures, defaults and limits.
///
/// Every field has a default, so a partial JSON document is a valid override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drags smaller than this on both axes are discarded.
    pub degenerate_threshold: f64,
    /// Offset applied to duplicated objects.
    pub duplicate_offset: Vec2,
    pub desktop_frame: Size,
    pub tablet_frame: Size,
    pub mobile_frame: Size,
    /// Content of a freshly placed text object.
    pub default_text: String,
    pub default_font_size: f64,
    pub default_font_family: String,
    /// Fill for new shapes.
    pub default_fill: SerializableColor,
    /// Stroke for new shapes.
    pub default_stroke: SerializableColor,
    pub default_stroke_width: f64,
    /// Fill for new frames.
    pub frame_fill: SerializableColor,
    pub freehand_width: f64,
    pub freehand_color: SerializableColor,
    /// Maximum history entries (`None` keeps the full linear history).
    pub max_history: Option<usize>,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Inserted images wider than this are scaled down.
    pub max_image_width: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            degenerate_threshold: 2.0,
            duplicate_offset: Vec2::new(20.0, 20.0),
            desktop_frame: Size::new(1440.0, 1024.0),
            tablet_frame: Size::new(768.0, 1024.0),
            mobile_frame: Size::new(375.0, 812.0),
            default_text: "Type here".to_string(),
            default_font_size: 24.0,
            default_font_family: "Helvetica".to_string(),
            default_fill: SerializableColor::new(0xaa, 0xbb, 0xcc, 255),
            default_stroke: SerializableColor::new(0x11, 0x18, 0x27, 255),
            default_stroke_width: 1.0,
            frame_fill: SerializableColor::white(),
            freehand_width: 3.0,
            freehand_color: SerializableColor::new(0x11, 0x18, 0x27, 255),
            max_history: None,
            min_zoom: 0.2,
            max_zoom: 4.0,
            max_image_width: 400.0,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make gestures or frames meaningless.
    pub fn validate(&self) -> EngineResult<()> {
        if self.degenerate_threshold < 0.0 {
            return Err(EngineError::Config(
                "degenerate_threshold must not be negative".to_string(),
            ));
        }
        for preset in FramePreset::all() {
            let size = self.frame_size(*preset);
            if size.width <= 0.0 || size.height <= 0.0 {
                return Err(EngineError::Config(format!(
                    "{} frame size must be positive",
                    preset.label()
                )));
            }
        }
        if self.min_zoom <= 0.0 || self.min_zoom > self.max_zoom {
            return Err(EngineError::Config(
                "zoom range must satisfy 0 < min_zoom <= max_zoom".to_string(),
            ));
        }
        if self.max_history == Some(0) {
            return Err(EngineError::Config(
                "max_history must keep at least one entry".to_string(),
            ));
        }
        Ok(())
    }

    /// Fixed dimensions for a frame preset.
    pub fn frame_size(&self, preset: FramePreset) -> Size {
        match preset {
            FramePreset::Desktop => self.desktop_frame,
            FramePreset::Tablet => self.tablet_frame,
            FramePreset::Mobile => self.mobile_frame,
        }
    }
}
