//! Image decoding for inserted image files.

use crate::error::{EngineError, EngineResult};
use crate::objects::{Geometry, ObjectKind, SceneObject};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kurbo::Point;
use std::io::Cursor;

/// Read the natural size of an encoded image and wrap its bytes in a data URL.
pub fn decode_image(bytes: &[u8]) -> EngineResult<(u32, u32, String)> {
    let format =
        image::guess_format(bytes).map_err(|e| EngineError::ImageDecode(e.to_string()))?;
    let reader = image::ImageReader::with_format(Cursor::new(bytes), format);
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| EngineError::ImageDecode(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(EngineError::ImageDecode("image has no pixels".to_string()));
    }
    let url = format!("data:{};base64,{}", format.to_mime_type(), STANDARD.encode(bytes));
    Ok((width, height, url))
}

/// Build an image object centred on `center`, no wider than `max_width`.
pub fn image_object(bytes: &[u8], center: Point, max_width: f64) -> EngineResult<SceneObject> {
    let (width, height, src) = decode_image(bytes)?;
    let (width, height) = (f64::from(width), f64::from(height));
    let scale = if width > max_width { max_width / width } else { 1.0 };
    let mut geometry = Geometry::new(
        center.x - width * scale / 2.0,
        center.y - height * scale / 2.0,
        width,
        height,
    );
    geometry.scale_x = scale;
    geometry.scale_y = scale;
    let mut object = SceneObject::new(ObjectKind::Image { src }, geometry);
    object.paint.fill = None;
    object.paint.stroke = None;
    object.paint.stroke_width = 0.0;
    Ok(object)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A valid 1x1 PNG.
    pub(crate) const PIXEL_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8,
        0xCF, 0xC0, 0xF0, 0x1F, 0x00, 0x05, 0x00, 0x01, 0xFF, 0x89, 0x99, 0x3D, 0x1D, 0x00, 0x00,
        0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_decode_png_header() {
        let (w, h, url) = decode_image(PIXEL_PNG).unwrap();
        assert_eq!((w, h), (1, 1));
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_rejects_garbage() {
        let result = decode_image(b"definitely not an image");
        assert!(matches!(result, Err(EngineError::ImageDecode(_))));
    }

    #[test]
    fn test_image_is_centered() {
        let object = image_object(PIXEL_PNG, Point::new(100.0, 50.0), 400.0).unwrap();
        assert!((object.geometry.left - 99.5).abs() < f64::EPSILON);
        assert!((object.geometry.top - 49.5).abs() < f64::EPSILON);
        assert_eq!(object.kind.label(), "Image");
    }
}
