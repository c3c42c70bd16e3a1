//! Stamp preview composited over the canvas at the cursor

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::pdf::{Canvas, Position};

/// Decode the stamp for previewing, scaled to its on-screen footprint
pub fn preview_image(stamp_png: &[u8], footprint_px: u32) -> image::ImageResult<RgbaImage> {
    let img = image::load_from_memory(stamp_png)?.to_rgba8();
    let side = footprint_px.max(1);
    if img.dimensions() == (side, side) {
        Ok(img)
    } else {
        Ok(imageops::resize(&img, side, side, FilterType::Triangle))
    }
}

/// Copy of the canvas with `preview` drawn with its top-left at `cursor`
#[must_use]
pub fn compose(canvas: &Canvas, preview: &RgbaImage, cursor: Position) -> RgbaImage {
    let mut frame = canvas.surface().clone();
    imageops::overlay(
        &mut frame,
        preview,
        cursor.left.round() as i64,
        cursor.top.round() as i64,
    );
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use image::Rgba;

    #[test]
    fn preview_is_resized_to_footprint() {
        let png = fixtures::solid_png(16, [0, 0, 255, 255]);
        let preview = preview_image(&png, 32).unwrap();
        assert_eq!(preview.dimensions(), (32, 32));
    }

    #[test]
    fn compose_clips_negative_offsets() {
        let mut canvas = Canvas::new();
        canvas.resize(10, 10);
        let preview = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));

        let frame = compose(&canvas, &preview, Position::new(-2.0, -2.0));

        assert_eq!(*frame.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*frame.get_pixel(2, 2), Rgba([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(1, 1), Some(Rgba([0, 0, 0, 0])));
    }
}
