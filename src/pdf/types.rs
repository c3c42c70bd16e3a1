//! Core types for stamping and rendering

use std::sync::Arc;

use image::{Rgba, RgbaImage};

/// A point in canvas-local pixel space.
///
/// For cursor positions the stamp size has already been subtracted from
/// both axes, so the position is the top-left corner of the stamp footprint.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub left: f32,
    pub top: f32,
}

impl Position {
    #[must_use]
    pub const fn new(left: f32, top: f32) -> Self {
        Self { left, top }
    }
}

/// Immutable snapshot of the current document bytes.
///
/// Cloning shares the bytes. Every successful edit produces a successor with
/// a higher generation; the bytes themselves are never mutated.
#[derive(Clone)]
pub struct DocumentBuffer {
    bytes: Arc<[u8]>,
    generation: u64,
}

impl DocumentBuffer {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
            generation: 0,
        }
    }

    /// Wrap edited bytes as the buffer that replaces `self`
    #[must_use]
    pub fn successor(&self, bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
            generation: self.generation + 1,
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for DocumentBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuffer")
            .field("generation", &self.generation)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Pixel-space rectangle for a page at a scale factor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Width in pixels (page points times scale)
    pub width: f32,
    /// Height in pixels (page points times scale)
    pub height: f32,
    /// Scale factor used (1.0 = one pixel per point)
    pub scale: f32,
}

impl Viewport {
    /// Minimum allowed scale factor
    pub const MIN_SCALE: f32 = 0.1;

    #[must_use]
    pub fn new(page_width: f32, page_height: f32, scale: f32) -> Self {
        let scale = Self::clamp_scale(scale);
        Self {
            width: page_width * scale,
            height: page_height * scale,
            scale,
        }
    }

    /// Integer surface size; fractional pixels are truncated
    #[must_use]
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width.max(0.0) as u32, self.height.max(0.0) as u32)
    }

    /// Clamp scale to valid range, handling NaN/Inf
    #[must_use]
    pub fn clamp_scale(scale: f32) -> f32 {
        if !scale.is_finite() {
            1.0
        } else {
            scale.max(Self::MIN_SCALE)
        }
    }
}

/// Rendered page pixels before they are drawn onto a canvas.
#[derive(Clone)]
pub struct PageRaster {
    /// RGBA pixel data, 4 bytes per pixel, rows tightly packed
    pub pixels: Vec<u8>,
    /// Raster width in pixels
    pub width: u32,
    /// Raster height in pixels
    pub height: u32,
    /// Viewport the raster was produced for
    pub viewport: Viewport,
    /// Page number (1-based)
    pub page_number: usize,
    /// Generation of the document buffer that was rendered
    pub generation: u64,
}

impl std::fmt::Debug for PageRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRaster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("viewport", &self.viewport)
            .field("page_number", &self.page_number)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// The 2-D drawing surface the page is presented on.
#[derive(Clone, Debug)]
pub struct Canvas {
    surface: RgbaImage,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    #[must_use]
    pub fn new() -> Self {
        Self {
            surface: RgbaImage::new(0, 0),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    /// Resize the surface; any prior content is discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface = RgbaImage::new(width, height);
    }

    /// Size the surface to the raster's viewport and draw the raster into it.
    pub fn draw(&mut self, raster: &Arc<PageRaster>) {
        let (width, height) = raster.viewport.pixel_size();
        self.resize(width, height);

        let copy_w = width.min(raster.width) as usize;
        let copy_h = height.min(raster.height) as usize;
        let dst_stride = width as usize * 4;
        let src_stride = raster.width as usize * 4;
        let row_bytes = copy_w * 4;

        let dst: &mut [u8] = &mut self.surface;
        for y in 0..copy_h {
            let src_start = y * src_stride;
            let dst_start = y * dst_stride;
            dst[dst_start..dst_start + row_bytes]
                .copy_from_slice(&raster.pixels[src_start..src_start + row_bytes]);
        }
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.surface.get_pixel(x, y))
        } else {
            None
        }
    }

    #[must_use]
    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(width: u32, height: u32, fill: u8) -> Arc<PageRaster> {
        Arc::new(PageRaster {
            pixels: vec![fill; (width * height * 4) as usize],
            width,
            height,
            viewport: Viewport::new(width as f32, height as f32, 1.0),
            page_number: 1,
            generation: 0,
        })
    }

    #[test]
    fn successor_bumps_generation_and_keeps_original() {
        let first = DocumentBuffer::new(vec![1, 2, 3]);
        let second = first.successor(vec![4, 5]);

        assert_eq!(first.generation(), 0);
        assert_eq!(first.bytes(), &[1, 2, 3]);
        assert_eq!(second.generation(), 1);
        assert_eq!(second.bytes(), &[4, 5]);
    }

    #[test]
    fn viewport_scales_page_size() {
        let viewport = Viewport::new(612.0, 792.0, 2.0);
        assert_eq!(viewport.pixel_size(), (1224, 1584));
    }

    #[test]
    fn viewport_truncates_fractional_pixels() {
        let viewport = Viewport::new(100.7, 50.2, 1.0);
        assert_eq!(viewport.pixel_size(), (100, 50));
    }

    #[test]
    fn clamp_scale_handles_nan_and_tiny_values() {
        assert_eq!(Viewport::clamp_scale(f32::NAN), 1.0);
        assert_eq!(Viewport::clamp_scale(0.0), Viewport::MIN_SCALE);
        assert_eq!(Viewport::clamp_scale(1.5), 1.5);
    }

    #[test]
    fn draw_resizes_canvas_to_viewport() {
        let mut canvas = Canvas::new();
        canvas.draw(&raster(4, 3, 200));

        assert_eq!((canvas.width(), canvas.height()), (4, 3));
        assert_eq!(canvas.pixel(3, 2), Some(Rgba([200, 200, 200, 200])));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn draw_discards_previous_content() {
        let mut canvas = Canvas::new();
        canvas.draw(&raster(8, 8, 10));
        canvas.draw(&raster(2, 2, 90));

        assert_eq!((canvas.width(), canvas.height()), (2, 2));
        assert_eq!(canvas.pixel(1, 1), Some(Rgba([90, 90, 90, 90])));
    }

    #[test]
    fn draw_clips_raster_larger_than_viewport() {
        let mut big = PageRaster::clone(&raster(5, 5, 30));
        big.viewport = Viewport::new(3.0, 2.0, 1.0);

        let mut canvas = Canvas::new();
        canvas.draw(&Arc::new(big));

        assert_eq!((canvas.width(), canvas.height()), (3, 2));
        assert_eq!(canvas.pixel(2, 1), Some(Rgba([30, 30, 30, 30])));
    }
}
