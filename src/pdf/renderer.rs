//! Page renderer - rasterizes a page with MuPDF

use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::types::{DocumentBuffer, PageRaster, Viewport};
use crate::error::{Result, StampError};

const PDF_MAGIC: &str = "pdf";

/// Render a single page (1-based) at `scale`.
///
/// The raster covers the page's visible box; pixels outside painted content
/// are opaque white.
pub fn render_page(document: &DocumentBuffer, page_number: usize, scale: f32) -> Result<PageRaster> {
    let doc = Document::from_bytes(document.bytes(), PDF_MAGIC)?;
    let count = doc.page_count()?.max(0) as usize;
    if page_number == 0 || page_number > count {
        return Err(StampError::malformed(format!(
            "page {page_number} out of range (document has {count})"
        )));
    }

    let page = doc.load_page((page_number - 1) as i32)?;
    let bounds = page.bounds()?;
    let viewport = Viewport::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0, scale);

    let transform = Matrix::new_scale(viewport.scale, viewport.scale);
    let rgb = Colorspace::device_rgb();
    let pixmap = page.to_pixmap(&transform, &rgb, false, false)?;
    let pixels = pixmap_to_rgba(&pixmap)?;

    Ok(PageRaster {
        pixels,
        width: pixmap.width(),
        height: pixmap.height(),
        viewport,
        page_number,
        generation: document.generation(),
    })
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(StampError::malformed(format!(
            "unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    let expected_min = stride.saturating_mul(height);
    if samples.len() < expected_min || row_bytes > stride {
        return Err(StampError::malformed("pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        for px in row.chunks_exact(n) {
            out.extend_from_slice(&px[..3]);
            out.push(u8::MAX);
        }
    }

    Ok(out)
}
