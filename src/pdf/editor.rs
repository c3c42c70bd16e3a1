//! Stamp editor - embeds the stamp image on the first page
//!
//! The document is loaded into an editable `lopdf` model, the stamp is added
//! as an image XObject (RGB samples plus a soft mask for alpha) and a new
//! content stream draws it. The input bytes are never touched; callers get a
//! fresh serialised buffer or an error.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use super::types::Position;
use crate::error::{Result, StampError};

/// The page stamps are drawn on (1-based); the widget renders the same page
pub const STAMPED_PAGE: usize = 1;

/// Name prefix for stamp XObjects in the page resources
pub const STAMP_XOBJECT_PREFIX: &str = "Stamp";

/// Page size used when the page tree carries no MediaBox (US Letter)
const FALLBACK_PAGE_BOX: PageBox = PageBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Guard against cycles in the page tree
const MAX_TREE_DEPTH: usize = 64;

/// Visible page rectangle in PDF user space (origin bottom-left)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    #[must_use]
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    fn normalized(self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    fn intersect(self, other: Self) -> Self {
        Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }
}

/// Where the stamp lands in PDF user space.
///
/// `x`/`y` are the lower-left corner of the image; `size` is the edge length
/// of the square footprint, in points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl Placement {
    /// Map a cursor position (canvas pixels, stamp top-left) to page space.
    ///
    /// Screen y grows downwards, PDF y grows upwards, so the vertical axis is
    /// flipped against the page height and shifted by the stamp size.
    #[must_use]
    pub fn from_position(position: Position, page: PageBox, scale: f32, size: f32) -> Self {
        let scale = super::Viewport::clamp_scale(scale);
        Self {
            x: page.x0 + position.left / scale,
            y: page.y0 + page.height() - position.top / scale - size,
            size,
        }
    }
}

/// Decoded stamp samples ready for embedding
#[derive(Clone, Debug)]
pub struct StampImage {
    pub width: u32,
    pub height: u32,
    rgb: Vec<u8>,
    /// `None` when every pixel is fully opaque
    alpha: Option<Vec<u8>>,
}

impl StampImage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(StampError::malformed("stamp image has no pixels"));
        }

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in img.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel[3]);
        }

        let alpha = if alpha.iter().all(|&a| a == u8::MAX) {
            None
        } else {
            Some(alpha)
        };

        Ok(Self {
            width,
            height,
            rgb,
            alpha,
        })
    }

    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }
}

/// Stamp `stamp_png` onto page 1 of `document` and return the new bytes.
///
/// `position` is the cursor position in canvas pixels rendered at `scale`;
/// the stamp covers a `size` x `size` square in page space.
pub fn stamp(
    document: &[u8],
    stamp_png: &[u8],
    position: Position,
    scale: f32,
    size: f32,
) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(document)?;
    let page_id = first_page(&doc)?;
    let page_box = page_box(&doc, page_id)?;
    let placement = Placement::from_position(position, page_box, scale, size);

    let image = StampImage::decode(stamp_png)?;
    let image_id = embed_image(&mut doc, &image)?;
    let name = install_xobject(&mut doc, page_id, image_id)?;
    append_draw(&mut doc, page_id, &name, placement)?;

    debug!(
        "Stamped /{name} at ({}, {}) size {} on page box {:?}",
        placement.x, placement.y, placement.size, page_box
    );

    let mut out = Vec::with_capacity(document.len() + image.rgb.len() / 2);
    doc.save_to(&mut out)
        .map_err(|e| StampError::malformed(format!("serialise failed: {e}")))?;
    Ok(out)
}

/// Names of stamp XObjects on page 1, in resource order
pub fn stamp_names(document: &[u8]) -> Result<Vec<String>> {
    let doc = Document::load_mem(document)?;
    let page_id = first_page(&doc)?;
    let Some(resources) = inherited_attribute(&doc, page_id, b"Resources")? else {
        return Ok(Vec::new());
    };
    let resources = resources
        .as_dict()
        .map_err(|_| StampError::malformed("page resources are not a dictionary"))?;
    let xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve(&doc, obj)?
            .as_dict()
            .map_err(|_| StampError::malformed("XObject resources are not a dictionary"))?,
        Err(_) => return Ok(Vec::new()),
    };

    Ok(xobjects
        .iter()
        .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
        .filter(|name| name.starts_with(STAMP_XOBJECT_PREFIX))
        .collect())
}

fn first_page(doc: &Document) -> Result<ObjectId> {
    doc.get_pages()
        .get(&(STAMPED_PAGE as u32))
        .copied()
        .ok_or_else(|| StampError::malformed("document has no pages"))
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Look up an inheritable page attribute, walking up the page tree
fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        if depth > MAX_TREE_DEPTH {
            return Err(StampError::malformed("page tree too deep or cyclic"));
        }
        depth += 1;

        let dict = doc
            .get_object(id)
            .and_then(Object::as_dict)
            .map_err(|_| StampError::malformed("page node is not a dictionary"))?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value).map(Some);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(None)
}

fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    let media = inherited_attribute(doc, page_id, b"MediaBox")?
        .and_then(rect_from_object)
        .map(PageBox::normalized)
        .unwrap_or(FALLBACK_PAGE_BOX);

    let visible = match inherited_attribute(doc, page_id, b"CropBox")?.and_then(rect_from_object) {
        Some(crop) => crop.normalized().intersect(media),
        None => media,
    };

    if visible.width() <= 0.0 || visible.height() <= 0.0 {
        return Err(StampError::malformed("page box is empty"));
    }
    Ok(visible)
}

fn rect_from_object(obj: &Object) -> Option<PageBox> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    Some(PageBox {
        x0: obj_to_f32(&arr[0])?,
        y0: obj_to_f32(&arr[1])?,
        x1: obj_to_f32(&arr[2])?,
        y1: obj_to_f32(&arr[3])?,
    })
}

fn obj_to_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f as f32),
        _ => None,
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|()| encoder.finish())
        .map_err(|e| StampError::malformed(format!("compress image samples: {e}")))
}

fn embed_image(doc: &mut Document, image: &StampImage) -> Result<ObjectId> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(image.width),
        "Height" => i64::from(image.height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = &image.alpha {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(alpha)?,
        );
        let smask_id = doc.add_object(smask);
        dict.set("SMask", smask_id);
    }

    Ok(doc.add_object(Stream::new(dict, deflate(&image.rgb)?)))
}

/// Register the image in the page's XObject resources under a fresh name.
///
/// The effective resources (possibly inherited or shared through a
/// reference) are copied onto the page as a direct dictionary, so other
/// pages sharing them are left alone.
fn install_xobject(doc: &mut Document, page_id: ObjectId, image_id: ObjectId) -> Result<String> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources")? {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(_) => return Err(StampError::malformed("page resources are not a dictionary")),
        None => Dictionary::new(),
    };

    let mut xobjects = match resources.get(b"XObject") {
        Ok(obj) => match resolve(doc, obj)? {
            Object::Dictionary(dict) => dict.clone(),
            _ => return Err(StampError::malformed("XObject resources are not a dictionary")),
        },
        Err(_) => Dictionary::new(),
    };

    let name = unique_name(&xobjects);
    xobjects.set(name.clone(), image_id);
    resources.set("XObject", Object::Dictionary(xobjects));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(name)
}

fn unique_name(xobjects: &Dictionary) -> String {
    let mut n = xobjects.len() + 1;
    loop {
        let name = format!("{STAMP_XOBJECT_PREFIX}{n}");
        if !xobjects.has(name.as_bytes()) {
            return name;
        }
        n += 1;
    }
}

/// Wrap existing content in `q`/`Q` and append the stamp drawing operators
fn append_draw(doc: &mut Document, page_id: ObjectId, name: &str, at: Placement) -> Result<()> {
    let current = page_dict(doc, page_id)?.get(b"Contents").ok().cloned();

    let mut parts = Vec::new();
    match current {
        None => {}
        Some(Object::Reference(id)) => match doc.get_object(id)? {
            Object::Array(items) => parts.extend(items.iter().cloned()),
            _ => parts.push(Object::Reference(id)),
        },
        Some(Object::Array(items)) => parts.extend(items),
        Some(_) => return Err(StampError::malformed("unsupported page /Contents entry")),
    }

    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let draw = format!(
        "Q\nq\n{size} 0 0 {size} {x} {y} cm\n/{name} Do\nQ\n",
        size = at.size,
        x = at.x,
        y = at.y,
    );
    let draw_id = doc.add_object(Stream::new(dictionary! {}, draw.into_bytes()));

    let mut contents = Vec::with_capacity(parts.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(parts);
    contents.push(Object::Reference(draw_id));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

fn page_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary> {
    doc.get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|_| StampError::malformed("page is not a dictionary"))
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| StampError::malformed("page is not a dictionary"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    const LETTER: PageBox = PageBox {
        x0: 0.0,
        y0: 0.0,
        x1: 612.0,
        y1: 792.0,
    };

    #[test]
    fn placement_flips_vertical_axis() {
        // click at canvas (200, 300) -> cursor (72, 172)
        let placement = Placement::from_position(Position::new(72.0, 172.0), LETTER, 1.0, 128.0);

        assert_eq!(placement.x, 72.0);
        assert_eq!(placement.y, 792.0 - 172.0 - 128.0);
        assert_eq!(placement.size, 128.0);
    }

    #[test]
    fn placement_divides_by_render_scale() {
        let placement = Placement::from_position(Position::new(200.0, 100.0), LETTER, 2.0, 128.0);

        assert_eq!(placement.x, 100.0);
        assert_eq!(placement.y, 792.0 - 50.0 - 128.0);
    }

    #[test]
    fn placement_respects_box_origin() {
        let shifted = PageBox {
            x0: 10.0,
            y0: 20.0,
            x1: 210.0,
            y1: 320.0,
        };
        let placement = Placement::from_position(Position::new(0.0, 0.0), shifted, 1.0, 128.0);

        assert_eq!(placement.x, 10.0);
        assert_eq!(placement.y, 20.0 + 300.0 - 128.0);
    }

    #[test]
    fn decode_drops_alpha_for_opaque_images() {
        let png = fixtures::solid_png(4, [255, 0, 0, 255]);
        let image = StampImage::decode(&png).unwrap();

        assert_eq!((image.width, image.height), (4, 4));
        assert!(!image.has_alpha());
    }

    #[test]
    fn decode_keeps_alpha_for_translucent_images() {
        let png = fixtures::solid_png(4, [0, 0, 255, 128]);
        let image = StampImage::decode(&png).unwrap();
        assert!(image.has_alpha());
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = StampImage::decode(b"not a png").unwrap_err();
        assert!(matches!(err, StampError::MalformedDocument { .. }));
    }

    #[test]
    fn stamp_adds_named_xobject_and_leaves_input_alone() {
        let pdf = fixtures::letter_pdf();
        let original = pdf.clone();
        let png = fixtures::solid_png(128, [255, 0, 0, 255]);

        let stamped = stamp(&pdf, &png, Position::new(72.0, 172.0), 1.0, 128.0).unwrap();

        assert_eq!(pdf, original);
        assert_ne!(stamped, pdf);
        assert_eq!(stamp_names(&stamped).unwrap(), vec!["Stamp1".to_string()]);
    }

    #[test]
    fn stamp_writes_expected_matrix() {
        let pdf = fixtures::letter_pdf();
        let png = fixtures::solid_png(128, [255, 0, 0, 255]);
        let stamped = stamp(&pdf, &png, Position::new(72.0, 172.0), 1.0, 128.0).unwrap();

        let doc = Document::load_mem(&stamped).unwrap();
        let page_id = first_page(&doc).unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);

        assert!(text.contains("128 0 0 128 72 492 cm"), "content was: {text}");
        assert!(text.contains("/Stamp1 Do"));
        assert!(text.starts_with("q\n"));
    }

    #[test]
    fn second_stamp_gets_a_distinct_name() {
        let pdf = fixtures::letter_pdf();
        let png = fixtures::solid_png(128, [255, 0, 0, 255]);

        let once = stamp(&pdf, &png, Position::new(10.0, 10.0), 1.0, 128.0).unwrap();
        let twice = stamp(&once, &png, Position::new(300.0, 400.0), 1.0, 128.0).unwrap();

        let mut names = stamp_names(&twice).unwrap();
        names.sort();
        assert_eq!(names, vec!["Stamp1".to_string(), "Stamp2".to_string()]);
    }

    #[test]
    fn stamp_copies_inherited_resources_onto_page() {
        let pdf = fixtures::pdf_with_inherited_resources();
        let png = fixtures::solid_png(16, [0, 255, 0, 255]);
        let stamped = stamp(&pdf, &png, Position::new(0.0, 0.0), 1.0, 128.0).unwrap();

        let doc = Document::load_mem(&stamped).unwrap();
        let page_id = first_page(&doc).unwrap();
        let resources = page_dict(&doc, page_id)
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();

        assert!(resources.has(b"ExtGState"), "inherited entries must survive");
        assert!(xobjects.has(b"Stamp1"));
    }

    #[test]
    fn stamp_rejects_invalid_document() {
        let png = fixtures::solid_png(8, [0, 0, 0, 255]);
        let err = stamp(b"%PDF-1.4 garbage", &png, Position::default(), 1.0, 128.0).unwrap_err();
        assert!(matches!(err, StampError::MalformedDocument { .. }));
    }

    #[test]
    fn stamp_rejects_invalid_image() {
        let pdf = fixtures::letter_pdf();
        let err = stamp(&pdf, b"nope", Position::default(), 1.0, 128.0).unwrap_err();
        assert!(matches!(err, StampError::MalformedDocument { .. }));
    }

    #[test]
    fn page_box_reads_inherited_media_box() {
        let doc = Document::load_mem(&fixtures::letter_pdf()).unwrap();
        let page_id = first_page(&doc).unwrap();
        assert_eq!(page_box(&doc, page_id).unwrap(), LETTER);
    }
}
