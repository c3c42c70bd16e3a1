pub mod fixtures {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};
    use lopdf::{Document, Object, Stream, dictionary};

    use crate::assets::MemoryAssetSource;

    /// Content of the fixture page: a grey box near the bottom-left corner
    pub const PAGE_CONTENT: &[u8] = b"0.8 g\n50 50 200 100 re f\n";

    /// Single US Letter page whose MediaBox lives on the Pages node
    pub fn letter_pdf() -> Vec<u8> {
        build_pdf(1, dictionary! {})
    }

    /// Two Letter pages with the same content
    pub fn two_page_pdf() -> Vec<u8> {
        build_pdf(2, dictionary! {})
    }

    /// Single page whose Resources (with an ExtGState entry) are inherited
    pub fn pdf_with_inherited_resources() -> Vec<u8> {
        build_pdf(
            1,
            dictionary! {
                "Resources" => dictionary! {
                    "ExtGState" => dictionary! {
                        "GS0" => dictionary! {
                            "Type" => "ExtGState",
                            "CA" => 1,
                        },
                    },
                },
            },
        )
    }

    fn build_pdf(page_count: usize, pages_extra: lopdf::Dictionary) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids = (0..page_count)
            .map(|_| {
                let content_id =
                    doc.add_object(Stream::new(dictionary! {}, PAGE_CONTENT.to_vec()));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                });
                Object::Reference(page_id)
            })
            .collect::<Vec<_>>();

        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count as i64),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        };
        for (key, value) in pages_extra.iter() {
            pages.set(key.clone(), value.clone());
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("fixture PDF serialises");
        out
    }

    /// Square PNG of one colour
    pub fn solid_png(size: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(size, size, Rgba(rgba));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)
            .expect("fixture PNG encodes");
        out.into_inner()
    }

    /// Letter page plus an opaque red 128px stamp, under the default names
    pub fn asset_source() -> MemoryAssetSource {
        MemoryAssetSource::new()
            .with("document.pdf", letter_pdf())
            .with("stamp.png", solid_png(128, [255, 0, 0, 255]))
    }
}

pub mod test_helpers {
    use crate::event_source::{PointerEvent, ScriptedEventSource};

    /// Builder for pointer scenarios replayed against a widget
    #[derive(Default)]
    pub struct PointerScenario {
        events: Vec<PointerEvent>,
    }

    impl PointerScenario {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pointer enters the canvas at a client point
        pub fn enter(mut self, x: f32, y: f32) -> Self {
            self.events.push(PointerEvent::Enter { x, y });
            self
        }

        pub fn move_to(mut self, x: f32, y: f32) -> Self {
            self.events.push(PointerEvent::Move { x, y });
            self
        }

        pub fn leave(mut self) -> Self {
            self.events.push(PointerEvent::Leave);
            self
        }

        pub fn click(mut self, x: f32, y: f32) -> Self {
            self.events.push(PointerEvent::Click { x, y });
            self
        }

        /// Build the scripted event source
        pub fn build(self) -> ScriptedEventSource {
            ScriptedEventSource::new(self.events)
        }
    }
}
