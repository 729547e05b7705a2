use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use resxps::{FontId, FontMetrics, FontProvider, MemoryArchive, ShapedGlyph};

mod render;

pub const PAGE_NAME: &str = "Documents/1/Pages/1.fpage";

pub const FONT_GUID: &str = "0B1C2D3E-4F50-6172-8394-A5B6C7D8E9FA";

const RELS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Type="http://schemas.microsoft.com/xps/2005/06/fixedrepresentation" Target="/FixedDocumentSequence.fdseq" Id="R0"/>
</Relationships>"#;

const SEQUENCE: &str = r#"<FixedDocumentSequence xmlns="http://schemas.microsoft.com/xps/2005/06">
  <DocumentReference Source="/Documents/1/FixedDocument.fdoc"/>
</FixedDocumentSequence>"#;

const DOCUMENT: &str = r#"<FixedDocument xmlns="http://schemas.microsoft.com/xps/2005/06">
  <PageContent Source="Pages/1.fpage"/>
  <PageContent Source="Pages/2.fpage"/>
  <PageContent Source="Pages/3.fpage"/>
</FixedDocument>"#;

const SECOND_PAGE: &str = r#"<FixedPage xmlns="http://schemas.microsoft.com/xps/2005/06" Width="816" Height="1056"/>"#;

// No height, so the page is skipped.
const BROKEN_PAGE: &str = r#"<FixedPage xmlns="http://schemas.microsoft.com/xps/2005/06" Width="816"/>"#;

/// A package skeleton without the first page.
static SKELETON: Lazy<MemoryArchive> = Lazy::new(|| {
    let mut font = b"FONT".to_vec();
    font.resize(64, 0x55);

    let mut obfuscated = font.clone();
    let guid = resxps::parse_guid(FONT_GUID).unwrap();
    resxps::deobfuscate(&mut obfuscated, &guid);

    MemoryArchive::new()
        .with("_rels/.rels", RELS)
        .with("FixedDocumentSequence.fdseq", SEQUENCE)
        .with("Documents/1/FixedDocument.fdoc", DOCUMENT)
        .with("Documents/1/Pages/2.fpage", SECOND_PAGE)
        .with("Documents/1/Pages/3.fpage", BROKEN_PAGE)
        .with("Resources/Font.ttf", font)
        .with(&format!("Resources/{}.odttf", FONT_GUID), obfuscated)
});

/// Builds a package with `markup` as the content of the first page.
pub fn package_with_page(markup: &str) -> (resxps::Package, Arc<AtomicUsize>) {
    let archive = (*SKELETON).clone().with(PAGE_NAME, markup);
    let provider = FakeFonts::default();
    let loads = provider.loads.clone();
    let package = resxps::Package::open(Box::new(archive), provider).unwrap();
    (package, loads)
}

/// A font provider with fixed metrics.
///
/// Every character is a 500x700 units box with a 500 units advance.
#[derive(Default)]
pub struct FakeFonts {
    pub loads: Arc<AtomicUsize>,
    count: usize,
}

impl FontProvider for FakeFonts {
    fn load_font_data(&mut self, data: Vec<u8>) -> Option<FontId> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if data.starts_with(b"FONT") {
            self.count += 1;
            Some(FontId(self.count - 1))
        } else {
            None
        }
    }

    fn family_name(&self, _: FontId) -> Option<String> {
        Some("Fake".to_string())
    }

    fn metrics(&self, _: FontId) -> Option<FontMetrics> {
        Some(FontMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
        })
    }

    fn char_advance(&self, _: FontId, _: char) -> Option<f32> {
        Some(500.0)
    }

    fn shape(&self, _: FontId, text: &str) -> Vec<ShapedGlyph> {
        text.char_indices()
            .map(|(cluster, _)| ShapedGlyph {
                glyph_id: 1,
                cluster,
                x_advance: 500,
                x_offset: 0,
                y_offset: 0,
            })
            .collect()
    }

    fn outline(&self, _: FontId, _: u16) -> Option<resxps::tiny_skia::Path> {
        let rect = resxps::tiny_skia::Rect::from_xywh(0.0, 0.0, 500.0, 700.0)?;
        Some(resxps::tiny_skia::PathBuilder::from_rect(rect))
    }
}

/// Returns a demultiplied pixel as `(r, g, b, a)`.
pub fn pixel(pixmap: &resxps::tiny_skia::Pixmap, x: u32, y: u32) -> (u8, u8, u8, u8) {
    let c = pixmap.pixel(x, y).unwrap().demultiply();
    (c.red(), c.green(), c.blue(), c.alpha())
}
