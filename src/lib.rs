// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
`resxps` renders XPS fixed pages into raster images and extracts
positioned text from them.

The page markup is consumed as a stream of element events. Two independent
visitors interpret that stream: one paints paths and glyph runs onto a
[`tiny_skia::Pixmap`], the other collects per-character bounding boxes into
a [`TextLayout`].

```no_run
let archive = resxps::DirArchive::new("document.xps.d");
let mut package = resxps::Package::open(Box::new(archive), resxps::FontDatabase::new()).unwrap();
let size = resxps::tiny_skia::IntSize::from_wh(800, 1000).unwrap();
let pixmap = package.render_page(0, size).unwrap();
pixmap.save_png("page.png").unwrap();
```
*/

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::upper_case_acronyms)]

pub use tiny_skia;

mod archive;
mod font;
pub mod image;
mod package;
mod paint_server;
mod pathdata;
mod render;
mod text;
mod transform;
mod tree;
mod xml;

pub use archive::{resolve_part_name, Archive, DirArchive, MemoryArchive};
pub use font::{
    deobfuscate, parse_guid, Font, FontCache, FontDatabase, FontId, FontMetrics, FontProvider,
    ShapedGlyph,
};
pub use package::{Package, Page};
pub use paint_server::{parse_color, Brush};
pub use pathdata::{PathData, PathSegment, PathToken};
pub use text::{NormalizedRect, TextEntry, TextLayout};
pub use transform::{parse_matrix, parse_matrix_ref};
pub use tree::{ComputedData, ElementKind, RenderNode, ScopeStack};
pub use xml::{parse_events, Attributes, ElementHandler};

/// List of all errors.
#[derive(Debug)]
pub enum Error {
    /// A package part doesn't exist.
    EntryNotFound(String),

    /// Failed to read a package part.
    Io(std::io::Error),

    /// Only UTF-8 content is supported.
    NotAnUtf8Str,

    /// Failed to parse a package part.
    ParsingFailed(roxmltree::Error),

    /// Page markup is malformed.
    ///
    /// Everything before the error was already processed.
    InvalidMarkup(quick_xml::Error),

    /// The package has no fixed representation relationship.
    MissingFixedRepresentation,

    /// A page has an invalid size.
    ///
    /// Occurs when `Width` and/or `Height` are missing or <= 0.
    InvalidPageSize,

    /// Requested page index doesn't exist.
    PageOutOfRange(usize),
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::ParsingFailed(e)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::InvalidMarkup(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Error::EntryNotFound(ref name) => {
                write!(f, "package part '{}' doesn't exist", name)
            }
            Error::Io(ref e) => {
                write!(f, "failed to read a package part cause {}", e)
            }
            Error::NotAnUtf8Str => {
                write!(f, "provided data has not an UTF-8 encoding")
            }
            Error::ParsingFailed(ref e) => {
                write!(f, "XML data parsing failed cause {}", e)
            }
            Error::InvalidMarkup(ref e) => {
                write!(f, "page markup parsing failed cause {}", e)
            }
            Error::MissingFixedRepresentation => {
                write!(f, "package doesn't have a fixed representation")
            }
            Error::InvalidPageSize => {
                write!(f, "page has an invalid size")
            }
            Error::PageOutOfRange(idx) => {
                write!(f, "page {} doesn't exist", idx)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Rendering options.
#[derive(Clone, Debug)]
pub struct Options {
    /// The color a page is cleared with before painting.
    ///
    /// Default: white
    pub background: tiny_skia::Color,

    /// Enables anti-aliasing of paths and glyphs.
    ///
    /// Default: true
    pub anti_alias: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            background: tiny_skia::Color::WHITE,
            anti_alias: true,
        }
    }
}

/// Everything a visitor needs to interpret one page.
#[derive(Clone, Copy)]
pub struct PageContext<'a> {
    /// The package the page belongs to.
    pub archive: &'a dyn Archive,
    /// Document-wide font cache.
    pub fonts: &'a FontCache,
    /// Part name of the page. Relative references are resolved against it.
    pub part_name: &'a str,
    /// Page size in page units (1/96 inch).
    pub size: tiny_skia::Size,
    /// Rendering options.
    pub options: &'a Options,
}

/// Renders page markup onto a new pixmap of `target_size`.
///
/// The page is scaled to fill the whole target.
///
/// Never fails on malformed markup. The markup is streamed, so every element
/// that precedes the error is painted and the error is logged.
/// Returns `None` only when a pixmap cannot be allocated.
pub fn render_page(
    page_xml: &str,
    ctx: &PageContext,
    target_size: tiny_skia::IntSize,
) -> Option<tiny_skia::Pixmap> {
    let mut pixmap = tiny_skia::Pixmap::new(target_size.width(), target_size.height())?;
    pixmap.fill(ctx.options.background);

    let ts = tiny_skia::Transform::from_scale(
        target_size.width() as f32 / ctx.size.width(),
        target_size.height() as f32 / ctx.size.height(),
    );

    {
        let mut visitor = render::RenderVisitor::new(ctx, ts, &mut pixmap);
        if let Err(e) = parse_events(page_xml, &mut visitor) {
            log::warn!("Failed to render '{}' cause {}.", ctx.part_name, e);
        }
    }

    Some(pixmap)
}

/// Collects the positions of all characters on a page.
pub fn extract_page_text(page_xml: &str, ctx: &PageContext) -> Result<TextLayout, Error> {
    let mut visitor = text::TextExtractionVisitor::new(ctx);
    parse_events(page_xml, &mut visitor)?;
    Ok(visitor.into_layout())
}

trait OptionLog {
    fn log_none<F: FnOnce()>(self, f: F) -> Self;
}

impl<T> OptionLog for Option<T> {
    #[inline]
    fn log_none<F: FnOnce()>(self, f: F) -> Self {
        self.or_else(|| {
            f();
            None
        })
    }
}
