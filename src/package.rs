// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::archive::{resolve_part_name, Archive};
use crate::font::{FontCache, FontProvider};
use crate::text::TextLayout;
use crate::xml::{read_part_text, root_attributes};
use crate::{Error, Options, PageContext};

const ROOT_RELATIONSHIPS: &str = "_rels/.rels";

const FIXED_REPRESENTATION: &[&str] = &[
    "http://schemas.microsoft.com/xps/2005/06/fixedrepresentation",
    "http://schemas.openxps.org/oxps/v1.0/fixedrepresentation",
];

/// A single fixed page of a package.
#[derive(Debug)]
pub struct Page {
    part_name: String,
    size: tiny_skia::Size,
    cache: Option<tiny_skia::Pixmap>,
}

impl Page {
    /// Loads the page header.
    ///
    /// Only the page size is read. The content is interpreted on demand.
    pub fn load(archive: &dyn Archive, part_name: &str) -> Result<Self, Error> {
        let text = read_part_text(archive, part_name)?;
        // The content is not validated here. A malformed body is rendered up to the error.
        let attrs = root_attributes(&text)?;
        let size = match (attrs.get_number("Width"), attrs.get_number("Height")) {
            (Some(w), Some(h)) => tiny_skia::Size::from_wh(w, h),
            _ => None,
        };

        let size = size.ok_or(Error::InvalidPageSize)?;
        Ok(Page {
            part_name: part_name.to_string(),
            size,
            cache: None,
        })
    }

    /// Returns the part name of the page.
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Returns the page size in page units (1/96 inch).
    pub fn size(&self) -> tiny_skia::Size {
        self.size
    }

    /// Renders the page.
    ///
    /// The image is cached and rendered again only when `target_size` changes.
    pub fn render(
        &mut self,
        archive: &dyn Archive,
        fonts: &FontCache,
        options: &Options,
        target_size: tiny_skia::IntSize,
    ) -> Option<tiny_skia::Pixmap> {
        if let Some(ref pixmap) = self.cache {
            if pixmap.width() == target_size.width() && pixmap.height() == target_size.height() {
                return Some(pixmap.clone());
            }
        }

        // A broken page is still rendered as an empty one.
        let text = read_part_text(archive, &self.part_name).unwrap_or_else(|e| {
            log::warn!("Failed to read '{}' cause {}.", self.part_name, e);
            String::new()
        });

        let ctx = self.context(archive, fonts, options);
        let pixmap = crate::render_page(&text, &ctx, target_size)?;
        self.cache = Some(pixmap.clone());
        Some(pixmap)
    }

    /// Collects positioned characters of the page.
    pub fn extract_text(
        &self,
        archive: &dyn Archive,
        fonts: &FontCache,
        options: &Options,
    ) -> Result<TextLayout, Error> {
        let text = read_part_text(archive, &self.part_name)?;
        let ctx = self.context(archive, fonts, options);
        crate::extract_page_text(&text, &ctx)
    }

    fn context<'a>(
        &'a self,
        archive: &'a dyn Archive,
        fonts: &'a FontCache,
        options: &'a Options,
    ) -> PageContext<'a> {
        PageContext {
            archive,
            fonts,
            part_name: &self.part_name,
            size: self.size,
            options,
        }
    }
}

/// An XPS package: the fixed pages of all its documents and the embedded fonts.
pub struct Package {
    archive: Box<dyn Archive>,
    fonts: FontCache,
    options: Options,
    pages: Vec<Page>,
}

impl Package {
    /// Opens a package and discovers its pages.
    ///
    /// Pages with an invalid size are skipped.
    pub fn open<P: FontProvider + Send + 'static>(
        archive: Box<dyn Archive>,
        font_provider: P,
    ) -> Result<Self, Error> {
        let sequence = find_fixed_representation(archive.as_ref())?;

        let mut pages = Vec::new();
        for document in list_references(archive.as_ref(), &sequence, "DocumentReference")? {
            let page_names = match list_references(archive.as_ref(), &document, "PageContent") {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("Failed to load document '{}' cause {}.", document, e);
                    continue;
                }
            };

            for name in page_names {
                match Page::load(archive.as_ref(), &name) {
                    Ok(page) => pages.push(page),
                    Err(e) => log::warn!("Page '{}' is skipped cause {}.", name, e),
                }
            }
        }

        log::debug!("Found {} pages.", pages.len());

        Ok(Package {
            archive,
            fonts: FontCache::new(font_provider),
            options: Options::default(),
            pages,
        })
    }

    /// Replaces rendering options. Cached page images are dropped.
    pub fn set_options(&mut self, options: Options) {
        self.options = options;
        for page in &mut self.pages {
            page.cache = None;
        }
    }

    /// Returns all pages in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Returns a page.
    pub fn page(&self, index: usize) -> Result<&Page, Error> {
        self.pages.get(index).ok_or(Error::PageOutOfRange(index))
    }

    /// Returns the document font cache.
    pub fn fonts(&self) -> &FontCache {
        &self.fonts
    }

    /// Renders a page to an image of `target_size`.
    pub fn render_page(
        &mut self,
        index: usize,
        target_size: tiny_skia::IntSize,
    ) -> Result<tiny_skia::Pixmap, Error> {
        let page = self
            .pages
            .get_mut(index)
            .ok_or(Error::PageOutOfRange(index))?;
        page.render(self.archive.as_ref(), &self.fonts, &self.options, target_size)
            .ok_or(Error::InvalidPageSize)
    }

    /// Collects positioned characters of a page.
    pub fn extract_text(&self, index: usize) -> Result<TextLayout, Error> {
        self.page(index)?
            .extract_text(self.archive.as_ref(), &self.fonts, &self.options)
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("pages", &self.pages)
            .field("fonts", &self.fonts)
            .finish()
    }
}

fn find_fixed_representation(archive: &dyn Archive) -> Result<String, Error> {
    let text = read_part_text(archive, ROOT_RELATIONSHIPS)?;
    let doc = roxmltree::Document::parse(text.trim_start_matches('\u{feff}'))?;

    doc.root_element()
        .children()
        .filter(|n| n.has_tag_name("Relationship"))
        .find(|n| {
            n.attribute("Type")
                .map_or(false, |t| FIXED_REPRESENTATION.contains(&t))
        })
        .and_then(|n| n.attribute("Target"))
        // Package relationships are relative to the package root.
        .map(|target| resolve_part_name("", target))
        .ok_or(Error::MissingFixedRepresentation)
}

/// Collects the `Source` attributes of all `element` children of the part root.
fn list_references(archive: &dyn Archive, part: &str, element: &str) -> Result<Vec<String>, Error> {
    let text = read_part_text(archive, part)?;
    let doc = roxmltree::Document::parse(text.trim_start_matches('\u{feff}'))?;

    let list = doc
        .root_element()
        .children()
        .filter(|n| n.tag_name().name() == element)
        .filter_map(|n| n.attribute("Source"))
        .map(|source| resolve_part_name(part, source))
        .collect();

    Ok(list)
}
