// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use rustybuzz::ttf_parser;

use crate::archive::{base_name, Archive};

/// A font registered in a [`FontProvider`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FontId(pub usize);

/// A resolved font of a specific size.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Font {
    /// Registered font.
    pub id: FontId,
    /// Em size in page units.
    pub size: f32,
}

/// Font-wide metrics in font units.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
}

impl FontMetrics {
    /// Returns a font units to page units scale.
    #[inline]
    pub fn scale(&self, size: f32) -> f32 {
        size / self.units_per_em as f32
    }

    /// Returns the line height at `size`.
    #[inline]
    pub fn height(&self, size: f32) -> f32 {
        (self.ascender as f32 - self.descender as f32) * self.scale(size)
    }
}

/// A positioned glyph in font units.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ShapedGlyph {
    pub glyph_id: u16,
    /// Byte offset of the first character of the glyph cluster.
    pub cluster: usize,
    pub x_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

/// A font loading, shaping and metrics service.
pub trait FontProvider {
    /// Registers a font.
    ///
    /// Returns `None` when data is not a font.
    fn load_font_data(&mut self, data: Vec<u8>) -> Option<FontId>;

    /// Returns a font family name.
    fn family_name(&self, id: FontId) -> Option<String>;

    /// Returns font metrics.
    fn metrics(&self, id: FontId) -> Option<FontMetrics>;

    /// Returns a horizontal advance of a character in font units.
    fn char_advance(&self, id: FontId, c: char) -> Option<f32>;

    /// Converts text into positioned glyphs.
    fn shape(&self, id: FontId, text: &str) -> Vec<ShapedGlyph>;

    /// Returns a glyph outline in font units, with the Y axis pointing up.
    fn outline(&self, id: FontId, glyph_id: u16) -> Option<tiny_skia::Path>;
}

/// A [`FontProvider`] backed by `fontdb` and `rustybuzz`.
///
/// Contains only fonts loaded via [`FontProvider::load_font_data`],
/// so every document has its own set of fonts.
#[derive(Clone)]
pub struct FontDatabase {
    db: fontdb::Database,
    ids: Vec<fontdb::ID>,
}

impl FontDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        FontDatabase {
            db: fontdb::Database::new(),
            ids: Vec::new(),
        }
    }

    fn with_face<P, T>(&self, id: FontId, p: P) -> Option<T>
    where
        P: FnOnce(&ttf_parser::Face) -> Option<T>,
    {
        let id = *self.ids.get(id.0)?;
        self.db
            .with_face_data(id, |data, face_index| {
                let face = ttf_parser::Face::parse(data, face_index).ok()?;
                p(&face)
            })
            .flatten()
    }
}

impl FontProvider for FontDatabase {
    fn load_font_data(&mut self, data: Vec<u8>) -> Option<FontId> {
        // `fontdb` silently ignores malformed data.
        ttf_parser::Face::parse(&data, 0).ok()?;

        let known: HashSet<fontdb::ID> = self.db.faces().map(|f| f.id).collect();
        self.db.load_font_data(data);
        let id = self.db.faces().map(|f| f.id).find(|id| !known.contains(id))?;

        self.ids.push(id);
        Some(FontId(self.ids.len() - 1))
    }

    fn family_name(&self, id: FontId) -> Option<String> {
        let face = self.db.face(*self.ids.get(id.0)?)?;
        face.families.first().map(|(name, _)| name.clone())
    }

    fn metrics(&self, id: FontId) -> Option<FontMetrics> {
        self.with_face(id, |face| {
            Some(FontMetrics {
                units_per_em: face.units_per_em(),
                ascender: face.ascender(),
                descender: face.descender(),
            })
        })
    }

    fn char_advance(&self, id: FontId, c: char) -> Option<f32> {
        self.with_face(id, |face| {
            let glyph_id = face.glyph_index(c).unwrap_or(ttf_parser::GlyphId(0));
            face.glyph_hor_advance(glyph_id).map(f32::from)
        })
    }

    fn shape(&self, id: FontId, text: &str) -> Vec<ShapedGlyph> {
        let id = match self.ids.get(id.0) {
            Some(id) => *id,
            None => return Vec::new(),
        };

        self.db
            .with_face_data(id, |font_data, face_index| -> Option<Vec<ShapedGlyph>> {
                let rb_font = rustybuzz::Face::from_slice(font_data, face_index)?;

                let mut buffer = rustybuzz::UnicodeBuffer::new();
                buffer.push_str(text);
                buffer.set_direction(rustybuzz::Direction::LeftToRight);

                let output = rustybuzz::shape(&rb_font, &[], buffer);
                let glyphs = output
                    .glyph_positions()
                    .iter()
                    .zip(output.glyph_infos())
                    .map(|(pos, info)| ShapedGlyph {
                        glyph_id: info.glyph_id as u16,
                        cluster: info.cluster as usize,
                        x_advance: pos.x_advance,
                        x_offset: pos.x_offset,
                        y_offset: pos.y_offset,
                    })
                    .collect();

                Some(glyphs)
            })
            .flatten()
            .unwrap_or_default()
    }

    fn outline(&self, id: FontId, glyph_id: u16) -> Option<tiny_skia::Path> {
        self.with_face(id, |face| {
            let mut builder = PathBuilder {
                builder: tiny_skia::PathBuilder::new(),
            };
            face.outline_glyph(ttf_parser::GlyphId(glyph_id), &mut builder)?;
            builder.builder.finish()
        })
    }
}

impl Default for FontDatabase {
    fn default() -> Self {
        Self::new()
    }
}

struct PathBuilder {
    builder: tiny_skia::PathBuilder,
}

impl ttf_parser::OutlineBuilder for PathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

struct FontCacheInner {
    provider: Box<dyn FontProvider + Send>,
    // Failed resolutions are cached as well.
    fonts: HashMap<String, Option<FontId>>,
}

/// A document-wide cache of embedded fonts.
///
/// Fonts are keyed by their part name. The size is not a part of the key.
pub struct FontCache {
    inner: Mutex<FontCacheInner>,
}

impl FontCache {
    /// Creates a new cache on top of a font provider.
    pub fn new<P: FontProvider + Send + 'static>(provider: P) -> Self {
        FontCache {
            inner: Mutex::new(FontCacheInner {
                provider: Box::new(provider),
                fonts: HashMap::new(),
            }),
        }
    }

    /// Resolves a font by its part name.
    ///
    /// The first call loads the font from `archive`, de-obfuscating it when needed.
    /// All following calls, successful or not, reuse the first result.
    pub fn resolve(&self, archive: &dyn Archive, name: &str, size: f32) -> Option<Font> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let inner = &mut *inner;

        let id = match inner.fonts.get(name) {
            Some(id) => *id,
            None => {
                let id = load_font(inner.provider.as_mut(), archive, name);
                inner.fonts.insert(name.to_string(), id);
                id
            }
        };

        id.map(|id| Font { id, size })
    }

    /// Runs `f` with the font provider locked.
    pub fn with_provider<T, F: FnOnce(&dyn FontProvider) -> T>(&self, f: F) -> T {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(inner.provider.as_ref())
    }

    /// Returns all resolved part names with their family names, sorted by part name.
    ///
    /// Fonts that failed to load have no family.
    pub fn families(&self) -> Vec<(String, Option<String>)> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<_> = inner
            .fonts
            .iter()
            .map(|(name, id)| {
                let family = (*id).and_then(|id| inner.provider.family_name(id));
                (name.clone(), family)
            })
            .collect();
        list.sort();
        list
    }

    /// Returns the number of resolved part names, including failed ones.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fonts.len()
    }

    /// Checks that nothing was resolved yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FontCache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "FontCache {{ len: {} }}", self.len())
    }
}

fn load_font(provider: &mut dyn FontProvider, archive: &dyn Archive, name: &str) -> Option<FontId> {
    let mut data = match archive.read(name) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Failed to load a font cause {}.", e);
            return None;
        }
    };

    if let Some(id) = provider.load_font_data(data.clone()) {
        return Some(id);
    }

    // Not a plain font. Try to treat it as an obfuscated one.
    let guid = match parse_guid(base_name(name)) {
        Some(v) => v,
        None => {
            log::warn!("'{}' is not a font and not an obfuscated font.", name);
            return None;
        }
    };

    if !deobfuscate(&mut data, &guid) {
        log::warn!("'{}' is too short to be an obfuscated font.", name);
        return None;
    }

    let id = provider.load_font_data(data);
    if id.is_none() {
        log::warn!("Failed to load an obfuscated font '{}'.", name);
    }
    id
}

/// Parses a GUID in its canonical form: `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`.
///
/// The first three groups are stored little-endian, the rest as is.
/// Characters after the 36th one are ignored.
pub fn parse_guid(text: &str) -> Option<[u8; 16]> {
    const INDEXES: [usize; 16] = [6, 4, 2, 0, 11, 9, 16, 14, 19, 21, 24, 26, 28, 30, 32, 34];

    let text = text.as_bytes();
    if text.len() < 36 {
        return None;
    }

    if [8, 13, 18, 23].iter().any(|idx| text[*idx] != b'-') {
        return None;
    }

    let hex = |c: u8| (c as char).to_digit(16);

    let mut guid = [0u8; 16];
    for (byte, idx) in guid.iter_mut().zip(INDEXES) {
        *byte = (hex(text[idx])? * 16 + hex(text[idx + 1])?) as u8;
    }

    Some(guid)
}

/// De-obfuscates an embedded font in place.
///
/// The first 32 bytes are XORed with the GUID bytes taken from the font part name.
/// Returns `false` when data is shorter than 32 bytes.
pub fn deobfuscate(data: &mut [u8], guid: &[u8; 16]) -> bool {
    const MAPPING: [usize; 16] = [15, 14, 13, 12, 11, 10, 9, 8, 6, 7, 4, 5, 0, 1, 2, 3];

    if data.len() < 32 {
        return false;
    }

    for (i, idx) in MAPPING.iter().enumerate() {
        data[i] ^= guid[*idx];
        data[i + 16] ^= guid[*idx];
    }

    true
}
