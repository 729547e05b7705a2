// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tiny_skia::{Point, Transform};

use crate::render::{resolve_font, unicode_string};
use crate::transform::parse_matrix_ref;
use crate::tree::{ElementKind, RenderNode, ScopeStack};
use crate::xml::{Attributes, ElementHandler};
use crate::PageContext;

/// A rectangle in page-relative coordinates.
///
/// `0,0` is the top-left corner of the page and `1,1` is the bottom-right one.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct NormalizedRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NormalizedRect {
    /// Returns rect width.
    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Returns rect height.
    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// A positioned character.
#[allow(missing_docs)]
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TextEntry {
    pub character: char,
    pub rect: NormalizedRect,
}

/// All characters of a page in the order they appear in the markup.
#[derive(Clone, Default, Debug)]
pub struct TextLayout {
    entries: Vec<TextEntry>,
}

impl TextLayout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a character.
    pub fn push(&mut self, character: char, rect: NormalizedRect) {
        self.entries.push(TextEntry { character, rect });
    }

    /// Returns all characters.
    pub fn entries(&self) -> &[TextEntry] {
        &self.entries
    }

    /// Returns the number of characters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks that the layout has no characters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collects all characters into a string.
    pub fn text(&self) -> String {
        self.entries.iter().map(|e| e.character).collect()
    }
}

/// Collects character positions from page markup.
pub struct TextExtractionVisitor<'a> {
    ctx: PageContext<'a>,
    stack: ScopeStack,
    transform: Transform,
    saved: Vec<Transform>,
    layout: TextLayout,
}

impl<'a> TextExtractionVisitor<'a> {
    /// Creates a new visitor.
    pub fn new(ctx: &PageContext<'a>) -> Self {
        TextExtractionVisitor {
            ctx: *ctx,
            stack: ScopeStack::new(),
            transform: Transform::default(),
            saved: Vec::new(),
            layout: TextLayout::new(),
        }
    }

    /// Returns collected characters.
    pub fn into_layout(self) -> TextLayout {
        self.layout
    }

    fn restore(&mut self) {
        match self.saved.pop() {
            Some(ts) => self.transform = ts,
            None => log::warn!("Unbalanced transform restore."),
        }
    }

    fn concat(&mut self, ts: Transform) {
        self.transform = self.transform.pre_concat(ts);
    }

    fn process_end(&mut self, node: &mut RenderNode) {
        match node.kind {
            ElementKind::Canvas => self.restore(),
            ElementKind::Glyphs => {
                if let Some(v) = node.attributes.get("RenderTransform") {
                    self.concat(parse_matrix_ref(v));
                }

                self.extract_glyphs(&node.attributes);
                self.restore();
            }
            ElementKind::CanvasRenderTransform | ElementKind::GlyphsRenderTransform => {
                if let Some(ts) = node.required_child_transform("MatrixTransform") {
                    self.concat(ts);
                }
            }
            ElementKind::MatrixTransform => node.resolve_matrix_transform(),
            _ => {}
        }
    }

    fn extract_glyphs(&mut self, attrs: &Attributes) {
        let font = match resolve_font(attrs, &self.ctx) {
            Some(v) => v,
            None => {
                log::warn!("Text of a Glyphs element with an unknown font is skipped.");
                return;
            }
        };

        let text = match unicode_string(attrs) {
            Some(v) => v,
            None => return,
        };

        let origin_x = attrs.get_number("OriginX").unwrap_or(0.0);
        let origin_y = attrs.get_number("OriginY").unwrap_or(0.0);

        let advances: Option<(f32, Vec<f32>)> = self.ctx.fonts.with_provider(|provider| {
            let metrics = provider.metrics(font.id)?;
            let scale = metrics.scale(font.size);
            let advances = text
                .chars()
                .map(|c| provider.char_advance(font.id, c).unwrap_or(0.0) * scale)
                .collect();
            Some((metrics.height(font.size), advances))
        });

        let (height, advances) = match advances {
            Some(v) => v,
            None => {
                log::warn!("Font metrics are not available. Text is skipped.");
                return;
            }
        };

        let mut x = origin_x;
        for (c, advance) in text.chars().zip(advances) {
            let rect = self.normalize(x, origin_y - height, x + advance, origin_y);
            self.layout.push(c, rect);
            x += advance;
        }
    }

    fn normalize(&self, left: f32, top: f32, right: f32, bottom: f32) -> NormalizedRect {
        let mut points = [
            Point::from_xy(left, top),
            Point::from_xy(right, top),
            Point::from_xy(right, bottom),
            Point::from_xy(left, bottom),
        ];
        self.transform.map_points(&mut points);

        let size = self.ctx.size;
        let (mut l, mut t, mut r, mut b) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for p in &points {
            l = l.min(p.x);
            t = t.min(p.y);
            r = r.max(p.x);
            b = b.max(p.y);
        }

        NormalizedRect {
            left: l / size.width(),
            top: t / size.height(),
            right: r / size.width(),
            bottom: b / size.height(),
        }
    }
}

impl ElementHandler for TextExtractionVisitor<'_> {
    fn start_element(&mut self, name: &str, attributes: Attributes) {
        match self.stack.push(name, attributes) {
            ElementKind::Canvas => {
                self.saved.push(self.transform);
                let ts = self
                    .stack
                    .top()
                    .and_then(|n| n.attributes.get("RenderTransform"))
                    .map(parse_matrix_ref);
                if let Some(ts) = ts {
                    self.concat(ts);
                }
            }
            ElementKind::Glyphs => self.saved.push(self.transform),
            _ => {}
        }
    }

    fn end_element(&mut self, name: &str) {
        let mut node = match self.stack.pop(name) {
            Some(v) => v,
            None => return,
        };

        self.process_end(&mut node);
        self.stack.attach(node);
    }
}
