// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tiny_skia::Transform;

use crate::archive::resolve_part_name;
use crate::paint_server::{self, Brush};
use crate::pathdata::PathData;
use crate::transform::parse_matrix_ref;
use crate::tree::{ComputedData, ElementKind, RenderNode, ScopeStack};
use crate::xml::{Attributes, ElementHandler};
use crate::PageContext;

/// Painting state saved by `Canvas`, `Path` and `Glyphs`.
#[derive(Clone, Copy, Debug)]
struct PaintState {
    transform: Transform,
    opacity: f32,
}

/// Paints page markup onto a pixmap.
pub struct RenderVisitor<'a, 'b> {
    ctx: PageContext<'a>,
    pixmap: &'b mut tiny_skia::Pixmap,
    stack: ScopeStack,
    state: PaintState,
    saved: Vec<PaintState>,
}

impl<'a, 'b> RenderVisitor<'a, 'b> {
    /// Creates a new visitor.
    ///
    /// `transform` maps page units to pixmap pixels.
    pub fn new(
        ctx: &PageContext<'a>,
        transform: Transform,
        pixmap: &'b mut tiny_skia::Pixmap,
    ) -> Self {
        RenderVisitor {
            ctx: *ctx,
            pixmap,
            stack: ScopeStack::new(),
            state: PaintState {
                transform,
                opacity: 1.0,
            },
            saved: Vec::new(),
        }
    }

    fn save(&mut self) {
        self.saved.push(self.state);
    }

    fn restore(&mut self) {
        match self.saved.pop() {
            Some(state) => self.state = state,
            None => log::warn!("Unbalanced painting state restore."),
        }
    }

    fn concat(&mut self, ts: Transform) {
        self.state.transform = self.state.transform.pre_concat(ts);
    }

    fn process_end(&mut self, node: &mut RenderNode) {
        match node.kind {
            ElementKind::Canvas => self.restore(),
            ElementKind::Path => {
                self.render_path(node);
                self.restore();
            }
            ElementKind::Glyphs => {
                self.render_glyphs(node);
                self.restore();
            }
            ElementKind::CanvasRenderTransform
            | ElementKind::PathRenderTransform
            | ElementKind::GlyphsRenderTransform => {
                if let Some(ts) = node.required_child_transform("MatrixTransform") {
                    self.concat(ts);
                }
            }
            ElementKind::PathFill | ElementKind::PathStroke | ElementKind::GlyphsFill => {
                node.forward_single_child();
            }
            ElementKind::MatrixTransform => node.resolve_matrix_transform(),
            ElementKind::SolidColorBrush => {
                let brush = paint_server::convert_solid_color(&node.attributes);
                node.data = Some(ComputedData::Brush(brush));
            }
            ElementKind::ImageBrush => {
                let ts = node.child_transform("ImageBrush.Transform");
                let brush = paint_server::convert_image(&node.attributes, ts, &self.ctx);
                node.data = Some(ComputedData::Brush(brush));
            }
            ElementKind::ImageBrushTransform => {
                node.data = node
                    .required_child_transform("MatrixTransform")
                    .map(ComputedData::Transform);
            }
            ElementKind::FixedPage | ElementKind::Unknown => {}
        }
    }

    fn render_path(&mut self, node: &mut RenderNode) {
        let data = match node.attributes.get("Data") {
            Some(v) if v.trim_start().starts_with('{') => {
                log::warn!("Path geometry resources are not supported.");
                return;
            }
            Some(v) => PathData::parse(v),
            None => {
                log::debug!("Paths without the Data attribute are not supported.");
                return;
            }
        };

        let path = match data.to_path() {
            Some(v) => v,
            None => return,
        };

        let fill = resolve_brush(node, "Fill", "Path.Fill");
        let stroke_brush = resolve_brush(node, "Stroke", "Path.Stroke");
        let opacity = self.state.opacity * paint_server::opacity(&node.attributes);
        let transform = self.element_transform(&node.attributes);
        let anti_alias = self.ctx.options.anti_alias;

        if let Some(paint) = fill.to_paint(opacity, anti_alias) {
            self.pixmap
                .fill_path(&path, &paint, data.fill_rule(), transform, None);
        }

        if let Some(paint) = stroke_brush.to_paint(opacity, anti_alias) {
            let stroke = convert_stroke(&node.attributes);
            self.pixmap
                .stroke_path(&path, &paint, &stroke, transform, None);
        }
    }

    fn render_glyphs(&mut self, node: &mut RenderNode) {
        let font = match resolve_font(&node.attributes, &self.ctx) {
            Some(v) => v,
            None => return,
        };

        let fill = resolve_brush(node, "Fill", "Glyphs.Fill");
        let text = match unicode_string(&node.attributes) {
            Some(v) => v,
            None => return,
        };

        let opacity = self.state.opacity * paint_server::opacity(&node.attributes);
        let transform = self.element_transform(&node.attributes);
        let paint = match fill.to_paint(opacity, self.ctx.options.anti_alias) {
            Some(v) => v,
            None => return,
        };

        let origin_x = node.attributes.get_number("OriginX").unwrap_or(0.0);
        let origin_y = node.attributes.get_number("OriginY").unwrap_or(0.0);

        let path = self.ctx.fonts.with_provider(|provider| {
            let metrics = provider.metrics(font.id)?;
            let scale = metrics.scale(font.size);

            let mut builder = tiny_skia::PathBuilder::new();
            let mut x = origin_x;
            for glyph in provider.shape(font.id, text) {
                if let Some(outline) = provider.outline(font.id, glyph.glyph_id) {
                    // Glyphs are upside-down by default, so we have to mirror them.
                    let ts = Transform::from_row(
                        scale,
                        0.0,
                        0.0,
                        -scale,
                        x + glyph.x_offset as f32 * scale,
                        origin_y - glyph.y_offset as f32 * scale,
                    );

                    if let Some(outline) = outline.transform(ts) {
                        builder.push_path(&outline);
                    }
                }

                x += glyph.x_advance as f32 * scale;
            }

            builder.finish()
        });

        if let Some(path) = path {
            self.pixmap.fill_path(
                &path,
                &paint,
                tiny_skia::FillRule::Winding,
                transform,
                None,
            );
        }
    }

    fn element_transform(&self, attrs: &Attributes) -> Transform {
        match attrs.get("RenderTransform") {
            Some(v) => self.state.transform.pre_concat(parse_matrix_ref(v)),
            None => self.state.transform,
        }
    }
}

impl ElementHandler for RenderVisitor<'_, '_> {
    fn start_element(&mut self, name: &str, attributes: Attributes) {
        let kind = ElementKind::from_name(name);
        if kind.is_scope() {
            self.save();
        }

        if kind == ElementKind::Canvas {
            if let Some(v) = attributes.get("RenderTransform") {
                self.concat(parse_matrix_ref(v));
            }
            self.state.opacity *= paint_server::opacity(&attributes);
        }

        self.stack.push(name, attributes);
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

/// Resolves a brush from an attribute, falling back to a property element.
fn resolve_brush(node: &mut RenderNode, attribute: &str, property: &str) -> Brush {
    if let Some(value) = node.attributes.get(attribute) {
        return paint_server::convert_attribute(value);
    }

    node.child_brush(property).unwrap_or_default()
}

fn convert_stroke(attrs: &Attributes) -> tiny_skia::Stroke {
    let mut stroke = tiny_skia::Stroke {
        width: attrs.get_number("StrokeThickness").unwrap_or(1.0),
        miter_limit: attrs.get_number("StrokeMiterLimit").unwrap_or(10.0).max(1.0),
        ..tiny_skia::Stroke::default()
    };

    stroke.line_join = match attrs.get("StrokeLineJoin") {
        Some("Bevel") => tiny_skia::LineJoin::Bevel,
        Some("Round") => tiny_skia::LineJoin::Round,
        _ => tiny_skia::LineJoin::Miter,
    };

    stroke.line_cap = match attrs.get("StrokeStartLineCap") {
        Some("Round") => tiny_skia::LineCap::Round,
        Some("Square") => tiny_skia::LineCap::Square,
        _ => tiny_skia::LineCap::Butt,
    };

    if attrs.get("StrokeDashArray").is_some() {
        log::debug!("Dashed strokes are not supported.");
    }

    stroke
}

/// Resolves the font of a `Glyphs` element.
pub(crate) fn resolve_font(attrs: &Attributes, ctx: &PageContext) -> Option<crate::Font> {
    let uri = match attrs.get("FontUri") {
        Some(v) => v,
        None => {
            log::warn!("Glyphs without a FontUri.");
            return None;
        }
    };

    let size = match attrs.get_number("FontRenderingEmSize") {
        Some(v) if v > 0.0 => v,
        _ => {
            log::warn!("Glyphs have an invalid FontRenderingEmSize.");
            return None;
        }
    };

    let name = resolve_part_name(ctx.part_name, uri);
    let font = ctx.fonts.resolve(ctx.archive, &name, size);
    if font.is_none() {
        log::warn!("Failed to resolve font '{}'.", name);
    }
    font
}

/// Returns the `UnicodeString` of a `Glyphs` element without the `{}` escape.
pub(crate) fn unicode_string(attrs: &Attributes) -> Option<&str> {
    let text = attrs.get("UnicodeString")?;
    let text = text.strip_prefix("{}").unwrap_or(text);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
