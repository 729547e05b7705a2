// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tiny_skia::{Color, Transform};

use crate::archive::resolve_part_name;
use crate::xml::Attributes;
use crate::{OptionLog, PageContext};

/// A resolved fill or stroke.
#[derive(Clone, Debug)]
pub enum Brush {
    /// Nothing is painted.
    None,
    /// A solid color.
    Color(Color),
    /// A repeated raster image.
    Image {
        /// Premultiplied image pixels.
        pixmap: tiny_skia::Pixmap,
        /// Maps image pixels into user space.
        transform: Transform,
        /// Brush opacity.
        opacity: f32,
    },
}

impl Default for Brush {
    fn default() -> Self {
        Brush::None
    }
}

impl Brush {
    /// Checks that the brush paints nothing.
    pub fn is_none(&self) -> bool {
        matches!(self, Brush::None)
    }

    /// Creates a paint with an additional element `opacity`.
    ///
    /// Returns `None` for an empty brush.
    pub(crate) fn to_paint(&self, opacity: f32, anti_alias: bool) -> Option<tiny_skia::Paint> {
        let shader = match self {
            Brush::None => return None,
            Brush::Color(c) => {
                let mut c = *c;
                c.apply_opacity(opacity);
                tiny_skia::Shader::SolidColor(c)
            }
            Brush::Image {
                pixmap,
                transform,
                opacity: brush_opacity,
            } => tiny_skia::Pattern::new(
                pixmap.as_ref(),
                tiny_skia::SpreadMode::Repeat,
                tiny_skia::FilterQuality::Bicubic,
                brush_opacity * opacity,
                *transform,
            ),
        };

        let mut paint = tiny_skia::Paint::default();
        paint.shader = shader;
        paint.anti_alias = anti_alias;
        Some(paint)
    }
}

/// Parses a `#RRGGBB` or `#AARRGGBB` color.
///
/// The six digits form is fully opaque.
pub fn parse_color(text: &str) -> Option<Color> {
    let text = text.trim();
    if text.starts_with("sc#") {
        log::warn!("scRGB colors are not supported. '{}' is ignored.", text);
        return None;
    }

    let hex = text.strip_prefix('#')?;
    if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16).ok();
    match hex.len() {
        6 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Some(Color::from_rgba8(
            channel(2)?,
            channel(4)?,
            channel(6)?,
            channel(0)?,
        )),
        _ => None,
    }
}

/// Resolves a `Fill` or `Stroke` attribute value.
pub(crate) fn convert_attribute(value: &str) -> Brush {
    if value.trim_start().starts_with('{') {
        log::warn!("Brush resources are not supported. '{}' is ignored.", value);
        return Brush::None;
    }

    match parse_color(value).log_none(|| log::warn!("Invalid color: '{}'.", value)) {
        Some(c) => Brush::Color(c),
        None => Brush::None,
    }
}

/// Resolves a `SolidColorBrush` element.
pub(crate) fn convert_solid_color(attrs: &Attributes) -> Brush {
    let mut brush = match attrs.get("Color") {
        Some(value) => convert_attribute(value),
        None => {
            log::warn!("SolidColorBrush without a color.");
            Brush::None
        }
    };

    if let Brush::Color(ref mut c) = brush {
        c.apply_opacity(opacity(attrs));
    }

    brush
}

/// Resolves an `ImageBrush` element.
///
/// `child_transform` is the transform of the `ImageBrush.Transform` child, if any.
/// The `Transform` attribute takes precedence over it.
pub(crate) fn convert_image(
    attrs: &Attributes,
    child_transform: Option<Transform>,
    ctx: &PageContext,
) -> Brush {
    let image = match load_image(attrs, ctx) {
        Some(v) => v,
        None => return Brush::None,
    };

    let view_box = match attrs.get("Viewbox").and_then(parse_rect) {
        Some(r) => r,
        None => {
            log::warn!("ImageBrush has an invalid Viewbox.");
            return Brush::None;
        }
    };

    let viewport = match attrs.get("Viewport").and_then(parse_rect) {
        Some(r) => r,
        None => {
            log::warn!("ImageBrush has an invalid Viewport.");
            return Brush::None;
        }
    };

    // Viewbox is in 1/96 inch, while the pattern is in image pixels.
    let sx = image.dpi_x / 96.0;
    let sy = image.dpi_y / 96.0;
    let view_box_ts = Transform::from_row(
        view_box.width() * sx,
        0.0,
        0.0,
        view_box.height() * sy,
        view_box.x() * sx,
        view_box.y() * sy,
    );
    let viewport_ts = Transform::from_row(
        viewport.width(),
        0.0,
        0.0,
        viewport.height(),
        viewport.x(),
        viewport.y(),
    );

    let inverse = match view_box_ts.invert() {
        Some(ts) => ts,
        None => return Brush::None,
    };

    let explicit = match attrs.get("Transform") {
        Some(value) => crate::transform::parse_matrix_ref(value),
        None => child_transform.unwrap_or_default(),
    };

    Brush::Image {
        pixmap: image.pixmap,
        transform: explicit.pre_concat(viewport_ts).pre_concat(inverse),
        opacity: opacity(attrs),
    }
}

fn load_image(attrs: &Attributes, ctx: &PageContext) -> Option<crate::image::RasterImage> {
    let source = attrs
        .get("ImageSource")
        .log_none(|| log::warn!("ImageBrush without an ImageSource."))?;

    if source.trim_start().starts_with('{') {
        log::warn!("Image resources are not supported. '{}' is ignored.", source);
        return None;
    }

    let name = resolve_part_name(ctx.part_name, source);
    let data = match ctx.archive.read(&name) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Failed to load an image cause {}.", e);
            return None;
        }
    };

    crate::image::decode(&data)
}

/// Parses the `Opacity` attribute.
///
/// Default: 1
pub(crate) fn opacity(attrs: &Attributes) -> f32 {
    attrs
        .get_number("Opacity")
        .map(|n| n.clamp(0.0, 1.0))
        .unwrap_or(1.0)
}

/// Parses an `x,y,width,height` rectangle.
pub(crate) fn parse_rect(text: &str) -> Option<tiny_skia::NonZeroRect> {
    let mut values = text.split(',').map(|s| s.trim().parse::<f32>().ok());
    let x = values.next()??;
    let y = values.next()??;
    let w = values.next()??;
    let h = values.next()??;
    if values.next().is_some() {
        return None;
    }

    tiny_skia::NonZeroRect::from_xywh(x, y, w, h)
}
