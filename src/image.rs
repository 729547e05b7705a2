// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Raster image decoding for image brushes.

/// Resolution assumed when an image doesn't specify one.
pub const DEFAULT_DPI: f32 = 96.0;

/// A decoded raster image.
#[derive(Clone, Debug)]
pub struct RasterImage {
    /// Premultiplied RGBA pixels.
    pub pixmap: tiny_skia::Pixmap,
    /// Horizontal resolution in dots per inch.
    pub dpi_x: f32,
    /// Vertical resolution in dots per inch.
    pub dpi_y: f32,
}

/// A raster image format.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImageFormat {
    /// PNG.
    PNG,
    /// JPEG.
    JPEG,
}

impl ImageFormat {
    /// Detects a format using the file signature.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::PNG)
        } else if data.starts_with(&[0xff, 0xd8, 0xff]) {
            Some(ImageFormat::JPEG)
        } else {
            None
        }
    }
}

/// Decodes a PNG or JPEG image.
///
/// Returns `None` for unknown formats, malformed data
/// and when the `raster-images` feature is disabled.
pub fn decode(data: &[u8]) -> Option<RasterImage> {
    match ImageFormat::detect(data) {
        Some(ImageFormat::PNG) => decode_png(data),
        Some(ImageFormat::JPEG) => decode_jpeg(data),
        None => {
            log::warn!("Unknown image format.");
            None
        }
    }
}

#[cfg(feature = "png")]
fn decode_png(data: &[u8]) -> Option<RasterImage> {
    use crate::OptionLog;
    raster_images::decode_png(data).log_none(|| log::warn!("Failed to decode a PNG image."))
}

#[cfg(not(feature = "png"))]
fn decode_png(_: &[u8]) -> Option<RasterImage> {
    log::warn!("PNG images are not supported.");
    None
}

#[cfg(feature = "jpeg")]
fn decode_jpeg(data: &[u8]) -> Option<RasterImage> {
    use crate::OptionLog;
    raster_images::decode_jpeg(data).log_none(|| log::warn!("Failed to decode a JPEG image."))
}

#[cfg(not(feature = "jpeg"))]
fn decode_jpeg(_: &[u8]) -> Option<RasterImage> {
    log::warn!("JPEG images are not supported.");
    None
}

#[cfg(any(feature = "png", feature = "jpeg"))]
mod raster_images {
    use super::{RasterImage, DEFAULT_DPI};

    #[cfg(feature = "png")]
    pub fn decode_png(data: &[u8]) -> Option<RasterImage> {
        let mut decoder = png::Decoder::new(data);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info().ok()?;

        let (dpi_x, dpi_y) = match reader.info().pixel_dims {
            Some(dims) if dims.unit == png::Unit::Meter && dims.xppu > 0 && dims.yppu > 0 => {
                (dims.xppu as f32 * 0.0254, dims.yppu as f32 * 0.0254)
            }
            _ => (DEFAULT_DPI, DEFAULT_DPI),
        };

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).ok()?;
        let img_data = &buf[..info.buffer_size()];

        let mut pixmap = tiny_skia::Pixmap::new(info.width, info.height)?;
        match info.color_type {
            png::ColorType::Rgb => rgb_to_pixmap(img_data, &mut pixmap),
            png::ColorType::Rgba => rgba_to_pixmap(img_data, &mut pixmap),
            png::ColorType::Grayscale => gray_to_pixmap(img_data, &mut pixmap),
            png::ColorType::GrayscaleAlpha => gray_alpha_to_pixmap(img_data, &mut pixmap),
            png::ColorType::Indexed => {
                log::warn!("Indexed PNG is not supported.");
                return None;
            }
        }

        Some(RasterImage {
            pixmap,
            dpi_x,
            dpi_y,
        })
    }

    #[cfg(feature = "jpeg")]
    pub fn decode_jpeg(data: &[u8]) -> Option<RasterImage> {
        let mut decoder = jpeg_decoder::Decoder::new(data);
        let img_data = decoder.decode().ok()?;
        let info = decoder.info()?;

        let mut pixmap = tiny_skia::Pixmap::new(info.width as u32, info.height as u32)?;
        match info.pixel_format {
            jpeg_decoder::PixelFormat::RGB24 => rgb_to_pixmap(&img_data, &mut pixmap),
            jpeg_decoder::PixelFormat::L8 => gray_to_pixmap(&img_data, &mut pixmap),
            _ => {
                log::warn!("{:?} JPEG is not supported.", info.pixel_format);
                return None;
            }
        }

        let (dpi_x, dpi_y) = jfif_density(data).unwrap_or((DEFAULT_DPI, DEFAULT_DPI));
        Some(RasterImage {
            pixmap,
            dpi_x,
            dpi_y,
        })
    }

    /// Reads the pixel density from a JFIF APP0 segment.
    #[cfg(feature = "jpeg")]
    pub(super) fn jfif_density(data: &[u8]) -> Option<(f32, f32)> {
        // SOI, then APP0 marker, segment length and the identifier.
        let app0 = data.get(2..)?;
        if !app0.starts_with(&[0xff, 0xe0]) || app0.get(4..9)? != &b"JFIF\0"[..] {
            return None;
        }

        let units = *app0.get(11)?;
        let x = u16::from_be_bytes([*app0.get(12)?, *app0.get(13)?]) as f32;
        let y = u16::from_be_bytes([*app0.get(14)?, *app0.get(15)?]) as f32;
        if x == 0.0 || y == 0.0 {
            return None;
        }

        match units {
            1 => Some((x, y)),
            2 => Some((x * 2.54, y * 2.54)),
            _ => None,
        }
    }

    fn rgb_to_pixmap(data: &[u8], pixmap: &mut tiny_skia::Pixmap) {
        use rgb::FromSlice;

        let mut i = 0;
        let dst = pixmap.data_mut();
        for p in data.as_rgb() {
            dst[i + 0] = p.r;
            dst[i + 1] = p.g;
            dst[i + 2] = p.b;
            dst[i + 3] = 255;

            i += tiny_skia::BYTES_PER_PIXEL;
        }
    }

    #[cfg(feature = "png")]
    fn rgba_to_pixmap(data: &[u8], pixmap: &mut tiny_skia::Pixmap) {
        use rgb::FromSlice;

        let mut i = 0;
        let dst = pixmap.data_mut();
        for p in data.as_rgba() {
            let a = p.a as f64 / 255.0;
            dst[i + 0] = (p.r as f64 * a + 0.5) as u8;
            dst[i + 1] = (p.g as f64 * a + 0.5) as u8;
            dst[i + 2] = (p.b as f64 * a + 0.5) as u8;
            dst[i + 3] = p.a;

            i += tiny_skia::BYTES_PER_PIXEL;
        }
    }

    fn gray_to_pixmap(data: &[u8], pixmap: &mut tiny_skia::Pixmap) {
        let dst = pixmap.data_mut();
        for (gray, p) in data.iter().zip(dst.chunks_exact_mut(tiny_skia::BYTES_PER_PIXEL)) {
            p[0] = *gray;
            p[1] = *gray;
            p[2] = *gray;
            p[3] = 255;
        }
    }

    #[cfg(feature = "png")]
    fn gray_alpha_to_pixmap(data: &[u8], pixmap: &mut tiny_skia::Pixmap) {
        let dst = pixmap.data_mut();
        for (src, p) in data
            .chunks_exact(2)
            .zip(dst.chunks_exact_mut(tiny_skia::BYTES_PER_PIXEL))
        {
            let a = src[1] as f64 / 255.0;
            let gray = (src[0] as f64 * a + 0.5) as u8;
            p[0] = gray;
            p[1] = gray;
            p[2] = gray;
            p[3] = src[1];
        }
    }
}
