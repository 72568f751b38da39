//! Page rasterization and image encoding

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{DynamicImage, RgbImage};
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use crate::engine::{
    EngineError, EngineResult, ImageFormat, PageImage, PageRenderRequest, PageSize, RenderedPage,
};

/// Resolution used when a render request does not name one
pub const DEFAULT_DPI: f32 = 96.0;
/// Resolution of print images
pub const PRINT_DPI: f32 = 150.0;
/// Longest thumbnail edge when the request does not name one
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 150;

const POINTS_PER_INCH: f32 = 72.0;
const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 10.0;
const MIN_DPI: f32 = 36.0;
const MAX_DPI: f32 = 600.0;
const MIN_THUMBNAIL_SIZE: u32 = 16;
const MAX_THUMBNAIL_SIZE: u32 = 1024;
/// Longest rendered edge in pixels
const MAX_PIXELS_PER_SIDE: f32 = 8192.0;

/// Points-to-pixels scale for a zoom factor and optional DPI, clamped so the
/// longest edge of `page` stays within the pixel limit
pub fn render_scale(page: PageSize, zoom_factor: f32, dpi: Option<f32>) -> f32 {
    let zoom = sanitize(zoom_factor, 1.0).clamp(MIN_ZOOM, MAX_ZOOM);
    let dpi = sanitize(dpi.unwrap_or(DEFAULT_DPI), DEFAULT_DPI).clamp(MIN_DPI, MAX_DPI);
    limit_scale(page, zoom * dpi / POINTS_PER_INCH)
}

/// Scale that fits the longest page edge into `size` pixels
pub fn thumbnail_scale(page: PageSize, size: Option<u32>) -> f32 {
    let size = size
        .unwrap_or(DEFAULT_THUMBNAIL_SIZE)
        .clamp(MIN_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE) as f32;
    let longest = page.width.max(page.height);
    if longest <= 0.0 {
        return 1.0;
    }
    size / longest
}

fn limit_scale(page: PageSize, scale: f32) -> f32 {
    let longest = page.width.max(page.height);
    if longest <= 0.0 {
        return scale;
    }
    scale.min(MAX_PIXELS_PER_SIDE / longest)
}

fn sanitize(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

/// Rasterize one page on a white background
pub fn render_pixmap(doc: &Document, page_index: usize, scale: f32) -> EngineResult<Pixmap> {
    let page = doc.load_page(page_index as i32)?;
    let matrix = Matrix::new_scale(scale, scale);
    let colorspace = Colorspace::device_rgb();
    // (ctm, colorspace, alpha, show_extras); extras draws annotations
    let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;
    Ok(pixmap)
}

pub fn render_page(
    doc: &Document,
    page_index: usize,
    size: PageSize,
    request: PageRenderRequest,
) -> EngineResult<RenderedPage> {
    let scale = render_scale(size, request.zoom_factor, request.dpi);
    let pixmap = render_pixmap(doc, page_index, scale)?;
    let (image, width, height) = encode_pixmap(&pixmap, ImageFormat::Png)?;

    Ok(RenderedPage {
        page_index,
        zoom_factor: request.zoom_factor,
        page_width: size.width,
        page_height: size.height,
        width,
        height,
        image,
    })
}

pub fn render_image(
    doc: &Document,
    page_index: usize,
    scale: f32,
    format: ImageFormat,
) -> EngineResult<PageImage> {
    let pixmap = render_pixmap(doc, page_index, scale)?;
    let (image, width, height) = encode_pixmap(&pixmap, format)?;

    Ok(PageImage {
        page_index,
        width,
        height,
        image,
    })
}

/// Encode a pixmap as a data URL, returning it with the pixel size
pub fn encode_pixmap(pixmap: &Pixmap, format: ImageFormat) -> EngineResult<(String, u32, u32)> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let rgb = rgb_from_samples(pixmap.samples(), width, height, pixmap.n() as usize);
    let bytes = encode_rgb(rgb, width, height, format)?;
    Ok((data_url(format, &bytes), width, height))
}

/// Repack `n`-component samples as tightly packed RGB
pub fn rgb_from_samples(samples: &[u8], width: u32, height: u32, n: usize) -> Vec<u8> {
    let pixels = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);

    for pixel in 0..pixels {
        let offset = pixel * n;
        if n >= 3 {
            for channel in 0..3 {
                rgb.push(samples.get(offset + channel).copied().unwrap_or(255));
            }
        } else {
            // grey (+ alpha)
            let grey = samples.get(offset).copied().unwrap_or(255);
            rgb.extend_from_slice(&[grey, grey, grey]);
        }
    }

    rgb
}

pub fn encode_rgb(
    rgb: Vec<u8>,
    width: u32,
    height: u32,
    format: ImageFormat,
) -> EngineResult<Vec<u8>> {
    let img = RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| EngineError::Image("Failed to create image buffer".to_string()))?;

    let target = match format {
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
    };

    let mut output = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut output), target)?;
    Ok(output)
}

pub fn data_url(format: ImageFormat, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime_type(), BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    #[test]
    fn test_render_scale_defaults_to_96_dpi() {
        let scale = render_scale(LETTER, 1.0, None);
        assert!((scale - 96.0 / 72.0).abs() < 1e-6);
    }

    #[test]
    fn test_render_scale_applies_zoom_and_dpi() {
        let scale = render_scale(LETTER, 2.0, Some(72.0));
        assert!((scale - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_render_scale_rejects_nonsense() {
        let fallback = render_scale(LETTER, 1.0, None);
        assert_eq!(render_scale(LETTER, 0.0, None), fallback);
        assert_eq!(render_scale(LETTER, f32::NAN, None), fallback);
        assert_eq!(render_scale(LETTER, -3.0, Some(-1.0)), fallback);
    }

    #[test]
    fn test_render_scale_caps_pixel_size() {
        let scale = render_scale(LETTER, 10.0, Some(600.0));
        assert!(LETTER.height * scale <= MAX_PIXELS_PER_SIDE + 0.5);
    }

    #[test]
    fn test_thumbnail_scale_fits_longest_edge() {
        let scale = thumbnail_scale(LETTER, Some(200));
        assert!((LETTER.height * scale - 200.0).abs() < 0.01);

        let default = thumbnail_scale(LETTER, None);
        assert!((LETTER.height * default - DEFAULT_THUMBNAIL_SIZE as f32).abs() < 0.01);

        let clamped = thumbnail_scale(LETTER, Some(1));
        assert!((LETTER.height * clamped - MIN_THUMBNAIL_SIZE as f32).abs() < 0.01);
    }

    #[test]
    fn test_rgb_from_samples_drops_alpha() {
        let rgba = [10, 20, 30, 255, 40, 50, 60, 0];
        assert_eq!(rgb_from_samples(&rgba, 2, 1, 4), vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_rgb_from_samples_expands_grey() {
        assert_eq!(rgb_from_samples(&[7, 9], 2, 1, 1), vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn test_encode_png_data_url() {
        let bytes = encode_rgb(vec![255; 4 * 4 * 3], 4, 4, ImageFormat::Png).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let url = data_url(ImageFormat::Png, &bytes);
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_encode_jpeg() {
        let bytes = encode_rgb(vec![128; 8 * 8 * 3], 8, 8, ImageFormat::Jpeg).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_rejects_short_buffer() {
        assert!(matches!(
            encode_rgb(vec![0; 5], 4, 4, ImageFormat::Png),
            Err(EngineError::Image(_))
        ));
    }
}
