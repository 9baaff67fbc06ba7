use bytes::Bytes;
use image::{ImageEncoder, RgbaImage};
use mupdf::{Colorspace, Matrix};
use std::path::Path;

use super::document::{PdfDocument, page_size_of};
use super::page_index::PageIndex;
use crate::error::{Error, Result};
use crate::preview::Preview;

/// Renders pages of a document to a requested pixel size
pub struct PageRenderer<'a> {
    /// The PDF document to render
    pub doc: &'a PdfDocument,
}

impl<'a> PageRenderer<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self { doc }
    }

    /// Render a page stretched to `width` × `height` pixels (each at least 1)
    pub fn render_page(&self, page: u32, width: u32, height: u32) -> Result<RgbaImage> {
        let index = PageIndex::checked(page, self.doc.page_count())?;
        let page_num = index.as_usize();

        let doc = self.doc.open_document()?;
        let natural = page_size_of(&doc, index)?;
        let page = doc.load_page(index.as_i32()).map_err(|e| Error::PdfRender {
            page: page_num,
            reason: format!("Failed to load page: {e}"),
        })?;

        #[allow(clippy::cast_precision_loss)]
        let matrix = Matrix::new_scale(
            width.max(1) as f32 / natural.width.max(1) as f32,
            height.max(1) as f32 / natural.height.max(1) as f32,
        );

        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
            .map_err(|e| Error::PdfRender {
                page: page_num,
                reason: format!("Failed to render: {e}"),
            })?;

        let pixels = pixmap.samples();
        let img_width = pixmap.width();
        let img_height = pixmap.height();

        // mupdf returns RGB, we need RGBA
        let n = pixmap.n() as usize;
        let mut rgba_pixels = Vec::with_capacity((img_width * img_height * 4) as usize);

        for chunk in pixels.chunks(n) {
            match n {
                3 => {
                    rgba_pixels.extend_from_slice(chunk);
                    rgba_pixels.push(255);
                }
                4 => rgba_pixels.extend_from_slice(chunk),
                1 => rgba_pixels.extend_from_slice(&[chunk[0], chunk[0], chunk[0], 255]),
                _ => {
                    return Err(Error::PdfRender {
                        page: page_num,
                        reason: format!("Unexpected pixel format with {n} components"),
                    });
                }
            }
        }

        RgbaImage::from_raw(img_width, img_height, rgba_pixels).ok_or_else(|| Error::PdfRender {
            page: page_num,
            reason: "Failed to create image buffer".to_string(),
        })
    }

    /// Render a page to a PNG preview
    pub fn render_preview(&self, page: u32, width: u32, height: u32) -> Result<Preview> {
        let img = self.render_page(page, width, height)?;

        let mut png_data = Vec::new();
        // Fast compression: previews are regenerated on demand anyway
        let encoder = image::codecs::png::PngEncoder::new_with_quality(
            &mut png_data,
            image::codecs::png::CompressionType::Fast,
            image::codecs::png::FilterType::Adaptive,
        );

        encoder
            .write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| Error::PdfRender {
                page: page as usize,
                reason: format!("Failed to encode PNG: {e}"),
            })?;

        Ok(Preview {
            width: img.width(),
            height: img.height(),
            png: Bytes::from(png_data),
        })
    }
}

/// Load a file and render one page of it
pub fn render_page_from_file(
    path: impl AsRef<Path>,
    page: u32,
    width: u32,
    height: u32,
) -> Result<Preview> {
    let doc = PdfDocument::from_file(path)?;
    PageRenderer::new(&doc).render_preview(page, width, height)
}

/// Convert f32 dimension to u32, clamping to valid range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub(crate) const fn f32_to_u32(value: f32) -> u32 {
    const MAX: f32 = u32::MAX as f32;
    let clamped = if value < 0.0 {
        0.0
    } else if value > MAX {
        MAX
    } else {
        value
    };
    clamped as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_u32_clamps() {
        assert_eq!(f32_to_u32(-3.0), 0);
        assert_eq!(f32_to_u32(612.4), 612);
        assert_eq!(f32_to_u32(f32::MAX), u32::MAX);
    }
}
