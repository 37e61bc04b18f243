//! Font loading and page rasterisation.
//!
//! Layout decisions are made in [`crate::pipeline::paginate`] from two numbers
//! this module measures once per font: the advance of `x` and the ink height
//! of the `Ay` sample (cap top to descender bottom). Rendering then just
//! draws each wrapped line left-aligned at `margin + i × line_height`.
//!
//! ## Why em-size scaling?
//!
//! `ab_glyph::PxScale` is expressed against the font's ascent-to-descent
//! height, not its em square. Converting through `units_per_em` keeps a
//! "9 px" font the same size it is in other rasterisers.

use crate::config::PageGeometry;
use crate::error::BenchError;
use crate::pipeline::paginate::FontMetrics;
use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Glyph whose advance stands in for the average character width.
pub const AVERAGE_GLYPH: char = 'x';

/// Two-character sample whose ink box gives the line height.
pub const REFERENCE_SAMPLE: &str = "Ay";

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// A loaded font at a fixed pixel size.
///
/// Cheap to clone: the glyph data is shared behind an `Arc`.
#[derive(Clone)]
pub struct PageFont {
    font: FontArc,
    scale: PxScale,
    path: PathBuf,
}

impl std::fmt::Debug for PageFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFont")
            .field("path", &self.path)
            .field("scale", &self.scale)
            .finish()
    }
}

impl PageFont {
    /// Read and parse a font file.
    ///
    /// Any failure here is fatal to the run: without a font there is no
    /// page geometry.
    pub fn load(path: &Path, size_px: f32) -> Result<Self, BenchError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BenchError::FontNotFound {
                path: path.to_path_buf(),
            },
            _ => BenchError::FontLoadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;

        let font = FontArc::try_from_vec(bytes).map_err(|e| BenchError::FontLoadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        debug!("Loaded font {} at {}px", path.display(), size_px);
        Ok(Self::from_font(font, size_px, path))
    }

    /// Wrap an already-parsed font.
    pub fn from_font(font: FontArc, size_px: f32, path: impl Into<PathBuf>) -> Self {
        let scale = em_scale(&font, size_px);
        Self {
            font,
            scale,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Measure the advance of [`AVERAGE_GLYPH`] and the ink height of
    /// [`REFERENCE_SAMPLE`].
    pub fn metrics(&self) -> Result<FontMetrics, BenchError> {
        let scaled = self.font.as_scaled(self.scale);

        let advance_width = scaled.h_advance(self.font.glyph_id(AVERAGE_GLYPH));
        if advance_width.is_nan() || advance_width <= 0.0 {
            return Err(BenchError::InvalidFont {
                path: self.path.clone(),
                detail: format!("glyph '{AVERAGE_GLYPH}' has no advance width"),
            });
        }

        let mut caret = 0.0;
        let mut top = f32::MAX;
        let mut bottom = f32::MIN;
        for c in REFERENCE_SAMPLE.chars() {
            let id = self.font.glyph_id(c);
            let glyph = id.with_scale_and_position(self.scale, point(caret, scaled.ascent()));
            caret += scaled.h_advance(id);
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                top = top.min(bounds.min.y);
                bottom = bottom.max(bounds.max.y);
            }
        }

        // Fonts without outlines for the sample fall back to the font box.
        let reference_height = if bottom > top {
            bottom - top
        } else {
            scaled.ascent() - scaled.descent()
        };

        Ok(FontMetrics {
            advance_width,
            reference_height,
        })
    }
}

/// `PxScale` that makes one em equal `size_px` pixels.
fn em_scale(font: &FontArc, size_px: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(size_px * font.height_unscaled() / upem),
        _ => PxScale::from(size_px),
    }
}

/// Draw `lines` onto a fresh white canvas of the configured size.
pub fn render_lines(
    lines: &[String],
    geometry: &PageGeometry,
    line_height: f32,
    font: &PageFont,
) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(geometry.width, geometry.height, BACKGROUND);

    for (i, line) in lines.iter().enumerate() {
        let y = geometry.margin_y as f32 + i as f32 * line_height;
        draw_text_mut(
            &mut canvas,
            INK,
            geometry.margin_x as i32,
            y.round() as i32,
            font.scale,
            &font.font,
            line,
        );
    }

    canvas
}
