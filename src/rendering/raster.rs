//! Glyph rasterization, painting and PNG encoding.

use crate::shape::Mask;
use crate::{Error, Result};
use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};
use log::debug;
use std::path::{Path, PathBuf};

/// Environment variable naming a font file to use.
pub const FONT_ENV: &str = "WEBCLOUD_FONT";

/// DejaVu Sans Bold, used when no other font is configured.
pub const DEFAULT_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// The font file to use instead of the bundled one: the explicit path, else
/// `WEBCLOUD_FONT` when set and non-empty.
pub fn font_override(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    std::env::var_os(FONT_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn load_font(explicit: Option<&Path>) -> Result<Font> {
    let Some(path) = font_override(explicit) else {
        return Font::from_bytes(DEFAULT_FONT, FontSettings::default())
            .map_err(|e| Error::Font(format!("bundled font: {}", e)));
    };
    let data = std::fs::read(&path)
        .map_err(|e| Error::Font(format!("failed to read {}: {}", path.display(), e)))?;
    debug!("using font {}", path.display());
    Font::from_bytes(data, FontSettings::default())
        .map_err(|e| Error::Font(format!("failed to parse {}: {}", path.display(), e)))
}

/// 8-bit alpha coverage of one rendered word
#[derive(Debug, Clone)]
pub struct Coverage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Coverage {
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    /// Rotate 90 degrees counter-clockwise, so text reads bottom to top.
    pub fn rotated(&self) -> Coverage {
        let (w, h) = (self.height, self.width);
        let mut data = vec![0u8; (w * h) as usize];
        for ny in 0..h {
            for nx in 0..w {
                data[(ny * w + nx) as usize] = self.at(self.width - 1 - ny, nx);
            }
        }
        Coverage {
            width: w,
            height: h,
            data,
        }
    }
}

/// Render `text` on a single line at `size` pixels.
pub fn rasterize_word(font: &Font, text: &str, size: f32) -> Coverage {
    let metrics = font
        .horizontal_line_metrics(size)
        .unwrap_or(fontdue::LineMetrics {
            ascent: size * 0.8,
            descent: size * -0.2,
            line_gap: 0.0,
            new_line_size: size,
        });

    let mut glyphs = Vec::new();
    let mut pen = 0.0f32;
    for ch in text.chars() {
        let (gm, bitmap) = font.rasterize(ch, size);
        glyphs.push((pen, gm, bitmap));
        pen += gm.advance_width;
    }

    let width = (pen.ceil() as u32).max(1);
    let height = ((metrics.ascent - metrics.descent).ceil() as u32).max(1);
    let baseline = metrics.ascent;
    let mut data = vec![0u8; (width * height) as usize];

    for (offset, gm, bitmap) in &glyphs {
        let left = (offset + gm.xmin as f32).round() as i32;
        let top = (baseline - gm.height as f32 - gm.ymin as f32).round() as i32;
        for gy in 0..gm.height {
            for gx in 0..gm.width {
                let (x, y) = (left + gx as i32, top + gy as i32);
                if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                    continue;
                }
                let idx = (y as u32 * width + x as u32) as usize;
                data[idx] = data[idx].max(bitmap[gy * gm.width + gx]);
            }
        }
    }

    Coverage {
        width,
        height,
        data,
    }
}

/// Alpha-blend `coverage` in `color` onto the canvas at (`x`, `y`).
pub fn paint(canvas: &mut RgbaImage, coverage: &Coverage, x: i32, y: i32, color: [u8; 3]) {
    for cy in 0..coverage.height {
        for cx in 0..coverage.width {
            let alpha = coverage.at(cx, cy) as u32;
            if alpha == 0 {
                continue;
            }
            let (px, py) = (x + cx as i32, y + cy as i32);
            if px < 0 || py < 0 || px >= canvas.width() as i32 || py >= canvas.height() as i32 {
                continue;
            }
            let dst = canvas.get_pixel_mut(px as u32, py as u32);
            for c in 0..3 {
                let blended = (color[c] as u32 * alpha + dst.0[c] as u32 * (255 - alpha)) / 255;
                dst.0[c] = blended as u8;
            }
        }
    }
}

/// Outline the usable area of `mask` with a `width`-pixel line.
///
/// The mask must have the canvas dimensions.
pub fn draw_contour(canvas: &mut RgbaImage, mask: &Mask, width: u32, color: [u8; 3]) {
    if width == 0 {
        return;
    }
    let (w, h) = (mask.width(), mask.height());
    let free = |x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < w as i64 && y < h as i64 && !mask.is_background(x as u32, y as u32)
    };
    let reach = width as i64 - 1;
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            if !free(x, y) {
                continue;
            }
            let on_edge = !free(x - 1, y) || !free(x + 1, y) || !free(x, y - 1) || !free(x, y + 1);
            if !on_edge {
                continue;
            }
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let (px, py) = (x + dx, y + dy);
                    if px >= 0 && py >= 0 && px < w as i64 && py < h as i64 {
                        canvas.put_pixel(px as u32, py as u32, Rgba([color[0], color[1], color[2], 255]));
                    }
                }
            }
        }
    }
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// `#rrggbb` to RGB
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn rotation_swaps_axes() {
        // 3x2:  a b c
        //       d e f
        let cov = Coverage {
            width: 3,
            height: 2,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        let rot = cov.rotated();
        assert_eq!((rot.width, rot.height), (2, 3));
        // counter-clockwise: top row is the old right column
        assert_eq!(rot.data, vec![3, 6, 2, 5, 1, 4]);
    }

    #[test]
    fn paint_blends_full_coverage() {
        let mut canvas = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let cov = Coverage {
            width: 2,
            height: 1,
            data: vec![255, 0],
        };
        paint(&mut canvas, &cov, 1, 1, [10, 20, 30]);
        assert_eq!(canvas.get_pixel(1, 1).0, [10, 20, 30, 255]);
        assert_eq!(canvas.get_pixel(2, 1).0, [255, 255, 255, 255]);
        // clipped silently at the edge
        paint(&mut canvas, &cov, 3, 3, [0, 0, 0]);
        paint(&mut canvas, &cov, -5, -5, [0, 0, 0]);
    }

    #[test]
    fn contour_traces_mask_edge() {
        let mut gray = GrayImage::from_pixel(9, 9, Luma([255]));
        for y in 2..7 {
            for x in 2..7 {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
        let mask = Mask::from_gray(gray);
        let mut canvas = RgbaImage::from_pixel(9, 9, Rgba([255, 255, 255, 255]));
        draw_contour(&mut canvas, &mask, 1, [0, 0, 0]);

        assert_eq!(canvas.get_pixel(2, 2).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(6, 4).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(4, 4).0, [255, 255, 255, 255]);
        assert_eq!(canvas.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn zero_width_contour_draws_nothing() {
        let mask = Mask::from_gray(GrayImage::from_pixel(4, 4, Luma([0])));
        let mut canvas = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        draw_contour(&mut canvas, &mask, 0, [0, 0, 0]);
        assert!(canvas.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn png_has_signature() {
        let png = encode_png(&RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]))).unwrap();
        assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn bundled_font_loads() {
        let font = Font::from_bytes(DEFAULT_FONT, FontSettings::default()).unwrap();
        let cov = rasterize_word(&font, "Hi", 32.0);
        assert!(cov.width > 0 && cov.height > 0);
        assert!(cov.data.iter().any(|&a| a > 0));
    }

    #[test]
    fn explicit_font_path_wins_and_must_exist() {
        let missing = Path::new("/nonexistent/font.ttf");
        assert_eq!(font_override(Some(missing)).as_deref(), Some(missing));
        assert!(matches!(load_font(Some(missing)), Err(Error::Font(_))));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#440154"), Some([0x44, 0x01, 0x54]));
        assert_eq!(parse_hex_color("fff"), None);
    }
}
