//! Shape masks: a small built-in catalog plus user uploads.
//!
//! Loading a mask never fails the run. Anything that cannot be decoded
//! degrades to "no mask" with a warning and the cloud is drawn unshaped.

use image::io::Limits;
use image::{imageops::FilterType, GrayImage, ImageReader, Luma, RgbaImage};
use log::{info, warn};
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg;
use std::io::Cursor;

/// Pixels at this intensity are background and stay free of words.
pub const BACKGROUND: u8 = 255;

/// Built-in mask shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuiltinShape {
    #[default]
    Circle,
    Star,
    Heart,
    Unique01,
}

impl BuiltinShape {
    pub const ALL: [BuiltinShape; 4] = [
        BuiltinShape::Circle,
        BuiltinShape::Star,
        BuiltinShape::Heart,
        BuiltinShape::Unique01,
    ];

    /// Name shown in the shape selector
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinShape::Circle => "Circle",
            BuiltinShape::Star => "Star",
            BuiltinShape::Heart => "Heart",
            BuiltinShape::Unique01 => "Unique 01",
        }
    }

    /// Bundled asset file name, also used in panel URLs
    pub fn file_name(&self) -> &'static str {
        match self {
            BuiltinShape::Circle => "circle.svg",
            BuiltinShape::Star => "star.svg",
            BuiltinShape::Heart => "heart.svg",
            BuiltinShape::Unique01 => "unique.svg",
        }
    }

    pub fn bytes(&self) -> &'static [u8] {
        match self {
            BuiltinShape::Circle => include_bytes!("../assets/shapes/circle.svg"),
            BuiltinShape::Star => include_bytes!("../assets/shapes/star.svg"),
            BuiltinShape::Heart => include_bytes!("../assets/shapes/heart.svg"),
            BuiltinShape::Unique01 => include_bytes!("../assets/shapes/unique.svg"),
        }
    }

    /// Lookup by display name or file stem, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| {
            s.name().to_ascii_lowercase() == wanted
                || s.file_name().trim_end_matches(".svg") == wanted
        })
    }
}

/// Where the mask for a run comes from
#[derive(Debug, Clone, Default)]
pub enum ShapeSource {
    #[default]
    None,
    Builtin(BuiltinShape),
    /// Raw bytes of a PNG, JPEG or SVG file
    Upload(Vec<u8>),
}

/// A 2-D grid of pixel intensities; white is background.
#[derive(Debug, Clone)]
pub struct Mask {
    pixels: GrayImage,
}

impl Mask {
    pub fn from_gray(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    /// Transparent pixels (alpha < 128) count as background.
    pub fn from_rgba(img: &RgbaImage) -> Self {
        let pixels = GrayImage::from_fn(img.width(), img.height(), |x, y| {
            let [r, g, b, a] = img.get_pixel(x, y).0;
            if a < 128 {
                Luma([BACKGROUND])
            } else {
                let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
                Luma([luma as u8])
            }
        });
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn intensity(&self, x: u32, y: u32) -> u8 {
        self.pixels.get_pixel(x, y).0[0]
    }

    pub fn is_background(&self, x: u32, y: u32) -> bool {
        self.intensity(x, y) == BACKGROUND
    }

    /// True when no pixel is available for placement.
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| p.0[0] == BACKGROUND)
    }

    /// Scale down (never up) so neither side exceeds `max_side`.
    pub fn fit_within(&self, max_side: u32) -> Mask {
        let (w, h) = (self.width(), self.height());
        let longest = w.max(h);
        if longest <= max_side || max_side == 0 {
            return self.clone();
        }
        let scale = max_side as f32 / longest as f32;
        let nw = ((w as f32 * scale).round() as u32).max(1);
        let nh = ((h as f32 * scale).round() as u32).max(1);
        Mask {
            pixels: image::imageops::resize(&self.pixels, nw, nh, FilterType::Nearest),
        }
    }
}

/// Severity of a shape notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// User-visible note about how the mask was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl ShapeNotice {
    pub fn info(message: String) -> Self {
        Self {
            level: NoticeLevel::Info,
            message,
        }
    }

    pub fn warning(message: String) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message,
        }
    }
}

/// Result of resolving a [`ShapeSource`]
#[derive(Debug, Clone, Default)]
pub struct ShapeOutcome {
    pub mask: Option<Mask>,
    pub notice: Option<ShapeNotice>,
}

/// Resolve a shape source into a mask no larger than `max_side` on either
/// side. Never fails.
pub fn load_mask(source: &ShapeSource, max_side: u32) -> ShapeOutcome {
    match source {
        ShapeSource::None => ShapeOutcome::default(),
        ShapeSource::Builtin(shape) => match decode_mask(shape.bytes(), max_side) {
            Ok(mask) => {
                info!("loaded built-in shape {}", shape.name());
                ShapeOutcome {
                    mask: Some(mask),
                    notice: Some(ShapeNotice::info(format!(
                        "Loaded built-in shape: {}",
                        shape.name()
                    ))),
                }
            }
            Err(e) => {
                warn!("built-in shape {} failed to load: {}", shape.name(), e);
                ShapeOutcome {
                    mask: None,
                    notice: Some(ShapeNotice::warning(format!(
                        "Couldn't load shape image: {}",
                        e
                    ))),
                }
            }
        },
        // An empty upload field means nothing was chosen
        ShapeSource::Upload(bytes) if bytes.is_empty() => ShapeOutcome::default(),
        ShapeSource::Upload(bytes) => match decode_mask(bytes, max_side) {
            Ok(mask) => ShapeOutcome {
                mask: Some(mask),
                notice: Some(ShapeNotice::info("Custom image loaded successfully!".into())),
            },
            Err(e) => {
                warn!("uploaded shape failed to decode: {}", e);
                ShapeOutcome {
                    mask: None,
                    notice: Some(ShapeNotice::warning(format!(
                        "Error loading uploaded image: {}",
                        e
                    ))),
                }
            }
        },
    }
}

/// Raster uploads larger than this on either side are rejected before
/// decoding.
pub const MAX_UPLOAD_SIDE: u32 = 8192;

/// Decoder memory cap for raster uploads
const MAX_DECODE_BYTES: u64 = 256 * 1024 * 1024;

/// Decode SVG or raster (PNG, JPEG) bytes into a mask scaled down to fit
/// `max_side`.
pub fn decode_mask(bytes: &[u8], max_side: u32) -> crate::Result<Mask> {
    let max_side = max_side.max(1);

    // SVG first: rendered onto white so transparent areas become background
    let opt = usvg::Options::default();
    if let Ok(tree) = usvg::Tree::from_data(bytes, &opt) {
        return rasterize_svg(&tree, max_side);
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_UPLOAD_SIDE);
    limits.max_image_height = Some(MAX_UPLOAD_SIDE);
    limits.max_alloc = Some(MAX_DECODE_BYTES);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| crate::Error::Image(e.to_string()))?;
    reader.limits(limits);
    let img = reader.decode()?;
    Ok(Mask::from_rgba(&img.to_rgba8()).fit_within(max_side))
}

/// Render at the declared size, or smaller when that exceeds `max_side`.
fn rasterize_svg(tree: &usvg::Tree, max_side: u32) -> crate::Result<Mask> {
    let size = tree.size();
    let longest = size.width().max(size.height());
    let scale = if longest > max_side as f32 {
        max_side as f32 / longest
    } else {
        1.0
    };
    let width = ((size.width() * scale).ceil() as u32).clamp(1, max_side);
    let height = ((size.height() * scale).ceil() as u32).clamp(1, max_side);

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| crate::Error::Image("SVG mask has no area".into()))?;
    pixmap.fill(Color::WHITE);
    resvg::render(tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    let rgba = RgbaImage::from_fn(width, height, |x, y| {
        let p = pixmap
            .pixel(x, y)
            .map(|p| [p.red(), p.green(), p.blue(), p.alpha()])
            .unwrap_or([255, 255, 255, 255]);
        image::Rgba(p)
    });
    Ok(Mask::from_rgba(&rgba))
}
