//! Word-cloud rendering
//!
//! [`WordCloudRenderer`] counts the words of the cleaned text, sizes them by
//! frequency, packs them onto the canvas (inside the mask when one is given)
//! and paints the result.

pub mod layout;
pub mod raster;
pub mod words;

use crate::shape::Mask;
use crate::{CanvasSize, CloudRenderer, Error, Result, WordLimit};
use fontdue::Font;
use image::{Rgba, RgbaImage};
use layout::{OccupancyMap, Sprite};
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

pub use words::{count_words, default_stopwords, WordCount};

const NO_SPACE: &str = "Couldn't find space to draw. Either the canvas is too small \
     or too much of the mask is blocked out.";

/// Word colors, picked at random per word.
pub const PALETTE: [&str; 8] = [
    "#440154", "#46327e", "#365c8d", "#277f8e", "#1fa187", "#4ac16d", "#a0da39", "#e7b416",
];

/// Everything the renderer needs besides the text
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub word_limit: WordLimit,
    /// Removed before counting, compared case-insensitively
    pub stopwords: HashSet<String>,
    pub mask: Option<Mask>,
    /// Outline width around the mask; ignored without a mask
    pub contour_width: u32,
    pub contour_color: [u8; 3],
    pub background: [u8; 3],
    /// Canvas for unshaped clouds
    pub canvas: CanvasSize,
    /// Masks are scaled down to fit this on their longest side
    pub max_mask_side: u32,
    pub font_path: Option<PathBuf>,
    pub seed: Option<u64>,
    /// How much a word's size follows its frequency relative to the
    /// previous word (0 = rank only, 1 = proportional)
    pub relative_scaling: f32,
    pub min_font_size: f32,
    /// Largest font size; a fraction of the canvas height when unset
    pub max_font_size: Option<f32>,
    /// Probability of a word being laid out horizontally
    pub prefer_horizontal: f64,
    /// Free pixels kept around every word
    pub padding: u32,
}

impl RenderConfig {
    /// White background, standard stopwords, and a 1 pixel black contour
    /// exactly when a mask is present.
    pub fn new(word_limit: WordLimit, mask: Option<Mask>) -> Self {
        let contour_width = if mask.is_some() { 1 } else { 0 };
        Self {
            word_limit,
            stopwords: default_stopwords(),
            mask,
            contour_width,
            contour_color: [0, 0, 0],
            background: [255, 255, 255],
            canvas: CanvasSize::default(),
            max_mask_side: 1000,
            font_path: None,
            seed: None,
            relative_scaling: 0.5,
            min_font_size: 4.0,
            max_font_size: None,
            prefer_horizontal: 0.9,
            padding: 1,
        }
    }

    fn effective_contour_width(&self) -> u32 {
        if self.mask.is_some() {
            self.contour_width
        } else {
            0
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new(WordLimit::default(), None)
    }
}

/// A word as drawn on the canvas
#[derive(Debug, Clone, Serialize)]
pub struct PlacedWord {
    pub text: String,
    pub count: u32,
    pub font_size: f32,
    /// Top-left corner of the word's box
    pub x: u32,
    pub y: u32,
    /// Drawn reading bottom to top
    pub rotated: bool,
    pub color: String,
}

/// A rendered cloud
#[derive(Debug, Clone)]
pub struct CloudImage {
    pub image: RgbaImage,
    /// Largest first
    pub words: Vec<PlacedWord>,
}

impl CloudImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The most frequent word that made it onto the canvas
    pub fn top_word(&self) -> Option<&PlacedWord> {
        self.words.first()
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        raster::encode_png(&self.image)
    }
}

/// The built-in frequency-cloud generator
#[derive(Debug, Default, Clone, Copy)]
pub struct WordCloudRenderer;

impl WordCloudRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl CloudRenderer for WordCloudRenderer {
    fn render(&self, text: &str, config: &RenderConfig) -> Result<CloudImage> {
        let mask = config
            .mask
            .as_ref()
            .map(|m| m.fit_within(config.max_mask_side));
        let (width, height) = match &mask {
            Some(m) => (m.width(), m.height()),
            None => (config.canvas.width.max(1), config.canvas.height.max(1)),
        };

        let [r, g, b] = config.background;
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));

        let mut counts = count_words(text, &config.stopwords);
        counts.truncate(config.word_limit.get() as usize);
        debug!("{} distinct words to place on {}x{}", counts.len(), width, height);

        let mut placed = Vec::new();
        if !counts.is_empty() {
            if mask.as_ref().is_some_and(|m| m.is_blank()) {
                return Err(Error::Render(NO_SPACE.into()));
            }
            let font = raster::load_font(config.font_path.as_deref())?;
            let mut rng = match config.seed {
                Some(s) => ChaCha8Rng::seed_from_u64(s),
                None => ChaCha8Rng::from_os_rng(),
            };
            let mut map = match &mask {
                Some(m) => OccupancyMap::from_mask(m),
                None => OccupancyMap::new(width, height),
            };
            placed = place_words(&counts, config, &font, &mut map, &mut canvas, &mut rng);
            if placed.is_empty() {
                return Err(Error::Render(NO_SPACE.into()));
            }
        }

        if let Some(m) = &mask {
            raster::draw_contour(
                &mut canvas,
                m,
                config.effective_contour_width(),
                config.contour_color,
            );
        }

        info!("placed {} of {} words", placed.len(), counts.len());
        Ok(CloudImage {
            image: canvas,
            words: placed,
        })
    }
}

/// Size, orient and place words in order; stops once the font would drop
/// below the minimum size.
fn place_words(
    counts: &[WordCount],
    config: &RenderConfig,
    font: &Font,
    map: &mut OccupancyMap,
    canvas: &mut RgbaImage,
    rng: &mut ChaCha8Rng,
) -> Vec<PlacedWord> {
    let max_count = counts.first().map(|c| c.count).unwrap_or(1).max(1) as f32;
    let rs = config.relative_scaling.clamp(0.0, 1.0);
    let mut font_size = config
        .max_font_size
        .unwrap_or(map.height() as f32 * 0.45)
        .max(config.min_font_size);
    let mut last_freq = 1.0f32;
    let mut placed = Vec::with_capacity(counts.len());

    for word in counts {
        let freq = word.count as f32 / max_count;
        if rs > 0.0 {
            font_size = ((rs * (freq / last_freq) + (1.0 - rs)) * font_size).round();
        }
        let mut rotated = rng.random::<f64>() >= config.prefer_horizontal;
        let mut tried_other = false;

        let spot = loop {
            if font_size < config.min_font_size {
                break None;
            }
            let mut coverage = raster::rasterize_word(font, &word.word, font_size);
            if rotated {
                coverage = coverage.rotated();
            }
            let sprite = Sprite::from_coverage(&coverage, config.padding);
            if let Some((x, y)) = layout::find_position(map, &sprite, rng) {
                break Some((x, y, sprite, coverage));
            }
            if !tried_other && config.prefer_horizontal < 1.0 {
                rotated = !rotated;
                tried_other = true;
            } else {
                font_size -= (font_size * 0.08).round().max(1.0);
                rotated = false;
            }
        };

        let Some((x, y, sprite, coverage)) = spot else {
            break;
        };
        map.insert(&sprite, x, y);
        let color = PALETTE[rng.random_range(0..PALETTE.len())];
        let rgb = raster::parse_hex_color(color).unwrap_or([0, 0, 0]);
        let pad = sprite.padding as i32;
        raster::paint(canvas, &coverage, x as i32 + pad, y as i32 + pad, rgb);

        placed.push(PlacedWord {
            text: word.word.clone(),
            count: word.count,
            font_size,
            x: x + sprite.padding,
            y: y + sprite.padding,
            rotated,
            color: color.to_string(),
        });
        last_freq = freq;
    }
    placed
}
