//! Webcloud
//!
//! Fetches a single web page, strips the boilerplate markup, and renders the
//! remaining visible text as a word-frequency cloud, optionally clipped to a
//! shape mask.
//!
//! # Pipeline
//!
//! - **Fetch**: one blocking GET with a bounded timeout ([`fetch`])
//! - **Extract**: pick the main content subtree and flatten its text ([`extract`])
//! - **Normalize**: collapse whitespace and drop `[12]` citation markers ([`normalize`])
//! - **Render**: count words and pack them into a raster ([`rendering`])
//!
//! # Example
//!
//! ```no_run
//! use webcloud::pipeline::{Pipeline, RunOutcome, RunRequest};
//! use webcloud::PipelineConfig;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
//! let request = RunRequest::custom("https://example.com");
//! match pipeline.run(&request) {
//!     RunOutcome::Done(report) => std::fs::write("wordcloud.png", &report.png).unwrap(),
//!     RunOutcome::Failed { error, .. } => eprintln!("{}", error.user_message()),
//! }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Category, Error, Result};

pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod rendering;
pub mod shape;

// Interactive control panel served over HTTP
#[cfg(feature = "server")]
pub mod panel;

pub use extract::HtmlTextExtractor;
pub use rendering::{CloudImage, RenderConfig, WordCloudRenderer};
pub use shape::{BuiltinShape, Mask, ShapeSource};

/// The links offered by the "predefined" link source.
pub const PREDEFINED_LINKS: [&str; 2] = [
    "https://en.wikipedia.org/wiki/Artificial_intelligence",
    "https://www.geeksforgeeks.org/machine-learning/what-is-reinforcement-learning/",
];

/// Number of distinct words a cloud may show
///
/// Always within `[MIN, MAX]` and a multiple of `STEP`; every constructor
/// clamps and snaps its input, so an out-of-range limit cannot exist.
///
/// ```
/// use webcloud::WordLimit;
/// assert_eq!(WordLimit::new(40).get(), 100);
/// assert_eq!(WordLimit::new(449).get(), 400);
/// assert_eq!(WordLimit::new(5000).get(), 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WordLimit(u32);

impl WordLimit {
    pub const MIN: u32 = 100;
    pub const MAX: u32 = 1000;
    pub const STEP: u32 = 100;

    pub fn new(requested: u32) -> Self {
        let clamped = requested.clamp(Self::MIN, Self::MAX);
        let snapped = (clamped + Self::STEP / 2) / Self::STEP * Self::STEP;
        Self(snapped.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for WordLimit {
    fn default() -> Self {
        Self(400)
    }
}

/// HTTP settings for the content fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string to send with requests
    pub user_agent: String,
    /// Timeout for the whole request in milliseconds
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("webcloud/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 10_000,
        }
    }
}

/// Canvas dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 400,
        }
    }
}

/// Configuration for a [`pipeline::Pipeline`]
///
/// Defaults match the interactive tool: 10 second fetch timeout, an 800x400
/// canvas for unshaped clouds and a 500 character text preview.
///
/// ```
/// let cfg = webcloud::PipelineConfig::default();
/// assert_eq!(cfg.fetch.timeout_ms, 10_000);
/// assert_eq!(cfg.preview_chars, 500);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    /// Canvas used when no mask is present
    pub canvas: CanvasSize,
    /// Masks larger than this on either side are scaled down
    pub max_mask_side: u32,
    /// Font file; falls back to `WEBCLOUD_FONT` and then system locations
    pub font_path: Option<PathBuf>,
    /// Fixed layout seed; random per run when unset
    pub seed: Option<u64>,
    /// Characters of cleaned text shown in the preview
    pub preview_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            canvas: CanvasSize::default(),
            max_mask_side: 1000,
            font_path: None,
            seed: None,
            preview_chars: 500,
        }
    }
}

/// Turns raw markup into flattened visible text
pub trait TextExtractor {
    /// Returns [`Error::NoContent`] when no content root exists.
    fn extract(&self, markup: &str) -> Result<String>;
}

/// Turns cleaned text into a word-cloud raster
pub trait CloudRenderer {
    fn render(&self, text: &str, config: &RenderConfig) -> Result<CloudImage>;
}
