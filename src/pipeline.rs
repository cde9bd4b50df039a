//! One generation run: fetch, extract, normalize, render.
//!
//! Every run is built from an immutable [`RunRequest`] and recomputes
//! everything from scratch. Failures come back as a typed [`Error`] inside
//! [`RunOutcome::Failed`]; nothing is retried.

use crate::fetch::Fetcher;
use crate::normalize::normalize;
use crate::rendering::{CloudImage, RenderConfig, WordCloudRenderer};
use crate::shape::{load_mask, ShapeNotice, ShapeSource};
use crate::{
    CloudRenderer, Error, HtmlTextExtractor, PipelineConfig, Result, TextExtractor, WordLimit,
    PREDEFINED_LINKS,
};
use log::{debug, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Shown instead of a preview when extraction produced no text.
pub const EMPTY_PREVIEW: &str = "No visible text found.";

/// Which of the two link inputs is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkSource {
    #[default]
    Predefined,
    Custom,
}

/// Inputs for a single run
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub link_source: LinkSource,
    /// Index into [`PREDEFINED_LINKS`]
    pub predefined: usize,
    pub custom_url: String,
    pub word_limit: WordLimit,
    pub shape: ShapeSource,
}

impl RunRequest {
    pub fn predefined(index: usize) -> Self {
        Self {
            link_source: LinkSource::Predefined,
            predefined: index,
            ..Default::default()
        }
    }

    pub fn custom(url: impl Into<String>) -> Self {
        Self {
            link_source: LinkSource::Custom,
            custom_url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_word_limit(mut self, limit: WordLimit) -> Self {
        self.word_limit = limit;
        self
    }

    pub fn with_shape(mut self, shape: ShapeSource) -> Self {
        self.shape = shape;
        self
    }

    /// The URL this request points at, if one is actually set.
    pub fn resolve_url(&self) -> Option<String> {
        match self.link_source {
            LinkSource::Predefined => PREDEFINED_LINKS.get(self.predefined).map(|s| s.to_string()),
            LinkSource::Custom => {
                let url = self.custom_url.trim();
                (!url.is_empty()).then(|| url.to_string())
            }
        }
    }
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub url: String,
    pub preview: String,
    pub cleaned_text: String,
    pub notices: Vec<ShapeNotice>,
    pub image: CloudImage,
    /// `image` encoded for download
    pub png: Vec<u8>,
}

#[derive(Debug)]
pub enum RunOutcome {
    Done(RunReport),
    Failed {
        error: Error,
        notices: Vec<ShapeNotice>,
    },
}

impl RunOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, RunOutcome::Done(_))
    }

    pub fn notices(&self) -> &[ShapeNotice] {
        match self {
            RunOutcome::Done(report) => &report.notices,
            RunOutcome::Failed { notices, .. } => notices,
        }
    }
}

/// First `max_chars` characters followed by an ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.is_empty() {
        return EMPTY_PREVIEW.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Fetcher,
    extractor: Box<dyn TextExtractor>,
    renderer: Box<dyn CloudRenderer>,
}

impl Pipeline {
    /// A pipeline using the bundled extractor and renderer.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let extractor = HtmlTextExtractor::new()?;
        Self::with_components(config, Box::new(extractor), Box::new(WordCloudRenderer::new()))
    }

    pub fn with_components(
        config: PipelineConfig,
        extractor: Box<dyn TextExtractor>,
        renderer: Box<dyn CloudRenderer>,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(config.fetch.clone())?;
        Ok(Self {
            config,
            fetcher,
            extractor,
            renderer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline once. Panics inside a step are reported as
    /// [`Error::Other`] instead of unwinding into the caller.
    pub fn run(&self, request: &RunRequest) -> RunOutcome {
        let mut notices = Vec::new();
        let result = catch_unwind(AssertUnwindSafe(|| self.try_run(request, &mut notices)))
            .unwrap_or_else(|panic| Err(Error::Other(panic_message(panic.as_ref()))));

        match result {
            Ok(report) => {
                info!(
                    "rendered {} words for {}",
                    report.image.words.len(),
                    report.url
                );
                RunOutcome::Done(report)
            }
            Err(error) => {
                warn!("run failed: {}", error);
                RunOutcome::Failed { error, notices }
            }
        }
    }

    fn try_run(&self, request: &RunRequest, notices: &mut Vec<ShapeNotice>) -> Result<RunReport> {
        let url = request.resolve_url().ok_or(Error::MissingUrl)?;

        let shape = load_mask(&request.shape, self.config.max_mask_side);
        notices.extend(shape.notice);

        let markup = self.fetcher.fetch(&url)?;
        let raw = self.extractor.extract(&markup)?;
        drop(markup);
        let cleaned_text = normalize(&raw);
        debug!("{} characters of cleaned text", cleaned_text.chars().count());

        let config = RenderConfig {
            canvas: self.config.canvas,
            max_mask_side: self.config.max_mask_side,
            font_path: self.config.font_path.clone(),
            seed: self.config.seed,
            ..RenderConfig::new(request.word_limit, shape.mask)
        };
        let image = self.renderer.render(&cleaned_text, &config)?;
        let png = image.to_png()?;

        Ok(RunReport {
            url,
            preview: preview(&cleaned_text, self.config.preview_chars),
            cleaned_text,
            notices: std::mem::take(notices),
            image,
            png,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "internal error".to_string()
    }
}
