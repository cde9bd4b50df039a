//! Error types for the word-cloud pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can end a run
///
/// Shape loading never produces one of these: a bad mask degrades to an
/// unshaped cloud and is reported through [`crate::shape::ShapeNotice`].
#[derive(Error, Debug)]
pub enum Error {
    /// No URL was entered or selected
    #[error("Please enter or select a valid URL")]
    MissingUrl,

    /// Transport, timeout or non-2xx status while fetching the page
    #[error("Request error: {0}")]
    Request(String),

    /// None of the content roots exist in the fetched document
    #[error("Couldn't find usable content. Try a different link or page structure.")]
    NoContent,

    /// Failed to load or parse a font
    #[error("Font error: {0}")]
    Font(String),

    /// Failed to decode or encode an image
    #[error("Image error: {0}")]
    Image(String),

    /// Failed to build the cloud raster
    #[error("Rendering failed: {0}")]
    Render(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// How a failure is presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Blocks the run before it starts; shown as a warning
    InputValidation,
    /// Network side failures
    Transport,
    /// The page had nothing to extract
    NoContent,
    /// Anything else, shown with its underlying message
    Unexpected,
}

impl Error {
    pub fn category(&self) -> Category {
        match self {
            Error::MissingUrl => Category::InputValidation,
            Error::Request(_) => Category::Transport,
            Error::NoContent => Category::NoContent,
            Error::Font(_) | Error::Image(_) | Error::Render(_) | Error::Other(_) => {
                Category::Unexpected
            }
        }
    }

    /// Message shown in the control panel or on stderr.
    pub fn user_message(&self) -> String {
        match self.category() {
            Category::Unexpected => format!("Something went wrong: {}", self),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Request(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}
