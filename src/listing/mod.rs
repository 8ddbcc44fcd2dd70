/// Listing source and detail resolver contracts
///
/// The collection loop only talks to the page-rendering layer through the two
/// traits below. `browser` provides the Chromium-backed YouTube implementation,
/// `parse` holds the pure HTML/text extraction it relies on.

pub mod browser;
pub mod pacing;
pub mod parse;

pub use browser::{BrowserSettings, YouTubeBrowser};
pub use pacing::Pacing;

use crate::language::Language;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A discovered (title, url) pair awaiting validation. Identity is the url.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub url: String,
}

impl Candidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Metadata the admission filter looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub popularity_score: u64,
    pub duration_minutes: u64,
}

/// Why metadata for a single video could not be (fully) resolved
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Browser session is not running")]
    SessionClosed,

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Page content unavailable: {0}")]
    Content(String),

    #[error("Missing field on watch page: {0}")]
    MissingField(&'static str),
}

/// Outcome of one metadata lookup.
///
/// Fields that could not be read stay at zero, so a failed lookup can be fed
/// straight into the admission filter and will be rejected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub details: VideoDetails,
    pub failure: Option<ResolveError>,
}

impl Resolution {
    pub fn resolved(details: VideoDetails) -> Self {
        Self {
            details,
            failure: None,
        }
    }

    pub fn failed(error: ResolveError) -> Self {
        Self {
            details: VideoDetails::default(),
            failure: Some(error),
        }
    }

    /// Some fields were read, at least one was not
    pub fn partial(details: VideoDetails, error: ResolveError) -> Self {
        Self {
            details,
            failure: Some(error),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Paginated listing the collection loop scrolls through
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Acquire the underlying page/session. Called once per run.
    async fn start(&self) -> Result<()>;

    /// Issue a query for `topic` biased towards `language`
    async fn search(&self, topic: &str, language: Language) -> Result<()>;

    /// Advance the listing by one page worth of results
    async fn scroll_step(&self) -> Result<()>;

    /// Candidates currently rendered. Malformed entries are skipped.
    async fn extract_visible(&self) -> Result<Vec<Candidate>>;

    /// Release the page/session. Must be safe to call on a source that never started.
    async fn shutdown(&self);
}

/// Per-video metadata lookup. Never fails: problems are reported inside the `Resolution`.
#[async_trait]
pub trait DetailResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Resolution;
}
