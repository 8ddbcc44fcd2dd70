//! Admission of discovered candidates into the persisted result set
//!
//! `filter` holds the numeric thresholds, `batch` the relevance/dedup/metadata
//! pipeline that turns a buffered batch into accepted records.

pub mod batch;
pub mod filter;

pub use batch::BatchAdmission;
pub use filter::{admit, AdmissionThresholds};

use crate::listing::{Candidate, VideoDetails};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A candidate that passed relevance, language, dedup and threshold checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedRecord {
    pub title: String,
    pub url: String,
    pub topic: String,
    pub popularity_score: u64,
    pub duration_minutes: u64,
}

impl AcceptedRecord {
    pub fn new(candidate: &Candidate, topic: &str, details: VideoDetails) -> Self {
        Self {
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            topic: topic.to_string(),
            popularity_score: details.popularity_score,
            duration_minutes: details.duration_minutes,
        }
    }
}

/// Target count of accepted records for one run.
///
/// `saved` never exceeds `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    target: usize,
    saved: usize,
}

impl Quota {
    pub fn new(target: usize) -> Self {
        Self { target, saved: 0 }
    }

    pub fn with_saved(target: usize, saved: usize) -> Self {
        Self {
            target,
            saved: saved.min(target),
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn remaining(&self) -> usize {
        self.target.saturating_sub(self.saved)
    }

    pub fn is_met(&self) -> bool {
        self.saved >= self.target
    }

    /// Count `accepted` records against the quota, returning how many were counted
    pub fn record(&mut self, accepted: usize) -> usize {
        let counted = accepted.min(self.remaining());
        if counted < accepted {
            warn!(
                "Quota overflow: {} accepted but only {} remaining",
                accepted, counted
            );
        }
        self.saved += counted;
        counted
    }
}
