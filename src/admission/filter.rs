use crate::listing::VideoDetails;
use serde::{Deserialize, Serialize};

/// Numeric bounds a resolved video must satisfy.
///
/// Popularity is an exclusive lower bound, duration is inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionThresholds {
    pub min_popularity_exclusive: u64,
    pub min_duration_inclusive: u64,
    pub max_duration_inclusive: u64,
}

impl Default for AdmissionThresholds {
    fn default() -> Self {
        Self {
            min_popularity_exclusive: 0,
            min_duration_inclusive: 0,
            max_duration_inclusive: 1_000_000,
        }
    }
}

impl AdmissionThresholds {
    pub fn admits(&self, details: &VideoDetails) -> bool {
        admit(
            details.popularity_score,
            details.duration_minutes,
            self.min_popularity_exclusive,
            self.min_duration_inclusive,
            self.max_duration_inclusive,
        )
    }
}

pub fn admit(
    popularity_score: u64,
    duration_minutes: u64,
    min_popularity_exclusive: u64,
    min_duration_inclusive: u64,
    max_duration_inclusive: u64,
) -> bool {
    popularity_score > min_popularity_exclusive
        && duration_minutes >= min_duration_inclusive
        && duration_minutes <= max_duration_inclusive
}
