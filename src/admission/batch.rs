use super::{AcceptedRecord, AdmissionThresholds, Quota};
use crate::collector::ShutdownSignal;
use crate::language::{detect_language, Language};
use crate::ledger::DedupLedger;
use crate::listing::{Candidate, DetailResolver};
use crate::llm::RelevanceClassifier;
use crate::sink::RecordSink;
use crate::store::VideoStore;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns one buffered batch of candidates into accepted, persisted records.
///
/// Stages run in a fixed order: relevance, language, storage dedup, then
/// sequential metadata resolution bounded by the remaining quota.
pub struct BatchAdmission {
    classifier: Arc<dyn RelevanceClassifier>,
    resolver: Arc<dyn DetailResolver>,
    store: Arc<dyn VideoStore>,
    sink: Arc<dyn RecordSink>,
    thresholds: AdmissionThresholds,
    language: Language,
    shutdown: ShutdownSignal,
}

impl BatchAdmission {
    pub fn new(
        classifier: Arc<dyn RelevanceClassifier>,
        resolver: Arc<dyn DetailResolver>,
        store: Arc<dyn VideoStore>,
        sink: Arc<dyn RecordSink>,
        thresholds: AdmissionThresholds,
        language: Language,
    ) -> Self {
        Self {
            classifier,
            resolver,
            store,
            sink,
            thresholds,
            language,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Abandon batches in progress once `shutdown` is triggered
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn sink(&self) -> &Arc<dyn RecordSink> {
        &self.sink
    }

    /// Admit at most `quota.remaining()` records from `candidates`.
    ///
    /// Accepted records are saved to the store and appended to the sink before
    /// returning. Classifier and per-video resolution failures only shrink the
    /// result; store and sink failures are returned as errors. A shutdown seen
    /// between lookups drops the whole batch without writing anything.
    pub async fn admit_batch(
        &self,
        candidates: &[Candidate],
        topic: &str,
        quota: Quota,
        ledger: &DedupLedger,
    ) -> Result<Vec<AcceptedRecord>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        info!("🧠 Sending {} titles to relevance filter", candidates.len());
        let titles: Vec<String> = candidates.iter().map(|c| c.title.clone()).collect();
        let relevant: HashSet<String> = self
            .classifier
            .select_relevant(&titles, topic)
            .await
            .into_iter()
            .collect();
        if relevant.is_empty() {
            info!("No relevant titles in this batch");
            return Ok(Vec::new());
        }

        let on_topic: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| relevant.contains(&c.title))
            .filter(|c| detect_language(&c.title) == self.language)
            .collect();
        debug!(
            "{} relevant, {} in {}",
            relevant.len(),
            on_topic.len(),
            self.language
        );
        if on_topic.is_empty() {
            return Ok(Vec::new());
        }

        let urls: Vec<String> = on_topic.iter().map(|c| c.url.clone()).collect();
        let unknown: HashSet<String> = ledger.query_unknown(&urls).await?.into_iter().collect();
        let unseen: Vec<&Candidate> = on_topic
            .into_iter()
            .filter(|c| unknown.contains(&c.url))
            .collect();

        let remaining = quota.remaining();
        if remaining == 0 {
            debug!("Quota already met, skipping metadata resolution");
            return Ok(Vec::new());
        }

        let mut accepted = Vec::new();
        let mut incomplete = 0;
        for (index, candidate) in unseen.iter().enumerate() {
            if self.shutdown.is_triggered() {
                warn!(
                    "🛑 Shutdown requested, dropping batch after {} of {} lookups",
                    index,
                    unseen.len()
                );
                return Ok(Vec::new());
            }

            let resolution = self.resolver.resolve(&candidate.url).await;
            if !resolution.is_complete() {
                incomplete += 1;
            }
            if let Some(failure) = &resolution.failure {
                warn!("⚠️ Metadata incomplete for {}: {}", candidate.url, failure);
            }

            if self.thresholds.admits(&resolution.details) {
                debug!(
                    "✅ {} ({} plays, {} min)",
                    candidate.title,
                    resolution.details.popularity_score,
                    resolution.details.duration_minutes
                );
                accepted.push(AcceptedRecord::new(candidate, topic, resolution.details));
                if accepted.len() >= remaining {
                    debug!("Quota reached after {} of {} lookups", index + 1, unseen.len());
                    break;
                }
            } else {
                debug!(
                    "❌ {} rejected ({} plays, {} min)",
                    candidate.title,
                    resolution.details.popularity_score,
                    resolution.details.duration_minutes
                );
            }
        }
        accepted.truncate(remaining);

        info!(
            "📥 Accepted {} of {} new candidates (remaining quota {}, {} with incomplete metadata)",
            accepted.len(),
            unseen.len(),
            remaining,
            incomplete
        );

        if !accepted.is_empty() {
            self.store.save_batch(&accepted).await?;
            self.sink.append(&accepted).await?;
        }
        Ok(accepted)
    }
}
