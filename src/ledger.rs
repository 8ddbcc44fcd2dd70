/// Two-level URL dedup: URLs seen in this run, and URLs persisted by earlier runs
use crate::store::VideoStore;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// The session set is consulted at discovery time, the store at batch admission.
/// A URL must pass both before metadata is resolved for it.
pub struct DedupLedger {
    session: HashSet<String>,
    store: Arc<dyn VideoStore>,
}

impl DedupLedger {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self {
            session: HashSet::new(),
            store,
        }
    }

    pub fn session_has(&self, url: &str) -> bool {
        self.session.contains(url)
    }

    /// Returns `false` when the URL was already recorded this session
    pub fn session_add(&mut self, url: &str) -> bool {
        self.session.insert(url.to_string())
    }

    pub fn session_len(&self) -> usize {
        self.session.len()
    }

    /// Forget everything seen this session (used when discovery restarts on a new term)
    pub fn reset_session(&mut self) {
        debug!("Clearing {} session URLs", self.session.len());
        self.session.clear();
    }

    /// Subset of `urls` not yet persisted, in input order
    pub async fn query_unknown(&self, urls: &[String]) -> Result<Vec<String>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        self.store.query_unknown(urls).await
    }
}
