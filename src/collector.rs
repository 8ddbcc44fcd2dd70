//! The collection loop.
//!
//! Drives a [`ListingSource`] through search, scroll and extract steps, feeds
//! new candidates through session dedup into a FIFO buffer and drains the
//! buffer in fixed-size batches through [`BatchAdmission`] until the quota is
//! met, discovery stalls, or a shutdown is requested.

use crate::admission::{BatchAdmission, Quota};
use crate::language::{detect_language, Language};
use crate::ledger::DedupLedger;
use crate::listing::{Candidate, ListingSource};
use crate::llm::Translator;
use anyhow::Result;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Loop tuning, usually built from `Config`
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Candidates per admission batch
    pub batch_size: usize,
    /// Consecutive empty discovery steps tolerated before falling back or stopping
    pub stall_threshold: u32,
    /// Number of records to save
    pub target: usize,
    /// Language results must be in
    pub language: Language,
    /// Language the user topic is translated into before the first search
    pub working_language: Language,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            batch_size: 55,
            stall_threshold: 5,
            target: 33,
            language: Language::En,
            working_language: Language::En,
        }
    }
}

/// Cooperative cancellation flag, checked by the loop at safe points
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Trigger this signal on the first Ctrl-C; a second Ctrl-C exits at once
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("🛑 Interrupted, finishing current step before shutting down (Ctrl-C again to force)");
            signal.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                error!("🛑 Forced exit");
                std::process::exit(130);
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Searching,
    Discovering,
    Draining,
    FallbackRequery,
    Done,
    Stalled,
    Interrupted,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    QuotaMet,
    Stalled,
    Interrupted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::QuotaMet => "quota met",
            Outcome::Stalled => "stalled",
            Outcome::Interrupted => "interrupted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub outcome: Outcome,
    pub saved: usize,
    pub target: usize,
    /// Topic in effect when the run ended (after translation/fallback)
    pub topic: String,
    pub fallback_used: bool,
    pub csv_path: Option<PathBuf>,
}

impl CollectionReport {
    pub fn summary(&self) -> String {
        format!(
            "{} | saved {}/{} for '{}'{}",
            self.outcome,
            self.saved,
            self.target,
            self.topic,
            if self.fallback_used { " (after translated requery)" } else { "" }
        )
    }
}

/// Mutable state of a single run
struct RunState {
    topic: String,
    buffer: VecDeque<Candidate>,
    quota: Quota,
    stall_count: u32,
    fallback_used: bool,
}

pub struct Collector {
    source: Arc<dyn ListingSource>,
    translator: Arc<dyn Translator>,
    admission: BatchAdmission,
    ledger: DedupLedger,
    settings: LoopSettings,
    shutdown: ShutdownSignal,
}

impl Collector {
    pub fn new(
        source: Arc<dyn ListingSource>,
        translator: Arc<dyn Translator>,
        admission: BatchAdmission,
        ledger: DedupLedger,
        settings: LoopSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            source,
            translator,
            admission: admission.with_shutdown(shutdown.clone()),
            ledger,
            settings,
            shutdown,
        }
    }

    /// Run one collection for `topic`.
    ///
    /// The listing source is started once and shut down exactly once before
    /// this returns, whether the run finished, stalled, was interrupted or failed.
    pub async fn run(&mut self, topic: &str) -> Result<CollectionReport> {
        let topic = self.initial_topic(topic).await;
        self.admission.sink().begin_run(&topic);

        info!(
            "🚀 Collecting '{}' | target {} | lang {} | batch {}",
            topic, self.settings.target, self.settings.language, self.settings.batch_size
        );

        let result = match self.source.start().await {
            Ok(()) => self.drive(topic).await,
            Err(e) => Err(e),
        };

        self.source.shutdown().await;
        info!("🧹 Listing source shut down");

        result
    }

    async fn initial_topic(&self, topic: &str) -> String {
        let translated = self
            .translator
            .translate(topic, self.settings.working_language)
            .await;
        let translated = translated.trim();
        if translated.is_empty() {
            topic.to_string()
        } else {
            info!("🌐 Working topic: {} -> {}", topic, translated);
            translated.to_string()
        }
    }

    async fn drive(&mut self, topic: String) -> Result<CollectionReport> {
        let mut run = RunState {
            topic,
            buffer: VecDeque::new(),
            quota: Quota::new(self.settings.target),
            stall_count: 0,
            fallback_used: false,
        };
        let mut state = LoopState::Searching;

        loop {
            debug!("Loop state: {:?}", state);
            state = match state {
                LoopState::Searching => {
                    if self.shutdown.is_triggered() {
                        LoopState::Interrupted
                    } else {
                        self.source.search(&run.topic, self.settings.language).await?;
                        LoopState::Discovering
                    }
                }
                LoopState::Discovering => self.discover(&mut run).await?,
                LoopState::Draining => self.drain(&mut run).await?,
                LoopState::FallbackRequery => self.fallback(&mut run).await,
                LoopState::Done | LoopState::Stalled | LoopState::Interrupted => break,
            };
        }

        let outcome = match state {
            LoopState::Done => Outcome::QuotaMet,
            LoopState::Interrupted => Outcome::Interrupted,
            _ => Outcome::Stalled,
        };
        if !run.buffer.is_empty() {
            debug!("Discarding {} buffered candidates", run.buffer.len());
        }
        debug!("{} URLs seen on '{}'", self.ledger.session_len(), run.topic);

        Ok(CollectionReport {
            outcome,
            saved: run.quota.saved(),
            target: run.quota.target(),
            topic: run.topic,
            fallback_used: run.fallback_used,
            csv_path: self.admission.sink().location(),
        })
    }

    /// One scroll + extract step
    async fn discover(&mut self, run: &mut RunState) -> Result<LoopState> {
        if run.quota.is_met() {
            return Ok(LoopState::Done);
        }
        if self.shutdown.is_triggered() {
            return Ok(LoopState::Interrupted);
        }

        self.source.scroll_step().await?;
        let visible = self.source.extract_visible().await?;
        let new_found = self.absorb(visible, &mut run.buffer);

        info!(
            "🔎 Buffer {} | saved {}/{} | new this step {}",
            run.buffer.len(),
            run.quota.saved(),
            run.quota.target(),
            new_found
        );

        if new_found > 0 {
            run.stall_count = 0;
            return Ok(LoopState::Draining);
        }

        run.stall_count += 1;
        if run.stall_count <= self.settings.stall_threshold {
            return Ok(LoopState::Draining);
        }

        if run.quota.saved() == 0 && !run.fallback_used {
            Ok(LoopState::FallbackRequery)
        } else {
            warn!(
                "⚠️ No new videos after {} scrolls, stopping",
                run.stall_count
            );
            Ok(LoopState::Stalled)
        }
    }

    /// Session-dedup and language-gate extracted candidates into the buffer
    fn absorb(&mut self, visible: Vec<Candidate>, buffer: &mut VecDeque<Candidate>) -> usize {
        let mut new_found = 0;
        for candidate in visible {
            if self.ledger.session_has(&candidate.url) {
                continue;
            }
            if detect_language(&candidate.title) != self.settings.language {
                continue;
            }
            self.ledger.session_add(&candidate.url);
            buffer.push_back(candidate);
            new_found += 1;
        }
        new_found
    }

    /// Admit full batches, oldest first
    async fn drain(&mut self, run: &mut RunState) -> Result<LoopState> {
        let batch_size = self.settings.batch_size.max(1);

        while run.buffer.len() >= batch_size {
            if self.shutdown.is_triggered() {
                return Ok(LoopState::Interrupted);
            }

            let batch: Vec<Candidate> = run.buffer.drain(..batch_size).collect();
            let accepted = self
                .admission
                .admit_batch(&batch, &run.topic, run.quota, &self.ledger)
                .await?;
            run.quota.record(accepted.len());
            info!(
                "📊 Saved {}/{}",
                run.quota.saved(),
                run.quota.target()
            );

            if run.quota.is_met() {
                info!("🎯 Quota reached");
                return Ok(LoopState::Done);
            }
        }

        Ok(LoopState::Discovering)
    }

    /// Retry discovery once with the topic translated into the result language
    async fn fallback(&mut self, run: &mut RunState) -> LoopState {
        let translated = self
            .translator
            .translate(&run.topic, self.settings.language)
            .await;
        let translated = translated.trim();
        if translated.is_empty() || translated == run.topic {
            warn!(
                "⚠️ No alternative search term for '{}', stopping",
                run.topic
            );
            return LoopState::Stalled;
        }

        info!(
            "🔁 Too few results, searching again as '{}' ({})",
            translated, self.settings.language
        );
        run.topic = translated.to_string();
        run.fallback_used = true;
        self.ledger.reset_session();
        run.buffer.clear();
        run.stall_count = 0;
        LoopState::Searching
    }
}
