#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use video_harvester::admission::AcceptedRecord;
use video_harvester::collector::ShutdownSignal;
use video_harvester::language::Language;
use video_harvester::listing::{
    Candidate, DetailResolver, ListingSource, Resolution, ResolveError, VideoDetails,
};
use video_harvester::llm::{RelevanceClassifier, Translator};
use video_harvester::sink::RecordSink;
use video_harvester::store::VideoStore;

pub fn url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// English-titled candidate `Video <id>`
pub fn candidate(id: &str) -> Candidate {
    Candidate::new(format!("Video {}", id), url(id))
}

pub fn candidates(ids: &[&str]) -> Vec<Candidate> {
    ids.iter().map(|id| candidate(id)).collect()
}

pub fn details(popularity_score: u64, duration_minutes: u64) -> VideoDetails {
    VideoDetails {
        popularity_score,
        duration_minutes,
    }
}

#[derive(Debug, Default)]
struct SourceState {
    started: usize,
    shutdowns: usize,
    searches: Vec<(String, Language)>,
    scrolls: HashMap<String, usize>,
    current: Option<String>,
}

/// Listing whose pages are scripted per search term.
///
/// Each scroll reveals the next page; extraction returns everything revealed
/// so far, like a real infinite-scroll listing.
pub struct ScriptedSource {
    pages: HashMap<String, Vec<Vec<Candidate>>>,
    fail_start: bool,
    fail_on_scroll: Option<usize>,
    state: Mutex<SourceState>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            fail_start: false,
            fail_on_scroll: None,
            state: Mutex::new(SourceState::default()),
        }
    }

    pub fn with_pages(mut self, term: &str, pages: Vec<Vec<Candidate>>) -> Self {
        self.pages.insert(term.to_string(), pages);
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Fail the n-th scroll (1-based) across the whole run
    pub fn failing_on_scroll(mut self, n: usize) -> Self {
        self.fail_on_scroll = Some(n);
        self
    }

    pub fn started(&self) -> usize {
        self.state.lock().unwrap().started
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    pub fn searches(&self) -> Vec<(String, Language)> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn scrolls_for(&self, term: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .scrolls
            .get(term)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_scrolls(&self) -> usize {
        self.state.lock().unwrap().scrolls.values().sum()
    }
}

#[async_trait]
impl ListingSource for ScriptedSource {
    async fn start(&self) -> Result<()> {
        if self.fail_start {
            return Err(anyhow!("browser failed to launch"));
        }
        self.state.lock().unwrap().started += 1;
        Ok(())
    }

    async fn search(&self, topic: &str, language: Language) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.searches.push((topic.to_string(), language));
        state.scrolls.insert(topic.to_string(), 0);
        state.current = Some(topic.to_string());
        Ok(())
    }

    async fn scroll_step(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let total: usize = state.scrolls.values().sum();
        if self.fail_on_scroll == Some(total + 1) {
            return Err(anyhow!("page crashed"));
        }
        let current = state
            .current
            .clone()
            .ok_or_else(|| anyhow!("scroll before search"))?;
        *state.scrolls.entry(current).or_insert(0) += 1;
        Ok(())
    }

    async fn extract_visible(&self) -> Result<Vec<Candidate>> {
        let state = self.state.lock().unwrap();
        let Some(current) = state.current.as_ref() else {
            return Ok(Vec::new());
        };
        let revealed = state.scrolls.get(current).copied().unwrap_or(0);
        Ok(self
            .pages
            .get(current)
            .map(|pages| pages.iter().take(revealed).flatten().cloned().collect())
            .unwrap_or_default())
    }

    async fn shutdown(&self) {
        self.state.lock().unwrap().shutdowns += 1;
    }
}

/// Resolver backed by a fixed table; unknown URLs fail
pub struct TableResolver {
    table: HashMap<String, VideoDetails>,
    calls: Mutex<Vec<String>>,
    interrupt: Option<(ShutdownSignal, usize)>,
}

impl TableResolver {
    pub fn new(entries: Vec<(String, VideoDetails)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
            interrupt: None,
        }
    }

    /// Trigger `signal` during the n-th lookup (1-based), like a Ctrl-C mid-batch
    pub fn interrupting_on_call(mut self, n: usize, signal: ShutdownSignal) -> Self {
        self.interrupt = Some((signal, n));
        self
    }

    /// Every URL resolves to `details`
    pub fn uniform(ids: &[&str], details: VideoDetails) -> Self {
        Self::new(ids.iter().map(|id| (url(id), details)).collect())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DetailResolver for TableResolver {
    async fn resolve(&self, url: &str) -> Resolution {
        let made = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(url.to_string());
            calls.len()
        };
        if let Some((signal, n)) = &self.interrupt {
            if made == *n {
                signal.trigger();
            }
        }
        match self.table.get(url) {
            Some(details) => Resolution::resolved(*details),
            None => Resolution::failed(ResolveError::Content(format!("no page for {}", url))),
        }
    }
}

pub enum Verdict {
    AllRelevant,
    Only(Vec<String>),
    Failing,
}

pub struct FixedClassifier {
    verdict: Verdict,
    calls: Mutex<Vec<(Vec<String>, String)>>,
}

impl FixedClassifier {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelevanceClassifier for FixedClassifier {
    async fn select_relevant(&self, titles: &[String], topic: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .push((titles.to_vec(), topic.to_string()));
        match &self.verdict {
            Verdict::AllRelevant => titles.to_vec(),
            Verdict::Only(keep) => titles.iter().filter(|t| keep.contains(*t)).cloned().collect(),
            Verdict::Failing => Vec::new(),
        }
    }
}

/// Dictionary translator; unknown words come back unchanged
pub struct DictionaryTranslator {
    entries: HashMap<(String, Language), String>,
    calls: Mutex<Vec<(String, Language)>>,
}

impl DictionaryTranslator {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, text: &str, target: Language, translated: &str) -> Self {
        self.entries
            .insert((text.to_string(), target), translated.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, Language)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for DictionaryTranslator {
    async fn translate(&self, text: &str, target: Language) -> String {
        self.calls.lock().unwrap().push((text.to_string(), target));
        self.entries
            .get(&(text.to_string(), target))
            .cloned()
            .unwrap_or_else(|| text.to_string())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<AcceptedRecord>>,
    preexisting: HashSet<String>,
    save_calls: Mutex<usize>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known(urls: &[String]) -> Self {
        Self {
            preexisting: urls.iter().cloned().collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<AcceptedRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn save_calls(&self) -> usize {
        *self.save_calls.lock().unwrap()
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn query_unknown(&self, urls: &[String]) -> Result<Vec<String>> {
        let rows = self.rows.lock().unwrap();
        Ok(urls
            .iter()
            .filter(|u| !self.preexisting.contains(*u) && !rows.iter().any(|r| &r.url == *u))
            .cloned()
            .collect())
    }

    async fn save_batch(&self, records: &[AcceptedRecord]) -> Result<u64> {
        *self.save_calls.lock().unwrap() += 1;
        if self.fail_saves {
            return Err(anyhow!("disk full"));
        }
        let mut rows = self.rows.lock().unwrap();
        let mut inserted = 0;
        for record in records {
            if !self.preexisting.contains(&record.url) && !rows.iter().any(|r| r.url == record.url) {
                rows.push(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<Vec<AcceptedRecord>>,
    runs: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.rows.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    fn begin_run(&self, topic: &str) {
        self.runs.lock().unwrap().push(topic.to_string());
    }

    async fn append(&self, records: &[AcceptedRecord]) -> Result<()> {
        self.rows.lock().unwrap().extend_from_slice(records);
        Ok(())
    }

    fn location(&self) -> Option<std::path::PathBuf> {
        None
    }
}
