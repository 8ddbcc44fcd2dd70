/// Video Harvester
///
/// Collects a fixed number of topic-relevant YouTube videos: scrolls search
/// results in a headless browser, screens titles with an LLM, checks play
/// count and duration on each watch page and records accepted videos in
/// SQLite and a CSV file.

pub mod admission;
pub mod collector;
pub mod config;
pub mod language;
pub mod ledger;
pub mod listing;
pub mod llm;
pub mod logging;
pub mod sink;
pub mod store;

// Re-export main types for easy access
pub use crate::admission::{admit, AcceptedRecord, AdmissionThresholds, BatchAdmission, Quota};
pub use crate::collector::{CollectionReport, Collector, LoopSettings, Outcome, ShutdownSignal};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::language::{detect_language, Language};
pub use crate::ledger::DedupLedger;
pub use crate::listing::{
    Candidate, DetailResolver, ListingSource, Resolution, ResolveError, VideoDetails, YouTubeBrowser,
};
pub use crate::llm::{LLMConfig, LLMProvider, RelevanceClassifier, Translator};
pub use crate::sink::{CsvSink, RecordSink};
pub use crate::store::{SqliteVideoStore, VideoStore};
