mod common;

use common::*;
use std::sync::Arc;
use video_harvester::admission::{AdmissionThresholds, BatchAdmission};
use video_harvester::collector::{Collector, LoopSettings, Outcome, ShutdownSignal};
use video_harvester::language::Language;
use video_harvester::ledger::DedupLedger;
use video_harvester::listing::Candidate;
use video_harvester::store::VideoStore;

struct Run {
    source: Arc<ScriptedSource>,
    translator: Arc<DictionaryTranslator>,
    resolver: Arc<TableResolver>,
    store: Arc<MemoryStore>,
    sink: Arc<MemorySink>,
    collector: Collector,
}

fn settings(language: Language, batch_size: usize, target: usize) -> LoopSettings {
    LoopSettings {
        batch_size,
        stall_threshold: 5,
        target,
        language,
        working_language: Language::En,
    }
}

fn build(
    source: ScriptedSource,
    translator: DictionaryTranslator,
    resolver: TableResolver,
    settings: LoopSettings,
    shutdown: ShutdownSignal,
) -> Run {
    let source = Arc::new(source);
    let translator = Arc::new(translator);
    let resolver = Arc::new(resolver);
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemorySink::new());
    let store_handle: Arc<dyn VideoStore> = store.clone();

    let admission = BatchAdmission::new(
        Arc::new(FixedClassifier::new(Verdict::AllRelevant)),
        resolver.clone(),
        store_handle.clone(),
        sink.clone(),
        AdmissionThresholds::default(),
        settings.language,
    );
    let collector = Collector::new(
        source.clone(),
        translator.clone(),
        admission,
        DedupLedger::new(store_handle),
        settings,
        shutdown,
    );

    Run {
        source,
        translator,
        resolver,
        store,
        sink,
        collector,
    }
}

/// Japanese title (contains kana)
fn jp(id: &str) -> Candidate {
    Candidate::new(format!("柔術のテクニック {}", id), url(id))
}

#[tokio::test]
async fn test_stops_exactly_at_quota_in_discovery_order() {
    let ids = ["a", "b", "c", "d", "e", "f"];
    let source = ScriptedSource::new().with_pages(
        "bjj",
        vec![candidates(&["a", "b"]), candidates(&["c", "d"]), candidates(&["e", "f"])],
    );
    let mut run = build(
        source,
        DictionaryTranslator::new(),
        TableResolver::uniform(&ids, details(100, 10)),
        settings(Language::En, 2, 3),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("bjj").await.unwrap();

    assert_eq!(report.outcome, Outcome::QuotaMet);
    assert_eq!(report.saved, 3);
    assert_eq!(run.sink.urls(), vec![url("a"), url("b"), url("c")]);
    assert_eq!(run.store.rows().len(), 3);
    // Quota reached on "c"; "d" is never looked up
    assert!(!run.resolver.calls().contains(&url("d")));
    assert_eq!(run.source.scrolls_for("bjj"), 2);
    assert_eq!(run.source.started(), 1);
    assert_eq!(run.source.shutdowns(), 1);
}

#[tokio::test]
async fn test_session_dedup_ignores_repeated_listing_entries() {
    // Every extraction returns the whole listing revealed so far
    let source = ScriptedSource::new().with_pages(
        "bjj",
        vec![candidates(&["a"]), candidates(&["a", "b"]), candidates(&["c"])],
    );
    let mut run = build(
        source,
        DictionaryTranslator::new(),
        TableResolver::uniform(&["a", "b", "c"], details(100, 10)),
        settings(Language::En, 1, 3),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("bjj").await.unwrap();

    assert_eq!(report.outcome, Outcome::QuotaMet);
    assert_eq!(run.sink.urls(), vec![url("a"), url("b"), url("c")]);
    assert_eq!(run.resolver.calls(), vec![url("a"), url("b"), url("c")]);
}

#[tokio::test]
async fn test_topic_translated_before_first_search() {
    let translator = DictionaryTranslator::new().with("巴西柔术", Language::En, "brazilian jiu jitsu");
    let source = ScriptedSource::new().with_pages("brazilian jiu jitsu", vec![candidates(&["a"])]);
    let mut run = build(
        source,
        translator,
        TableResolver::uniform(&["a"], details(100, 10)),
        settings(Language::En, 1, 1),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("巴西柔术").await.unwrap();

    assert_eq!(
        run.source.searches(),
        vec![("brazilian jiu jitsu".to_string(), Language::En)]
    );
    assert_eq!(run.sink.runs(), vec!["brazilian jiu jitsu".to_string()]);
    assert_eq!(report.topic, "brazilian jiu jitsu");
    assert_eq!(run.store.rows()[0].topic, "brazilian jiu jitsu");
}

#[tokio::test]
async fn test_stall_triggers_single_translated_requery() {
    let translator = DictionaryTranslator::new().with("jiu jitsu", Language::Jp, "柔術");
    let source = ScriptedSource::new()
        .with_pages("jiu jitsu", vec![vec![jp("x")]])
        .with_pages("柔術", vec![vec![jp("x"), jp("y")], vec![jp("z")]]);
    let mut run = build(
        source,
        translator,
        TableResolver::uniform(&["x", "y", "z"], details(100, 10)),
        settings(Language::Jp, 2, 5),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("jiu jitsu").await.unwrap();

    assert_eq!(
        run.source.searches(),
        vec![
            ("jiu jitsu".to_string(), Language::Jp),
            ("柔術".to_string(), Language::Jp),
        ]
    );
    // One productive scroll, then six empty ones before giving up on the first term
    assert_eq!(run.source.scrolls_for("jiu jitsu"), 7);
    // "x" was seen before the requery; session and buffer were cleared so it is admitted once
    assert_eq!(run.sink.urls(), vec![url("x"), url("y")]);
    assert!(report.fallback_used);
    assert_eq!(report.topic, "柔術");
    assert_eq!(report.outcome, Outcome::Stalled);
    assert_eq!(report.saved, 2);
    assert_eq!(run.source.shutdowns(), 1);
}

#[tokio::test]
async fn test_no_second_requery_after_fallback() {
    let translator = DictionaryTranslator::new().with("jiu jitsu", Language::Jp, "柔術");
    let mut run = build(
        ScriptedSource::new(),
        translator,
        TableResolver::new(Vec::new()),
        settings(Language::Jp, 2, 5),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("jiu jitsu").await.unwrap();

    assert_eq!(report.outcome, Outcome::Stalled);
    assert_eq!(run.source.searches().len(), 2);
    assert_eq!(run.source.scrolls_for("jiu jitsu"), 6);
    assert_eq!(run.source.scrolls_for("柔術"), 6);
    // Initial translation plus the one fallback translation
    assert_eq!(
        run.translator.calls(),
        vec![
            ("jiu jitsu".to_string(), Language::En),
            ("jiu jitsu".to_string(), Language::Jp),
        ]
    );
}

#[tokio::test]
async fn test_no_requery_once_something_was_saved() {
    let translator = DictionaryTranslator::new().with("bjj", Language::En, "bjj");
    let source = ScriptedSource::new().with_pages("bjj", vec![candidates(&["a"])]);
    let mut run = build(
        source,
        translator,
        TableResolver::uniform(&["a"], details(100, 10)),
        settings(Language::En, 1, 5),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("bjj").await.unwrap();

    assert_eq!(report.outcome, Outcome::Stalled);
    assert_eq!(report.saved, 1);
    assert!(!report.fallback_used);
    assert_eq!(run.source.searches().len(), 1);
    assert_eq!(run.translator.calls().len(), 1);
}

#[tokio::test]
async fn test_untranslatable_topic_stalls() {
    let mut run = build(
        ScriptedSource::new(),
        DictionaryTranslator::new(),
        TableResolver::new(Vec::new()),
        settings(Language::Jp, 2, 5),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("judo").await.unwrap();

    assert_eq!(report.outcome, Outcome::Stalled);
    assert!(!report.fallback_used);
    assert_eq!(run.source.searches().len(), 1);
    assert_eq!(run.source.shutdowns(), 1);
}

#[tokio::test]
async fn test_partial_batch_waits_for_more_candidates() {
    let source = ScriptedSource::new().with_pages("bjj", vec![candidates(&["a", "b", "c"])]);
    let mut run = build(
        source,
        DictionaryTranslator::new(),
        TableResolver::uniform(&["a", "b", "c"], details(100, 10)),
        settings(Language::En, 2, 5),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("bjj").await.unwrap();

    // [a, b] fills a batch; [c] never does
    assert_eq!(run.sink.urls(), vec![url("a"), url("b")]);
    assert_eq!(report.saved, 2);
    assert_eq!(report.outcome, Outcome::Stalled);
}

#[tokio::test]
async fn test_scroll_failure_still_shuts_down_once() {
    let source = ScriptedSource::new()
        .with_pages("bjj", vec![candidates(&["a"])])
        .failing_on_scroll(1);
    let mut run = build(
        source,
        DictionaryTranslator::new(),
        TableResolver::new(Vec::new()),
        settings(Language::En, 1, 5),
        ShutdownSignal::new(),
    );

    assert!(run.collector.run("bjj").await.is_err());
    assert_eq!(run.source.shutdowns(), 1);
}

#[tokio::test]
async fn test_start_failure_still_shuts_down_once() {
    let mut run = build(
        ScriptedSource::new().failing_start(),
        DictionaryTranslator::new(),
        TableResolver::new(Vec::new()),
        settings(Language::En, 1, 5),
        ShutdownSignal::new(),
    );

    assert!(run.collector.run("bjj").await.is_err());
    assert!(run.source.searches().is_empty());
    assert_eq!(run.source.shutdowns(), 1);
}

#[tokio::test]
async fn test_interrupt_skips_discovery() {
    let shutdown = ShutdownSignal::new();
    shutdown.trigger();
    let source = ScriptedSource::new().with_pages("bjj", vec![candidates(&["a"])]);
    let mut run = build(
        source,
        DictionaryTranslator::new(),
        TableResolver::uniform(&["a"], details(100, 10)),
        settings(Language::En, 1, 5),
        shutdown,
    );

    let report = run.collector.run("bjj").await.unwrap();

    assert_eq!(report.outcome, Outcome::Interrupted);
    assert_eq!(run.source.total_scrolls(), 0);
    assert!(run.sink.urls().is_empty());
    assert_eq!(run.source.shutdowns(), 1);
}

#[tokio::test]
async fn test_interrupt_during_lookups_ends_run_without_saving() {
    let shutdown = ShutdownSignal::new();
    let ids = ["a", "b", "c", "d"];
    let source = ScriptedSource::new().with_pages("bjj", vec![candidates(&ids)]);
    let resolver =
        TableResolver::uniform(&ids, details(100, 10)).interrupting_on_call(2, shutdown.clone());
    let mut run = build(
        source,
        DictionaryTranslator::new(),
        resolver,
        settings(Language::En, 4, 4),
        shutdown,
    );

    let report = run.collector.run("bjj").await.unwrap();

    assert_eq!(report.outcome, Outcome::Interrupted);
    assert_eq!(report.saved, 0);
    assert_eq!(run.resolver.calls(), vec![url("a"), url("b")]);
    assert!(run.store.rows().is_empty());
    assert!(run.sink.urls().is_empty());
    assert_eq!(run.source.shutdowns(), 1);
}

#[tokio::test]
async fn test_zero_target_is_done_without_scrolling() {
    let mut run = build(
        ScriptedSource::new().with_pages("bjj", vec![candidates(&["a"])]),
        DictionaryTranslator::new(),
        TableResolver::uniform(&["a"], details(100, 10)),
        settings(Language::En, 1, 0),
        ShutdownSignal::new(),
    );

    let report = run.collector.run("bjj").await.unwrap();

    assert_eq!(report.outcome, Outcome::QuotaMet);
    assert_eq!(run.source.total_scrolls(), 0);
    assert!(run.resolver.calls().is_empty());
}
