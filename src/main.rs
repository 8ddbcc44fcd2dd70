use anyhow::Result;
use clap::{builder::PossibleValuesParser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use video_harvester::admission::BatchAdmission;
use video_harvester::collector::{Collector, Outcome, ShutdownSignal};
use video_harvester::config::Config;
use video_harvester::language::Language;
use video_harvester::ledger::DedupLedger;
use video_harvester::listing::YouTubeBrowser;
use video_harvester::llm::{check_availability, create_llm, LlmRelevanceClassifier, LlmTranslator, LLM};
use video_harvester::logging;
use video_harvester::sink::CsvSink;
use video_harvester::store::{SqliteVideoStore, VideoStore};

fn cli() -> Command {
    Command::new("video-harvester")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Collect topic-relevant YouTube videos into SQLite and CSV")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: looks for video-harvester.toml, then config/)")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("find-url")
                .about("Search YouTube for TOPIC and save matching video URLs")
                .arg(
                    Arg::new("topic")
                        .value_name("TOPIC")
                        .help("Topic to search for")
                        .required(true),
                )
                .arg(
                    Arg::new("lang")
                        .short('l')
                        .long("lang")
                        .value_name("LANG")
                        .help("Language of the collected videos")
                        .value_parser(PossibleValuesParser::new(["en", "cn", "jp"]))
                        .ignore_case(true)
                        .default_value("en"),
                )
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .value_name("NUM")
                        .help("Number of videos to collect (overrides output.csv_video_count)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("visible")
                        .long("visible")
                        .help("Show the browser window")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path)),
        None => Config::load(),
    }
}

async fn find_url(mut config: Config, matches: &ArgMatches) -> Result<Outcome> {
    let topic = matches
        .get_one::<String>("topic")
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    if topic.is_empty() {
        return Err(anyhow::anyhow!("TOPIC must not be empty"));
    }
    let language: Language = matches
        .get_one::<String>("lang")
        .map(String::as_str)
        .unwrap_or("en")
        .parse()?;

    if let Some(count) = matches.get_one::<usize>("count") {
        config.output.csv_video_count = *count;
    }
    if matches.get_flag("visible") {
        config.crawler.visible = true;
    }

    config.validate()?;
    info!("{}", config.summary());

    let store = Arc::new(SqliteVideoStore::open(&config.storage.db_path).await?);
    let llm: Arc<dyn LLM> = Arc::from(create_llm(&config.llm)?);
    check_availability(llm.as_ref()).await;
    let browser = Arc::new(YouTubeBrowser::new(config.crawler.browser_settings()));

    let store_handle: Arc<dyn VideoStore> = store.clone();
    let classifier = Arc::new(LlmRelevanceClassifier::new(
        llm.clone(),
        config.llm.filter_template.clone(),
    ));
    let admission = BatchAdmission::new(
        classifier.clone(),
        browser.clone(),
        store_handle.clone(),
        Arc::new(CsvSink::in_directory(&config.output.csv_dir)),
        config.admission.thresholds(),
        language,
    );

    let shutdown = ShutdownSignal::new();
    let listener = shutdown.listen_for_ctrl_c();

    let mut collector = Collector::new(
        browser,
        Arc::new(LlmTranslator::new(llm)),
        admission,
        DedupLedger::new(store_handle),
        config.loop_settings(language),
        shutdown,
    );

    let result = collector.run(&topic).await;
    listener.abort();
    info!("🧮 Relevance filter used {} tokens", classifier.tokens_used());
    match store.count().await {
        Ok(total) => info!("🗄️ {} videos stored in total", total),
        Err(e) => warn!("⚠️ Could not count stored videos: {:#}", e),
    }
    store.close().await;

    let report = result?;
    info!("🎉 {}", report.summary());
    if let Some(path) = &report.csv_path {
        info!("📄 CSV: {}", path.display());
    }
    Ok(report.outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config = match load_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(2);
        }
    };

    logging::init(&config.logging, matches.get_flag("verbose"))?;
    info!("🚀 Video Harvester starting...");

    match matches.subcommand() {
        Some(("find-url", sub_matches)) => match find_url(config, sub_matches).await {
            Ok(outcome) => {
                info!("Finished: {}", outcome);
                Ok(())
            }
            Err(e) => {
                error!("❌ Run failed: {:#}", e);
                std::process::exit(1);
            }
        },
        _ => unreachable!("subcommand_required is set"),
    }
}
