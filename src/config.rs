use crate::admission::AdmissionThresholds;
use crate::collector::LoopSettings;
use crate::language::Language;
use crate::listing::{BrowserSettings, Pacing};
use crate::llm::{LLMConfig, LLMProvider};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder shipped in sample config files, treated as "no key"
const API_KEY_PLACEHOLDER: &str = "YOUR_DASHSCOPE_API_KEY";

/// Configuration for the video harvester
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Browser and discovery loop settings
    pub crawler: CrawlerConfig,

    /// Popularity and duration thresholds
    pub admission: AdmissionConfig,

    /// CSV output and quota
    pub output: OutputConfig,

    /// SQLite storage
    pub storage: StorageConfig,

    /// Relevance filter and translation model
    pub llm: LLMConfig,

    /// Log level and optional log file
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Candidates sent to the relevance filter per batch
    pub batch_size: usize,

    /// Show the browser window
    pub visible: bool,

    /// Lower bound of the random delay around navigation and scrolling (seconds)
    pub min_wait_seconds: f64,

    /// Upper bound of the random delay (seconds)
    pub max_wait_seconds: f64,

    /// Empty scroll steps tolerated before the fallback/stop decision
    pub stall_threshold: u32,

    /// Restrict search results to regular videos (no Shorts)
    pub exclude_shorts: bool,

    /// Wait for search results to render (seconds)
    pub search_timeout_seconds: u64,

    /// Wait for watch page metadata to render (seconds)
    pub detail_timeout_seconds: u64,

    /// Explicit Chrome/Chromium binary
    pub chrome_executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Videos need strictly more plays than this
    pub min_times_of_play: u64,

    /// Shortest accepted duration in minutes (inclusive)
    pub min_video_min: u64,

    /// Longest accepted duration in minutes (inclusive)
    pub max_video_max: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory CSV files are written to
    pub csv_dir: PathBuf,

    /// Number of videos to collect per run
    pub csv_video_count: usize,

    /// Language the topic is translated into before the first search
    pub working_language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,

    /// Also write logs to `file_path`
    pub file_enabled: bool,

    pub file_path: PathBuf,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            batch_size: 55,
            visible: false,
            min_wait_seconds: 3.0,
            max_wait_seconds: 6.0,
            stall_threshold: 5,
            exclude_shorts: true,
            search_timeout_seconds: 15,
            detail_timeout_seconds: 10,
            chrome_executable: None,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            min_times_of_play: 0,
            min_video_min: 0,
            max_video_max: 1_000_000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("data"),
            csv_video_count: 33,
            working_language: Language::En,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/videos.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
            file_path: PathBuf::from("data/app.log"),
        }
    }
}

impl CrawlerConfig {
    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            visible: self.visible,
            exclude_shorts: self.exclude_shorts,
            search_timeout: Duration::from_secs(self.search_timeout_seconds),
            detail_timeout: Duration::from_secs(self.detail_timeout_seconds),
            pacing: Pacing::new(self.min_wait_seconds, self.max_wait_seconds),
            chrome_executable: self.chrome_executable.clone(),
        }
    }
}

impl AdmissionConfig {
    pub fn thresholds(&self) -> AdmissionThresholds {
        AdmissionThresholds {
            min_popularity_exclusive: self.min_times_of_play,
            min_duration_inclusive: self.min_video_min,
            max_duration_inclusive: self.max_video_max,
        }
    }
}

impl Config {
    /// Load configuration from the first readable file, falling back to defaults + environment
    pub fn load() -> Result<Self> {
        let config_paths = [
            "video-harvester.toml",
            "config/video-harvester.toml",
            "config/settings.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_env_overrides();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file; a missing or malformed file is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("HARVESTER_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        let key_missing = match self.llm.api_key.as_deref() {
            None => true,
            Some(key) => key.trim().is_empty() || key == API_KEY_PLACEHOLDER,
        };
        if key_missing {
            self.llm.api_key = std::env::var("DASHSCOPE_API_KEY").ok();
        }

        if let Ok(log_level) = std::env::var("HARVESTER_LOG_LEVEL") {
            self.logging.level = log_level;
        }

        if let Ok(output_dir) = std::env::var("HARVESTER_OUTPUT_DIR") {
            self.output.csv_dir = PathBuf::from(output_dir);
        }

        if let Ok(db_path) = std::env::var("HARVESTER_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }

        if let Ok(count) = std::env::var("HARVESTER_VIDEO_COUNT") {
            match count.parse() {
                Ok(count) => self.output.csv_video_count = count,
                Err(_) => tracing::warn!("Ignoring invalid HARVESTER_VIDEO_COUNT: {}", count),
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.crawler.batch_size == 0 {
            return Err(anyhow!("batch_size must be greater than 0"));
        }

        if self.crawler.min_wait_seconds < 0.0 || self.crawler.max_wait_seconds < 0.0 {
            return Err(anyhow!("wait bounds must not be negative"));
        }

        if self.crawler.min_wait_seconds > self.crawler.max_wait_seconds {
            return Err(anyhow!(
                "min_wait_seconds ({}) is greater than max_wait_seconds ({})",
                self.crawler.min_wait_seconds,
                self.crawler.max_wait_seconds
            ));
        }

        if self.admission.min_video_min > self.admission.max_video_max {
            return Err(anyhow!(
                "min_video_min ({}) is greater than max_video_max ({})",
                self.admission.min_video_min,
                self.admission.max_video_max
            ));
        }

        if self.llm.requires_api_key() && self.llm.api_key.is_none() {
            return Err(anyhow!(
                "API key required for {:?} provider (set llm.api_key, HARVESTER_API_KEY or DASHSCOPE_API_KEY)",
                self.llm.provider
            ));
        }

        if self.llm.provider != LLMProvider::Gemini && self.llm.endpoint.is_none() {
            return Err(anyhow!("LLM endpoint required for {:?} provider", self.llm.provider));
        }

        if !self.output.csv_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.output.csv_dir) {
                return Err(anyhow!("Cannot create output directory: {}", e));
            }
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Loop settings for a run collecting `language` results
    pub fn loop_settings(&self, language: Language) -> LoopSettings {
        LoopSettings {
            batch_size: self.crawler.batch_size,
            stall_threshold: self.crawler.stall_threshold,
            target: self.output.csv_video_count,
            language,
            working_language: self.output.working_language,
        }
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video Harvester Configuration:\n\
            - Target Videos: {}\n\
            - Batch Size: {}\n\
            - Wait Range: {}-{}s\n\
            - Min Plays (exclusive): {}\n\
            - Duration Range: {}-{} min\n\
            - Exclude Shorts: {}\n\
            - LLM: {:?} ({})\n\
            - CSV Directory: {}\n\
            - Database: {}",
            self.output.csv_video_count,
            self.crawler.batch_size,
            self.crawler.min_wait_seconds,
            self.crawler.max_wait_seconds,
            self.admission.min_times_of_play,
            self.admission.min_video_min,
            self.admission.max_video_max,
            self.crawler.exclude_shorts,
            self.llm.provider,
            self.llm.model,
            self.output.csv_dir.display(),
            self.storage.db_path.display()
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_video_count(mut self, count: usize) -> Self {
        self.config.output.csv_video_count = count;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.crawler.batch_size = batch_size;
        self
    }

    pub fn with_wait_range(mut self, min_seconds: f64, max_seconds: f64) -> Self {
        self.config.crawler.min_wait_seconds = min_seconds;
        self.config.crawler.max_wait_seconds = max_seconds;
        self
    }

    pub fn with_min_plays(mut self, min_plays: u64) -> Self {
        self.config.admission.min_times_of_play = min_plays;
        self
    }

    pub fn with_duration_range(mut self, min_minutes: u64, max_minutes: u64) -> Self {
        self.config.admission.min_video_min = min_minutes;
        self.config.admission.max_video_max = max_minutes;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.csv_dir = dir;
        self
    }

    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.config.storage.db_path = path;
        self
    }

    pub fn with_llm_provider(mut self, provider: LLMProvider) -> Self {
        self.config.llm.provider = provider;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.llm.api_key = Some(api_key);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.config.crawler.visible = visible;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.crawler.batch_size, 55);
        assert_eq!(config.crawler.stall_threshold, 5);
        assert_eq!(config.output.csv_video_count, 33);
        assert_eq!(config.admission.max_video_max, 1_000_000);
        assert_eq!(config.storage.db_path, PathBuf::from("data/videos.db"));
        assert!(config.crawler.exclude_shorts);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_video_count(10)
            .with_batch_size(20)
            .with_min_plays(10_000)
            .with_duration_range(5, 60)
            .visible(true)
            .build();

        assert_eq!(config.output.csv_video_count, 10);
        assert_eq!(config.crawler.batch_size, 20);
        assert!(config.crawler.visible);
        let thresholds = config.admission.thresholds();
        assert_eq!(thresholds.min_popularity_exclusive, 10_000);
        assert_eq!(thresholds.min_duration_inclusive, 5);
        assert_eq!(thresholds.max_duration_inclusive, 60);
    }

    #[test]
    fn test_config_validation() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigBuilder::new()
            .with_api_key("sk-test".to_string())
            .with_output_dir(temp_dir.path().join("csv"))
            .build();
        assert!(config.validate().is_ok());
        assert!(temp_dir.path().join("csv").exists());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_batch = ConfigBuilder::new()
            .with_api_key("sk-test".to_string())
            .with_batch_size(0)
            .build();
        assert!(zero_batch.validate().is_err());

        let inverted_wait = ConfigBuilder::new()
            .with_api_key("sk-test".to_string())
            .with_wait_range(6.0, 3.0)
            .build();
        assert!(inverted_wait.validate().is_err());

        let inverted_duration = ConfigBuilder::new()
            .with_api_key("sk-test".to_string())
            .with_duration_range(60, 5)
            .build();
        assert!(inverted_duration.validate().is_err());
    }

    #[test]
    fn test_hosted_provider_needs_key() {
        let mut config = Config::default();
        config.llm.api_key = None;
        assert!(config.validate().is_err());

        let temp_dir = TempDir::new().unwrap();
        config.llm.provider = LLMProvider::LMStudio;
        config.llm.endpoint = Some("http://localhost:1234/v1/chat/completions".to_string());
        config.output.csv_dir = temp_dir.path().to_path_buf();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            batch_size = 10

            [output]
            csv_video_count = 5
            working_language = "jp"
            "#,
        )
        .unwrap();
        assert_eq!(config.crawler.batch_size, 10);
        assert_eq!(config.crawler.max_wait_seconds, 6.0);
        assert_eq!(config.output.csv_video_count, 5);
        assert_eq!(config.output.working_language, Language::Jp);
        assert_eq!(config.storage.db_path, PathBuf::from("data/videos.db"));
    }

    #[test]
    fn test_save_and_load_from() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("video-harvester.toml");
        let config = ConfigBuilder::new().with_video_count(7).build();
        config.save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.output.csv_video_count, 7);
        assert!(Config::load_from(&temp_dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_loop_settings_carry_language() {
        let config = ConfigBuilder::new().with_video_count(4).build();
        let settings = config.loop_settings(Language::Cn);
        assert_eq!(settings.target, 4);
        assert_eq!(settings.language, Language::Cn);
        assert_eq!(settings.working_language, Language::En);
    }
}
