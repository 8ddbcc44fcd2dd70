pub mod providers;
pub mod relevance;
pub mod translate;

pub use relevance::{LlmRelevanceClassifier, RelevanceClassifier};
pub use translate::{LlmTranslator, Translator};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// LLM provider types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LLMProvider {
    /// Any `/chat/completions` endpoint: DashScope (Qwen), OpenAI, vLLM...
    OpenAICompatible,
    LMStudio,
    Gemini,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Relevance prompt, `{topic}` and `{titles}` are substituted
    pub filter_template: String,
}

pub const DASHSCOPE_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";

pub const DEFAULT_FILTER_TEMPLATE: &str = r#"You are screening YouTube search results for the topic "{topic}".
Below is a JSON array of video titles:
{titles}
Return ONLY a JSON array containing the titles that are clearly about the topic, copied exactly as given. Return [] if none match."#;

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAICompatible,
            endpoint: Some(DASHSCOPE_ENDPOINT.to_string()),
            api_key: None,
            model: "qwen-plus".to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_seconds: 60,
            filter_template: DEFAULT_FILTER_TEMPLATE.to_string(),
        }
    }
}

impl LLMConfig {
    /// Hosted providers cannot be called without a key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self.provider, LLMProvider::LMStudio)
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse>;
    async fn is_available(&self) -> bool;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>> {
    match config.provider {
        LLMProvider::OpenAICompatible | LLMProvider::LMStudio => Ok(Box::new(
            providers::ChatCompletionsProvider::new(config.clone())?,
        )),
        LLMProvider::Gemini => Ok(Box::new(providers::GeminiProvider::new(config.clone())?)),
    }
}

/// Check the provider answers before a long run starts.
///
/// An unreachable model is not fatal: every batch is then judged irrelevant.
pub async fn check_availability(llm: &dyn LLM) -> bool {
    let available = llm.is_available().await;
    if available {
        info!("🤖 LLM provider {:?} is reachable", llm.provider_type());
    } else {
        warn!(
            "⚠️ LLM provider {:?} is not responding, relevance filtering will reject batches until it does",
            llm.provider_type()
        );
    }
    available
}

/// Strip markdown code fences that chat models like to wrap answers in
pub fn clean_llm_response(content: &str) -> String {
    let content = content.trim();

    if content.starts_with("```") {
        if let Some(start) = content.find('\n') {
            if let Some(end) = content.rfind("```") {
                if end > start {
                    return content[start + 1..end].trim().to_string();
                }
            }
        }
    }

    content.replace("```", "").trim().to_string()
}
