/// Topic relevance screening of video titles via a chat model
use super::{clean_llm_response, ChatMessage, LLMResponse, LLM};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    /// Titles judged on-topic. Always a subset of `titles`; any failure yields an empty list.
    async fn select_relevant(&self, titles: &[String], topic: &str) -> Vec<String>;
}

pub struct LlmRelevanceClassifier {
    llm: Arc<dyn LLM>,
    template: String,
    tokens: AtomicU64,
}

impl LlmRelevanceClassifier {
    pub fn new(llm: Arc<dyn LLM>, template: impl Into<String>) -> Self {
        Self {
            llm,
            template: template.into(),
            tokens: AtomicU64::new(0),
        }
    }

    /// Tokens reported by the provider across all relevance requests so far
    pub fn tokens_used(&self) -> u64 {
        self.tokens.load(Ordering::Relaxed)
    }

    fn build_prompt(&self, titles: &[String], topic: &str) -> String {
        let titles_json = serde_json::to_string(titles).unwrap_or_else(|_| "[]".to_string());
        self.template
            .replace("{topic}", topic)
            .replace("{titles}", &titles_json)
    }
}

/// Parse the model reply as a JSON array of strings and keep only entries
/// that were actually offered
fn parse_selection(reply: &str, offered: &[String]) -> Option<Vec<String>> {
    let cleaned = clean_llm_response(reply);
    let value: serde_json::Value = serde_json::from_str(&cleaned).ok()?;
    let items = value.as_array()?;

    let offered: HashSet<&str> = offered.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let selected = items
        .iter()
        .filter_map(|item| item.as_str())
        .filter(|title| offered.contains(title) && seen.insert(*title))
        .map(str::to_string)
        .collect();
    Some(selected)
}

#[async_trait]
impl RelevanceClassifier for LlmRelevanceClassifier {
    async fn select_relevant(&self, titles: &[String], topic: &str) -> Vec<String> {
        if titles.is_empty() {
            return Vec::new();
        }

        debug!("Relevance prompt: topic={}, {} titles", topic, titles.len());
        let messages = vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user(self.build_prompt(titles, topic)),
        ];

        let reply = self.llm.chat(messages).await;
        if let Ok(LLMResponse {
            tokens_used: Some(tokens),
            ..
        }) = &reply
        {
            let total = self.tokens.fetch_add(u64::from(*tokens), Ordering::Relaxed) + u64::from(*tokens);
            debug!("Relevance request used {} tokens ({} total)", tokens, total);
        }

        match reply {
            Ok(response) => match parse_selection(&response.content, titles) {
                Some(selected) => {
                    info!("🧠 Relevance filter kept {}/{} titles", selected.len(), titles.len());
                    selected
                }
                None => {
                    warn!("⚠️ Relevance reply is not a JSON array, treating batch as irrelevant");
                    debug!("Unparseable reply: {}", response.content);
                    Vec::new()
                }
            },
            Err(e) => {
                error!("❌ Relevance request failed: {}", e);
                Vec::new()
            }
        }
    }
}
