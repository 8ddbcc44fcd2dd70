/// Search-term translation via a chat model
use super::{clean_llm_response, ChatMessage, LLM};
use crate::language::Language;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

#[async_trait]
pub trait Translator: Send + Sync {
    /// `text` rendered in `target`. Returns `text` unchanged when translation fails.
    async fn translate(&self, text: &str, target: Language) -> String;
}

pub struct LlmTranslator {
    llm: Arc<dyn LLM>,
}

impl LlmTranslator {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self { llm }
    }
}

fn build_prompt(text: &str, target: Language) -> String {
    format!(
        "Translate the following search keyword into {}. Reply with the translated keyword only, nothing else: {}",
        target.display_name(),
        text
    )
}

/// Strip fences, whitespace and wrapping quotes/backticks from a model reply
fn clean_translation(reply: &str) -> String {
    clean_llm_response(reply)
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim()
        .to_string()
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(&self, text: &str, target: Language) -> String {
        let messages = vec![
            ChatMessage::system("You are a helpful translator."),
            ChatMessage::user(build_prompt(text, target)),
        ];

        match self.llm.chat(messages).await {
            Ok(response) => {
                let translated = clean_translation(&response.content);
                if translated.is_empty() {
                    return text.to_string();
                }
                info!("🌐 Translated '{}' -> '{}' ({})", text, translated, target);
                translated
            }
            Err(e) => {
                error!("❌ Translation failed: {}", e);
                text.to_string()
            }
        }
    }
}
