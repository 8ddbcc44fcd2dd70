/// Script-based language tagging for video titles
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language tags understood by the harvester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Latin script, the fallback tag
    En,
    /// Han ideographs without kana
    Cn,
    /// Any hiragana or katakana present
    Jp,
}

impl Language {
    /// Short tag used on the command line and in logs
    pub fn tag(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Cn => "cn",
            Language::Jp => "jp",
        }
    }

    /// Hint appended to search queries to bias results towards this language
    pub fn query_hint(&self) -> &'static str {
        match self {
            Language::En => " in English",
            Language::Cn => " 中文",
            Language::Jp => " 日本語",
        }
    }

    /// Human readable name used in translation prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Cn => "Simplified Chinese",
            Language::Jp => "Japanese",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unsupported language tag '{0}' (expected en, cn or jp)")]
pub struct LanguageParseError(pub String);

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "cn" => Ok(Language::Cn),
            "jp" => Ok(Language::Jp),
            other => Err(LanguageParseError(other.to_string())),
        }
    }
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{FF66}'..='\u{FF9F}')
}

fn is_ideograph(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}')
}

/// Classify a title by the scripts it contains.
///
/// Kana wins over ideographs: Japanese titles routinely mix both, while
/// Chinese titles never contain kana.
pub fn detect_language(text: &str) -> Language {
    let mut has_ideograph = false;
    for c in text.chars() {
        if is_kana(c) {
            return Language::Jp;
        }
        if is_ideograph(c) {
            has_ideograph = true;
        }
    }

    if has_ideograph {
        Language::Cn
    } else {
        Language::En
    }
}
