//! File-backed configuration types.
//!
//! Two TOML documents are read once per run: `urls.toml` (what to collect
//! and how politely) and `prompts.toml` (how to ask the LLM and how hard to
//! retry). Every setting has a default so a minimal file stays minimal.

use serde::Deserialize;

/// One collection source: a category landing or interests URL.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionUrl {
    pub name: String,
    pub url: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub request_delay_seconds: f64,
    pub old_article_threshold_days: i64,
    pub max_retries: u32,
    pub stop_after_old_articles: bool,
    pub fetch_article_details: bool,
    pub max_pages_per_category: u32,
    pub timeout_seconds: u64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            request_delay_seconds: 1.0,
            old_article_threshold_days: 1,
            max_retries: 3,
            stop_after_old_articles: true,
            fetch_article_details: true,
            max_pages_per_category: 5,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlsConfig {
    #[serde(default)]
    pub collection_urls: Vec<CollectionUrl>,
    #[serde(default)]
    pub collection_settings: CollectionSettings,
}

/// System prompt plus user template for one evaluation pass. The template
/// carries literal `{article_id}`, `{title}`, `{author}`, `{category}`, and
/// `{content_preview}` placeholders.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptPair {
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub user_prompt_template: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            top_p: 0.9,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub retry_delay_seconds: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_seconds: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptConfig {
    #[serde(default)]
    pub evaluation_prompt: PromptPair,
    #[serde(default)]
    pub retry_evaluation_prompt: PromptPair,
    #[serde(default)]
    pub llm_settings: LlmSettings,
    #[serde(default)]
    pub rate_limit: RetrySettings,
}
