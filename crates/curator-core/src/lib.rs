//! Domain layer for the daily column curation pipeline.
//!
//! Models article references, fetched articles, and LLM evaluations;
//! decodes the platform's list payloads and article pages; renders
//! evaluation prompts and parses model responses; and tracks recent
//! score patterns for duplicate detection.
//!
//! Zero I/O — parsing and validation only, with no opinions about
//! transport or persistence.

pub mod article;
pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod html;
pub mod listing;
pub mod prompt;
pub mod reference;
pub mod respparse;
pub mod scoring;
pub mod timeutil;

pub use article::{Article, DetailRecord};
pub use config::{
    CollectionSettings, CollectionUrl, LlmSettings, PromptConfig, PromptPair, RetrySettings,
    UrlsConfig,
};
pub use constants::{
    ENTERTAINMENT_MAX, EVAL_CONTENT_MAX_CHARS, ORIGINALITY_MAX, PATTERN_WINDOW, PREVIEW_MAX_CHARS,
    QUALITY_MAX, SUMMARY_MAX_CHARS, SUMMARY_MIN_CHARS,
};
pub use detector::{DuplicateDetector, DuplicateVerdict, PatternEntry};
pub use error::{ParseError, ValidationError};
pub use listing::{ListData, ListResponse, ListSection, NoteItem, NoteUser};
pub use prompt::{ChatMessage, PromptVars, Role, jittered_temperature, retry_temperature};
pub use reference::ArticleReference;
pub use respparse::{ParsedEvaluation, parse_response};
pub use scoring::{Evaluation, Scores, Summary};
pub use timeutil::{parse_timestamp, within_threshold};
