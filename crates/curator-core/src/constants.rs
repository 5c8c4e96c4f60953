/// Maximum characters of cleaned body text persisted as the article preview
pub const PREVIEW_MAX_CHARS: usize = 200;

/// Maximum characters of cleaned body text sent to the LLM for evaluation
pub const EVAL_CONTENT_MAX_CHARS: usize = 4000;

/// Writing-quality score ceiling
pub const QUALITY_MAX: u8 = 40;

/// Originality score ceiling
pub const ORIGINALITY_MAX: u8 = 30;

/// Entertainment score ceiling
pub const ENTERTAINMENT_MAX: u8 = 30;

/// AI summary length floor; shorter summaries are padded
pub const SUMMARY_MIN_CHARS: usize = 10;

/// AI summary length ceiling; longer summaries are truncated
pub const SUMMARY_MAX_CHARS: usize = 300;

/// Capacity of the recent-score-pattern ring used for duplicate detection
pub const PATTERN_WINDOW: usize = 20;

/// Per-call uniform jitter applied to the base sampling temperature
pub const TEMP_JITTER: f64 = 0.05;

/// Sampling temperature clamp range for first-pass evaluation calls
pub const TEMP_MIN: f64 = 0.1;
pub const TEMP_MAX: f64 = 0.8;

/// Sampling temperature clamp range for duplicate-triggered retry calls
pub const RETRY_TEMP_MIN: f64 = 0.5;
pub const RETRY_TEMP_MAX: f64 = 0.8;
