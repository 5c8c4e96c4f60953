use chrono::{DateTime, Utc};

/// Persisted article record. Carries only the bounded content preview —
/// the full body lives in memory between detail fetch and evaluation and
/// is never written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: String,
    pub content_preview: String,
    pub category: String,
    pub collected_at: DateTime<Utc>,
    pub is_evaluated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the detail fetch learns about a single article, including the
/// transient full body text.
#[derive(Debug, Clone, Default)]
pub struct DetailRecord {
    pub title: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub note_type: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub price: i64,
    pub can_read: bool,
    pub content_preview: String,
    pub content_full: String,
}

impl DetailRecord {
    /// Paid or otherwise unreadable articles are excluded from the pipeline.
    pub fn is_paid(&self) -> bool {
        self.price > 0 || !self.can_read
    }
}
