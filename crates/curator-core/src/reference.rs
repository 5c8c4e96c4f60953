use chrono::{DateTime, Utc};

/// A minimal pointer to an article known to exist but not yet fetched in
/// detail. Identity is the composite `(key, urlname)` pair; everything else
/// is mutable metadata captured at discovery time.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleReference {
    pub key: String,
    pub urlname: String,
    pub category: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub is_processed: bool,
}

impl ArticleReference {
    /// Stable article identity derived from the composite key.
    pub fn article_id(&self) -> String {
        format!("{}_{}", self.key, self.urlname)
    }

    /// Canonical article page URL on the source platform.
    pub fn article_url(&self, host: &str) -> String {
        format!("https://{host}/{}/n/{}", self.urlname, self.key)
    }
}
