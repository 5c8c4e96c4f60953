//! Typed decoding of the platform's list endpoint payload.
//!
//! The decoder is deliberately permissive: optional fields default, and the
//! payload's two spellings for publish time and thumbnail
//! (`publishAt`/`publish_at`, `eyecatch`/`eyecatch_url`) are both accepted.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::reference::ArticleReference;
use crate::timeutil::parse_timestamp;

#[derive(Debug, Deserialize)]
pub struct ListResponse {
    pub data: ListData,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListData {
    #[serde(rename = "isLast", alias = "is_last", default)]
    pub is_last: bool,
    #[serde(default)]
    pub sections: Vec<ListSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListSection {
    #[serde(default)]
    pub notes: Vec<NoteItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteUser {
    #[serde(default)]
    pub urlname: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoteItem {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: NoteUser,
    #[serde(default, alias = "publishAt")]
    pub publish_at: Option<String>,
    #[serde(default, alias = "eyecatch")]
    pub eyecatch_url: Option<String>,
    #[serde(default = "default_note_type", rename = "type")]
    pub note_type: String,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub price: i64,
    #[serde(default = "default_can_read")]
    pub can_read: bool,
    #[serde(default)]
    pub is_liked: bool,
}

fn default_note_type() -> String {
    "TextNote".to_string()
}

fn default_can_read() -> bool {
    true
}

impl NoteItem {
    /// Publish time normalized to UTC, if the payload carried one.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.publish_at.as_deref().and_then(parse_timestamp)
    }

    /// Convert a list item into a discovery reference for the given category.
    pub fn into_reference(self, category: &str, collected_at: DateTime<Utc>) -> ArticleReference {
        let published_at = self.published_at();
        ArticleReference {
            key: self.key,
            urlname: self.user.urlname,
            category: category.to_string(),
            title: self.name,
            author: self.user.nickname,
            thumbnail: self.eyecatch_url,
            published_at,
            collected_at,
            is_processed: false,
        }
    }
}
