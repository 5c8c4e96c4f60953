//! Discovered article references: the deduplication gate between list
//! collection and detail fetching.

use std::collections::HashSet;

use rusqlite::params;

use curator_core::ArticleReference;

use crate::error::Result;
use crate::store::{Store, decode_time, decode_time_opt, encode_time};

impl Store {
    /// Idempotent upsert keyed on `(key, urlname)`. Mutable metadata fields
    /// update; `is_processed` and the original `collected_at` are preserved
    /// so re-discovery never resets processing state or FIFO order.
    /// Returns the number of references written.
    pub fn save_references(&self, refs: &[ArticleReference]) -> Result<usize> {
        if refs.is_empty() {
            return Ok(0);
        }

        let tx = self.conn().unchecked_transaction()?;
        let mut saved = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO article_references
                 (key, urlname, category, title, author, thumbnail, published_at,
                  collected_at, is_processed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(key, urlname) DO UPDATE SET
                     category = excluded.category,
                     title = excluded.title,
                     author = excluded.author,
                     thumbnail = excluded.thumbnail,
                     published_at = excluded.published_at",
            )?;

            for r in refs {
                stmt.execute(params![
                    r.key,
                    r.urlname,
                    r.category,
                    r.title,
                    r.author,
                    r.thumbnail,
                    r.published_at.map(encode_time),
                    encode_time(r.collected_at),
                    r.is_processed as i32,
                ])?;
                saved += 1;
            }
        }
        tx.commit()?;

        tracing::debug!(saved, "saved article references");
        Ok(saved)
    }

    /// All known composite identities, for fast dedup at discovery time.
    pub fn existing_reference_keys(&self) -> Result<HashSet<(String, String)>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT key, urlname FROM article_references")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<HashSet<_>, _>>()
            .map_err(Into::into)
    }

    /// Unprocessed references in FIFO collection order.
    pub fn unprocessed_references(&self, limit: Option<usize>) -> Result<Vec<ArticleReference>> {
        let mut stmt = self.conn().prepare(
            "SELECT key, urlname, category, title, author, thumbnail, published_at,
                    collected_at, is_processed
             FROM article_references
             WHERE is_processed = 0
             ORDER BY collected_at ASC
             LIMIT ?1",
        )?;

        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let rows: Vec<RefRow> = stmt
            .query_map([limit], |row| {
                Ok(RefRow {
                    key: row.get(0)?,
                    urlname: row.get(1)?,
                    category: row.get(2)?,
                    title: row.get(3)?,
                    author: row.get(4)?,
                    thumbnail: row.get(5)?,
                    published_at: row.get(6)?,
                    collected_at: row.get(7)?,
                    is_processed: row.get::<_, i32>(8)? != 0,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter().map(RefRow::into_reference).collect()
    }

    /// Flip the processed flag; idempotent.
    pub fn mark_reference_processed(&self, key: &str, urlname: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE article_references SET is_processed = 1 WHERE key = ?1 AND urlname = ?2",
            params![key, urlname],
        )?;
        Ok(())
    }

    pub fn reference_counts_by_category(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn().prepare(
            "SELECT category, COUNT(*) AS count FROM article_references
             GROUP BY category ORDER BY count DESC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    pub fn reference_count(&self) -> Result<u64> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM article_references", [], |row| {
                row.get(0)
            })?)
    }
}

struct RefRow {
    key: String,
    urlname: String,
    category: String,
    title: Option<String>,
    author: Option<String>,
    thumbnail: Option<String>,
    published_at: Option<String>,
    collected_at: String,
    is_processed: bool,
}

impl RefRow {
    fn into_reference(self) -> Result<ArticleReference> {
        Ok(ArticleReference {
            published_at: decode_time_opt(self.published_at)?,
            collected_at: decode_time(&self.collected_at)?,
            key: self.key,
            urlname: self.urlname,
            category: self.category,
            title: self.title,
            author: self.author,
            thumbnail: self.thumbnail,
            is_processed: self.is_processed,
        })
    }
}
