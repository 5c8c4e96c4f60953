//! Static JSON feed artifacts consumed by the website.
//!
//! Feed-level duplicate handling happens here at query time: entries are
//! deduplicated by article URL, keeping the highest-scored candidate.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::json;

use curator_store::{ArticleWithEvaluation, Store};

const RECENT_FEED_DAYS: i64 = 30;
const TOP_FEED_SIZE: usize = 5;

pub struct JsonPublisher {
    output_dir: PathBuf,
}

impl JsonPublisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Regenerate every feed artifact.
    pub fn publish_all(&self, store: &Store, now: DateTime<Utc>) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed to create output dir {}", self.output_dir.display())
        })?;

        self.write_articles(store, now)?;
        let top5 = self.write_top5(store, now)?;
        self.write_categories(store, now)?;
        self.write_statistics(store, now)?;
        self.write_meta(store, now)?;
        self.archive_daily(&top5, now)?;

        tracing::info!(dir = %self.output_dir.display(), "feeds regenerated");
        Ok(())
    }

    fn write_articles(&self, store: &Store, now: DateTime<Utc>) -> anyhow::Result<()> {
        let rows = store.recent_with_evaluations(RECENT_FEED_DAYS, 0, now)?;
        let deduped = dedup_by_url(rows);

        let payload = json!({
            "lastUpdated": now.to_rfc3339(),
            "total": deduped.len(),
            "articles": deduped.iter().map(entry_json).collect::<Vec<_>>(),
        });
        self.write_json("articles.json", &payload)
    }

    fn write_top5(&self, store: &Store, now: DateTime<Utc>) -> anyhow::Result<serde_json::Value> {
        // Today's best; widen to a week when the day is thin
        let mut rows = store.top_rated(TOP_FEED_SIZE, 1, now)?;
        if rows.len() < TOP_FEED_SIZE {
            rows = store.top_rated(TOP_FEED_SIZE, 7, now)?;
        }

        let mut deduped = dedup_by_url(rows);
        deduped.truncate(TOP_FEED_SIZE);

        let payload = json!({
            "lastUpdated": now.to_rfc3339(),
            "period": "daily",
            "articles": deduped.iter().map(entry_json).collect::<Vec<_>>(),
        });
        self.write_json("top5.json", &payload)?;
        Ok(payload)
    }

    fn write_categories(&self, store: &Store, now: DateTime<Utc>) -> anyhow::Result<()> {
        let breakdown = store.category_breakdown(RECENT_FEED_DAYS, now)?;
        let payload = json!({
            "lastUpdated": now.to_rfc3339(),
            "categories": breakdown.iter().map(|c| json!({
                "category": c.category,
                "articles": c.articles,
                "averageScore": c.average_score,
                "topScore": c.top_score,
            })).collect::<Vec<_>>(),
        });
        self.write_json("categories.json", &payload)
    }

    fn write_statistics(&self, store: &Store, now: DateTime<Utc>) -> anyhow::Result<()> {
        let rows = store.recent_with_evaluations(RECENT_FEED_DAYS, 0, now)?;
        let totals: Vec<u32> = rows.iter().map(|r| u32::from(r.total_score())).collect();

        let payload = if totals.is_empty() {
            json!({
                "lastUpdated": now.to_rfc3339(),
                "evaluations": 0,
            })
        } else {
            let sum: u32 = totals.iter().sum();
            json!({
                "lastUpdated": now.to_rfc3339(),
                "evaluations": totals.len(),
                "averageScore": f64::from(sum) / totals.len() as f64,
                "maxScore": totals.iter().max(),
                "minScore": totals.iter().min(),
                "bands": {
                    "high": totals.iter().filter(|t| **t >= 80).count(),
                    "medium": totals.iter().filter(|t| (60..80).contains(*t)).count(),
                    "low": totals.iter().filter(|t| **t < 60).count(),
                },
            })
        };
        self.write_json("statistics.json", &payload)
    }

    /// Keep a dated copy of the daily top feed under `archives/`.
    fn archive_daily(&self, top5: &serde_json::Value, now: DateTime<Utc>) -> anyhow::Result<()> {
        let archive_dir = self.output_dir.join("archives");
        fs::create_dir_all(&archive_dir)
            .with_context(|| format!("failed to create {}", archive_dir.display()))?;

        let name = format!("top5-{}.json", now.format("%Y-%m-%d"));
        let path = archive_dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(top5)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn write_meta(&self, store: &Store, now: DateTime<Utc>) -> anyhow::Result<()> {
        let payload = json!({
            "lastUpdated": now.to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
            "systemInfo": {
                "totalArticles": store.article_count()?,
                "evaluatedArticles": store.evaluated_article_count()?,
                "totalEvaluations": store.evaluation_count()?,
            },
        });
        self.write_json("meta.json", &payload)
    }

    fn write_json(&self, name: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        let path = self.output_dir.join(name);
        let rendered = serde_json::to_string_pretty(payload)?;
        fs::write(&path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(file = %path.display(), "wrote feed artifact");
        Ok(())
    }
}

/// Deduplicate by article URL, keeping the highest-scored candidate, ordered
/// best-first.
fn dedup_by_url(rows: Vec<ArticleWithEvaluation>) -> Vec<ArticleWithEvaluation> {
    let mut best: HashMap<String, ArticleWithEvaluation> = HashMap::new();
    for row in rows {
        let url = row.article.url.clone();
        match best.get(&url) {
            Some(existing) if existing.total_score() >= row.total_score() => {}
            _ => {
                best.insert(url, row);
            }
        }
    }

    let mut deduped: Vec<ArticleWithEvaluation> = best.into_values().collect();
    deduped.sort_by(|a, b| {
        b.total_score()
            .cmp(&a.total_score())
            .then_with(|| a.article.id.cmp(&b.article.id))
    });
    deduped
}

fn entry_json(row: &ArticleWithEvaluation) -> serde_json::Value {
    let a = &row.article;
    let e = &row.evaluation;
    json!({
        "id": a.id,
        "title": a.title,
        "url": a.url,
        "thumbnail": a.thumbnail,
        "publishedAt": a.published_at.map(|t| t.to_rfc3339()),
        "author": a.author,
        "category": a.category,
        "contentPreview": a.content_preview,
        "totalScore": e.total_score(),
        "qualityScore": e.scores.quality(),
        "originalityScore": e.scores.originality(),
        "entertainmentScore": e.scores.entertainment(),
        "aiSummary": e.ai_summary.as_str(),
        "isRetryEvaluation": e.is_retry_evaluation,
        "evaluatedAt": e.evaluated_at.to_rfc3339(),
    })
}
