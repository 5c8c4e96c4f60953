//! End-to-end daily batch driver.
//!
//! Streams unprocessed references in FIFO collection order through detail
//! fetch → article persist → evaluation → evaluation persist → mark
//! processed. Per-item failures are isolated; the batch is best-effort. The
//! full body never outlives its loop iteration.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use curator_core::{Article, ArticleReference, CollectionSettings, CollectionUrl, DetailRecord};
use curator_store::Store;

use crate::collector;
use crate::detail;
use crate::evaluator::Evaluator;
use crate::governor::RateGovernor;
use crate::llm::ChatApi;
use crate::platform::{FetchError, PlatformClient};
use crate::publisher::JsonPublisher;

/// Seam between the orchestrator and the source platform, so scenario tests
/// can script discovery and detail payloads.
#[async_trait]
pub trait ArticleSource: Send {
    async fn collect_references(
        &mut self,
        governor: &RateGovernor,
        now: DateTime<Utc>,
    ) -> Vec<ArticleReference>;

    /// `Ok(None)` signals a paid/unreadable article to skip permanently.
    async fn fetch_detail(
        &mut self,
        governor: &RateGovernor,
        urlname: &str,
        key: &str,
    ) -> Result<Option<DetailRecord>, FetchError>;
}

/// The production source: list collection plus detail fetch against the
/// live platform.
pub struct PlatformSource {
    client: PlatformClient,
    sources: Vec<CollectionUrl>,
    settings: CollectionSettings,
}

impl PlatformSource {
    pub fn new(
        client: PlatformClient,
        sources: Vec<CollectionUrl>,
        settings: CollectionSettings,
    ) -> Self {
        Self {
            client,
            sources,
            settings,
        }
    }
}

#[async_trait]
impl ArticleSource for PlatformSource {
    async fn collect_references(
        &mut self,
        governor: &RateGovernor,
        now: DateTime<Utc>,
    ) -> Vec<ArticleReference> {
        collector::collect_references(&mut self.client, &self.sources, &self.settings, governor, now)
            .await
    }

    async fn fetch_detail(
        &mut self,
        governor: &RateGovernor,
        urlname: &str,
        key: &str,
    ) -> Result<Option<DetailRecord>, FetchError> {
        detail::fetch_detail(&mut self.client, governor, urlname, key).await
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BatchOutcome {
    pub discovered: usize,
    pub saved_references: usize,
    pub evaluated: usize,
    pub skipped_paid: usize,
    pub failed: usize,
}

enum ItemResult {
    Evaluated(u8),
    SkippedPaid,
}

pub struct BatchOrchestrator<S: ArticleSource, C: ChatApi> {
    store: Store,
    source: S,
    evaluator: Evaluator<C>,
    publisher: JsonPublisher,
    settings: CollectionSettings,
    host: String,
    pub target_categories: Option<Vec<String>>,
    pub limit: Option<usize>,
}

impl<S: ArticleSource, C: ChatApi> BatchOrchestrator<S, C> {
    pub fn new(
        store: Store,
        source: S,
        evaluator: Evaluator<C>,
        publisher: JsonPublisher,
        settings: CollectionSettings,
        host: String,
    ) -> Self {
        Self {
            store,
            source,
            evaluator,
            publisher,
            settings,
            host,
            target_categories: None,
            limit: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn run(&mut self, governor: &RateGovernor) -> anyhow::Result<BatchOutcome> {
        let now = Utc::now();

        tracing::info!("phase 1: collecting article references");
        let refs = self.source.collect_references(governor, now).await;
        let discovered = refs.len();
        let saved_references = self.store.save_references(&refs)?;

        if !self.settings.fetch_article_details {
            tracing::info!("detail fetching disabled; collection-only run");
            self.publisher.publish_all(&self.store, Utc::now())?;
            return Ok(BatchOutcome {
                discovered,
                saved_references,
                ..Default::default()
            });
        }

        let mut pending = self.store.unprocessed_references(None)?;
        if let Some(categories) = &self.target_categories {
            let before = pending.len();
            pending.retain(|r| categories.contains(&r.category));
            tracing::info!(
                before,
                after = pending.len(),
                ?categories,
                "filtered references by category"
            );
        }
        if let Some(limit) = self.limit {
            pending.truncate(limit);
        }

        let total = pending.len();
        tracing::info!(discovered, saved_references, total, "phase 2: streaming evaluation");

        let mut outcome = BatchOutcome {
            discovered,
            saved_references,
            ..Default::default()
        };
        let mut totals: Vec<u32> = Vec::new();

        for (index, reference) in pending.iter().enumerate() {
            match self.process_reference(governor, reference).await {
                Ok(ItemResult::Evaluated(total_score)) => {
                    outcome.evaluated += 1;
                    totals.push(u32::from(total_score));
                    tracing::info!(
                        article_id = %reference.article_id(),
                        total_score,
                        "evaluation committed"
                    );
                }
                Ok(ItemResult::SkippedPaid) => outcome.skipped_paid += 1,
                Err(err) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        key = %reference.key,
                        urlname = %reference.urlname,
                        %err,
                        "item failed; continuing"
                    );
                }
            }

            if (index + 1) % 10 == 0 {
                tracing::info!(
                    processed = index + 1,
                    total,
                    evaluated = outcome.evaluated,
                    "batch progress"
                );
            }
            tokio::time::sleep(Duration::from_secs_f64(self.settings.request_delay_seconds)).await;
        }

        self.publisher.publish_all(&self.store, Utc::now())?;
        log_score_summary(&totals);

        for service in [crate::governor::PLATFORM_SERVICE, crate::governor::LLM_SERVICE] {
            if let Some(status) = governor.status(service).await {
                tracing::debug!(
                    service,
                    requests_this_minute = status.requests_this_minute,
                    requests_today = status.requests_today,
                    minute_limit = status.minute_limit,
                    daily_limit = status.daily_limit,
                    "governor status"
                );
            }
        }
        Ok(outcome)
    }

    async fn process_reference(
        &mut self,
        governor: &RateGovernor,
        reference: &ArticleReference,
    ) -> anyhow::Result<ItemResult> {
        let Some(detail) = self
            .source
            .fetch_detail(governor, &reference.urlname, &reference.key)
            .await?
        else {
            // Permanent exclusion: no article row, but the reference is done
            self.store
                .mark_reference_processed(&reference.key, &reference.urlname)?;
            return Ok(ItemResult::SkippedPaid);
        };

        let article = assemble_article(reference, &detail, &self.host, Utc::now());
        // A storage failure here leaves the reference unprocessed, so the
        // next batch re-attempts it.
        self.store.upsert_article(&article)?;

        let evaluation = self
            .evaluator
            .evaluate_with_full_content(governor, &article, &detail.content_full)
            .await?;
        let total_score = evaluation.total_score();

        self.store.upsert_evaluation(&evaluation)?;
        self.store.mark_article_evaluated(&article.id)?;
        self.store
            .mark_reference_processed(&reference.key, &reference.urlname)?;

        // `detail` (and with it the full body) drops at the end of this scope
        Ok(ItemResult::Evaluated(total_score))
    }
}

/// Merge the discovery reference with the fetched detail into the persisted
/// article. Detail wins per field; the urlname is the author of last resort.
fn assemble_article(
    reference: &ArticleReference,
    detail: &DetailRecord,
    host: &str,
    now: DateTime<Utc>,
) -> Article {
    Article {
        id: reference.article_id(),
        title: detail
            .title
            .clone()
            .or_else(|| reference.title.clone())
            .unwrap_or_else(|| "(untitled)".to_string()),
        url: reference.article_url(host),
        thumbnail: detail.thumbnail.clone().or_else(|| reference.thumbnail.clone()),
        published_at: detail.published_at.or(reference.published_at),
        author: detail
            .author
            .clone()
            .or_else(|| reference.author.clone())
            .unwrap_or_else(|| reference.urlname.clone()),
        content_preview: detail.content_preview.clone(),
        category: reference.category.clone(),
        collected_at: reference.collected_at,
        is_evaluated: false,
        created_at: now,
        updated_at: now,
    }
}

fn log_score_summary(totals: &[u32]) {
    if totals.is_empty() {
        tracing::info!("no evaluations this run");
        return;
    }

    let count = totals.len();
    let sum: u32 = totals.iter().sum();
    let mean = f64::from(sum) / count as f64;
    let max = totals.iter().max().copied().unwrap_or(0);
    let min = totals.iter().min().copied().unwrap_or(0);
    let high = totals.iter().filter(|t| **t >= 80).count();
    let medium = totals.iter().filter(|t| (60..80).contains(*t)).count();
    let low = totals.iter().filter(|t| **t < 60).count();

    tracing::info!(count, mean, max, min, high, medium, low, "evaluation score summary");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::{Duration as ChronoDuration, TimeZone};
    use curator_core::{PromptConfig, PromptPair};

    use crate::llm::testing::ScriptedChat;

    struct FakeSource {
        refs: Vec<ArticleReference>,
        details: HashMap<(String, String), Option<DetailRecord>>,
        fetch_calls: usize,
    }

    impl FakeSource {
        fn new(refs: Vec<ArticleReference>) -> Self {
            Self {
                refs,
                details: HashMap::new(),
                fetch_calls: 0,
            }
        }

        fn with_detail(mut self, key: &str, urlname: &str, detail: Option<DetailRecord>) -> Self {
            self.details
                .insert((key.to_string(), urlname.to_string()), detail);
            self
        }
    }

    #[async_trait]
    impl ArticleSource for FakeSource {
        async fn collect_references(
            &mut self,
            _governor: &RateGovernor,
            _now: DateTime<Utc>,
        ) -> Vec<ArticleReference> {
            self.refs.clone()
        }

        async fn fetch_detail(
            &mut self,
            _governor: &RateGovernor,
            urlname: &str,
            key: &str,
        ) -> Result<Option<DetailRecord>, FetchError> {
            self.fetch_calls += 1;
            self.details
                .get(&(key.to_string(), urlname.to_string()))
                .cloned()
                .ok_or_else(|| FetchError::Transient("no scripted detail".to_string()))
        }
    }

    fn reference(key: &str, urlname: &str) -> ArticleReference {
        let now = Utc.with_ymd_and_hms(2026, 7, 31, 11, 0, 0).unwrap();
        ArticleReference {
            key: key.to_string(),
            urlname: urlname.to_string(),
            category: "game".to_string(),
            title: Some("T".to_string()),
            author: Some("Writer".to_string()),
            thumbnail: None,
            published_at: Some(now - ChronoDuration::hours(1)),
            collected_at: now,
            is_processed: false,
        }
    }

    fn free_detail(body: &str) -> DetailRecord {
        DetailRecord {
            title: Some("Detailed title".to_string()),
            author: Some("Detailed author".to_string()),
            thumbnail: None,
            published_at: None,
            note_type: "TextNote".to_string(),
            like_count: 4,
            comment_count: 1,
            price: 0,
            can_read: true,
            content_preview: body.chars().take(200).collect(),
            content_full: body.to_string(),
        }
    }

    fn paid_detail() -> Option<DetailRecord> {
        None
    }

    fn prompts() -> PromptConfig {
        PromptConfig {
            evaluation_prompt: PromptPair {
                system_prompt: "base".to_string(),
                user_prompt_template: "rate {article_id}: {content_preview}".to_string(),
            },
            retry_evaluation_prompt: PromptPair {
                system_prompt: "retry".to_string(),
                user_prompt_template: "re-rate {article_id}".to_string(),
            },
            ..Default::default()
        }
    }

    fn response(q: u8, o: u8, e: u8) -> String {
        format!(
            r#"{{"quality_score": {q}, "originality_score": {o},
                "entertainment_score": {e}, "ai_summary": "sixteen-char text here."}}"#
        )
    }

    static FEED_DIR_SEQ: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    fn orchestrator(
        store: Store,
        source: FakeSource,
        chat: ScriptedChat,
    ) -> BatchOrchestrator<FakeSource, ScriptedChat> {
        let dir = std::env::temp_dir().join(format!(
            "curator-test-feeds-{}-{}",
            std::process::id(),
            FEED_DIR_SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        ));
        BatchOrchestrator::new(
            store,
            source,
            Evaluator::new(chat, prompts()),
            JsonPublisher::new(dir),
            CollectionSettings {
                request_delay_seconds: 0.0,
                ..Default::default()
            },
            "note.com".to_string(),
        )
    }

    #[tokio::test]
    async fn test_cold_run_happy_path() {
        let source = FakeSource::new(vec![reference("abc", "u")]).with_detail(
            "abc",
            "u",
            Some(free_detail("<p>Full body text</p>")),
        );
        let chat = ScriptedChat::new(&[&response(30, 20, 20)]);
        let governor = RateGovernor::new();

        let mut orch = orchestrator(Store::open_in_memory().unwrap(), source, chat);
        let outcome = orch.run(&governor).await.unwrap();

        assert_eq!(outcome.discovered, 1);
        assert_eq!(outcome.saved_references, 1);
        assert_eq!(outcome.evaluated, 1);
        assert_eq!(outcome.failed, 0);

        let store = orch.store();
        let article = store.get_article("abc_u").unwrap().unwrap();
        assert_eq!(article.title, "Detailed title");
        assert_eq!(article.url, "https://note.com/u/n/abc");
        assert!(article.is_evaluated);

        let evaluation = store.get_evaluation("abc_u").unwrap().unwrap();
        assert_eq!(evaluation.total_score(), 70);

        assert!(store.unprocessed_references(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paid_article_is_excluded_but_processed() {
        let source =
            FakeSource::new(vec![reference("paid", "u")]).with_detail("paid", "u", paid_detail());
        let chat = ScriptedChat::new(&[]);
        let governor = RateGovernor::new();

        let mut orch = orchestrator(Store::open_in_memory().unwrap(), source, chat);
        let outcome = orch.run(&governor).await.unwrap();

        assert_eq!(outcome.skipped_paid, 1);
        assert_eq!(outcome.evaluated, 0);
        assert_eq!(outcome.failed, 0);

        let store = orch.store();
        assert!(store.get_article("paid_u").unwrap().is_none());
        assert_eq!(store.evaluation_count().unwrap(), 0);
        assert!(store.unprocessed_references(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("curator.db");
        let refs = vec![reference("a", "u"), reference("b", "u"), reference("c", "u")];
        let governor = RateGovernor::new();

        // First run evaluates all three
        {
            let source = FakeSource::new(refs.clone())
                .with_detail("a", "u", Some(free_detail("body a")))
                .with_detail("b", "u", Some(free_detail("body b")))
                .with_detail("c", "u", Some(free_detail("body c")));
            let chat = ScriptedChat::new(&[
                &response(30, 20, 20),
                &response(31, 21, 19),
                &response(32, 22, 18),
            ]);
            let mut orch = orchestrator(Store::open(&db_path).unwrap(), source, chat);
            let outcome = orch.run(&governor).await.unwrap();
            assert_eq!(outcome.evaluated, 3);
            assert_eq!(orch.source.fetch_calls, 3);
        }

        // Second run rediscovers the same items: zero fetches, zero calls
        {
            let source = FakeSource::new(refs);
            let chat = ScriptedChat::new(&[]);
            let mut orch = orchestrator(Store::open(&db_path).unwrap(), source, chat);
            let outcome = orch.run(&governor).await.unwrap();

            assert_eq!(outcome.discovered, 3);
            assert_eq!(outcome.evaluated, 0);
            assert_eq!(outcome.failed, 0);
            assert_eq!(orch.source.fetch_calls, 0);
            assert_eq!(orch.evaluator.api().calls(), 0);
            assert_eq!(orch.store().evaluation_count().unwrap(), 3);
        }
    }

    #[tokio::test]
    async fn test_redo_after_crash_between_eval_write_and_mark() {
        let store = Store::open_in_memory().unwrap();
        let governor = RateGovernor::new();

        // Simulate the previous run dying after the evaluation write: the
        // reference was saved but never marked processed.
        let r = reference("abc", "u");
        store.save_references(std::slice::from_ref(&r)).unwrap();

        let source = FakeSource::new(vec![r]).with_detail(
            "abc",
            "u",
            Some(free_detail("body again")),
        );
        let chat = ScriptedChat::new(&[&response(30, 20, 20)]);

        let mut orch = orchestrator(store, source, chat);
        // Pre-seed the article and evaluation rows the crashed run committed
        {
            let detail = free_detail("body again");
            let article = assemble_article(&reference("abc", "u"), &detail, "note.com", Utc::now());
            orch.store().upsert_article(&article).unwrap();
            orch.store()
                .upsert_evaluation(&curator_core::Evaluation {
                    article_id: "abc_u".to_string(),
                    scores: curator_core::Scores::clamped(30, 20, 20),
                    ai_summary: curator_core::Summary::normalized("a committed summary"),
                    is_retry_evaluation: false,
                    retry_reason: None,
                    evaluation_metadata: None,
                    evaluated_at: Utc::now(),
                })
                .unwrap();
        }

        let outcome = orch.run(&governor).await.unwrap();

        // The single article was re-fetched and re-evaluated, and the upserts
        // left exactly one row each
        assert_eq!(outcome.evaluated, 1);
        assert_eq!(orch.source.fetch_calls, 1);
        assert_eq!(orch.store().article_count().unwrap(), 1);
        assert_eq!(orch.store().evaluation_count().unwrap(), 1);
        assert!(orch.store().unprocessed_references(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_item_failure_is_isolated() {
        // "bad" has no scripted detail, so its fetch errors; "good" still
        // completes
        let source = FakeSource::new(vec![reference("bad", "u"), reference("good", "u")])
            .with_detail("good", "u", Some(free_detail("body")));
        let chat = ScriptedChat::new(&[&response(10, 10, 10)]);
        let governor = RateGovernor::new();

        let mut orch = orchestrator(Store::open_in_memory().unwrap(), source, chat);
        let outcome = orch.run(&governor).await.unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.evaluated, 1);

        // The failed reference stays unprocessed for the next batch
        let pending = orch.store().unprocessed_references(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, "bad");
    }

    #[tokio::test]
    async fn test_duplicate_pattern_persists_retry_evaluation() {
        let source = FakeSource::new(vec![reference("abc", "u")]).with_detail(
            "abc",
            "u",
            Some(free_detail("body")),
        );
        let chat = ScriptedChat::new(&[&response(20, 15, 15), &response(25, 18, 22)]);
        let governor = RateGovernor::new();

        let mut orch = orchestrator(Store::open_in_memory().unwrap(), source, chat);
        orch.evaluator.seed_pattern("earlier_article", "20/15/15");

        orch.run(&governor).await.unwrap();

        let evaluation = orch.store().get_evaluation("abc_u").unwrap().unwrap();
        assert!(evaluation.is_retry_evaluation);
        assert_eq!(
            evaluation.evaluation_metadata.unwrap()["score_pattern_original"],
            "20/15/15"
        );
    }

    #[tokio::test]
    async fn test_category_filter_and_limit() {
        let mut music = reference("m1", "u");
        music.category = "music".to_string();
        let refs = vec![reference("g1", "u"), reference("g2", "u"), music];

        let source = FakeSource::new(refs)
            .with_detail("g1", "u", Some(free_detail("body 1")))
            .with_detail("g2", "u", Some(free_detail("body 2")));
        let chat = ScriptedChat::new(&[&response(10, 10, 10)]);
        let governor = RateGovernor::new();

        let mut orch = orchestrator(Store::open_in_memory().unwrap(), source, chat);
        orch.target_categories = Some(vec!["game".to_string()]);
        orch.limit = Some(1);

        let outcome = orch.run(&governor).await.unwrap();
        assert_eq!(outcome.evaluated, 1);
        // Only the first game reference was attempted
        assert_eq!(orch.source.fetch_calls, 1);
    }

    #[tokio::test]
    async fn test_collection_only_mode_skips_details() {
        let source = FakeSource::new(vec![reference("abc", "u")]);
        let chat = ScriptedChat::new(&[]);
        let governor = RateGovernor::new();

        let mut orch = orchestrator(Store::open_in_memory().unwrap(), source, chat);
        orch.settings.fetch_article_details = false;

        let outcome = orch.run(&governor).await.unwrap();
        assert_eq!(outcome.saved_references, 1);
        assert_eq!(outcome.evaluated, 0);
        assert_eq!(orch.source.fetch_calls, 0);
        // The reference stays queued for a detail-enabled run
        assert_eq!(orch.store().unprocessed_references(None).unwrap().len(), 1);
    }

    #[test]
    fn test_assemble_article_fallbacks() {
        let mut r = reference("k", "writer");
        r.title = None;
        r.author = None;
        let detail = DetailRecord {
            can_read: true,
            ..Default::default()
        };

        let article = assemble_article(&r, &detail, "note.com", Utc::now());
        assert_eq!(article.id, "k_writer");
        assert_eq!(article.title, "(untitled)");
        // urlname is the author of last resort
        assert_eq!(article.author, "writer");
        assert_eq!(article.url, "https://note.com/writer/n/k");
    }
}
