//! Phase-1 list collection: enumerate article references per category.
//!
//! Interests URLs go through the paginated JSON endpoint; other category
//! URLs fall back to the landing page's inline state blob. Per-category
//! failures are isolated — one broken source never aborts the pass.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;

use curator_core::{ArticleReference, CollectionSettings, CollectionUrl, NoteItem};
use curator_core::html;
use curator_core::timeutil::within_threshold;

use crate::governor::{PLATFORM_SERVICE, RateGovernor};
use crate::platform::{FetchError, PlatformClient};

/// Back-off after an HTTP 429 before re-requesting the same page.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(30);
/// Back-off before the single same-page retry after a 5xx.
const SERVER_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Collect references from every configured source, deduplicated by key
/// within the pass.
pub async fn collect_references(
    client: &mut PlatformClient,
    sources: &[CollectionUrl],
    settings: &CollectionSettings,
    governor: &RateGovernor,
    now: DateTime<Utc>,
) -> Vec<ArticleReference> {
    let mut merged: Vec<ArticleReference> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for source in sources {
        match collect_source(client, source, settings, governor, now).await {
            Ok(refs) => {
                let found = refs.len();
                for r in refs {
                    if seen.insert(r.key.clone()) {
                        merged.push(r);
                    }
                }
                tracing::info!(source = %source.name, found, "collected source");
            }
            Err(err) => {
                tracing::warn!(source = %source.name, %err, "source collection failed; continuing");
            }
        }
        tokio::time::sleep(Duration::from_secs_f64(settings.request_delay_seconds)).await;
    }

    tracing::info!(total = merged.len(), "collection pass complete");
    merged
}

async fn collect_source(
    client: &mut PlatformClient,
    source: &CollectionUrl,
    settings: &CollectionSettings,
    governor: &RateGovernor,
    now: DateTime<Utc>,
) -> Result<Vec<ArticleReference>, FetchError> {
    match interests_label(&source.url) {
        Some(label) => {
            collect_interests(client, &label, &source.category, settings, governor, now).await
        }
        None => collect_landing(client, source, settings, governor, now).await,
    }
}

/// Paginate the JSON list endpoint for an interests label.
async fn collect_interests(
    client: &mut PlatformClient,
    label: &str,
    category: &str,
    settings: &CollectionSettings,
    governor: &RateGovernor,
    now: DateTime<Utc>,
) -> Result<Vec<ArticleReference>, FetchError> {
    if !client.has_session() {
        let landing = client.interests_url(label)?;
        governor.admit(PLATFORM_SERVICE).await;
        client.ensure_session(landing.as_str()).await?;
        governor.record(PLATFORM_SERVICE).await;
    }
    let session = client
        .session()
        .ok_or_else(|| FetchError::Parse("session unavailable".to_string()))?;

    let mut refs = Vec::new();
    let mut page = 1u32;
    let mut retried_page = false;

    while page <= settings.max_pages_per_category {
        governor.admit(PLATFORM_SERVICE).await;
        match client.list_page(label, page, &session).await {
            Ok(resp) => {
                governor.record(PLATFORM_SERVICE).await;
                retried_page = false;

                let items: Vec<NoteItem> = resp
                    .data
                    .sections
                    .into_iter()
                    .flat_map(|s| s.notes)
                    .collect();
                if items.is_empty() {
                    tracing::debug!(label, page, "empty page; stopping");
                    break;
                }

                let (recent, saw_old) = split_recent(
                    items,
                    category,
                    now,
                    settings.old_article_threshold_days,
                );
                refs.extend(recent);

                if saw_old && settings.stop_after_old_articles {
                    tracing::debug!(label, page, "old articles reached; stopping");
                    break;
                }
                if resp.data.is_last {
                    break;
                }

                page += 1;
                tokio::time::sleep(Duration::from_secs_f64(settings.request_delay_seconds)).await;
            }
            Err(FetchError::RateLimited) => {
                tracing::warn!(label, page, "platform returned 429; backing off");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                // same page, same attempt budget
            }
            Err(FetchError::Transient(msg)) => {
                if retried_page {
                    tracing::warn!(label, page, %msg, "second server failure; stopping category");
                    break;
                }
                retried_page = true;
                tracing::warn!(label, page, %msg, "server failure; retrying page once");
                tokio::time::sleep(SERVER_ERROR_BACKOFF).await;
            }
            Err(FetchError::Http(status)) => {
                tracing::warn!(label, page, status, "client error; stopping category");
                break;
            }
            Err(FetchError::Parse(msg)) => {
                tracing::warn!(label, page, %msg, "undecodable page; stopping category");
                break;
            }
        }
    }

    Ok(refs)
}

/// Landing-page fallback: read the note objects out of the inline state blob.
async fn collect_landing(
    client: &mut PlatformClient,
    source: &CollectionUrl,
    settings: &CollectionSettings,
    governor: &RateGovernor,
    now: DateTime<Utc>,
) -> Result<Vec<ArticleReference>, FetchError> {
    governor.admit(PLATFORM_SERVICE).await;
    let page = client.landing_page(&source.url).await?;
    governor.record(PLATFORM_SERVICE).await;

    let Some(state) = html::extract_initial_state(&page) else {
        tracing::warn!(url = %source.url, "no state blob on landing page");
        return Ok(Vec::new());
    };

    let items: Vec<NoteItem> = html::collect_notes_from_state(&state)
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();

    let (refs, _) = split_recent(items, &source.category, now, settings.old_article_threshold_days);
    Ok(refs)
}

/// Keep items inside the recency window, converted to references; report
/// whether any item on the page had aged out (stop-early signal). Items
/// without a publish time count as fresh.
fn split_recent(
    items: Vec<NoteItem>,
    category: &str,
    now: DateTime<Utc>,
    threshold_days: i64,
) -> (Vec<ArticleReference>, bool) {
    let mut refs = Vec::new();
    let mut saw_old = false;

    for item in items {
        match item.published_at() {
            Some(published) if !within_threshold(published, now, threshold_days) => {
                saw_old = true;
            }
            _ => refs.push(item.into_reference(category, now)),
        }
    }

    (refs, saw_old)
}

/// The decoded label of an interests URL, or `None` for other URLs.
fn interests_label(raw_url: &str) -> Option<String> {
    let url = url::Url::parse(raw_url).ok()?;
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == "interests")?;
    let encoded = segments.next().filter(|s| !s.is_empty())?;
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|s| s.to_string())
}
