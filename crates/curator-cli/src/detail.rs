//! Phase-2 detail fetch: one article's full record on demand.
//!
//! Returns `Ok(None)` for paid or unreadable articles — those are never
//! persisted, the caller just marks the reference processed and moves on.

use curator_core::DetailRecord;
use curator_core::html;

use crate::governor::{PLATFORM_SERVICE, RateGovernor};
use crate::platform::{FetchError, PlatformClient};

pub async fn fetch_detail(
    client: &mut PlatformClient,
    governor: &RateGovernor,
    urlname: &str,
    key: &str,
) -> Result<Option<DetailRecord>, FetchError> {
    if !client.has_session() {
        let landing = client.profile_url(urlname);
        governor.admit(PLATFORM_SERVICE).await;
        client.ensure_session(&landing).await?;
        governor.record(PLATFORM_SERVICE).await;
    }

    governor.admit(PLATFORM_SERVICE).await;
    let page = client.article_page(urlname, key).await?;
    governor.record(PLATFORM_SERVICE).await;

    let detail = html::parse_article_page(&page, key);
    if detail.is_paid() {
        tracing::info!(key, urlname, price = detail.price, "paid article; skipping");
        return Ok(None);
    }

    tracing::debug!(
        key,
        urlname,
        preview_chars = detail.content_preview.chars().count(),
        full_chars = detail.content_full.chars().count(),
        "fetched article detail"
    );
    Ok(Some(detail))
}
