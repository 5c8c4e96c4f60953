//! HTTP client for the source platform.
//!
//! Holds the reqwest client (browser-ish headers, cookie store) and the
//! lazily-acquired session state the JSON list endpoint requires. Status
//! handling maps onto the fetch error taxonomy the collector's retry policy
//! branches on.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};

use curator_core::ListResponse;
use curator_core::html;

pub const DEFAULT_HOST: &str = "note.com";

/// Transient per-batch state for talking to the platform: the client code
/// extracted from a landing page, plus the cookie-borne CSRF token when the
/// platform handed one out.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub client_code: String,
    pub xsrf_token: Option<String>,
}

#[derive(Debug)]
pub enum FetchError {
    /// HTTP 429 from the platform
    RateLimited,
    /// Timeouts, connection failures, 5xx
    Transient(String),
    /// Any other 4xx
    Http(u16),
    /// Unusable payload (missing client code, undecodable JSON)
    Parse(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::RateLimited => write!(f, "rate limited by the platform"),
            FetchError::Transient(msg) => write!(f, "transient failure: {msg}"),
            FetchError::Http(status) => write!(f, "unexpected HTTP status {status}"),
            FetchError::Parse(msg) => write!(f, "unusable response: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transient(e.to_string())
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status.as_u16() == 429 {
        Err(FetchError::RateLimited)
    } else if status.is_server_error() {
        Err(FetchError::Transient(format!("HTTP {status}")))
    } else if status.is_client_error() {
        Err(FetchError::Http(status.as_u16()))
    } else {
        Ok(())
    }
}

pub struct PlatformClient {
    http: reqwest::Client,
    host: String,
    session: Option<SessionState>,
}

impl PlatformClient {
    pub fn new(host: &str, timeout_seconds: u64) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/html, */*"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja,en-US;q=0.9,en;q=0.8"),
        );

        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            host: host.to_string(),
            session: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_url(&self) -> String {
        format!("https://{}", self.host)
    }

    pub fn profile_url(&self, urlname: &str) -> String {
        format!("{}/{urlname}", self.base_url())
    }

    pub fn interests_url(&self, label: &str) -> Result<url::Url, FetchError> {
        let mut url = url::Url::parse(&self.base_url())
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Parse("host URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("interests")
            .push(label);
        Ok(url)
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<SessionState> {
        self.session.clone()
    }

    /// Acquire the session lazily from a landing page: extract the 64-hex
    /// client code from the inline state and opportunistically capture the
    /// XSRF cookie (its absence is tolerated).
    pub async fn ensure_session(&mut self, landing_url: &str) -> Result<SessionState, FetchError> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }

        let resp = self
            .http
            .get(landing_url)
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .send()
            .await?;
        check_status(resp.status())?;

        let xsrf_token = resp
            .cookies()
            .find(|c| c.name() == "XSRF-TOKEN")
            .map(|c| c.value().to_string());
        let body = resp.text().await?;

        let client_code = html::extract_client_code(&body).ok_or_else(|| {
            FetchError::Parse("client code not found in landing page".to_string())
        })?;

        tracing::debug!(
            has_xsrf = xsrf_token.is_some(),
            "acquired platform session"
        );
        let session = SessionState {
            client_code,
            xsrf_token,
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    /// One page of the JSON list endpoint for an interests label.
    pub async fn list_page(
        &self,
        label: &str,
        page: u32,
        session: &SessionState,
    ) -> Result<ListResponse, FetchError> {
        let mut url = url::Url::parse(&format!("{}/api/v3/mkit_layouts/json", self.base_url()))
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("context", "top_keyword")
            .append_pair("page", &page.to_string())
            .append_pair("args[label_name]", label);

        let referer = self.interests_url(label)?;

        let mut request = self
            .http
            .get(url)
            .header("X-Note-Client-Code", &session.client_code)
            .header(REFERER, referer.as_str())
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin");
        if let Some(token) = &session.xsrf_token {
            request = request.header("X-Xsrf-Token", token);
        }

        let resp = request.send().await?;
        check_status(resp.status())?;
        resp.json::<ListResponse>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }

    /// A single article page as HTML.
    pub async fn article_page(&self, urlname: &str, key: &str) -> Result<String, FetchError> {
        let url = format!("{}/{urlname}/n/{key}", self.base_url());
        let resp = self
            .http
            .get(&url)
            .header(REFERER, self.profile_url(urlname))
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "same-origin")
            .send()
            .await?;
        check_status(resp.status())?;
        resp.text().await.map_err(Into::into)
    }

    /// An arbitrary landing page (category URLs that are not interests).
    pub async fn landing_page(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .http
            .get(url)
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .send()
            .await?;
        check_status(resp.status())?;
        resp.text().await.map_err(Into::into)
    }
}
