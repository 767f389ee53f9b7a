//! Article fetching and content extraction.
//!
//! This crate provides:
//! - [`ArticleSource`]: the seam the coordinator fetches articles through
//! - [`WikiExtractor`]: HTTP fetch + MediaWiki-style normalization
//! - [`parse_article`]: the pure HTML → [`Article`] step

mod article;

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use quizsmith_shared::{Article, FetchConfig, QuizsmithError, Result};
use reqwest::Client;
use reqwest::redirect::Policy;
use tracing::{debug, info, instrument};
use url::Url;

pub use article::{SECTION_DENYLIST, UNKNOWN_TITLE, parse_article, truncate_chars};

/// User-Agent string for article requests.
const USER_AGENT: &str = concat!(
    "Quizsmith/",
    env!("CARGO_PKG_VERSION"),
    " (article-to-quiz generator)"
);

/// Maximum number of redirects to follow for one article.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Anything that can turn a URL into a normalized [`Article`].
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Fetch and normalize one article.
    ///
    /// Fails with [`QuizsmithError::Fetch`] when the document can't be
    /// retrieved and [`QuizsmithError::Parse`] when it has no article body.
    async fn extract(&self, url: &str) -> Result<Article>;
}

// ---------------------------------------------------------------------------
// WikiExtractor
// ---------------------------------------------------------------------------

/// Fetches MediaWiki-style article pages over HTTP.
pub struct WikiExtractor {
    client: Client,
    max_content_chars: usize,
    allow_private_hosts: bool,
}

impl WikiExtractor {
    /// Create an extractor with the given fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy(config.allow_private_hosts))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuizsmithError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_content_chars: config.max_content_chars,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    /// GET the page body; any transport error or non-2xx status is a fetch error.
    async fn fetch(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching article");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| QuizsmithError::Fetch(format!("Failed to fetch URL: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuizsmithError::Fetch(format!(
                "Failed to fetch URL: {url}: HTTP {status}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| QuizsmithError::Fetch(format!("{url}: body read failed: {e}")))
    }
}

#[async_trait]
impl ArticleSource for WikiExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Result<Article> {
        let url = Url::parse(url)
            .map_err(|e| QuizsmithError::Fetch(format!("invalid URL '{url}': {e}")))?;

        if !self.allow_private_hosts && is_ssrf_target(&url) {
            return Err(QuizsmithError::Fetch(format!(
                "refusing to fetch {url}: local or private address"
            )));
        }

        let body = self.fetch(&url).await?;
        let article = parse_article(&body, self.max_content_chars)?;

        info!(
            title = %article.title,
            content_chars = article.content.chars().count(),
            sections = article.sections.len(),
            "article extracted"
        );

        Ok(article)
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Follow at most [`MAX_REDIRECTS`] hops, re-checking every target.
fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error(format!("more than {MAX_REDIRECTS} redirects"))
        } else if !allow_private_hosts && is_ssrf_target(attempt.url()) {
            let target = attempt.url().to_string();
            attempt.error(format!("redirect to local or private address {target}"))
        } else {
            attempt.follow()
        }
    })
}

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 (unique local)
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 (link-local)
                || (first & 0xffc0) == 0xfe80
        }
    }
}
