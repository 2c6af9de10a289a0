//! Document fetching
//!
//! The resolver talks to the network through the [`Fetcher`] trait so that
//! transport, TLS policy and tests can be swapped independently. A fetch
//! never follows redirects itself: the resolver needs to see every hop to
//! memoize the chain.

pub mod http;
pub mod markup;

pub use http::HttpFetcher;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// HTTP statuses treated as redirects
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out fetching {0}")]
    Timeout(String),

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Unsupported URL: {0}")]
    Unsupported(String),

    #[error("Failed to read {url}: {message}")]
    Io { url: String, message: String },
}

/// One response, redirects not followed
#[derive(Debug, Clone, Default)]
pub struct FetchedDocument {
    /// The URL that was requested
    pub url: String,
    pub status: u16,
    /// `Location` header, as sent
    pub location: Option<String>,
    /// Target of a `Link: <…>; rel="canonical"` header, as sent
    pub link_canonical: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedDocument {
    /// A plain 200 response
    pub fn ok(url: impl Into<String>, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: Some(content_type.into()),
            body: body.into(),
            ..Default::default()
        }
    }

    /// A redirect response pointing at `location`
    pub fn redirect(url: impl Into<String>, status: u16, location: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            location: Some(location.into()),
            ..Default::default()
        }
    }

    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status)
    }

    /// Absolute redirect target, for redirect statuses with a `Location`
    pub fn redirect_target(&self) -> Option<String> {
        if !self.is_redirect() {
            return None;
        }
        self.location
            .as_deref()
            .and_then(|location| resolve_reference(&self.url, location))
    }

    /// Absolute canonical URL from the `Link` header
    pub fn canonical_target(&self) -> Option<String> {
        self.link_canonical
            .as_deref()
            .and_then(|link| resolve_reference(&self.url, link))
    }

    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(content_type) if content_type.to_lowercase().contains("html") => true,
            Some(content_type) if !content_type.to_lowercase().starts_with("text/plain") => {
                markup::looks_like_html(&self.body)
            }
            Some(_) => false,
            None => markup::looks_like_html(&self.body),
        }
    }
}

/// Fetches a single URL without following redirects
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

static LINK_CANONICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([^>]*)>\s*;\s*rel\s*=\s*"?canonical"?"#).expect("valid regex"));

/// Extract the target of a `rel="canonical"` entry from `Link` header values
pub fn parse_link_canonical<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    values.into_iter().find_map(|value| {
        LINK_CANONICAL
            .captures_iter(value)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .find(|target| !target.is_empty())
    })
}

/// Resolve `reference` against `base`; absolute references pass through
pub fn resolve_reference(base: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if let Ok(absolute) = url::Url::parse(reference) {
        return Some(absolute.to_string());
    }
    url::Url::parse(base)
        .and_then(|base| base.join(reference))
        .map(|joined| joined.to_string())
        .ok()
}
