//! HTTP and local-file fetcher
//!
//! License documents are not security-sensitive, and the hosts that serve
//! them are frequently misconfigured, so hostname verification is relaxed.
//! `file:` URLs are read from disk; that is how license files extracted
//! from an archive reach the resolver.

use super::{parse_link_canonical, FetchError, FetchedDocument, Fetcher};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("license-resolver/", env!("CARGO_PKG_VERSION"));

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Network {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let location = headers
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let link_canonical = parse_link_canonical(
            headers
                .get_all(reqwest::header::LINK)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut document = FetchedDocument {
            url: url.to_string(),
            status,
            location,
            link_canonical,
            content_type,
            body: String::new(),
        };

        if document.is_redirect() {
            return Ok(document);
        }
        if status == 404 || status == 410 {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !(200..300).contains(&status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        document.body = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            message: format!("Failed to read response: {}", e),
        })?;
        Ok(document)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::Unsupported(url.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => read_file(url, &parsed).await,
            _ => Err(FetchError::Unsupported(url.to_string())),
        }
    }
}

async fn read_file(url: &str, parsed: &url::Url) -> Result<FetchedDocument, FetchError> {
    let path = parsed
        .to_file_path()
        .map_err(|_| FetchError::Unsupported(url.to_string()))?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FetchError::NotFound(url.to_string()),
        _ => FetchError::Io {
            url: url.to_string(),
            message: e.to_string(),
        },
    })?;

    let is_html = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false);

    Ok(FetchedDocument::ok(
        url,
        if is_html { "text/html" } else { "text/plain" },
        String::from_utf8_lossy(&bytes).into_owned(),
    ))
}
