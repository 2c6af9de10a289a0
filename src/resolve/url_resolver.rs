//! URL resolver: license document URL → expression
//!
//! Known URLs (corpus, seeds, earlier discoveries) resolve without
//! touching the network. Anything else is fetched hop by hop:
//!
//! ```text
//! fetch ─▶ redirect status?        ─▶ follow Location
//!       ─▶ Link rel=canonical?     ─▶ follow it
//!       ─▶ redirect table match?   ─▶ follow replacement
//!       ─▶ HTML canonical known?   ─▶ done
//!       ─▶ strip markup ─▶ TextMatcher ─▶ ids ─▶ expression
//! ```
//!
//! Outcomes are memoized per URL, and every hop of a redirect chain is
//! memoized with the final outcome. Each hop is also fetched through its
//! own single-flight cell, so a worker reaching a URL another worker is
//! already fetching waits for that fetch instead of repeating it. A hop
//! cell only ever covers one fetch, so redirect loops cannot deadlock.

use crate::detection::TextMatcher;
use crate::engine::store::KeyedStore;
use crate::fetch::{markup, resolve_reference, FetchError, FetchedDocument, Fetcher};
use crate::license::{Expression, Registry};
use crate::resolve::merger;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Memoized result for one URL, independent of the caller's name hint
#[derive(Debug, Clone)]
enum Outcome {
    Identified(Expression),
    /// Nothing matched; carries whatever text was extracted
    Unidentified { text: String },
}

#[derive(Debug, Clone)]
enum Step {
    Follow(String),
    Done(Outcome),
}

pub struct UrlResolver {
    registry: Arc<Registry>,
    matcher: Arc<TextMatcher>,
    fetcher: Arc<dyn Fetcher>,
    cache: KeyedStore<Outcome>,
    steps: KeyedStore<Step>,
    fetch_timeout: Duration,
    max_redirects: usize,
}

impl UrlResolver {
    pub fn new(
        registry: Arc<Registry>,
        matcher: Arc<TextMatcher>,
        fetcher: Arc<dyn Fetcher>,
        fetch_timeout: Duration,
        max_redirects: usize,
    ) -> Self {
        Self {
            registry,
            matcher,
            fetcher,
            cache: KeyedStore::new(),
            steps: KeyedStore::new(),
            fetch_timeout,
            max_redirects,
        }
    }

    /// Resolve `url`. When nothing can be identified the result is
    /// `Unresolved { raw_id: hint, raw_text: <extracted text>, source_urls: [url] }`.
    pub async fn resolve(&self, hint: Option<&str>, url: &str) -> Expression {
        let url = url.trim();
        if let Some(known) = self.registry.expression_for_url(url) {
            return known;
        }

        let (outcome, _) = self.cache.get_or_compute(url, || self.compute(url)).await;
        match outcome {
            Outcome::Identified(expression) => expression,
            Outcome::Unidentified { text } => {
                Expression::unresolved(hint.unwrap_or("").trim(), text, vec![url.to_string()])
            }
        }
    }

    /// Number of URLs with a memoized outcome
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    async fn compute(&self, url: &str) -> Outcome {
        let mut chain: Vec<String> = Vec::new();
        let mut current = url.to_string();

        let outcome = loop {
            if chain.iter().any(|seen| same_url(seen, &current)) {
                tracing::warn!("Redirect loop resolving {} (at {})", url, current);
                break Outcome::Unidentified { text: String::new() };
            }
            if chain.len() > self.max_redirects {
                tracing::warn!("Too many redirects resolving {}", url);
                break Outcome::Unidentified { text: String::new() };
            }
            chain.push(current.clone());

            if chain.len() > 1 {
                if let Some(known) = self.registry.expression_for_url(&current) {
                    break Outcome::Identified(known);
                }
                if let Some(cached) = self.cache.get(&current) {
                    break cached;
                }
            }

            let (step, _) = self.steps.get_or_compute(&current, || self.step(&current)).await;
            match step {
                Step::Follow(target) => {
                    tracing::debug!("{} -> {}", current, target);
                    current = target;
                }
                Step::Done(outcome) => break outcome,
            }
        };

        for hop in chain.iter().skip(1) {
            self.cache.insert_if_absent(hop, outcome.clone());
        }
        if let Outcome::Identified(expression) = &outcome {
            for hop in &chain {
                self.registry.remember_url(hop, expression);
            }
        }
        outcome
    }

    async fn step(&self, url: &str) -> Step {
        let document = match self.fetch(url).await {
            Ok(document) => document,
            Err(error) => {
                if let Some(target) = self.registry.redirect(url) {
                    return Step::Follow(target);
                }
                tracing::warn!("Cannot read {}: {}", url, error);
                return Step::Done(Outcome::Unidentified { text: String::new() });
            }
        };

        if let Some(target) = document.redirect_target().filter(|t| !same_url(t, url)) {
            return Step::Follow(target);
        }
        if let Some(target) = document.canonical_target().filter(|t| !same_url(t, url)) {
            return Step::Follow(target);
        }
        if let Some(target) = self.registry.redirect(url) {
            return Step::Follow(target);
        }

        Step::Done(self.analyze(url, &document))
    }

    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(url.to_string())),
        }
    }

    fn analyze(&self, url: &str, document: &FetchedDocument) -> Outcome {
        if !document.is_html() {
            let text = document.body.trim();
            return match self.identify(text) {
                Some(expression) => Outcome::Identified(expression),
                None => Outcome::Unidentified {
                    text: text.to_string(),
                },
            };
        }

        let canonical = markup::canonical_link(&document.body)
            .and_then(|href| resolve_reference(url, &href))
            .filter(|href| !same_url(href, url));
        if let Some(known) = canonical.and_then(|href| self.registry.expression_for_url(&href)) {
            return Outcome::Identified(known);
        }

        let regions = markup::text_regions(&document.body);
        for region in &regions {
            if let Some(expression) = self.identify(region) {
                return Outcome::Identified(expression);
            }
        }
        Outcome::Unidentified {
            text: regions.last().cloned().unwrap_or_default(),
        }
    }

    /// Text → expression through the matcher; `None` when nothing matches
    fn identify(&self, text: &str) -> Option<Expression> {
        let ids = self.matcher.match_ids(text);
        if ids.is_empty() {
            return None;
        }
        let members: Vec<Expression> = ids
            .into_iter()
            .map(|id| match self.registry.get(id.as_str()) {
                Some(entry) => Expression::Single(entry.id.clone()),
                None => Expression::Single(id),
            })
            .collect();
        Some(merger::to_expression(members))
    }
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('/').eq_ignore_ascii_case(b.trim().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned documents and counts fetches
    struct CannedFetcher {
        documents: HashMap<String, FetchedDocument>,
        calls: AtomicUsize,
    }

    impl CannedFetcher {
        fn new(documents: Vec<FetchedDocument>) -> Self {
            Self {
                documents: documents.into_iter().map(|d| (d.url.clone(), d)).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.documents
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::NotFound(url.to_string()))
        }
    }

    fn resolver(documents: Vec<FetchedDocument>) -> (UrlResolver, Arc<CannedFetcher>, Arc<Registry>) {
        let registry = Arc::new(Registry::bundled().unwrap());
        let matcher = Arc::new(TextMatcher::new(&registry));
        let fetcher = Arc::new(CannedFetcher::new(documents));
        let resolver = UrlResolver::new(
            Arc::clone(&registry),
            matcher,
            fetcher.clone(),
            Duration::from_secs(5),
            DEFAULT_MAX_REDIRECTS,
        );
        (resolver, fetcher, registry)
    }

    fn text(registry: &Registry, id: &str) -> String {
        registry.get(id).unwrap().text.clone().unwrap()
    }

    #[tokio::test]
    async fn test_known_url_needs_no_fetch() {
        let (r, fetcher, _) = resolver(vec![]);
        let expr = r.resolve(None, "https://www.apache.org/licenses/LICENSE-2.0").await;
        assert_eq!(expr, Expression::single("Apache-2.0"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plain_text_document() {
        let registry = Registry::bundled().unwrap();
        let url = "https://example.test/LICENSE.txt";
        let (r, fetcher, registry) =
            resolver(vec![FetchedDocument::ok(url, "text/plain", text(&registry, "ISC"))]);

        assert_eq!(r.resolve(Some("ISC-ish"), url).await, Expression::single("ISC"));
        assert_eq!(r.resolve(None, url).await, Expression::single("ISC"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.by_url(url).unwrap().id.as_str(), "ISC");
    }

    #[tokio::test]
    async fn test_html_main_region() {
        let registry = Registry::bundled().unwrap();
        let url = "https://example.test/license.html";
        let page = format!(
            "<html><head><title>License</title></head><body><nav>Home | About | Download</nav>\
             <main><pre>{}</pre></main><footer>Site footer</footer></body></html>",
            text(&registry, "BSD-3-Clause")
        );
        let (r, _, _) = resolver(vec![FetchedDocument::ok(url, "text/html", page)]);
        assert_eq!(r.resolve(None, url).await, Expression::single("BSD-3-Clause"));
    }

    #[tokio::test]
    async fn test_html_canonical_to_known_url() {
        let url = "https://mirror.test/mit";
        let page = r#"<html><head><link rel="canonical" href="https://opensource.org/licenses/MIT"></head>
                      <body><p>Loading...</p></body></html>"#;
        let (r, _, _) = resolver(vec![FetchedDocument::ok(url, "text/html", page)]);
        assert_eq!(r.resolve(None, url).await, Expression::single("MIT"));
    }

    #[tokio::test]
    async fn test_link_header_canonical_is_followed() {
        let registry = Registry::bundled().unwrap();
        let a = "https://example.test/a";
        let b = "https://example.test/b";
        let mut first = FetchedDocument::ok(a, "text/plain", "moved");
        first.link_canonical = Some("/b".into());
        let (r, fetcher, _) = resolver(vec![
            first,
            FetchedDocument::ok(b, "text/plain", text(&registry, "Zlib")),
        ]);
        assert_eq!(r.resolve(None, a).await, Expression::single("Zlib"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_url_is_unresolved() {
        let (r, _, _) = resolver(vec![]);
        let url = "https://example.test/missing";
        match r.resolve(Some("Custom License"), url).await {
            Expression::Unresolved(u) => {
                assert_eq!(u.raw_id, "Custom License");
                assert!(u.raw_text.is_empty());
                assert_eq!(u.source_urls, vec![url.to_string()]);
            }
            other => panic!("expected Unresolved, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_unmatched_text_is_carried() {
        let url = "https://example.test/custom.txt";
        let body = "FooCorp Custom License\n\nNo redistribution of any kind is permitted.";
        let (r, _, registry) = resolver(vec![FetchedDocument::ok(url, "text/plain", body)]);
        match r.resolve(Some("FooCorp"), url).await {
            Expression::Unresolved(u) => assert_eq!(u.raw_text, body),
            other => panic!("expected Unresolved, got {}", other),
        }
        assert!(registry.expression_for_url(url).is_none());
    }

    #[tokio::test]
    async fn test_redirect_loop_terminates() {
        let a = "https://example.test/a";
        let b = "https://example.test/b";
        let (r, _, _) = resolver(vec![
            FetchedDocument::redirect(a, 302, b),
            FetchedDocument::redirect(b, 301, a),
        ]);
        assert!(r.resolve(None, a).await.is_unresolved());
    }

    #[tokio::test]
    async fn test_redirect_table_applies_on_fetch_failure() {
        let (r, fetcher, _) = resolver(vec![]);
        // Rewritten to https://opensource.org/licenses/MIT, which the
        // corpus knows.
        let expr = r.resolve(None, "http://opensource.org/licenses/MIT.html").await;
        assert_eq!(expr, Expression::single("MIT"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_url() {
        assert!(same_url("https://A.test/x/", "https://a.test/x"));
        assert!(!same_url("http://a.test/x", "https://a.test/x"));
    }
}
