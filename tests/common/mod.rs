//! Shared fixtures: a counting in-memory fetcher and engine builders

#![allow(dead_code)]

use async_trait::async_trait;
use license_resolver::{
    EngineConfig, FetchError, FetchedDocument, Fetcher, LicenseEngine, Registry, SignalSource,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serves canned documents, counting every fetch per URL
#[derive(Default)]
pub struct MockFetcher {
    documents: Mutex<HashMap<String, FetchedDocument>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn serve_text(&self, url: &str, body: &str) {
        self.serve(FetchedDocument::ok(url, "text/plain", body));
    }

    pub fn serve_html(&self, url: &str, body: &str) {
        self.serve(FetchedDocument::ok(url, "text/html", body));
    }

    pub fn serve_redirect(&self, url: &str, location: &str) {
        self.serve(FetchedDocument::redirect(url, 301, location));
    }

    pub fn serve(&self, document: FetchedDocument) {
        self.documents
            .lock()
            .unwrap()
            .insert(document.url.clone(), document);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let document = self.documents.lock().unwrap().get(url).cloned();
        document.ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

/// Canonical text of a bundled license
pub fn license_text(id: &str) -> String {
    let registry = Registry::bundled().unwrap();
    registry.get(id).unwrap().text.clone().unwrap()
}

/// Config persisting into `cache_dir`
pub fn config_in(cache_dir: &Path) -> EngineConfig {
    EngineConfig {
        cache_dir: cache_dir.to_path_buf(),
        fetch_timeout_secs: 5,
        ..EngineConfig::default()
    }
}

/// Config that never touches the disk
pub fn memory_config() -> EngineConfig {
    EngineConfig {
        persist: false,
        fetch_timeout_secs: 5,
        ..EngineConfig::default()
    }
}

pub fn engine(config: EngineConfig, source: impl SignalSource + 'static, fetcher: Arc<MockFetcher>) -> LicenseEngine {
    LicenseEngine::with_fetcher(config, Arc::new(source), fetcher).unwrap()
}
