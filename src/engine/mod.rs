//! # Engine: configuration and the top-level entry point
//!
//! - `store`: keyed single-flight memo store shared by the caches
//! - `cache`: resolution catalog (defaults, durable store, compute)
//! - `pipeline`: batch resolution over a bounded worker pool
//!
//! [`LicenseEngine`] wires every component together as explicitly owned
//! `Arc` context objects; nothing is global.

pub mod cache;
pub mod pipeline;
pub mod store;

pub use cache::{CatalogData, ResolutionCatalog};
pub use pipeline::{resolve_all, BatchReport};

use crate::detection::{TextMatcher, MATCH_THRESHOLD, VERIFY_THRESHOLD};
use crate::fetch::http::DEFAULT_USER_AGENT;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::ingest::{RawSignal, SignalSource};
use crate::license::corpus::{Corpus, CorpusTables, UrlRedirect};
use crate::license::{Expression, Registry};
use crate::resolve::{merger, ArtifactResolver, SignalNormalizer, UrlResolver, DEFAULT_MAX_REDIRECTS};
use crate::{ResolverError, ResolverResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ─── Configuration ─────────────────────────────────────────────────

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shared local cache directory holding the catalog file
    pub cache_dir: PathBuf,
    pub catalog_file: String,
    /// Persist the catalog at all
    pub persist: bool,
    /// Flush after this many newly computed, fully identified entries
    pub flush_interval: usize,
    /// Concurrent resolutions in `resolve_all`
    pub workers: usize,
    pub fetch_timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
    /// Minimum matcher score to accept a license text
    pub match_threshold: f32,
    /// Minimum score for strict template verification
    pub verify_threshold: f32,
    /// Directory replacing the bundled license corpus
    pub corpus_dir: Option<PathBuf>,
    /// Extra aliases: name → license id
    pub aliases: BTreeMap<String, String>,
    /// Extra known URLs: expression → URLs
    pub seeds: BTreeMap<String, Vec<String>>,
    pub redirects: Vec<UrlRedirect>,
    /// Operator overrides: artifact key → expression
    pub overrides: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".license-cache"),
            catalog_file: "artifact-license-catalog.json".to_string(),
            persist: true,
            flush_interval: 16,
            workers: 8,
            fetch_timeout_secs: 30,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            match_threshold: MATCH_THRESHOLD,
            verify_threshold: VERIFY_THRESHOLD,
            corpus_dir: None,
            aliases: BTreeMap::new(),
            seeds: BTreeMap::new(),
            redirects: Vec::new(),
            overrides: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file
    pub fn from_file(path: &Path) -> ResolverResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ResolverError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(toml::from_str(&content)?)
    }

    /// Try `license-resolver.toml` then `.license-resolver.toml` in `root`,
    /// falling back to defaults
    pub fn from_project_root(root: &Path) -> Self {
        for name in ["license-resolver.toml", ".license-resolver.toml"] {
            let path = root.join(name);
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}; using defaults", path.display(), e);
                }
            }
        }
        Self::default()
    }

    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.persist.then(|| self.cache_dir.join(&self.catalog_file))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    fn tables(&self) -> CorpusTables {
        CorpusTables {
            aliases: self.aliases.clone(),
            seeds: self.seeds.clone(),
            redirects: self.redirects.clone(),
        }
    }
}

// ─── Engine ────────────────────────────────────────────────────────

pub struct LicenseEngine {
    config: EngineConfig,
    registry: Arc<Registry>,
    matcher: Arc<TextMatcher>,
    normalizer: Arc<SignalNormalizer>,
    catalog: ResolutionCatalog,
}

impl LicenseEngine {
    /// Engine fetching over HTTP(S) and `file:` URLs
    pub fn new(config: EngineConfig, source: Arc<dyn SignalSource>) -> ResolverResult<Self> {
        let fetcher = HttpFetcher::new(config.fetch_timeout(), &config.user_agent)?;
        Self::with_fetcher(config, source, Arc::new(fetcher))
    }

    pub fn with_fetcher(
        config: EngineConfig,
        source: Arc<dyn SignalSource>,
        fetcher: Arc<dyn Fetcher>,
    ) -> ResolverResult<Self> {
        let mut corpus = match &config.corpus_dir {
            Some(dir) => Corpus::from_dir(dir)?,
            None => Corpus::bundled()?,
        };
        corpus.tables.extend(config.tables());

        let registry = Arc::new(Registry::new(corpus)?);
        let matcher = Arc::new(TextMatcher::with_thresholds(
            &registry,
            config.match_threshold,
            config.verify_threshold,
        ));
        let urls = Arc::new(UrlResolver::new(
            Arc::clone(&registry),
            Arc::clone(&matcher),
            fetcher,
            config.fetch_timeout(),
            config.max_redirects,
        ));
        let normalizer = Arc::new(SignalNormalizer::new(Arc::clone(&registry), urls));
        let resolver = Arc::new(ArtifactResolver::new(Arc::clone(&normalizer)));
        let catalog = ResolutionCatalog::new(
            Arc::clone(&registry),
            resolver,
            source,
            config.catalog_path(),
            config.flush_interval,
        )?;

        for (key, expression) in &config.overrides {
            catalog
                .put_str(key, expression)
                .map_err(|e| ResolverError::Config(format!("Override {}: {}", key, e)))?;
        }

        tracing::info!(
            "License engine ready: {} licenses, {} reference texts, {} override(s)",
            registry.len(),
            matcher.len(),
            config.overrides.len()
        );

        Ok(Self {
            config,
            registry,
            matcher,
            normalizer,
            catalog,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn catalog(&self) -> &ResolutionCatalog {
        &self.catalog
    }

    pub async fn get(&self, key: &str) -> Expression {
        self.catalog.get(key).await
    }

    pub fn put(&self, key: &str, expression: Expression) {
        self.catalog.put(key, expression);
    }

    /// Resolve many artifacts, at most `workers` at a time
    pub async fn resolve_all<S: AsRef<str>>(&self, keys: &[S]) -> BatchReport {
        pipeline::resolve_all(&self.catalog, keys, self.config.workers).await
    }

    pub fn flush(&self) -> bool {
        self.catalog.flush()
    }

    /// Final flush; the catalog also flushes when dropped
    pub fn shutdown(self) {
        self.catalog.flush();
    }

    pub async fn normalize(&self, signal: &RawSignal) -> Expression {
        self.normalizer.normalize(signal).await
    }

    pub async fn resolve_url(&self, hint: Option<&str>, url: &str) -> Expression {
        self.normalizer.url_resolver().resolve(hint, url).await
    }

    /// Resolve a project's own declared licenses. When the canonical form
    /// differs from what was declared, the canonical identifier is logged
    /// so the declaration can be updated.
    pub async fn resolve_project_license(&self, declared: &[RawSignal]) -> Expression {
        let resolved = self.normalizer.normalize_all(declared).await;
        let expression = merger::to_expression(resolved);

        let declared_names: Vec<&str> = declared.iter().filter_map(|s| s.name.as_deref()).collect();
        let rendered = expression.to_string();
        if declared_names.len() != 1 || declared_names[0].trim() != rendered {
            tracing::warn!("SPDX-License-Identifier: {}", rendered);
        }
        expression
    }

    /// Strict check of a local copy of a license against its template.
    /// Only single licenses are verifiable.
    pub fn verify_license_text(&self, expression: &Expression, text: &str) -> bool {
        match expression {
            Expression::Single(id) => self.matcher.is_standard_text(id.as_str(), text),
            _ => false,
        }
    }

    pub async fn verify_license_file(&self, expression: &Expression, path: &Path) -> ResolverResult<bool> {
        let bytes = tokio::fs::read(path).await?;
        Ok(self.verify_license_text(expression, &String::from_utf8_lossy(&bytes)))
    }
}
