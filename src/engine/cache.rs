//! Resolution catalog: artifact key → resolved expression
//!
//! Three layers, most specific first:
//!
//! 1. in-process entries: the on-disk store, `put` overrides, and
//!    everything computed this run
//! 2. the bundled default table
//! 3. computation through the [`SignalSource`] and [`ArtifactResolver`]
//!
//! Only fully identified expressions that differ from the bundled default
//! are written back. The store file is rewritten only when its contents
//! would change.

use super::store::KeyedStore;
use crate::ingest::SignalSource;
use crate::license::{Expression, Registry};
use crate::resolve::ArtifactResolver;
use crate::{ResolverError, ResolverResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub const CATALOG_VERSION: u32 = 1;

const BUNDLED_CATALOG: &str = include_str!("../../resources/artifact-license-catalog.json");

/// On-disk catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Artifact key → canonical expression string
    #[serde(default)]
    pub licenses: BTreeMap<String, String>,
}

impl Default for CatalogData {
    fn default() -> Self {
        Self {
            version: CATALOG_VERSION,
            updated_at: None,
            licenses: BTreeMap::new(),
        }
    }
}

impl CatalogData {
    /// Read a catalog file. A missing file is an empty catalog.
    pub fn load(path: &Path) -> ResolverResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let data: CatalogData = serde_json::from_str(&content)?;
        if data.version != CATALOG_VERSION {
            return Err(ResolverError::Catalog(format!(
                "{}: unsupported catalog version {}",
                path.display(),
                data.version
            )));
        }
        Ok(data)
    }

    /// Write atomically: a temporary file in the same directory, then rename
    pub fn save(&self, path: &Path) -> ResolverResult<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.persist(path).map_err(|e| ResolverError::Io(e.error))?;
        Ok(())
    }
}

pub struct ResolutionCatalog {
    registry: Arc<Registry>,
    resolver: Arc<ArtifactResolver>,
    source: Arc<dyn SignalSource>,
    defaults: HashMap<String, Expression>,
    entries: KeyedStore<Expression>,
    store: Option<PathBuf>,
    flush_interval: usize,
    computed: AtomicUsize,
    flush_lock: Arc<Mutex<()>>,
}

impl ResolutionCatalog {
    /// Build the catalog. A corrupt bundled table is fatal; an unreadable
    /// store file is logged and ignored. `store: None` never persists.
    pub fn new(
        registry: Arc<Registry>,
        resolver: Arc<ArtifactResolver>,
        source: Arc<dyn SignalSource>,
        store: Option<PathBuf>,
        flush_interval: usize,
    ) -> ResolverResult<Self> {
        let bundled: CatalogData = serde_json::from_str(BUNDLED_CATALOG)
            .map_err(|e| ResolverError::Catalog(format!("Bundled catalog is corrupt: {}", e)))?;
        let defaults: HashMap<String, Expression> = parse_entries(&registry, &bundled.licenses, "bundled catalog")
            .into_iter()
            .collect();

        let entries = KeyedStore::new();
        if let Some(path) = &store {
            match CatalogData::load(path) {
                Ok(data) => {
                    let loaded = parse_entries(&registry, &data.licenses, &path.display().to_string());
                    tracing::info!("Loaded license catalog {} ({} entries)", path.display(), loaded.len());
                    for (key, expression) in loaded {
                        entries.insert(&key, expression);
                    }
                }
                Err(e) => tracing::warn!("Ignoring license catalog {}: {}", path.display(), e),
            }
        }

        Ok(Self {
            registry,
            resolver,
            source,
            defaults,
            entries,
            store,
            flush_interval: flush_interval.max(1),
            computed: AtomicUsize::new(0),
            flush_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Expression for `key`, computed on first access
    pub async fn get(&self, key: &str) -> Expression {
        let key = key.trim();
        if let Some(expression) = self.entries.get(key) {
            return expression;
        }
        if let Some(expression) = self.defaults.get(key) {
            return expression.clone();
        }

        let (expression, computed) = self.entries.get_or_compute(key, || self.compute(key)).await;
        if computed && expression.is_fully_identified() {
            let count = self.computed.fetch_add(1, Ordering::SeqCst) + 1;
            if count % self.flush_interval == 0 {
                self.checkpoint().await;
            }
        }
        expression
    }

    async fn compute(&self, key: &str) -> Expression {
        let source = Arc::clone(&self.source);
        let owned = key.to_string();
        let signals = match tokio::task::spawn_blocking(move || source.signals(&owned)).await {
            Ok(signals) => signals,
            Err(e) => {
                tracing::warn!("{}: signal extraction failed: {}", key, e);
                Default::default()
            }
        };
        self.resolver.resolve(key, &signals).await
    }

    /// Record an out-of-band resolution; it takes precedence over
    /// computed and default results
    pub fn put(&self, key: &str, expression: Expression) {
        self.entries.insert(key.trim(), expression);
    }

    /// Parse `expression` against the registry and `put` it
    pub fn put_str(&self, key: &str, expression: &str) -> ResolverResult<()> {
        let parsed = self.registry.parse_expression(expression).map_err(ResolverError::Parse)?;
        self.put(key, parsed);
        Ok(())
    }

    pub fn default_for(&self, key: &str) -> Option<&Expression> {
        self.defaults.get(key)
    }

    /// Keys resolved (or loaded, or put) in this process
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_deref()
    }

    /// Write persistable entries to the store. Returns true when the file
    /// was rewritten. Failures are logged, never raised.
    pub fn flush(&self) -> bool {
        match &self.store {
            Some(path) => write_store(path, &self.flush_lock, self.persistable()),
            None => false,
        }
    }

    /// `flush` with the file I/O moved off the async workers
    async fn checkpoint(&self) -> bool {
        let Some(path) = self.store.clone() else {
            return false;
        };
        let licenses = self.persistable();
        let lock = Arc::clone(&self.flush_lock);
        match tokio::task::spawn_blocking(move || write_store(&path, &lock, licenses)).await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!("License catalog checkpoint failed: {}", e);
                false
            }
        }
    }

    /// Fully identified entries that differ from the bundled default
    fn persistable(&self) -> BTreeMap<String, String> {
        self.entries
            .entries()
            .into_iter()
            .filter(|(key, expression)| {
                expression.is_fully_identified() && self.defaults.get(key) != Some(expression)
            })
            .map(|(key, expression)| (key, expression.to_string()))
            .collect()
    }
}

impl Drop for ResolutionCatalog {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Merge `entries` into the store file at `path`, rewriting it only when
/// its contents change
fn write_store(path: &Path, lock: &Mutex<()>, entries: BTreeMap<String, String>) -> bool {
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    let existing = match CatalogData::load(path) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!("Rewriting unreadable license catalog {}: {}", path.display(), e);
            None
        }
    };
    let mut licenses = existing
        .as_ref()
        .map(|data| data.licenses.clone())
        .unwrap_or_default();
    licenses.extend(entries);

    let unchanged = existing.as_ref().map_or(false, |data| data.licenses == licenses);
    if unchanged {
        tracing::debug!("License catalog {} unchanged", path.display());
        return false;
    }

    let data = CatalogData {
        version: CATALOG_VERSION,
        updated_at: Some(chrono::Utc::now().to_rfc3339()),
        licenses,
    };
    match data.save(path) {
        Ok(()) => {
            tracing::info!("Saved license catalog {} ({} entries)", path.display(), data.licenses.len());
            true
        }
        Err(e) => {
            tracing::warn!("Failed to save license catalog {}: {}", path.display(), e);
            false
        }
    }
}

/// Parse catalog values, skipping (with a warning) anything that does not
/// parse to a fully identified expression
fn parse_entries(registry: &Registry, licenses: &BTreeMap<String, String>, origin: &str) -> Vec<(String, Expression)> {
    licenses
        .iter()
        .filter_map(|(key, value)| match registry.parse_expression(value) {
            Ok(expression) if expression.is_fully_identified() => Some((key.clone(), expression)),
            Ok(expression) => {
                tracing::warn!("{}: {} = {} is not fully identified, skipped", origin, key, expression);
                None
            }
            Err(e) => {
                tracing::warn!("{}: {} = {:?}: {}", origin, key, value, e);
                None
            }
        })
        .collect()
}
