//! License registry
//!
//! Canonical license entries plus the indexes used to recognize them:
//! identifiers, names and aliases (normalized lookup keys), and known
//! license document URLs. The URL index has a static part built from the
//! corpus and an append-only part filled in as URLs are resolved at
//! runtime.

use crate::license::corpus::Corpus;
use crate::license::{Expression, LicenseId};
use crate::{ResolverError, ResolverResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// A license known to the registry
#[derive(Debug, Clone)]
pub struct LicenseEntry {
    pub id: LicenseId,
    pub name: String,
    pub see_also: Vec<String>,
    pub deprecated: bool,
    /// Canonical text, when the corpus carries one
    pub text: Option<String>,
}

pub struct Registry {
    entries: BTreeMap<String, LicenseEntry>,
    /// Lower-cased id → id
    ids: HashMap<String, String>,
    /// Normalized name/alias key → id
    names: HashMap<String, String>,
    /// Normalized URL → expression
    urls: HashMap<String, Expression>,
    /// URLs associated at runtime
    discovered: RwLock<HashMap<String, Expression>>,
    redirects: Vec<(Regex, String)>,
    list_version: Option<String>,
}

static VERSION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:version|ver\.?|v)\s*(\d)").expect("valid regex"));

static LEADING_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^the\s+").expect("valid regex"));

impl Registry {
    /// Registry over the bundled corpus
    pub fn bundled() -> ResolverResult<Self> {
        Self::new(Corpus::bundled()?)
    }

    /// Build the indexes. Alias, seed and redirect tables that do not
    /// resolve against the license list are corpus errors.
    pub fn new(corpus: Corpus) -> ResolverResult<Self> {
        let Corpus {
            list,
            alternates,
            tables,
            mut texts,
        } = corpus;

        let mut registry = Self {
            entries: BTreeMap::new(),
            ids: HashMap::new(),
            names: HashMap::new(),
            urls: HashMap::new(),
            discovered: RwLock::new(HashMap::new()),
            redirects: Vec::new(),
            list_version: list.license_list_version,
        };

        for listed in list.licenses {
            let text = texts.remove(&listed.license_id);
            registry
                .ids
                .insert(listed.license_id.to_lowercase(), listed.license_id.clone());
            registry.entries.insert(
                listed.license_id.clone(),
                LicenseEntry {
                    id: LicenseId::new(listed.license_id),
                    name: listed.name,
                    see_also: listed.see_also,
                    deprecated: listed.is_deprecated_license_id,
                    text,
                },
            );
        }
        for id in texts.keys() {
            tracing::warn!("License text for unlisted id {} ignored", id);
        }

        // Names, lowest precedence first: listed names and alternates never
        // displace an earlier key, aliases and ids always do.
        let listed_names: Vec<(String, String)> = registry
            .entries
            .values()
            .map(|e| (e.name.clone(), e.id.0.clone()))
            .collect();
        for (name, id) in listed_names {
            registry.index_name(&name, &id, false);
        }

        for alternate in &alternates.licenses {
            let Some(id) = alternate.spdx_id().and_then(|s| registry.canonical_id(s)) else {
                tracing::debug!("Alternate license record {} has no listed id", alternate.id);
                continue;
            };
            registry.index_name(&alternate.id, &id, false);
            if let Some(name) = &alternate.name {
                registry.index_name(name, &id, false);
            }
            for other in &alternate.other_names {
                registry.index_name(other, &id, false);
            }
        }

        for (alias, target) in &tables.aliases {
            let id = registry.canonical_id(target).ok_or_else(|| {
                ResolverError::Corpus(format!("Alias {:?} names unknown license {}", alias, target))
            })?;
            registry.index_name(alias, &id, true);
        }

        let ids: Vec<String> = registry.entries.keys().cloned().collect();
        for id in &ids {
            registry.index_name(id, id, true);
        }

        // URLs: current ids before deprecated ones so shared documents map
        // to the current id.
        let mut ordered: Vec<&LicenseEntry> = registry.entries.values().collect();
        ordered.sort_by_key(|e| e.deprecated);
        let mut urls: HashMap<String, Expression> = HashMap::new();
        for entry in ordered {
            let single = Expression::Single(entry.id.clone());
            let id = entry.id.as_str();
            for url in entry
                .see_also
                .iter()
                .cloned()
                .chain([
                    format!("https://opensource.org/licenses/{}", id),
                    format!("https://spdx.org/licenses/{}.html", id),
                ])
            {
                urls.entry(url_key(&url)).or_insert_with(|| single.clone());
            }
        }
        for alternate in &alternates.licenses {
            if let Some(id) = alternate.spdx_id().and_then(|s| registry.canonical_id(s)) {
                for uri in &alternate.uris {
                    urls.entry(url_key(uri))
                        .or_insert_with(|| Expression::single(id.clone()));
                }
            }
        }
        registry.urls = urls;

        for (key, seed_urls) in &tables.seeds {
            let expression = registry
                .parse_expression(key)
                .map_err(|e| ResolverError::Corpus(format!("Seed {:?}: {}", key, e)))?;
            if !expression.is_fully_identified() {
                return Err(ResolverError::Corpus(format!(
                    "Seed {:?} does not name registry licenses",
                    key
                )));
            }
            for url in seed_urls.iter().filter(|u| !u.trim().is_empty()) {
                registry
                    .urls
                    .entry(url_key(url))
                    .or_insert_with(|| expression.clone());
            }
        }

        for rule in &tables.redirects {
            let regex = Regex::new(&format!("^(?:{})$", rule.pattern)).map_err(|e| {
                ResolverError::Corpus(format!("Invalid redirect pattern {:?}: {}", rule.pattern, e))
            })?;
            registry.redirects.push((regex, rule.replacement.trim().to_string()));
        }

        tracing::info!(
            "License registry ready: {} licenses, {} names, {} URLs (list version {})",
            registry.entries.len(),
            registry.names.len(),
            registry.urls.len(),
            registry.list_version.as_deref().unwrap_or("unknown")
        );

        Ok(registry)
    }

    fn canonical_id(&self, id: &str) -> Option<String> {
        self.ids.get(&id.trim().to_lowercase()).cloned()
    }

    fn index_name(&mut self, name: &str, id: &str, replace: bool) {
        for key in lookup_keys(name) {
            if replace {
                self.names.insert(key, id.to_string());
            } else {
                self.names.entry(key).or_insert_with(|| id.to_string());
            }
        }
    }

    // ─── Queries ───────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LicenseEntry> {
        self.entries.values()
    }

    /// Entry by identifier (case-insensitive)
    pub fn get(&self, id: &str) -> Option<&LicenseEntry> {
        self.ids
            .get(&id.trim().to_lowercase())
            .and_then(|id| self.entries.get(id))
    }

    /// Entry by identifier, name, alternate name or alias
    pub fn lookup(&self, name: &str) -> Option<&LicenseEntry> {
        if name.trim().is_empty() {
            return None;
        }
        if let Some(entry) = self.get(name) {
            return Some(entry);
        }
        lookup_keys(name)
            .iter()
            .find_map(|key| self.names.get(key))
            .and_then(|id| self.entries.get(id))
    }

    /// Entry for a URL known to document exactly one license
    pub fn by_url(&self, url: &str) -> Option<&LicenseEntry> {
        match self.expression_for_url(url)? {
            Expression::Single(id) => self.entries.get(id.as_str()),
            _ => None,
        }
    }

    /// Expression for a known URL: corpus, seeds, then runtime discoveries
    pub fn expression_for_url(&self, url: &str) -> Option<Expression> {
        let key = url_key(url);
        if key.is_empty() {
            return None;
        }
        if let Some(expression) = self.urls.get(&key) {
            return Some(expression.clone());
        }
        self.discovered
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Remember a URL that resolved to a fully identified expression
    pub fn remember_url(&self, url: &str, expression: &Expression) {
        if !expression.is_fully_identified() {
            return;
        }
        let key = url_key(url);
        if key.is_empty() || self.urls.contains_key(&key) {
            return;
        }
        self.discovered
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert_with(|| expression.clone());
    }

    /// Replacement URL from the redirect table, if a rule matches and
    /// points somewhere else
    pub fn redirect(&self, url: &str) -> Option<String> {
        let url = url.trim();
        self.redirects.iter().find_map(|(pattern, replacement)| {
            if !pattern.is_match(url) {
                return None;
            }
            let target = pattern.replace(url, replacement.as_str()).trim().to_string();
            (!target.is_empty() && url_key(&target) != url_key(url)).then_some(target)
        })
    }

    /// Parse an expression and map its identifiers onto the registry;
    /// unknown identifiers become `Unresolved`
    pub fn parse_expression(&self, input: &str) -> Result<Expression, String> {
        let parsed = Expression::parse(input)?;
        Ok(parsed.map_leaves(&mut |leaf| match leaf {
            Expression::Single(id) => match self.get(id.as_str()) {
                Some(entry) => Expression::Single(entry.id.clone()),
                None => Expression::unresolved(id.as_str(), "", Vec::new()),
            },
            other => other.clone(),
        }))
    }

    pub fn list_version(&self) -> Option<&str> {
        self.list_version.as_deref()
    }
}

// ─── Key Normalization ──────────────────────────────────────────────

/// Normalize a name for lookup: case-folded, British spelling folded,
/// punctuation and whitespace reduced to single hyphens.
pub fn normalize_key(name: &str) -> String {
    let lower = name.trim().to_lowercase().replace("licence", "license");
    let mut key = String::with_capacity(lower.len());
    for c in lower.chars() {
        if c.is_alphanumeric() || c == '.' || c == '+' {
            key.push(c);
        } else if !key.ends_with('-') {
            key.push('-');
        }
    }
    key.trim_matches('-').to_string()
}

/// All keys a name is indexed and looked up under
fn lookup_keys(name: &str) -> Vec<String> {
    let trimmed = name.trim();
    let without_article = LEADING_ARTICLE.replace(trimmed, "").to_string();

    let mut keys = Vec::with_capacity(4);
    for variant in [trimmed.to_string(), without_article] {
        let reduced = VERSION_TOKEN.replace_all(&variant, "$1").to_string();
        for candidate in [normalize_key(&variant), normalize_key(&reduced)] {
            if !candidate.is_empty() && !keys.contains(&candidate) {
                keys.push(candidate);
            }
        }
    }
    keys
}

/// Normalize a URL for index lookups: case, scheme and trailing slash
/// are not significant.
pub fn url_key(url: &str) -> String {
    let lower = url.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    without_scheme.trim_end_matches('/').to_string()
}
