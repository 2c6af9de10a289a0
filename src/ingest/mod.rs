//! Ingestion: raw license evidence for an artifact
//!
//! An artifact's evidence comes from three places:
//!
//! ```text
//!  published metadata ──▶ declared (name, url) pairs ──┐
//!  archive manifest   ──▶ Bundle-License header ───────┼──▶ RawSignal*
//!  archive contents   ──▶ LICENSE / about.html files ──┘
//! ```
//!
//! Fetching metadata and unpacking archives belongs to the caller; it
//! hands the results over through [`SignalSource`]. [`scan_extracted`]
//! covers the common case of an archive already unpacked on disk.

pub mod manifest;

pub use manifest::{manifest_header, scan_extracted, BUNDLE_LICENSE};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ─── Signals ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// From published metadata
    Declared,
    /// From the archive's bundle-license header
    Bundle,
    /// A license file found inside the archive
    Scanned,
}

/// One piece of license evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignal {
    pub kind: SignalKind,
    pub name: Option<String>,
    pub urls: Vec<String>,
}

impl RawSignal {
    pub fn new(kind: SignalKind, name: Option<&str>, urls: Vec<String>) -> Self {
        Self {
            kind,
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            urls: urls
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
        }
    }

    pub fn declared(name: Option<&str>, urls: Vec<String>) -> Self {
        Self::new(SignalKind::Declared, name, urls)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.urls.is_empty()
    }
}

/// A license as published in metadata: a name, a URL, or both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredLicense {
    pub name: Option<String>,
    pub url: Option<String>,
}

impl DeclaredLicense {
    pub fn new(name: Option<&str>, url: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            url: url.map(str::to_string),
        }
    }

    pub fn named(name: &str) -> Self {
        Self::new(Some(name), None)
    }
}

/// Everything the extraction collaborator knows about one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSignals {
    /// Base URL of the archive; relative URLs are resolved against it
    pub archive_url: Option<String>,
    pub declared: Vec<DeclaredLicense>,
    pub bundle_header: Option<String>,
    /// Paths of entries inside the archive
    pub license_files: Vec<String>,
}

impl ArtifactSignals {
    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
            && self.bundle_header.as_deref().map_or(true, |h| h.trim().is_empty())
            && self.license_files.is_empty()
    }

    pub fn declared_signals(&self) -> Vec<RawSignal> {
        let base = self.archive_url.as_deref();
        self.declared
            .iter()
            .map(|declared| {
                let urls = declared
                    .url
                    .as_deref()
                    .map(|field| split_url_field(field).map(|u| resolve_relative(base, u)).collect())
                    .unwrap_or_default();
                RawSignal::declared(declared.name.as_deref(), urls)
            })
            .filter(|signal| !signal.is_empty())
            .collect()
    }

    pub fn bundle_signals(&self) -> Vec<RawSignal> {
        self.bundle_header
            .as_deref()
            .map(|header| parse_bundle_header(header, self.archive_url.as_deref()))
            .unwrap_or_default()
    }

    /// Signals for the entries that look like license files
    pub fn file_signals(&self) -> Vec<RawSignal> {
        let base = self.archive_url.as_deref();
        self.license_files
            .iter()
            .filter(|path| is_license_file(path))
            .map(|path| RawSignal::new(SignalKind::Scanned, None, vec![resolve_relative(base, path)]))
            .collect()
    }
}

// ─── Extraction Boundary ────────────────────────────────────────────

/// Supplies the evidence for an artifact key
pub trait SignalSource: Send + Sync {
    /// Evidence for `key`; an unknown or unreadable artifact yields empty
    /// signals
    fn signals(&self, key: &str) -> ArtifactSignals;
}

/// In-memory source
#[derive(Debug, Clone, Default)]
pub struct StaticSignalSource {
    artifacts: HashMap<String, ArtifactSignals>,
}

impl StaticSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, signals: ArtifactSignals) -> Self {
        self.insert(key, signals);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, signals: ArtifactSignals) {
        self.artifacts.insert(key.into(), signals);
    }
}

impl SignalSource for StaticSignalSource {
    fn signals(&self, key: &str) -> ArtifactSignals {
        self.artifacts.get(key).cloned().unwrap_or_default()
    }
}

// ─── Artifact Keys ──────────────────────────────────────────────────

/// `group:name:version` coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub group: String,
    pub name: String,
    pub version: String,
}

impl ArtifactKey {
    pub fn new(group: &str, name: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)
    }
}

impl FromStr for ArtifactKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [group, name, version] if parts.iter().all(|p| !p.is_empty()) => {
                Ok(Self::new(group, name, version))
            }
            _ => Err(format!("Expected group:name:version, got {:?}", s)),
        }
    }
}

// ─── Parsing Helpers ────────────────────────────────────────────────

static LICENSE_FILE_INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*/|)(LICENSE([.][^/]+)?|about\.html)$").expect("valid regex"));

static LICENSE_FILE_EXCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*[.]class$").expect("valid regex"));

/// Does this archive entry look like a license file?
pub fn is_license_file(path: &str) -> bool {
    let path = path.trim().replace('\\', "/");
    LICENSE_FILE_INCLUDE.is_match(&path) && !LICENSE_FILE_EXCLUDE.is_match(&path)
}

/// Parse a `Bundle-License` header:
/// `name(;attr=value)*(, name(;attr=value)*)*` where `link` names the URL
pub fn parse_bundle_header(header: &str, base: Option<&str>) -> Vec<RawSignal> {
    split_outside_quotes(header, ',')
        .into_iter()
        .filter_map(|entry| {
            let mut parts = split_outside_quotes(entry, ';').into_iter();
            let name = unquote(parts.next()?);
            if name.is_empty() || name == "<<EXTERNAL>>" {
                return None;
            }
            let link = parts.find_map(|attribute| {
                let (key, value) = attribute.split_once('=')?;
                let key = key.trim().trim_end_matches(':');
                key.eq_ignore_ascii_case("link").then(|| unquote(value))
            });

            let signal = match link.filter(|l| !l.is_empty()) {
                Some(link) => RawSignal::new(SignalKind::Bundle, Some(name), vec![resolve_relative(base, link)]),
                None if name.contains("://") => RawSignal::new(SignalKind::Bundle, None, vec![name.to_string()]),
                None => RawSignal::new(SignalKind::Bundle, Some(name), Vec::new()),
            };
            Some(signal)
        })
        .collect()
}

fn split_outside_quotes(input: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if c == separator && !quoted {
            pieces.push(&input[start..i]);
            start = i + c.len_utf8();
        }
    }
    pieces.push(&input[start..]);
    pieces
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"').trim()
}

/// Split a metadata URL field that may hold several URLs
fn split_url_field(field: &str) -> impl Iterator<Item = &str> {
    field
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|u| !u.is_empty())
}

/// Resolve a possibly-relative reference against the archive base URL.
/// Bases that cannot be joined (e.g. `jar:` URLs) are concatenated.
pub fn resolve_relative(base: Option<&str>, reference: &str) -> String {
    let reference = reference.trim();
    if url::Url::parse(reference).is_ok() {
        return reference.to_string();
    }
    let Some(base) = base.map(str::trim).filter(|b| !b.is_empty()) else {
        return reference.to_string();
    };
    if let Ok(joined) = url::Url::parse(base).and_then(|b| b.join(reference)) {
        return joined.to_string();
    }
    let reference = reference.trim_start_matches('/');
    if base.ends_with('/') {
        format!("{}{}", base, reference)
    } else {
        format!("{}/{}", base, reference)
    }
}
