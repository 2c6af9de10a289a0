//! License corpus: the data the registry is built from
//!
//! The bundled corpus is compiled into the binary. An operator can point
//! `corpus_dir` at a directory with the same layout to replace it:
//!
//! ```text
//! <dir>/licenses.json        SPDX-style license list (required)
//! <dir>/licenses-full.json   alternate ids, names and URIs (optional)
//! <dir>/aliases.toml         [aliases] name = "id" (optional)
//! <dir>/seeds.toml           [seeds] "expression" = [urls] (optional)
//! <dir>/redirects.toml       [[redirects]] pattern/replacement (optional)
//! <dir>/text/<id>.txt        canonical license texts (optional)
//! <dir>/details/<id>.json     SPDX license details with `licenseText` (optional)
//! ```
//!
//! The `json/` directory of SPDX's license-list-data already has this
//! layout, so pointing `corpus_dir` at it loads the complete license list
//! with every standard text.

use crate::{ResolverError, ResolverResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ─── Corpus Formats ─────────────────────────────────────────────────

/// SPDX license list document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseList {
    #[serde(default)]
    pub license_list_version: Option<String>,
    pub licenses: Vec<ListedLicense>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedLicense {
    pub license_id: String,
    pub name: String,
    #[serde(default)]
    pub see_also: Vec<String>,
    #[serde(default)]
    pub is_deprecated_license_id: bool,
}

/// One SPDX license details document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseDetails {
    pub license_id: String,
    #[serde(default)]
    pub license_text: Option<String>,
}

/// Secondary corpus: other ids, names and URIs for listed licenses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlternateList {
    #[serde(default)]
    pub licenses: Vec<AlternateLicense>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlternateLicense {
    pub id: String,
    #[serde(default)]
    pub identifiers: AlternateIdentifiers,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub other_names: Vec<String>,
    #[serde(default)]
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlternateIdentifiers {
    #[serde(default)]
    pub spdx: Vec<String>,
}

impl AlternateLicense {
    /// The registry id this record describes
    pub fn spdx_id(&self) -> Option<&str> {
        self.identifiers.spdx.first().map(String::as_str)
    }
}

/// A URL rewrite rule; `pattern` must match the whole URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRedirect {
    pub pattern: String,
    pub replacement: String,
}

/// Alias, seed and redirect tables. Each TOML file fills one part.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorpusTables {
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub seeds: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub redirects: Vec<UrlRedirect>,
}

impl CorpusTables {
    /// Layer `other` on top of `self`; later aliases and seeds win
    pub fn extend(&mut self, other: CorpusTables) {
        self.aliases.extend(other.aliases);
        for (expression, urls) in other.seeds {
            self.seeds.entry(expression).or_default().extend(urls);
        }
        self.redirects.extend(other.redirects);
    }
}

// ─── Corpus ─────────────────────────────────────────────────────────

/// Everything needed to build a [`crate::license::Registry`]
#[derive(Debug, Clone)]
pub struct Corpus {
    pub list: LicenseList,
    pub alternates: AlternateList,
    pub tables: CorpusTables,
    /// Canonical texts by license id
    pub texts: BTreeMap<String, String>,
}

const LICENSES_JSON: &str = include_str!("../../resources/licenses.json");
const LICENSES_FULL_JSON: &str = include_str!("../../resources/licenses-full.json");
const ALIASES_TOML: &str = include_str!("../../resources/aliases.toml");
const SEEDS_TOML: &str = include_str!("../../resources/seeds.toml");
const REDIRECTS_TOML: &str = include_str!("../../resources/redirects.toml");

const BUNDLED_TEXTS: &[(&str, &str)] = &[
    ("Apache-2.0", include_str!("../../resources/text/Apache-2.0.txt")),
    ("Artistic-1.0-Perl", include_str!("../../resources/text/Artistic-1.0-Perl.txt")),
    ("BSD-2-Clause", include_str!("../../resources/text/BSD-2-Clause.txt")),
    ("BSD-3-Clause", include_str!("../../resources/text/BSD-3-Clause.txt")),
    ("BSL-1.0", include_str!("../../resources/text/BSL-1.0.txt")),
    ("CC0-1.0", include_str!("../../resources/text/CC0-1.0.txt")),
    ("GFDL-1.2-only", include_str!("../../resources/text/GFDL-1.2-only.txt")),
    ("GFDL-1.3-only", include_str!("../../resources/text/GFDL-1.3-only.txt")),
    ("GPL-1.0-only", include_str!("../../resources/text/GPL-1.0-only.txt")),
    ("GPL-2.0-only", include_str!("../../resources/text/GPL-2.0-only.txt")),
    ("GPL-3.0-only", include_str!("../../resources/text/GPL-3.0-only.txt")),
    ("ISC", include_str!("../../resources/text/ISC.txt")),
    ("LGPL-2.0-only", include_str!("../../resources/text/LGPL-2.0-only.txt")),
    ("LGPL-2.1-only", include_str!("../../resources/text/LGPL-2.1-only.txt")),
    ("LGPL-3.0-only", include_str!("../../resources/text/LGPL-3.0-only.txt")),
    ("MIT", include_str!("../../resources/text/MIT.txt")),
    ("MPL-1.1", include_str!("../../resources/text/MPL-1.1.txt")),
    ("MPL-2.0", include_str!("../../resources/text/MPL-2.0.txt")),
    ("Unlicense", include_str!("../../resources/text/Unlicense.txt")),
    ("Zlib", include_str!("../../resources/text/Zlib.txt")),
];

impl Corpus {
    /// The corpus compiled into the crate
    pub fn bundled() -> ResolverResult<Self> {
        let list = parse_list(LICENSES_JSON, "bundled licenses.json")?;
        let alternates = parse_alternates(LICENSES_FULL_JSON, "bundled licenses-full.json")?;

        let mut tables = CorpusTables::default();
        for (source, name) in [
            (ALIASES_TOML, "aliases.toml"),
            (SEEDS_TOML, "seeds.toml"),
            (REDIRECTS_TOML, "redirects.toml"),
        ] {
            tables.extend(parse_tables(source, name)?);
        }

        let texts = BUNDLED_TEXTS
            .iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect();

        Ok(Self {
            list,
            alternates,
            tables,
            texts,
        })
    }

    /// Load a corpus directory (see module docs for the layout)
    pub fn from_dir(dir: &Path) -> ResolverResult<Self> {
        let list_path = dir.join("licenses.json");
        let content = std::fs::read_to_string(&list_path).map_err(|e| {
            ResolverError::Corpus(format!("Failed to read {}: {}", list_path.display(), e))
        })?;
        let list = parse_list(&content, &list_path.display().to_string())?;

        let full_path = dir.join("licenses-full.json");
        let alternates = if full_path.exists() {
            let content = std::fs::read_to_string(&full_path)?;
            parse_alternates(&content, &full_path.display().to_string())?
        } else {
            AlternateList::default()
        };

        let mut tables = CorpusTables::default();
        for name in ["aliases.toml", "seeds.toml", "redirects.toml"] {
            let path = dir.join(name);
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                tables.extend(parse_tables(&content, &path.display().to_string())?);
            }
        }

        let mut texts = BTreeMap::new();
        let text_dir = dir.join("text");
        if text_dir.is_dir() {
            for entry in std::fs::read_dir(&text_dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                    continue;
                }
                if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                    texts.insert(id.to_string(), std::fs::read_to_string(&path)?);
                }
            }
        }

        let details_dir = dir.join("details");
        if details_dir.is_dir() {
            for (id, text) in read_details(&details_dir)? {
                texts.entry(id).or_insert(text);
            }
        }

        tracing::info!(
            "Loaded license corpus from {} ({} licenses, {} texts)",
            dir.display(),
            list.licenses.len(),
            texts.len()
        );

        Ok(Self {
            list,
            alternates,
            tables,
            texts,
        })
    }
}

/// Texts from a directory of SPDX details documents. Unreadable or
/// text-less documents are skipped.
fn read_details(dir: &Path) -> ResolverResult<Vec<(String, String)>> {
    let mut texts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<LicenseDetails>(&content) {
            Ok(LicenseDetails {
                license_id,
                license_text: Some(text),
            }) if !text.trim().is_empty() => texts.push((license_id, text)),
            Ok(_) => tracing::debug!("{} carries no license text", path.display()),
            Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(texts)
}

fn parse_list(content: &str, source: &str) -> ResolverResult<LicenseList> {
    let list: LicenseList = serde_json::from_str(content)
        .map_err(|e| ResolverError::Corpus(format!("Failed to parse {}: {}", source, e)))?;
    if list.licenses.is_empty() {
        return Err(ResolverError::Corpus(format!("{} lists no licenses", source)));
    }
    Ok(list)
}

fn parse_alternates(content: &str, source: &str) -> ResolverResult<AlternateList> {
    serde_json::from_str(content)
        .map_err(|e| ResolverError::Corpus(format!("Failed to parse {}: {}", source, e)))
}

fn parse_tables(content: &str, source: &str) -> ResolverResult<CorpusTables> {
    toml::from_str(content)
        .map_err(|e| ResolverError::Corpus(format!("Failed to parse {}: {}", source, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_corpus_loads() {
        let corpus = Corpus::bundled().unwrap();
        assert!(corpus.list.licenses.iter().any(|l| l.license_id == "Apache-2.0"));
        assert!(corpus.texts.contains_key("MIT"));
        assert!(!corpus.tables.aliases.is_empty());
        assert!(!corpus.tables.seeds.is_empty());
        assert!(!corpus.tables.redirects.is_empty());
    }

    #[test]
    fn test_every_bundled_text_is_listed() {
        let corpus = Corpus::bundled().unwrap();
        for id in corpus.texts.keys() {
            assert!(
                corpus.list.licenses.iter().any(|l| &l.license_id == id),
                "{} has a text but no list entry",
                id
            );
        }
    }

    #[test]
    fn test_common_copyleft_texts_are_bundled() {
        let corpus = Corpus::bundled().unwrap();
        for id in ["GPL-2.0-only", "GPL-3.0-only", "LGPL-2.1-only", "LGPL-3.0-only", "MPL-2.0"] {
            assert!(corpus.texts.contains_key(id), "{}", id);
        }
    }

    #[test]
    fn test_from_dir_reads_spdx_details() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("licenses.json"),
            r#"{"licenseListVersion":"3.21","licenses":[
                {"licenseId":"MIT","name":"MIT License","seeAlso":[]},
                {"licenseId":"ISC","name":"ISC License","seeAlso":[]}]}"#,
        )
        .unwrap();
        let details = dir.path().join("details");
        std::fs::create_dir(&details).unwrap();
        std::fs::write(
            details.join("MIT.json"),
            r#"{"licenseId":"MIT","licenseText":"Permission is hereby granted","isDeprecatedLicenseId":false}"#,
        )
        .unwrap();
        std::fs::write(details.join("ISC.json"), r#"{"licenseId":"ISC"}"#).unwrap();
        std::fs::write(details.join("broken.json"), "{").unwrap();

        let corpus = Corpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.list.license_list_version.as_deref(), Some("3.21"));
        assert_eq!(corpus.texts.get("MIT").map(String::as_str), Some("Permission is hereby granted"));
        assert!(!corpus.texts.contains_key("ISC"));
    }

    #[test]
    fn test_from_dir_requires_license_list() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Corpus::from_dir(dir.path()), Err(ResolverError::Corpus(_))));
    }

    #[test]
    fn test_from_dir_reads_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("licenses.json"),
            r#"{"licenses":[{"licenseId":"MIT","name":"MIT License","seeAlso":[]}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("aliases.toml"), "[aliases]\n\"Expat\" = \"MIT\"\n").unwrap();
        std::fs::create_dir(dir.path().join("text")).unwrap();
        std::fs::write(dir.path().join("text").join("MIT.txt"), "Permission is hereby granted").unwrap();

        let corpus = Corpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.list.licenses.len(), 1);
        assert_eq!(corpus.tables.aliases.get("Expat").map(String::as_str), Some("MIT"));
        assert!(corpus.texts.contains_key("MIT"));
        assert!(corpus.alternates.licenses.is_empty());
    }
}
