//! License text identification backed by askalono
//!
//! Wraps askalono's bigram-based Sørensen–Dice scoring to identify license
//! texts from their content. The store is built from the canonical texts
//! the registry carries, so every id the matcher returns is a registry id.
//!
//! Two thresholds apply:
//!  - discovery (`match_ids`): is this text recognizably one of our
//!    licenses? Tolerates headers, copyright lines, re-wrapping.
//!  - verification (`is_standard_text`): is this a faithful copy of one
//!    specific license?

use crate::license::{LicenseId, Registry};
use sha2::{Digest, Sha256};
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Default discovery threshold
pub const MATCH_THRESHOLD: f32 = 0.80;

/// Default verification threshold
pub const VERIFY_THRESHOLD: f32 = 0.95;

/// Templates scoring within this distance of the best match are reported
/// alongside it
const TIE_EPSILON: f32 = 0.005;

// ─── Types ─────────────────────────────────────────────────────────

/// Best match for a text
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub id: LicenseId,
    /// askalono's Sørensen–Dice score (0.0-1.0)
    pub score: f32,
}

pub struct TextMatcher {
    store: askalono::Store,
    templates: BTreeMap<String, askalono::TextData>,
    match_threshold: f32,
    verify_threshold: f32,
    /// SHA-256 of text → matched ids, one cell per text so concurrent
    /// callers with the same text share a single analysis
    memo: Mutex<HashMap<String, Arc<OnceCell<Vec<LicenseId>>>>>,
    analyses: AtomicUsize,
}

impl TextMatcher {
    pub fn new(registry: &Registry) -> Self {
        Self::with_thresholds(registry, MATCH_THRESHOLD, VERIFY_THRESHOLD)
    }

    pub fn with_thresholds(registry: &Registry, match_threshold: f32, verify_threshold: f32) -> Self {
        let mut store = askalono::Store::new();
        let mut templates = BTreeMap::new();

        for entry in registry.entries() {
            if let Some(text) = &entry.text {
                let data = askalono::TextData::from(text.as_str());
                store.add_license(entry.id.0.clone(), data.clone());
                templates.insert(entry.id.0.clone(), data);
            }
        }

        tracing::debug!("Text matcher loaded {} license templates", templates.len());

        Self {
            store,
            templates,
            match_threshold,
            verify_threshold,
            memo: Mutex::new(HashMap::new()),
            analyses: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    // ─── Core Functions ────────────────────────────────────────────

    /// Best scoring template, if any template is loaded
    pub fn best_match(&self, text: &str) -> Option<TextMatch> {
        if text.trim().is_empty() || self.store.is_empty() {
            return None;
        }
        let data = askalono::TextData::from(text);
        let result = self.store.analyze(&data);
        Some(TextMatch {
            id: LicenseId::new(result.name),
            score: result.score,
        })
    }

    /// Ids of every template the text matches, sorted. Blank text or a
    /// best score under the discovery threshold yields nothing. Results
    /// are memoized per text.
    pub fn match_ids(&self, text: &str) -> Vec<LicenseId> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let cell = self
            .memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(hash_text(text))
            .or_default()
            .clone();
        cell.get_or_init(|| self.compute_ids(text)).clone()
    }

    /// Number of distinct texts analyzed so far
    pub fn analyses(&self) -> usize {
        self.analyses.load(Ordering::Relaxed)
    }

    fn compute_ids(&self, text: &str) -> Vec<LicenseId> {
        self.analyses.fetch_add(1, Ordering::Relaxed);
        let best = match self.best_match(text) {
            Some(best) if best.score >= self.match_threshold => best,
            Some(best) => {
                tracing::debug!("Best text match {} at {:.3} is below threshold", best.id, best.score);
                return Vec::new();
            }
            None => return Vec::new(),
        };

        let data = askalono::TextData::from(text);
        let mut ids: Vec<LicenseId> = self
            .templates
            .iter()
            .filter(|(id, template)| {
                *id == best.id.as_str() || {
                    let score = template.match_score(&data);
                    score >= self.match_threshold && best.score - score <= TIE_EPSILON
                }
            })
            .map(|(id, _)| LicenseId::new(id.clone()))
            .collect();
        ids.sort();

        tracing::debug!("Text matched {:?} (best {:.3})", ids, best.score);
        ids
    }

    /// Strict check that `text` is a faithful copy of license `id`
    pub fn is_standard_text(&self, id: &str, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        match self.templates.get(id) {
            Some(template) => {
                let score = template.match_score(&askalono::TextData::from(text));
                tracing::debug!("{} verification score {:.3}", id, score);
                score >= self.verify_threshold
            }
            None => false,
        }
    }
}

/// Hash text content with SHA-256
fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
