//! Per-artifact resolution: signal groups → one expression

use super::merger;
use super::SignalNormalizer;
use crate::ingest::{ArtifactSignals, RawSignal};
use crate::license::Expression;
use std::sync::Arc;

/// Intermediate candidates kept for diagnostics
#[derive(Debug, Clone)]
pub struct Resolution {
    pub declared: Vec<RawSignal>,
    pub bundle: Vec<RawSignal>,
    pub parsed: Vec<Expression>,
    pub scanned: Vec<Expression>,
    pub license: Expression,
}

pub struct ArtifactResolver {
    normalizer: Arc<SignalNormalizer>,
}

impl ArtifactResolver {
    pub fn new(normalizer: Arc<SignalNormalizer>) -> Self {
        Self { normalizer }
    }

    pub async fn resolve(&self, key: &str, signals: &ArtifactSignals) -> Expression {
        self.resolve_detailed(key, signals).await.license
    }

    /// Resolve and keep every candidate group.
    ///
    /// Declared signals fall back to the bundle header when metadata
    /// declares nothing. Scanned evidence (bundle header plus license files)
    /// that never got past a bare URL is dropped.
    pub async fn resolve_detailed(&self, key: &str, signals: &ArtifactSignals) -> Resolution {
        let bundle = signals.bundle_signals();
        let files = signals.file_signals();

        let mut declared = signals.declared_signals();
        if declared.is_empty() {
            declared = bundle.clone();
        }

        let scan_inputs: Vec<RawSignal> = bundle.iter().cloned().chain(files).collect();
        let (parsed, scanned) = futures::join!(
            self.normalizer.normalize_all(&declared),
            self.normalizer.normalize_all(&scan_inputs)
        );
        let scanned: Vec<Expression> = scanned.into_iter().filter(|e| !is_bare_url(e)).collect();

        if declared.is_empty() && scanned.is_empty() {
            tracing::warn!("{}: no license(s) specified or found", key);
        }

        let license = merger::select_best(&[parsed.clone(), scanned.clone()]);

        let resolution = Resolution {
            declared,
            bundle,
            parsed,
            scanned,
            license,
        };
        if !resolution.license.is_empty() && !resolution.license.is_fully_identified() {
            tracing::warn!("{}: license not fully identified\n{}", key, resolution.dump());
        }
        resolution
    }
}

impl Resolution {
    /// Multi-line dump of every candidate group
    pub fn dump(&self) -> String {
        let signals = |group: &[RawSignal]| {
            group
                .iter()
                .map(|s| format!("{}{:?}", s.name.as_deref().unwrap_or(""), s.urls))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let expressions = |group: &[Expression]| {
            group
                .iter()
                .map(Expression::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "  declared: [{}]\n  bundle:   [{}]\n  parsed:   [{}]\n  scanned:  [{}]\n  license:  {}",
            signals(&self.declared),
            signals(&self.bundle),
            expressions(&self.parsed),
            expressions(&self.scanned),
            self.license
        )
    }
}

fn is_bare_url(expression: &Expression) -> bool {
    match expression {
        Expression::Unresolved(unresolved) => {
            unresolved.raw_id.trim().is_empty()
                && unresolved.raw_text.trim().is_empty()
                && !unresolved.source_urls.is_empty()
        }
        _ => false,
    }
}
