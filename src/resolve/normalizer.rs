//! Signal normalizer: one raw signal → one expression
//!
//! Attempts, first success wins:
//! 1. registry lookup of the name (ids, names, aliases, version variants)
//! 2. the name parsed as an expression, accepted only if fully identified
//! 3. every URL through the [`UrlResolver`], folded into one expression
//! 4. an `Unresolved` placeholder carrying the name and every URL
//!
//! A lone URL that identifies nothing keeps its own result, which carries
//! the extracted text.

use super::merger;
use super::UrlResolver;
use crate::ingest::RawSignal;
use crate::license::{Expression, Registry};
use futures::future::join_all;
use std::sync::Arc;

pub struct SignalNormalizer {
    registry: Arc<Registry>,
    urls: Arc<UrlResolver>,
}

impl SignalNormalizer {
    pub fn new(registry: Arc<Registry>, urls: Arc<UrlResolver>) -> Self {
        Self { registry, urls }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn url_resolver(&self) -> &UrlResolver {
        &self.urls
    }

    pub async fn normalize(&self, signal: &RawSignal) -> Expression {
        let name = signal.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

        if let Some(name) = name {
            if let Some(named) = self.by_name(name) {
                return named;
            }
        }

        if !signal.urls.is_empty() {
            let resolved = join_all(signal.urls.iter().map(|url| self.urls.resolve(name, url))).await;
            if resolved.len() == 1 || resolved.iter().any(Expression::is_partially_identified) {
                return merger::to_expression(resolved);
            }
        }

        if let Some(name) = name {
            tracing::warn!("Unrecognized license name {:?}", name);
        }
        Expression::unresolved(name.unwrap_or(""), "", signal.urls.clone())
    }

    /// Normalize several signals concurrently, keeping their order
    pub async fn normalize_all(&self, signals: &[RawSignal]) -> Vec<Expression> {
        join_all(signals.iter().map(|signal| self.normalize(signal))).await
    }

    fn by_name(&self, name: &str) -> Option<Expression> {
        if let Some(entry) = self.registry.lookup(name) {
            return Some(Expression::Single(entry.id.clone()));
        }
        match self.registry.parse_expression(name) {
            Ok(parsed) if parsed.is_fully_identified() => Some(parsed),
            Ok(_) => None,
            Err(error) => {
                tracing::debug!("{:?} is not an expression: {}", name, error);
                None
            }
        }
    }
}
