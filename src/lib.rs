//! # license-resolver: Artifact License Resolution Engine
//!
//! Resolves the license of third-party software artifacts into canonical
//! SPDX-style expressions. Evidence comes from three noisy sources: license
//! names and URLs declared in published metadata, a bundle-license header
//! in the archive manifest, and license files found inside the archive.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        LicenseEngine                          │
//! │  ┌──────────────┐   ┌──────────────────────────────────────┐  │
//! │  │ SignalSource │──▶│ ResolutionCatalog (single-flight,    │  │
//! │  │ (extraction) │   │ durable JSON store, worker pool)     │  │
//! │  └──────────────┘   └─────────────────┬────────────────────┘  │
//! │                                       │                       │
//! │  ┌────────────────────────────────────▼────────────────────┐  │
//! │  │ ArtifactResolver: declared │ bundle │ license files     │  │
//! │  │        └──▶ SignalNormalizer ──▶ merger::select_best    │  │
//! │  └──────────┬──────────────────────────────┬───────────────┘  │
//! │             │                              │                  │
//! │  ┌──────────▼──────────┐        ┌──────────▼───────────────┐  │
//! │  │ Registry (aliases,  │        │ UrlResolver (redirects,  │  │
//! │  │ URLs, expressions)  │        │ canonical links, memo)   │  │
//! │  └─────────────────────┘        └──────────┬───────────────┘  │
//! │                                 ┌──────────▼───────────────┐  │
//! │                                 │ Fetcher ─▶ TextMatcher   │  │
//! │                                 └──────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything that cannot be identified survives as an `Unresolved` leaf
//! (rendered `LicenseRef-…`) carrying its raw name, text and source URLs.

pub mod license;
pub mod detection;
pub mod fetch;
pub mod resolve;
pub mod ingest;
pub mod engine;

// Re-exports for convenience
pub use license::{Expression, LicenseEntry, LicenseId, Operator, Registry, UnresolvedLicense};
pub use detection::TextMatcher;
pub use fetch::{FetchError, FetchedDocument, Fetcher, HttpFetcher};
pub use resolve::{ArtifactResolver, Resolution, SignalNormalizer, UrlResolver};
pub use ingest::{ArtifactKey, ArtifactSignals, DeclaredLicense, RawSignal, SignalKind, SignalSource, StaticSignalSource};
pub use engine::{EngineConfig, LicenseEngine, ResolutionCatalog};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("License corpus error: {0}")]
    Corpus(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Expression parse error: {0}")]
    Parse(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type ResolverResult<T> = Result<T, ResolverError>;
