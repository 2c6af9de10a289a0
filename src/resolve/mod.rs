//! Resolution: raw signals → canonical expressions
//!
//! ```text
//!  RawSignal ──▶ SignalNormalizer ──▶ Registry (names, expressions)
//!                      │
//!                      └──▶ UrlResolver ──▶ Fetcher ──▶ TextMatcher
//!
//!  [declared] [scanned] ──▶ merger::select_best ──▶ Expression
//! ```

pub mod artifact;
pub mod merger;
pub mod normalizer;
pub mod url_resolver;

pub use artifact::{ArtifactResolver, Resolution};
pub use merger::{select_best, to_expression};
pub use normalizer::SignalNormalizer;
pub use url_resolver::{UrlResolver, DEFAULT_MAX_REDIRECTS};
