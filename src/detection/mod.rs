//! Detection: identifying licenses from their text

pub mod license_identifier;

pub use license_identifier::{TextMatch, TextMatcher, MATCH_THRESHOLD, VERIFY_THRESHOLD};
