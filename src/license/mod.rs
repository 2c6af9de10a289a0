//! License expression model
//!
//! A resolved license is an expression tree over canonical identifiers:
//!   `MIT`
//!   `GPL-2.0-only WITH Classpath-exception-2.0`
//!   `(Apache-2.0 OR MIT)`
//!   `LicenseRef-FooCorp-Custom-License`
//!
//! Leaves are either registry licenses (`Single`) or placeholders for
//! evidence that could not be identified (`Unresolved`). The tree is
//! immutable once built; set construction canonicalizes member order so
//! equal expressions always render to the same string.

pub mod corpus;
pub mod registry;
pub mod spdx_expression;

pub use registry::{LicenseEntry, Registry};

use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

// ─── License Identity ───────────────────────────────────────────────

/// Canonical license identifier (SPDX where possible)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LicenseId(pub String);

impl LicenseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Expression Tree ────────────────────────────────────────────────

/// Set operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Conjunction: all members apply
    And,
    /// Disjunction: any member may be chosen
    Or,
}

impl Operator {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Evidence of a license that could not be mapped to a registry entry
#[derive(Debug, Clone, Default)]
pub struct UnresolvedLicense {
    /// The name the evidence carried (may be blank)
    pub raw_id: String,
    /// Extracted license text (may be blank)
    pub raw_text: String,
    /// Where the evidence came from
    pub source_urls: Vec<String>,
}

impl UnresolvedLicense {
    pub fn new(raw_id: impl Into<String>, raw_text: impl Into<String>, source_urls: Vec<String>) -> Self {
        Self {
            raw_id: raw_id.into(),
            raw_text: raw_text.into(),
            source_urls,
        }
    }

    /// Reference suffix used in the `LicenseRef-` rendering
    pub fn reference(&self) -> String {
        let sanitized = sanitize_reference(&self.raw_id);
        if !sanitized.is_empty() {
            return sanitized;
        }
        let mut hasher = Sha256::new();
        hasher.update(self.raw_text.as_bytes());
        for url in &self.source_urls {
            hasher.update(b"\n");
            hasher.update(url.as_bytes());
        }
        hex::encode(hasher.finalize())[..12].to_string()
    }
}

/// A license expression
#[derive(Debug, Clone)]
pub enum Expression {
    /// A registry license
    Single(LicenseId),
    /// Conjunctive or disjunctive set, members canonically ordered
    Set {
        operator: Operator,
        members: Vec<Expression>,
    },
    /// A license modified by an exception
    WithException {
        license: Box<Expression>,
        exception: String,
    },
    /// "This version or any later version"
    OrLater(Box<Expression>),
    /// Unidentified evidence
    Unresolved(UnresolvedLicense),
}

/// Rendering of the empty expression
pub const NONE: &str = "NONE";

impl Expression {
    pub fn single(id: impl Into<String>) -> Self {
        Self::Single(LicenseId::new(id))
    }

    pub fn unresolved(raw_id: impl Into<String>, raw_text: impl Into<String>, source_urls: Vec<String>) -> Self {
        Self::Unresolved(UnresolvedLicense::new(raw_id, raw_text, source_urls))
    }

    /// The empty expression (no license at all)
    pub fn none() -> Self {
        Self::Set {
            operator: Operator::Or,
            members: Vec::new(),
        }
    }

    pub fn or_later(license: Expression) -> Self {
        Self::OrLater(Box::new(license))
    }

    pub fn with_exception(license: Expression, exception: impl Into<String>) -> Self {
        Self::WithException {
            license: Box::new(license),
            exception: exception.into(),
        }
    }

    /// Build a set: nested sets with the same operator are flattened,
    /// members deduplicated and sorted, and a single member collapses to
    /// itself.
    pub fn set(operator: Operator, members: impl IntoIterator<Item = Expression>) -> Self {
        let mut flat: Vec<Expression> = Vec::new();
        for member in members {
            match member {
                Expression::Set {
                    operator: inner,
                    members: nested,
                } if inner == operator || nested.is_empty() => flat.extend(nested),
                other => flat.push(other),
            }
        }
        flat.sort();
        flat.dedup();

        if flat.len() == 1 {
            return flat.remove(0);
        }
        Self::Set {
            operator,
            members: flat,
        }
    }

    pub fn any_of(members: impl IntoIterator<Item = Expression>) -> Self {
        Self::set(Operator::Or, members)
    }

    pub fn all_of(members: impl IntoIterator<Item = Expression>) -> Self {
        Self::set(Operator::And, members)
    }

    /// Parse the canonical string form. Plain identifiers become `Single`;
    /// registry validation is `Registry::parse_expression`.
    pub fn parse(input: &str) -> Result<Self, String> {
        spdx_expression::parse(input)
    }

    // ─── Structure ─────────────────────────────────────────────────

    /// Immediate children: set members, or the operand of an operator node
    pub fn children(&self) -> &[Expression] {
        match self {
            Self::Set { members, .. } => members,
            Self::WithException { license, .. } => std::slice::from_ref(license.as_ref()),
            Self::OrLater(license) => std::slice::from_ref(license.as_ref()),
            Self::Single(_) | Self::Unresolved(_) => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Single(_) | Self::Unresolved(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set { .. })
    }

    pub fn is_with_exception(&self) -> bool {
        matches!(self, Self::WithException { .. })
    }

    pub fn is_or_later(&self) -> bool {
        matches!(self, Self::OrLater(_))
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved(_))
    }

    /// True for the empty set
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Pre-order traversal starting at `self`
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Expression> {
        self.walk().filter(|node| node.is_leaf())
    }

    /// Every leaf is a registry license (and there is at least one leaf)
    pub fn is_fully_identified(&self) -> bool {
        let mut leaves = self.leaves().peekable();
        leaves.peek().is_some() && leaves.all(|leaf| matches!(leaf, Self::Single(_)))
    }

    /// At least one leaf is a registry license
    pub fn is_partially_identified(&self) -> bool {
        self.leaves().any(|leaf| matches!(leaf, Self::Single(_)))
    }

    /// Number of licenses: the sum over set members, 1 for anything else
    pub fn count(&self) -> usize {
        match self {
            Self::Set { members, .. } => members.iter().map(Expression::count).sum(),
            _ => 1,
        }
    }

    /// Registry ids referenced anywhere in the tree
    pub fn license_ids(&self) -> Vec<&LicenseId> {
        self.leaves()
            .filter_map(|leaf| match leaf {
                Self::Single(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Rebuild the tree bottom-up, mapping every leaf through `f`
    pub fn map_leaves<F>(&self, f: &mut F) -> Expression
    where
        F: FnMut(&Expression) -> Expression,
    {
        match self {
            Self::Set { operator, members } => {
                Self::set(*operator, members.iter().map(|m| m.map_leaves(f)).collect::<Vec<_>>())
            }
            Self::WithException { license, exception } => {
                Self::with_exception(license.map_leaves(f), exception.clone())
            }
            Self::OrLater(license) => Self::or_later(license.map_leaves(f)),
            leaf => f(leaf),
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Single(id) => out.push_str(id.as_str()),
            Self::Unresolved(unresolved) => {
                out.push_str(spdx_expression::LICENSE_REF_PREFIX);
                out.push_str(&unresolved.reference());
            }
            Self::OrLater(license) => {
                license.render(out);
                out.push('+');
            }
            Self::WithException { license, exception } => {
                license.render(out);
                out.push_str(" WITH ");
                out.push_str(exception);
            }
            Self::Set { members, .. } if members.is_empty() => out.push_str(NONE),
            Self::Set { operator, members } => {
                out.push('(');
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                        out.push_str(operator.keyword());
                        out.push(' ');
                    }
                    member.render(out);
                }
                out.push(')');
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out);
        f.write_str(&out)
    }
}

// Identity is the canonical string form.

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl PartialOrd for Expression {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expression {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl std::str::FromStr for Expression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ─── Traversal ──────────────────────────────────────────────────────

/// Depth-first, pre-order iterator over an expression tree
pub struct Walk<'a> {
    stack: Vec<&'a Expression>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Expression;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// Reduce a raw name to the characters allowed in a `LicenseRef-` suffix
pub fn sanitize_reference(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}
