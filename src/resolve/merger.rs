//! Expression merger
//!
//! Two ways of combining per-signal expressions:
//!
//! - [`to_expression`] folds independent witnesses into a disjunction
//!   ("any of these may apply").
//! - [`select_best`] arbitrates between signal groups for the same artifact
//!   (declared vs. scanned) that would otherwise produce spurious
//!   disjunctions when unioned.

use crate::license::Expression;
use std::cmp::Reverse;

/// One expression unchanged; anything else becomes a deduplicated, sorted
/// `OR` set (a set of one collapses to its member).
pub fn to_expression(expressions: impl IntoIterator<Item = Expression>) -> Expression {
    let mut expressions: Vec<Expression> = expressions.into_iter().collect();
    if expressions.len() == 1 {
        return expressions.remove(0);
    }
    Expression::any_of(expressions)
}

/// Sort key of the sieve; the smaller key is the more trustworthy witness.
///
/// In priority order: not a bare URL, not raw extracted text, not
/// unresolved, fully identified, not a set, more licenses, has an
/// exception, is or-later, partially identified.
pub type SieveKey = (bool, bool, bool, bool, bool, Reverse<usize>, bool, bool, bool);

pub fn sieve_key(expression: &Expression) -> SieveKey {
    let (url_only, extracted_text) = match expression {
        Expression::Unresolved(unresolved) => (
            unresolved.raw_text.trim().is_empty() && !unresolved.source_urls.is_empty(),
            !unresolved.raw_text.trim().is_empty(),
        ),
        _ => (false, false),
    };
    (
        url_only,
        extracted_text,
        expression.is_unresolved(),
        !expression.is_fully_identified(),
        expression.is_set(),
        Reverse(expression.count()),
        !expression.is_with_exception(),
        !expression.is_or_later(),
        !expression.is_partially_identified(),
    )
}

/// The more trustworthy of two candidates; `first` wins ties
pub fn sieve<'a>(first: &'a Expression, second: &'a Expression) -> &'a Expression {
    if sieve_key(second) < sieve_key(first) {
        second
    } else {
        first
    }
}

/// Pick the result for an artifact from independent signal groups.
/// `groups[0]` is the declared baseline; later groups are discovered
/// evidence.
///
/// 1. A later group whose fully identified members are at least as many
///    as the baseline's distinct members (or cover the same number of
///    licenses) replaces the baseline outright. The group with the most
///    such witnesses wins; ties go to the later group.
/// 2. Otherwise candidates are paired by position and the sieve keeps the
///    better of each pair.
pub fn select_best(groups: &[Vec<Expression>]) -> Expression {
    let Some((baseline, discovered)) = groups.split_first() else {
        return Expression::none();
    };
    let baseline = distinct(baseline.iter());
    let baseline_count: usize = baseline.iter().map(Expression::count).sum();

    let mut best: Option<Vec<Expression>> = None;
    for group in discovered {
        let witnesses = distinct(
            group
                .iter()
                .filter(|e| !e.is_empty() && e.is_fully_identified()),
        );
        if witnesses.is_empty() {
            continue;
        }
        let witness_count: usize = witnesses.iter().map(Expression::count).sum();
        let qualifies = witnesses.len() >= baseline.len() || witness_count == baseline_count;
        if qualifies && best.as_ref().map_or(true, |b| witnesses.len() >= b.len()) {
            best = Some(witnesses);
        }
    }
    if let Some(witnesses) = best {
        return to_expression(witnesses);
    }

    let width = groups
        .iter()
        .map(Vec::len)
        .find(|len| *len > 0)
        .unwrap_or(0);
    let selected: Vec<Expression> = (0..width)
        .filter_map(|position| {
            groups
                .iter()
                .filter_map(|group| group.get(position))
                .min_by(|a, b| sieve_key(a).cmp(&sieve_key(b)))
                .cloned()
        })
        .collect();
    to_expression(selected)
}

fn distinct<'a>(expressions: impl Iterator<Item = &'a Expression>) -> Vec<Expression> {
    let mut out: Vec<Expression> = Vec::new();
    for expression in expressions {
        if !out.contains(expression) {
            out.push(expression.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(id: &str) -> Expression {
        Expression::single(id)
    }

    fn unresolved_url(url: &str) -> Expression {
        Expression::unresolved("", "", vec![url.to_string()])
    }

    #[test]
    fn test_to_expression_single_is_unchanged() {
        let expression = Expression::all_of([single("MIT"), single("BSD-3-Clause")]);
        assert_eq!(to_expression([expression.clone()]), expression);
    }

    #[test]
    fn test_to_expression_dedups_and_sorts() {
        let merged = to_expression([single("MIT"), single("Apache-2.0"), single("MIT")]);
        assert_eq!(merged.to_string(), "(Apache-2.0 OR MIT)");
        assert_eq!(to_expression([single("MIT"), single("MIT")]).to_string(), "MIT");
        assert!(to_expression(Vec::new()).is_empty());
    }

    #[test]
    fn test_sieve_order() {
        let text = Expression::unresolved("Foo", "Some license text", vec![]);
        let url = unresolved_url("https://a.test/L");
        let named = Expression::unresolved("Foo", "", vec![]);
        let set = Expression::any_of([single("MIT"), single("Apache-2.0")]);
        let exception = Expression::with_exception(single("GPL-2.0-only"), "Classpath-exception-2.0");
        let later = Expression::or_later(single("GPL-2.0-only"));

        assert_eq!(sieve(&url, &text), &text);
        assert_eq!(sieve(&text, &named), &named);
        assert_eq!(sieve(&named, &single("MIT")), &single("MIT"));
        assert_eq!(sieve(&set, &single("MIT")), &single("MIT"));
        assert_eq!(sieve(&single("MIT"), &exception), &exception);
        assert_eq!(sieve(&single("MIT"), &later), &later);
        // Identical keys keep the first.
        assert_eq!(sieve(&single("MIT"), &single("ISC")), &single("MIT"));
    }

    #[test]
    fn test_sieve_prefers_more_licenses_among_sets() {
        let two = Expression::any_of([single("MIT"), single("ISC")]);
        let three = Expression::any_of([single("MIT"), single("ISC"), single("Zlib")]);
        assert_eq!(sieve(&two, &three), &three);
    }

    #[test]
    fn test_declared_kept_when_scan_unresolved() {
        let declared = vec![single("Apache-2.0")];
        let scanned = vec![Expression::unresolved("", "unknown text", vec!["file:///x/LICENSE".into()])];
        assert_eq!(select_best(&[declared, scanned]), single("Apache-2.0"));
    }

    #[test]
    fn test_fully_identified_scan_replaces_declared() {
        let declared = vec![Expression::unresolved("Apache 2", "", vec![])];
        let scanned = vec![single("Apache-2.0")];
        assert_eq!(select_best(&[declared, scanned]), single("Apache-2.0"));
    }

    #[test]
    fn test_smaller_scan_does_not_replace_declared() {
        let declared = vec![single("MIT"), single("Apache-2.0")];
        let scanned = vec![single("Apache-2.0")];
        assert_eq!(select_best(&[declared, scanned]).to_string(), "(Apache-2.0 OR MIT)");
    }

    #[test]
    fn test_scan_with_same_license_count_replaces_declared() {
        let declared = vec![single("MIT"), unresolved_url("https://a.test/L")];
        let scanned = vec![Expression::any_of([single("MIT"), single("ISC")])];
        assert_eq!(select_best(&[declared, scanned]).to_string(), "(ISC OR MIT)");
    }

    #[test]
    fn test_pairwise_sieve() {
        let declared = vec![unresolved_url("https://a.test/L"), single("MIT")];
        let scanned = vec![Expression::unresolved("", "text", vec!["file:///LICENSE".into()])];
        let result = select_best(&[declared, scanned]);
        assert!(result.is_set());
        assert!(result.to_string().contains("MIT"));
        assert_eq!(result.count(), 2);
    }

    #[test]
    fn test_no_evidence_is_none() {
        assert!(select_best(&[]).is_empty());
        assert!(select_best(&[vec![], vec![]]).is_empty());
    }

    #[test]
    fn test_scan_only() {
        let scanned = vec![Expression::unresolved("", "text", vec!["file:///LICENSE".into()])];
        let result = select_best(&[vec![], scanned.clone()]);
        assert_eq!(result, scanned[0]);
    }
}
