//! Turns raw matcher output into ordered, de-duplicated diagnostics.

use crate::config::{CheckConfig, Severity};
use crate::rules::{Fix, Match, RuleId};
use crate::syntax::span::{Position, Span};
use crate::syntax::SourceUnit;
use std::cmp::Reverse;

/// A match located in its source file, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub rule: RuleId,
    pub severity: Severity,
    pub span: Span,
    pub start: Position,
    pub end: Position,
    pub message: String,
    pub suggestion: Option<String>,
    pub fix: Option<Fix>,
}

/// Sorts matches by location and keeps one match per span: the one from the
/// most specific rule.
///
/// The result depends only on the set of matches, never on the order the
/// matchers produced them in.
pub fn dedupe(mut matches: Vec<Match>) -> Vec<Match> {
    matches.sort_by(|a, b| {
        (a.span.start, a.span.end, Reverse(a.rule.specificity()), &a.message).cmp(&(
            b.span.start,
            b.span.end,
            Reverse(b.rule.specificity()),
            &b.message,
        ))
    });
    matches.dedup_by(|later, kept| later.span == kept.span);
    matches
}

pub fn report(source: &SourceUnit, matches: Vec<Match>, config: &CheckConfig) -> Vec<Diagnostic> {
    dedupe(matches)
        .into_iter()
        .map(|m| Diagnostic {
            severity: config.severity(m.rule),
            start: source.position(m.span.start),
            end: source.position(m.span.end),
            rule: m.rule,
            span: m.span,
            message: m.message,
            suggestion: m.suggestion,
            fix: m.fix,
        })
        .collect()
}
