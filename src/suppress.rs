//! Inline suppression comments.
//!
//! ```text
//! -- scriptwise: ignore                      (this line and the next, every rule)
//! -- scriptwise: ignore ternary-opportunity  (this line and the next, listed rules)
//! -- scriptwise: ignore-file                 (whole file)
//! ```

use crate::report::Diagnostic;
use crate::rules::RuleId;
use crate::syntax::SourceUnit;
use crate::syntax::lexer::comment_spans;
use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeSet;

/// Finds suppression directives in source text.
pub struct DirectiveScanner {
    directive: Regex,
}

impl DirectiveScanner {
    pub fn new() -> Result<Self, regex::Error> {
        let directive = Regex::new(
            r"^--\s*scriptwise:\s*(ignore-file|ignore)(?:[ \t]+([A-Za-z0-9_-]+(?:[ \t]*,[ \t]*[A-Za-z0-9_-]+)*))?",
        )?;
        Ok(Self { directive })
    }

    /// Directives are read from comments only; text that merely looks like
    /// one inside a string literal is ignored.
    pub fn scan(&self, source: &SourceUnit) -> Suppressions {
        let mut suppressions = Suppressions::default();
        let comments = match comment_spans(source.text()) {
            Ok(comments) => comments,
            Err(e) => {
                debug!("{}: no suppressions read: {}", source.path().display(), e.message);
                return suppressions;
            }
        };
        for span in comments {
            let Some(comment) = source.slice(span) else {
                continue;
            };
            let Some(caps) = self.directive.captures(comment) else {
                continue;
            };
            let Some(kind) = caps.get(1) else {
                continue;
            };
            if kind.as_str() == "ignore-file" {
                suppressions.whole_file = true;
                continue;
            }
            let rules = caps.get(2).map(|list| {
                list.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter_map(|name| match name.parse::<RuleId>() {
                        Ok(rule) => Some(rule),
                        Err(_) => {
                            warn!(
                                "{}: unknown rule '{}' in suppression comment",
                                source.path().display(),
                                name
                            );
                            None
                        }
                    })
                    .collect::<BTreeSet<_>>()
            });
            suppressions.lines.push(LineSuppression {
                line: source.position(span.start).line,
                rules,
            });
        }
        suppressions
    }
}

#[derive(Debug)]
struct LineSuppression {
    line: usize,
    /// `None` silences every rule.
    rules: Option<BTreeSet<RuleId>>,
}

/// Suppression directives found in one file.
#[derive(Debug, Default)]
pub struct Suppressions {
    whole_file: bool,
    lines: Vec<LineSuppression>,
}

impl Suppressions {
    pub fn is_empty(&self) -> bool {
        !self.whole_file && self.lines.is_empty()
    }

    pub fn covers(&self, diagnostic: &Diagnostic) -> bool {
        if self.whole_file {
            return true;
        }
        let line = diagnostic.start.line;
        self.lines.iter().any(|s| {
            (line == s.line || line == s.line + 1)
                && s.rules
                    .as_ref()
                    .map_or(true, |rules| rules.contains(&diagnostic.rule))
        })
    }

    pub fn apply(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        if self.is_empty() {
            return diagnostics;
        }
        diagnostics.into_iter().filter(|d| !self.covers(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Severity;
    use crate::syntax::span::{Position, Span};

    fn diag(rule: RuleId, line: usize) -> Diagnostic {
        Diagnostic {
            rule,
            severity: Severity::Warning,
            span: Span::default(),
            start: Position { line, column: 1 },
            end: Position { line, column: 2 },
            message: String::new(),
            suggestion: None,
            fix: None,
        }
    }

    fn scan(src: &str) -> Suppressions {
        DirectiveScanner::new()
            .unwrap()
            .scan(&SourceUnit::new("t.lua", src))
    }

    #[test]
    fn bare_ignore_covers_line_and_next() {
        let s = scan("a = 1\n-- scriptwise: ignore\nb = 2\nc = 3\n");
        assert!(!s.covers(&diag(RuleId::TernaryOpportunity, 1)));
        assert!(s.covers(&diag(RuleId::TernaryOpportunity, 2)));
        assert!(s.covers(&diag(RuleId::AssumeAndRefute, 3)));
        assert!(!s.covers(&diag(RuleId::TernaryOpportunity, 4)));
    }

    #[test]
    fn trailing_directive_with_rule_list() {
        let s = scan("x = 1 -- scriptwise: ignore ternary-opportunity, assume-and-refute\n");
        assert!(s.covers(&diag(RuleId::TernaryOpportunity, 1)));
        assert!(s.covers(&diag(RuleId::AssumeAndRefute, 1)));
        assert!(!s.covers(&diag(RuleId::MissingStartupInvocation, 1)));
    }

    #[test]
    fn whole_file() {
        let s = scan("--scriptwise: ignore-file\n\n\nx = 1");
        assert!(s.covers(&diag(RuleId::SocketEventDataConflation, 40)));
    }

    #[test]
    fn unknown_rule_names_are_dropped() {
        let s = scan("-- scriptwise: ignore no-such-rule\n");
        assert!(!s.covers(&diag(RuleId::TernaryOpportunity, 1)));
    }

    #[test]
    fn directives_inside_strings_are_ignored() {
        let s = scan("msg = \"-- scriptwise: ignore\"\nx = [[\n-- scriptwise: ignore-file\n]]\n");
        assert!(s.is_empty());
        let s = scan("msg = '-- scriptwise: ignore' -- scriptwise: ignore assume-and-refute\n");
        assert!(s.covers(&diag(RuleId::AssumeAndRefute, 1)));
        assert!(!s.covers(&diag(RuleId::TernaryOpportunity, 1)));
    }

    #[test]
    fn apply_filters() {
        let s = scan("-- scriptwise: ignore\nx = 1\n\ny = 2");
        let kept = s.apply(vec![
            diag(RuleId::TernaryOpportunity, 2),
            diag(RuleId::TernaryOpportunity, 4),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].start.line, 4);
        assert!(scan("x = 1").is_empty());
    }
}
