pub mod assume_refute;
pub mod factory;
pub mod redundant_boolean;
pub mod shape;
pub mod socket_split;
pub mod startup_invocation;
pub mod ternary;

use crate::config::Severity;
use crate::model::{ObjectTable, RuntimeModel};
use crate::syntax::ast::Block;
use crate::syntax::span::Span;
use crate::syntax::SourceUnit;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The cataloged idioms the checker knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleId {
    RedundantBranchToBoolean,
    TernaryOpportunity,
    MissingStartupInvocation,
    AssumeAndRefute,
    SocketEventDataConflation,
}

impl RuleId {
    pub const ALL: [RuleId; 5] = [
        RuleId::RedundantBranchToBoolean,
        RuleId::TernaryOpportunity,
        RuleId::MissingStartupInvocation,
        RuleId::AssumeAndRefute,
        RuleId::SocketEventDataConflation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RuleId::RedundantBranchToBoolean => "redundant-branch-to-boolean",
            RuleId::TernaryOpportunity => "ternary-opportunity",
            RuleId::MissingStartupInvocation => "missing-startup-invocation",
            RuleId::AssumeAndRefute => "assume-and-refute",
            RuleId::SocketEventDataConflation => "socket-event-data-conflation",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RuleId::RedundantBranchToBoolean => {
                "if/else that only assigns true/false; assign the condition directly"
            }
            RuleId::TernaryOpportunity => {
                "if/else choosing between two values; use `cond and a or b` when `a` is never false/nil"
            }
            RuleId::MissingStartupInvocation => {
                "control event handler that is not also called once at startup"
            }
            RuleId::AssumeAndRefute => {
                "loop that assumes a result and overwrites it on a counterexample or better candidate"
            }
            RuleId::SocketEventDataConflation => {
                "socket handler mixing connection events with payload handling"
            }
        }
    }

    pub fn default_severity(self) -> Severity {
        match self {
            RuleId::AssumeAndRefute => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// When two rules report the same span, the higher value wins.
    pub fn specificity(self) -> u8 {
        match self {
            RuleId::RedundantBranchToBoolean => 5,
            RuleId::TernaryOpportunity => 4,
            RuleId::SocketEventDataConflation => 3,
            RuleId::MissingStartupInvocation => 2,
            RuleId::AssumeAndRefute => 1,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleId::ALL
            .into_iter()
            .find(|r| r.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = RuleId::ALL.iter().map(|r| r.name()).collect();
                format!("unknown rule '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Replacement text for a span of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fix {
    pub span: Span,
    pub replacement: String,
}

/// One occurrence of an idiom (or a violation of one) found by a matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub rule: RuleId,
    pub span: Span,
    pub message: String,
    pub suggestion: Option<String>,
    /// Present only when the rewrite is safe to apply automatically.
    pub fix: Option<Fix>,
}

/// A matcher could not make sense of the tree it was given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule '{rule}' failed: {message}")]
pub struct RuleEvaluationError {
    pub rule: RuleId,
    pub message: String,
}

/// Everything a matcher may look at for one file.
pub struct CheckContext<'a> {
    pub source: &'a SourceUnit,
    pub chunk: &'a Block,
    pub model: &'a RuntimeModel,
    pub objects: &'a ObjectTable,
}

impl<'a> CheckContext<'a> {
    /// Source text covered by a node.
    pub fn text(&self, rule: RuleId, span: Span) -> Result<&'a str, RuleEvaluationError> {
        self.source.slice(span).ok_or_else(|| RuleEvaluationError {
            rule,
            message: format!("span {}..{} is outside the source text", span.start, span.end),
        })
    }
}

/// A stateless predicate over the syntax tree.
///
/// Matchers must not depend on each other: running any subset in any order
/// yields the same matches.
pub trait Matcher: Send + Sync {
    fn rule(&self) -> RuleId;

    fn check(&self, ctx: &CheckContext) -> Result<Vec<Match>, RuleEvaluationError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names_round_trip() {
        for rule in RuleId::ALL {
            assert_eq!(rule.name().parse::<RuleId>(), Ok(rule));
        }
    }

    #[test]
    fn unknown_rule_lists_known_names() {
        let err = "nope".parse::<RuleId>().unwrap_err();
        assert!(err.contains("ternary-opportunity"));
    }

    #[test]
    fn specificity_is_total() {
        let mut ranks: Vec<u8> = RuleId::ALL.iter().map(|r| r.specificity()).collect();
        ranks.sort();
        ranks.dedup();
        assert_eq!(ranks.len(), RuleId::ALL.len());
        assert!(
            RuleId::RedundantBranchToBoolean.specificity()
                > RuleId::TernaryOpportunity.specificity()
        );
    }
}
