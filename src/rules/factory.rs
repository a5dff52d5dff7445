use crate::config::CheckConfig;
use crate::rules::assume_refute::AssumeRefuteMatcher;
use crate::rules::redundant_boolean::RedundantBooleanMatcher;
use crate::rules::socket_split::SocketSplitMatcher;
use crate::rules::startup_invocation::StartupInvocationMatcher;
use crate::rules::ternary::TernaryMatcher;
use crate::rules::{Matcher, RuleId};

/// Build the matcher for a rule.
pub fn build_matcher(rule: RuleId) -> Box<dyn Matcher> {
    match rule {
        RuleId::RedundantBranchToBoolean => Box::new(RedundantBooleanMatcher),
        RuleId::TernaryOpportunity => Box::new(TernaryMatcher),
        RuleId::MissingStartupInvocation => Box::new(StartupInvocationMatcher),
        RuleId::AssumeAndRefute => Box::new(AssumeRefuteMatcher),
        RuleId::SocketEventDataConflation => Box::new(SocketSplitMatcher),
    }
}

/// Matchers for every rule the configuration leaves enabled.
///
/// `--rule` wins over the config file: a rule named there runs even when
/// the file disables it.
pub fn build_matchers(config: &CheckConfig) -> Vec<Box<dyn Matcher>> {
    match config.only {
        Some(rule) => vec![build_matcher(rule)],
        None => RuleId::ALL
            .into_iter()
            .filter(|rule| config.is_enabled(*rule))
            .map(build_matcher)
            .collect(),
    }
}
