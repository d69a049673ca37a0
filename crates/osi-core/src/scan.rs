//! Template scanning: capture each rule's region from the template file

use tracing::debug;

use crate::error::{Phase, Result, SpliceError};
use crate::matcher::{advance_all, MatchState, RegionMatcher, Step};
use crate::rule::{ExtractionRule, RuleKind, RuleSet};
use crate::{is_blank, lines};

/// A rule set whose regions have all been captured from a template
///
/// Only `scan()` produces one, and `splice()` only accepts one, so a splice
/// can never run against rules that were not fully scanned.
#[derive(Debug, Clone)]
pub struct ScannedRuleSet<'a> {
    rule_set: &'a RuleSet,
    captured: Vec<String>,
}

impl<'a> ScannedRuleSet<'a> {
    pub fn rule_set(&self) -> &'a RuleSet {
        self.rule_set
    }

    /// Captured text for the rule called `name`
    pub fn captured(&self, name: &str) -> Option<&str> {
        self.rule_set
            .rules()
            .iter()
            .position(|r| r.name() == name)
            .map(|i| self.captured[i].as_str())
    }

    /// Rules paired with their captured text, in rule order
    pub fn iter(&self) -> impl Iterator<Item = (&'a ExtractionRule, &str)> + '_ {
        self.rule_set
            .rules()
            .iter()
            .zip(self.captured.iter().map(String::as_str))
    }
}

/// Capture every rule's region from `template`
///
/// Every rule must match: a rule that never opens, or a chunk whose end
/// marker never follows its start, is a configuration error. A class region
/// still open at end of file is closed there.
pub fn scan<'a>(rule_set: &'a RuleSet, template: &str) -> Result<ScannedRuleSet<'a>> {
    if rule_set.is_whole_file() {
        let rule = &rule_set.rules()[0];
        if template.is_empty() {
            return Err(SpliceError::MissingInTemplate {
                rule: rule.name().to_string(),
            });
        }
        debug!(path = rule_set.path(), "whole-file template captured");
        return Ok(ScannedRuleSet {
            rule_set,
            captured: vec![template.to_string()],
        });
    }

    let mut matchers: Vec<RegionMatcher<'_>> =
        rule_set.rules().iter().map(RegionMatcher::new).collect();
    let mut captured = vec![String::new(); matchers.len()];

    for (idx, line) in lines(template).enumerate() {
        let steps = advance_all(&mut matchers, Phase::Template, idx + 1, line)?;
        for (i, step) in steps.iter().enumerate() {
            match step {
                Step::Open | Step::Inside => captured[i].push_str(line),
                Step::Close { .. } => debug!(
                    rule = matchers[i].rule().name(),
                    line = idx + 1,
                    "template region closed"
                ),
                Step::Outside | Step::Reopened => {}
            }
        }
    }

    for (i, matcher) in matchers.iter_mut().enumerate() {
        let rule = matcher.rule();
        match (matcher.state(), rule.kind()) {
            (MatchState::NotStarted, _) => {
                return Err(SpliceError::MissingInTemplate {
                    rule: rule.name().to_string(),
                });
            }
            (MatchState::InProgress, RuleKind::ClassRegion) => {
                debug!(rule = rule.name(), "class region closed by end of template");
                matcher.finish();
            }
            (MatchState::InProgress, _) => {
                return Err(SpliceError::UnterminatedInTemplate {
                    rule: rule.name().to_string(),
                    line: matcher.opened_at().unwrap_or_default(),
                });
            }
            (MatchState::Done, _) => {}
        }

        if rule.kind() == RuleKind::ClassRegion {
            captured[i] = trim_trailing_blank_lines(&captured[i]);
        }
    }

    Ok(ScannedRuleSet { rule_set, captured })
}

/// Drop trailing blank lines, leaving the text ending in exactly one newline
fn trim_trailing_blank_lines(text: &str) -> String {
    let mut kept: Vec<&str> = lines(text).collect();
    while kept.last().is_some_and(|l| is_blank(l)) {
        kept.pop();
    }
    let mut trimmed = kept.concat();
    if !trimmed.ends_with('\n') {
        trimmed.push('\n');
    }
    trimmed
}
