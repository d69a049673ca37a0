//! Per-rule boundary state machine
//!
//! A `RegionMatcher` is created fresh for every pass over a file, so no
//! state survives from the template scan into the target splice. Each line
//! is fed to every matcher in turn; the returned `Step` tells the caller
//! whether the rule claims the line.
//!
//! End detection lives in `RegionMatcher::closes` and nowhere else: chunk
//! regions close on their end marker, class regions on the second of two
//! consecutive blank lines.

use crate::error::{Phase, Result, SpliceError};
use crate::is_blank;
use crate::rule::{ExtractionRule, RuleKind};

/// Lifecycle of a rule within one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    NotStarted,
    InProgress,
    Done,
}

/// What a line means to one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Not part of the region
    Outside,
    /// The region's first line
    Open,
    /// A line inside the region
    Inside,
    /// The region ends here. `claimed` is false for a chunk end marker,
    /// which stays ordinary text, and true for the blank line closing a class.
    Close { claimed: bool },
    /// The start pattern matched again after the region was done
    Reopened,
}

impl Step {
    /// Whether the rule takes ownership of the line
    pub fn claims(&self) -> bool {
        match self {
            Step::Open | Step::Inside => true,
            Step::Close { claimed } => *claimed,
            Step::Outside | Step::Reopened => false,
        }
    }
}

/// Tracks one rule's region across the lines of a single file
#[derive(Debug)]
pub struct RegionMatcher<'r> {
    rule: &'r ExtractionRule,
    state: MatchState,
    opened_at: Option<usize>,
    after_blank: bool,
}

impl<'r> RegionMatcher<'r> {
    pub fn new(rule: &'r ExtractionRule) -> Self {
        Self {
            rule,
            state: MatchState::NotStarted,
            opened_at: None,
            after_blank: false,
        }
    }

    pub fn rule(&self) -> &'r ExtractionRule {
        self.rule
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    /// 1-based line number where the region opened
    pub fn opened_at(&self) -> Option<usize> {
        self.opened_at
    }

    /// Advance over one line (1-based `line_no`, terminator included in `line`)
    pub fn step(&mut self, line_no: usize, line: &str) -> Step {
        match self.state {
            MatchState::NotStarted => {
                if self.rule.opens(line) {
                    self.state = MatchState::InProgress;
                    self.opened_at = Some(line_no);
                    self.after_blank = false;
                    Step::Open
                } else {
                    Step::Outside
                }
            }
            MatchState::InProgress => match self.closes(line) {
                Some(claimed) => {
                    self.state = MatchState::Done;
                    Step::Close { claimed }
                }
                None => Step::Inside,
            },
            MatchState::Done => {
                if self.rule.opens(line) {
                    Step::Reopened
                } else {
                    Step::Outside
                }
            }
        }
    }

    /// Close an open region at end of input
    pub fn finish(&mut self) {
        if self.state == MatchState::InProgress {
            self.state = MatchState::Done;
        }
    }

    /// Returns `Some(claimed)` when `line` ends the open region
    fn closes(&mut self, line: &str) -> Option<bool> {
        match self.rule.kind() {
            RuleKind::ChunkRegion => self
                .rule
                .end_pattern()
                .is_some_and(|p| p.is_match(line))
                .then_some(false),
            RuleKind::ClassRegion => {
                let blank = is_blank(line);
                if blank && self.after_blank {
                    return Some(true);
                }
                self.after_blank = blank;
                None
            }
            RuleKind::WholeFileReplace => None,
        }
    }
}

/// Feed one line to every matcher, enforcing single ownership
///
/// Fails on a start pattern matching again after its region closed, and on
/// a line claimed by more than one rule. Returns the steps in rule order.
pub(crate) fn advance_all(
    matchers: &mut [RegionMatcher<'_>],
    phase: Phase,
    line_no: usize,
    line: &str,
) -> Result<Vec<Step>> {
    let mut steps = Vec::with_capacity(matchers.len());

    for matcher in matchers.iter_mut() {
        let step = matcher.step(line_no, line);
        if step == Step::Reopened {
            return Err(SpliceError::Duplicate {
                phase,
                rule: matcher.rule().name().to_string(),
                line: line_no,
                first_line: matcher.opened_at().unwrap_or_default(),
            });
        }
        steps.push(step);
    }

    let claimants: Vec<String> = steps
        .iter()
        .zip(matchers.iter())
        .filter(|(step, _)| step.claims())
        .map(|(_, m)| m.rule().name().to_string())
        .collect();
    if claimants.len() > 1 {
        return Err(SpliceError::Ambiguous {
            phase,
            line: line_no,
            rules: claimants,
        });
    }

    tracing::trace!(%phase, line_no, ?steps, "advanced matchers");
    Ok(steps)
}
