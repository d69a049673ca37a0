//! Errors raised while scanning templates and splicing targets

use std::fmt;
use thiserror::Error;

/// Which file a pass was reading when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Template,
    Target,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Template => f.write_str("template"),
            Phase::Target => f.write_str("target"),
        }
    }
}

/// Fatal conditions of the scan and splice passes
///
/// None of these are recoverable: rule sets are static, so retrying the
/// same inputs always ends the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid rule set for {path}: {reason}")]
    InvalidRuleSet { path: String, reason: String },

    #[error("Rule '{rule}' did not match anything in the template")]
    MissingInTemplate { rule: String },

    #[error("Rule '{rule}' opened at template line {line} but its end marker never appeared")]
    UnterminatedInTemplate { rule: String, line: usize },

    #[error("{phase} line {line} is claimed by more than one rule: {}", rules.join(", "))]
    Ambiguous {
        phase: Phase,
        line: usize,
        rules: Vec<String>,
    },

    #[error("Rule '{rule}' matched again at {phase} line {line} after its region opened at line {first_line} had closed")]
    Duplicate {
        phase: Phase,
        rule: String,
        line: usize,
        first_line: usize,
    },

    #[error("Rule '{rule}' could not be placed: its region was not found in the target")]
    Unresolved { rule: String },
}

pub type Result<T> = std::result::Result<T, SpliceError>;
