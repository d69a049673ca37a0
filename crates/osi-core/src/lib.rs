//! osi-core: Region scanning and splicing for StorPool driver files
//!
//! This crate provides:
//! - `ExtractionRule` / `RuleSet`: what to lift out of a template file
//! - `RegionMatcher`: the per-rule, per-line boundary state machine
//! - `scan()`: capture every rule's region from a template into a `ScannedRuleSet`
//! - `splice()`: merge a `ScannedRuleSet` into a target file

mod error;
pub mod matcher;
mod rule;
mod scan;
mod splice;

pub use error::{Phase, Result, SpliceError};
pub use matcher::{MatchState, RegionMatcher, Step};
pub use rule::{ExtractionRule, Pattern, RuleDescription, RuleKind, RuleSet};
pub use scan::{scan, ScannedRuleSet};
pub use splice::splice;

/// Split text into lines, keeping each line's terminator
pub(crate) fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('\n')
}

/// A line with nothing but whitespace (the terminator included)
pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
