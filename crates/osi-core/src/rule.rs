//! Extraction rules and the rule sets that group them per managed file

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::error::{Result, SpliceError};

/// How a rule's region is found and what happens to it in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// The template replaces the target file outright
    WholeFileReplace,
    /// A span between two literal markers
    ChunkRegion,
    /// A top-level class declaration, closed by two consecutive blank lines
    ClassRegion,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::WholeFileReplace => "whole_file_replace",
            RuleKind::ChunkRegion => "chunk_region",
            RuleKind::ClassRegion => "class_region",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test applied to a single line, with its terminator stripped
#[derive(Debug, Clone)]
pub enum Pattern {
    /// The line begins with this exact text
    Literal(String),
    /// The regular expression matches somewhere in the line
    Regex(Regex),
    /// The line opens a top-level `class <name>` declaration
    ClassDeclaration(String),
}

impl Pattern {
    /// Match lines beginning with `text`
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// Match lines with a regular expression
    pub fn regex(expr: &str) -> Result<Self> {
        Regex::new(expr)
            .map(Pattern::Regex)
            .map_err(|e| SpliceError::InvalidPattern {
                pattern: expr.to_string(),
                reason: e.to_string(),
            })
    }

    /// Match the first line of `class <name>`, `class <name>(...)` or `class <name>:`
    pub fn class_declaration(name: impl Into<String>) -> Self {
        Pattern::ClassDeclaration(name.into())
    }

    pub fn is_match(&self, line: &str) -> bool {
        let line = line.trim_end_matches(['\n', '\r']);
        match self {
            Pattern::Literal(text) => line.starts_with(text.as_str()),
            Pattern::Regex(re) => re.is_match(line),
            Pattern::ClassDeclaration(name) => declares_class(line, name),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => write!(f, "{}", text),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            Pattern::ClassDeclaration(name) => write!(f, "class {}", name),
        }
    }
}

fn declares_class(line: &str, name: &str) -> bool {
    let Some(rest) = line.strip_prefix("class") else {
        return false;
    };
    let trimmed = rest.trim_start_matches([' ', '\t']);
    if trimmed.len() == rest.len() {
        return false;
    }
    let Some(after) = trimmed.strip_prefix(name) else {
        return false;
    };
    matches!(after.chars().next(), None | Some('(' | ':' | '[' | ' ' | '\t'))
}

/// One region to lift out of a template and place into a target
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    name: String,
    kind: RuleKind,
    start: Option<Pattern>,
    end: Option<Pattern>,
}

impl ExtractionRule {
    /// The whole template becomes the output
    pub fn whole_file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RuleKind::WholeFileReplace,
            start: None,
            end: None,
        }
    }

    /// A region from the line matching `start` up to, not including, the line matching `end`
    pub fn chunk(name: impl Into<String>, start: Pattern, end: Pattern) -> Self {
        Self {
            name: name.into(),
            kind: RuleKind::ChunkRegion,
            start: Some(start),
            end: Some(end),
        }
    }

    /// The top-level class called `name`
    pub fn class(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            start: Some(Pattern::class_declaration(name.clone())),
            name,
            kind: RuleKind::ClassRegion,
            end: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn start_pattern(&self) -> Option<&Pattern> {
        self.start.as_ref()
    }

    pub fn end_pattern(&self) -> Option<&Pattern> {
        self.end.as_ref()
    }

    /// Does this line open the rule's region?
    pub fn opens(&self, line: &str) -> bool {
        self.start.as_ref().is_some_and(|p| p.is_match(line))
    }

    pub fn describe(&self) -> RuleDescription {
        RuleDescription {
            name: self.name.clone(),
            kind: self.kind,
            start: self.start.as_ref().map(|p| p.to_string()),
            end: self.end.as_ref().map(|p| p.to_string()),
        }
    }
}

/// Serializable summary of a rule, for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDescription {
    pub name: String,
    pub kind: RuleKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// The ordered rules for one (component, relative path) pair
#[derive(Debug, Clone)]
pub struct RuleSet {
    component: String,
    path: String,
    rules: Vec<ExtractionRule>,
}

impl RuleSet {
    /// Build a rule set, rejecting shapes the engine cannot honor
    ///
    /// A whole-file replacement must be the only rule of its set, and rule
    /// names must be unique within the set.
    pub fn new(
        component: impl Into<String>,
        path: impl Into<String>,
        rules: Vec<ExtractionRule>,
    ) -> Result<Self> {
        let path = path.into();
        let invalid = |reason: String| SpliceError::InvalidRuleSet {
            path: path.clone(),
            reason,
        };

        if rules.is_empty() {
            return Err(invalid("no rules".to_string()));
        }

        let whole_file = rules
            .iter()
            .filter(|r| r.kind == RuleKind::WholeFileReplace)
            .count();
        if whole_file > 0 && rules.len() > 1 {
            return Err(invalid(
                "a whole-file replacement cannot be combined with other rules".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(invalid(format!("rule '{}' is defined twice", rule.name)));
            }
        }

        Ok(Self {
            component: component.into(),
            path,
            rules,
        })
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Path of the managed file, relative to the component's root
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Whether this set replaces its file wholesale instead of merging
    pub fn is_whole_file(&self) -> bool {
        self.rules
            .iter()
            .any(|r| r.kind == RuleKind::WholeFileReplace)
    }

    pub fn describe(&self) -> Vec<RuleDescription> {
        self.rules.iter().map(|r| r.describe()).collect()
    }
}
