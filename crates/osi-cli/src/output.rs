//! Output formatting for sp-osi
//!
//! Supports text (colored terminal), JSON and unified diff output.

use anyhow::Result;
use colored::*;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::path::Path;

use osi_rules::{FileMode, ManagedFile};

use crate::process::MergePlan;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Diff,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<OutputFormat> {
        match s.to_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            "diff" => Some(OutputFormat::Diff),
            _ => None,
        }
    }
}

/// Result for a single managed file
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: String,
    pub mode: FileMode,
    pub dest: String,
    pub changed: bool,
    pub written: bool,
}

/// Summary statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub files_processed: usize,
    pub files_with_changes: usize,
    pub files_written: usize,
}

/// Full JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    pub version: String,
    pub component: String,
    pub summary: Summary,
    pub files: Vec<FileResult>,
}

/// Reporter for accumulating and outputting merge results
pub struct Reporter {
    format: OutputFormat,
    verbose: bool,
    component: String,
    results: Vec<FileResult>,
    summary: Summary,
}

impl Reporter {
    pub fn new(format: OutputFormat, verbose: bool, component: &str) -> Self {
        Self {
            format,
            verbose,
            component: component.to_string(),
            results: Vec::new(),
            summary: Summary::default(),
        }
    }

    /// Report a file in check mode, showing what would change
    pub fn report_check(&mut self, plan: &MergePlan) {
        self.summary.files_processed += 1;
        let changed = plan.has_changes();

        if !changed {
            self.report_unchanged(plan);
            return;
        }
        self.summary.files_with_changes += 1;

        let old = plan.old_content.as_deref().unwrap_or_default();
        match self.format {
            OutputFormat::Text => {
                println!("{} [{}]", plan.dest.display().to_string().bold(), plan.mode.as_str());
                print_diff(old, &plan.new_content);
                println!();
            }
            OutputFormat::Diff => {
                print_unified_diff(Path::new(&plan.path), old, &plan.new_content);
            }
            OutputFormat::Json => {
                // JSON output is handled in finish()
            }
        }

        self.results.push(result(plan, true, false));
    }

    /// Report a file after it was written
    pub fn report_written(&mut self, plan: &MergePlan) {
        self.summary.files_processed += 1;

        if !plan.has_changes() {
            self.report_unchanged(plan);
            return;
        }
        self.summary.files_with_changes += 1;
        self.summary.files_written += 1;

        if self.format == OutputFormat::Text {
            let action = match plan.mode {
                FileMode::Merge => "Merged",
                FileMode::Replace => "Replaced",
            };
            println!("  {} {} {}", "OK".green(), action, plan.dest.display());
        }

        self.results.push(result(plan, true, true));
    }

    fn report_unchanged(&mut self, plan: &MergePlan) {
        if self.verbose && self.format == OutputFormat::Text {
            println!("{}: No changes needed", plan.dest.display());
        }
        self.results.push(result(plan, false, false));
    }

    /// Print final summary/output
    pub fn finish(self, check_mode: bool) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                println!();
                println!("{}", "Summary".bold().underline());
                println!("  Component: {}", self.component);
                println!("  Files processed: {}", self.summary.files_processed);
                println!("  Files with changes: {}", self.summary.files_with_changes);
                if !check_mode {
                    println!("  Files written: {}", self.summary.files_written);
                }

                if check_mode && self.summary.files_with_changes > 0 {
                    println!();
                    println!("{}", "Run without --check to apply changes".yellow());
                }
            }
            OutputFormat::Json => {
                let output = JsonOutput {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    component: self.component,
                    summary: self.summary,
                    files: self.results,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Diff => {
                // Each diff was printed as it was produced
            }
        }
        Ok(())
    }

    /// Get summary for exit code determination
    pub fn summary(&self) -> &Summary {
        &self.summary
    }
}

fn result(plan: &MergePlan, changed: bool, written: bool) -> FileResult {
    FileResult {
        path: plan.path.clone(),
        mode: plan.mode,
        dest: plan.dest.display().to_string(),
        changed,
        written,
    }
}

/// Print the managed file listing
pub fn print_listing(files: &[ManagedFile], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(files)?);
        return Ok(());
    }

    let mut component = "";
    for file in files {
        if file.component != component {
            component = file.component.as_str();
            println!("{}:", component.bold());
        }
        let mode = match file.mode {
            FileMode::Merge => file.mode.as_str().green(),
            FileMode::Replace => file.mode.as_str().yellow(),
        };
        println!("  {:8} {}", mode, file.path);
    }
    Ok(())
}

/// Print the rules of one managed file
pub fn print_rules(file: &ManagedFile, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(file)?);
        return Ok(());
    }

    println!("{} [{}]", file.path.bold(), file.mode.as_str());
    for rule in &file.rules {
        println!("  {} ({})", rule.name.green(), rule.kind.as_str());
        if let Some(start) = &rule.start {
            println!("    start: {}", start);
        }
        if let Some(end) = &rule.end {
            println!("    end:   {}", end);
        }
    }
    Ok(())
}

/// Print the changed lines between old and new content
fn print_diff(old: &str, new: &str) {
    let diff = TextDiff::from_lines(old, new);
    for change in diff.iter_all_changes() {
        let line = change.value().trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Delete => println!("  {}", format!("- {}", line).red()),
            ChangeTag::Insert => println!("  {}", format!("+ {}", line).green()),
            ChangeTag::Equal => {
                // Skip unchanged lines for cleaner output
            }
        }
    }
}

/// Print unified diff format (standard diff -u compatible)
fn print_unified_diff(path: &Path, old: &str, new: &str) {
    let diff = TextDiff::from_lines(old, new);
    let path_str = path.display().to_string();

    println!("--- a/{}", path_str);
    println!("+++ b/{}", path_str);

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        println!("{}", hunk.header());
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            print!("{}{}", sign, change);
            if change.missing_newline() {
                println!();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn plan(old: Option<&str>, new: &str) -> MergePlan {
        MergePlan {
            path: "exception.py".to_string(),
            mode: FileMode::Merge,
            dest: PathBuf::from("/srv/os_brick/exception.py"),
            old_content: old.map(str::to_string),
            new_content: new.to_string(),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("diff"), Some(OutputFormat::Diff));
        assert_eq!(OutputFormat::from_str("xml"), None);
    }

    #[test]
    fn test_summary_counts() {
        let mut reporter = Reporter::new(OutputFormat::Json, false, "os_brick");
        reporter.report_check(&plan(Some("a\n"), "a\n"));
        reporter.report_check(&plan(Some("a\n"), "b\n"));
        reporter.report_written(&plan(None, "c\n"));

        let summary = reporter.summary();
        assert_eq!(summary.files_processed, 3);
        assert_eq!(summary.files_with_changes, 2);
        assert_eq!(summary.files_written, 1);
    }

    #[test]
    fn test_json_serialization() {
        let output = JsonOutput {
            version: "0.1.0".to_string(),
            component: "nova".to_string(),
            summary: Summary {
                files_processed: 2,
                files_with_changes: 1,
                files_written: 1,
            },
            files: vec![result(&plan(None, "x\n"), true, true)],
        };

        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"component\":\"nova\""));
        assert!(json.contains("\"mode\":\"merge\""));
        assert!(json.contains("\"files_written\":1"));
    }
}
