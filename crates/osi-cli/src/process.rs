//! File processing logic for sp-osi
//!
//! Every managed file of a component is merged in memory first; nothing is
//! written until all of them succeeded.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use osi_core::{scan, splice, RuleSet};
use osi_rules::FileMode;

/// Locations for one merge run
pub struct MergeRoots<'a> {
    /// Where the StorPool templates live
    pub templates: &'a Path,
    /// The installed component whose files are merged into
    pub source: &'a Path,
    /// Where merged files are written
    pub dest: &'a Path,
}

/// The merged result for one managed file, not yet written
#[derive(Debug)]
pub struct MergePlan {
    /// Path relative to the component root
    pub path: String,
    pub mode: FileMode,
    pub dest: PathBuf,
    /// Current content of the destination, if it exists
    pub old_content: Option<String>,
    pub new_content: String,
}

impl MergePlan {
    pub fn has_changes(&self) -> bool {
        self.old_content.as_deref() != Some(self.new_content.as_str())
    }
}

/// Merge every rule set in order, stopping at the first failure
pub fn plan_component(rule_sets: &[RuleSet], roots: &MergeRoots<'_>) -> Result<Vec<MergePlan>> {
    rule_sets.iter().map(|set| plan_file(set, roots)).collect()
}

/// Merge one managed file in memory
pub fn plan_file(set: &RuleSet, roots: &MergeRoots<'_>) -> Result<MergePlan> {
    let template_path = roots.templates.join(set.path());
    let target_path = roots.source.join(set.path());
    let dest = roots.dest.join(set.path());

    let template = read_file(&template_path)?;
    let scanned = scan(set, &template)
        .with_context(|| format!("Failed to scan template {}", template_path.display()))?;

    let (mode, target) = if set.is_whole_file() {
        (FileMode::Replace, read_optional(&target_path)?)
    } else {
        (FileMode::Merge, Some(read_file(&target_path)?))
    };

    let new_content = splice(&scanned, target.as_deref().unwrap_or_default())
        .with_context(|| format!("Failed to merge into {}", target_path.display()))?;

    let old_content = if same_path(&dest, &target_path) {
        target
    } else {
        read_optional(&dest)?
    };

    debug!(path = set.path(), mode = mode.as_str(), "planned merge");
    Ok(MergePlan {
        path: set.path().to_string(),
        mode,
        dest,
        old_content,
        new_content,
    })
}

/// Write a planned merge to its destination
///
/// The content goes to a temporary file in the destination directory which
/// then replaces the destination, so a failed write never leaves a
/// truncated file behind. An existing destination keeps its permissions.
pub fn write_plan(plan: &MergePlan) -> Result<()> {
    let parent = plan
        .dest
        .parent()
        .with_context(|| format!("No parent directory for {}", plan.dest.display()))?;
    ensure_directory(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
    tmp.write_all(plan.new_content.as_bytes())
        .and_then(|_| tmp.flush())
        .with_context(|| format!("Failed to write {}", plan.dest.display()))?;

    if let Ok(meta) = fs::metadata(&plan.dest) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .with_context(|| format!("Failed to copy permissions of {}", plan.dest.display()))?;
    }

    tmp.persist(&plan.dest)
        .with_context(|| format!("Failed to write file: {}", plan.dest.display()))?;
    info!("Wrote {}", plan.dest.display());
    Ok(())
}

/// Whether two paths name the same file or directory
///
/// Both are resolved when they exist, so `./os_brick` and `os_brick` match.
/// A path that cannot be resolved (it does not exist yet) is compared as
/// spelled.
pub fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Create `dir` and its parents; an existing directory is fine
pub fn ensure_directory(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if path.exists() {
        read_file(path).map(Some)
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osi_core::{ExtractionRule, Pattern};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sets() -> Vec<RuleSet> {
        vec![
            RuleSet::new(
                "demo",
                "pkg/table.py",
                vec![ExtractionRule::chunk(
                    "table",
                    Pattern::literal("TABLE = {"),
                    Pattern::literal("}"),
                )],
            )
            .unwrap(),
            RuleSet::new(
                "demo",
                "pkg/drivers/storpool.py",
                vec![ExtractionRule::whole_file("driver")],
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_plan_and_write_to_separate_dest() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("templates");
        let source = temp.path().join("source");
        let dest = temp.path().join("dest");
        write(&templates, "pkg/table.py", "TABLE = {\n    'sp': 1,\n}\n");
        write(&templates, "pkg/drivers/storpool.py", "driver = True\n");
        write(&source, "pkg/table.py", "x = 0\nTABLE = {\n    'a': 2,\n}\n");

        let roots = MergeRoots {
            templates: &templates,
            source: &source,
            dest: &dest,
        };
        let plans = plan_component(&sets(), &roots).unwrap();

        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].mode, FileMode::Merge);
        assert_eq!(plans[0].new_content, "x = 0\nTABLE = {\n    'sp': 1,\n}\n");
        assert!(plans[0].old_content.is_none());
        assert_eq!(plans[1].mode, FileMode::Replace);
        assert!(plans[1].has_changes());

        for plan in &plans {
            write_plan(plan).unwrap();
        }
        assert_eq!(
            fs::read_to_string(dest.join("pkg/drivers/storpool.py")).unwrap(),
            "driver = True\n"
        );
        // The source is left alone
        assert_eq!(
            fs::read_to_string(source.join("pkg/table.py")).unwrap(),
            "x = 0\nTABLE = {\n    'a': 2,\n}\n"
        );
    }

    #[test]
    fn test_unchanged_in_place_merge() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("templates");
        let source = temp.path().join("source");
        write(&templates, "pkg/table.py", "TABLE = {\n}\n");
        write(&source, "pkg/table.py", "TABLE = {\n}\n");

        let roots = MergeRoots {
            templates: &templates,
            source: &source,
            dest: &source,
        };
        let plan = plan_file(&sets()[0], &roots).unwrap();
        assert!(!plan.has_changes());
    }

    #[test]
    fn test_missing_merge_target_is_an_error() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("templates");
        write(&templates, "pkg/table.py", "TABLE = {\n}\n");

        let roots = MergeRoots {
            templates: &templates,
            source: &temp.path().join("source"),
            dest: &temp.path().join("dest"),
        };
        let err = plan_file(&sets()[0], &roots).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read file"));
    }

    #[test]
    fn test_failed_merge_reports_rule() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("templates");
        let source = temp.path().join("source");
        write(&templates, "pkg/table.py", "TABLE = {\n}\n");
        write(&source, "pkg/table.py", "no table here\n");

        let roots = MergeRoots {
            templates: &templates,
            source: &source,
            dest: &source,
        };
        let err = plan_file(&sets()[0], &roots).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("Failed to merge into"));
        assert!(msg.contains("'table'"));
    }

    #[test]
    fn test_write_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out.py");
        fs::write(&dest, "old").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o640)).unwrap();

        let plan = MergePlan {
            path: "out.py".to_string(),
            mode: FileMode::Replace,
            dest: dest.clone(),
            old_content: Some("old".to_string()),
            new_content: "new".to_string(),
        };
        write_plan(&plan).unwrap();

        let meta = fs::metadata(&dest).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o640);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_same_path_resolves_aliases() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("os_brick");
        fs::create_dir_all(&dir).unwrap();

        assert!(same_path(&dir, &temp.path().join(".").join("os_brick")));
        assert!(same_path(&dir, &dir.join("..").join("os_brick")));
        assert!(!same_path(&dir, &temp.path().join("merged")));
        assert!(same_path(
            &temp.path().join("missing"),
            &temp.path().join("missing")
        ));
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a/b/c");
        ensure_directory(&dir).unwrap();
        ensure_directory(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
