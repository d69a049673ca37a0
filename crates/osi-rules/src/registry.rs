//! Component trait and registry of rule sets

use osi_core::{RuleDescription, RuleSet, SpliceError};
use serde::Serialize;
use thiserror::Error;

/// An OpenStack component whose files StorPool patches
pub trait Component: Send + Sync {
    /// The component's Python package name (e.g., "os_brick")
    fn name(&self) -> &'static str;

    /// A short description of what is integrated
    fn description(&self) -> &'static str;

    /// One rule set per managed file, in processing order
    fn rule_sets(&self) -> osi_core::Result<Vec<RuleSet>>;
}

/// Errors from registry lookups and registration
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown component '{0}'")]
    UnknownComponent(String),

    #[error("Component '{component}' does not manage {path}")]
    UnknownFile { component: String, path: String },

    #[error("Component '{0}' is already registered")]
    DuplicateComponent(String),

    #[error("Component '{component}' has invalid rules: {source}")]
    InvalidRules {
        component: String,
        #[source]
        source: SpliceError,
    },
}

/// How a managed file is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// Regions are spliced into the upstream file
    Merge,
    /// The StorPool file replaces the upstream one
    Replace,
}

impl FileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Merge => "merge",
            FileMode::Replace => "replace",
        }
    }
}

/// One entry of a component's file listing
#[derive(Debug, Clone, Serialize)]
pub struct ManagedFile {
    pub component: String,
    pub path: String,
    pub mode: FileMode,
    pub rules: Vec<RuleDescription>,
}

struct Registered {
    name: &'static str,
    description: &'static str,
    rule_sets: Vec<RuleSet>,
}

/// Registry of components and their rule sets
///
/// Built explicitly and passed by reference; tests construct their own.
pub struct RuleSetRegistry {
    components: Vec<Registered>,
}

impl RuleSetRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// A registry with all built-in components
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::empty();

        registry.register(Box::new(crate::components::Cinder))?;
        registry.register(Box::new(crate::components::Nova))?;
        registry.register(Box::new(crate::components::OsBrick))?;

        Ok(registry)
    }

    /// Register a component, building and validating its rule sets
    pub fn register(&mut self, component: Box<dyn Component>) -> Result<(), RegistryError> {
        let name = component.name();
        if self.find(name).is_some() {
            return Err(RegistryError::DuplicateComponent(name.to_string()));
        }

        let rule_sets = component
            .rule_sets()
            .map_err(|source| RegistryError::InvalidRules {
                component: name.to_string(),
                source,
            })?;

        self.components.push(Registered {
            name,
            description: component.description(),
            rule_sets,
        });
        Ok(())
    }

    /// Get all component names
    pub fn all_names(&self) -> Vec<&'static str> {
        self.components.iter().map(|c| c.name).collect()
    }

    /// Get all components with their descriptions
    pub fn list_components(&self) -> Vec<(&'static str, &'static str)> {
        self.components
            .iter()
            .map(|c| (c.name, c.description))
            .collect()
    }

    /// All rule sets of a component
    pub fn rule_sets(&self, component: &str) -> Result<&[RuleSet], RegistryError> {
        self.find(component)
            .map(|c| c.rule_sets.as_slice())
            .ok_or_else(|| RegistryError::UnknownComponent(component.to_string()))
    }

    /// The rule set for one managed file of a component
    pub fn rule_set(&self, component: &str, path: &str) -> Result<&RuleSet, RegistryError> {
        self.rule_sets(component)?
            .iter()
            .find(|s| s.path() == path)
            .ok_or_else(|| RegistryError::UnknownFile {
                component: component.to_string(),
                path: path.to_string(),
            })
    }

    /// The files a component manages, whole-file replacements marked as such
    pub fn managed_files(&self, component: &str) -> Result<Vec<ManagedFile>, RegistryError> {
        Ok(self
            .rule_sets(component)?
            .iter()
            .map(|set| ManagedFile {
                component: set.component().to_string(),
                path: set.path().to_string(),
                mode: if set.is_whole_file() {
                    FileMode::Replace
                } else {
                    FileMode::Merge
                },
                rules: set.describe(),
            })
            .collect())
    }

    fn find(&self, name: &str) -> Option<&Registered> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osi_core::{ExtractionRule, RuleKind};

    struct Fake;

    impl Component for Fake {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn description(&self) -> &'static str {
            "test component"
        }

        fn rule_sets(&self) -> osi_core::Result<Vec<RuleSet>> {
            Ok(vec![
                RuleSet::new("fake", "a.py", vec![ExtractionRule::class("A")])?,
                RuleSet::new("fake", "b.py", vec![ExtractionRule::whole_file("b")])?,
            ])
        }
    }

    struct Broken;

    impl Component for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn description(&self) -> &'static str {
            "rules that cannot be built"
        }

        fn rule_sets(&self) -> osi_core::Result<Vec<RuleSet>> {
            Ok(vec![RuleSet::new("broken", "x.py", vec![])?])
        }
    }

    #[test]
    fn test_defaults_register_all_components() {
        let registry = RuleSetRegistry::with_defaults().unwrap();
        assert_eq!(registry.all_names(), vec!["cinder", "nova", "os_brick"]);
    }

    #[test]
    fn test_managed_files_marks_replacements() {
        let mut registry = RuleSetRegistry::empty();
        registry.register(Box::new(Fake)).unwrap();

        let files = registry.managed_files("fake").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "a.py");
        assert_eq!(files[0].mode, FileMode::Merge);
        assert_eq!(files[0].rules[0].kind, RuleKind::ClassRegion);
        assert_eq!(files[1].mode, FileMode::Replace);
    }

    #[test]
    fn test_os_brick_has_merge_and_replace_files() {
        let registry = RuleSetRegistry::with_defaults().unwrap();
        let files = registry.managed_files("os_brick").unwrap();

        let modes: Vec<_> = files.iter().map(|f| (f.path.as_str(), f.mode)).collect();
        assert_eq!(
            modes,
            vec![
                ("exception.py", FileMode::Merge),
                ("initiator/connector.py", FileMode::Merge),
                ("initiator/connectors/storpool.py", FileMode::Replace),
            ]
        );
    }

    #[test]
    fn test_unknown_component() {
        let registry = RuleSetRegistry::with_defaults().unwrap();
        assert!(matches!(
            registry.rule_sets("glance"),
            Err(RegistryError::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_unknown_file() {
        let registry = RuleSetRegistry::with_defaults().unwrap();
        let err = registry.rule_set("cinder", "volume/manager.py").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Component 'cinder' does not manage volume/manager.py"
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = RuleSetRegistry::empty();
        registry.register(Box::new(Fake)).unwrap();
        assert!(matches!(
            registry.register(Box::new(Fake)),
            Err(RegistryError::DuplicateComponent(_))
        ));
    }

    #[test]
    fn test_invalid_rules_rejected_at_registration() {
        let mut registry = RuleSetRegistry::empty();
        let err = registry.register(Box::new(Broken)).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRules { .. }));
        assert!(registry.all_names().is_empty());
    }
}
