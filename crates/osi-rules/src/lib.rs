//! osi-rules: Rule sets for the OpenStack components StorPool integrates with
//!
//! Each component lists the files it manages and, per file, the regions to
//! merge from the StorPool template (or a whole-file replacement).
//!
//! Adding support for another upstream file means adding a rule set to the
//! owning component; nothing else changes.

pub mod components;
mod registry;

pub use registry::{Component, FileMode, ManagedFile, RegistryError, RuleSetRegistry};
