//! cinder: the StorPool block storage driver

use osi_core::{ExtractionRule, Result, RuleSet};

use crate::Component;

pub struct Cinder;

impl Component for Cinder {
    fn name(&self) -> &'static str {
        "cinder"
    }

    fn description(&self) -> &'static str {
        "Block storage service: StorPool volume driver"
    }

    fn rule_sets(&self) -> Result<Vec<RuleSet>> {
        Ok(vec![RuleSet::new(
            self.name(),
            "volume/drivers/storpool.py",
            vec![ExtractionRule::whole_file("storpool_driver")],
        )?])
    }
}
