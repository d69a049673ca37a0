//! nova: the libvirt volume driver for StorPool attachments

use osi_core::{ExtractionRule, Pattern, Result, RuleSet};

use crate::Component;

pub struct Nova;

impl Component for Nova {
    fn name(&self) -> &'static str {
        "nova"
    }

    fn description(&self) -> &'static str {
        "Compute service: libvirt StorPool volume driver"
    }

    fn rule_sets(&self) -> Result<Vec<RuleSet>> {
        Ok(vec![
            RuleSet::new(
                self.name(),
                "virt/libvirt/driver.py",
                vec![ExtractionRule::chunk(
                    "libvirt_volume_drivers",
                    Pattern::literal("libvirt_volume_drivers = ["),
                    Pattern::literal("]"),
                )],
            )?,
            RuleSet::new(
                self.name(),
                "virt/libvirt/volume/storpool.py",
                vec![ExtractionRule::whole_file("storpool_volume_driver")],
            )?,
        ])
    }
}
