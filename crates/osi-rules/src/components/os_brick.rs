//! os-brick: the StorPool connector and its wiring into the connector factory

use osi_core::{ExtractionRule, Pattern, Result, RuleSet};

use crate::Component;

pub struct OsBrick;

impl Component for OsBrick {
    fn name(&self) -> &'static str {
        "os_brick"
    }

    fn description(&self) -> &'static str {
        "Volume attachment library: StorPool connector and exceptions"
    }

    fn rule_sets(&self) -> Result<Vec<RuleSet>> {
        Ok(vec![
            RuleSet::new(
                self.name(),
                "exception.py",
                vec![
                    ExtractionRule::class("StorPoolApiError"),
                    ExtractionRule::class("StorPoolVolumeError"),
                ],
            )?,
            RuleSet::new(
                self.name(),
                "initiator/connector.py",
                vec![ExtractionRule::chunk(
                    "connector_mapping_linux",
                    Pattern::literal("_connector_mapping_linux = {"),
                    Pattern::literal("}"),
                )],
            )?,
            RuleSet::new(
                self.name(),
                "initiator/connectors/storpool.py",
                vec![ExtractionRule::whole_file("storpool_connector")],
            )?,
        ])
    }
}
