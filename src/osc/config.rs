//! OSC configuration: listen port and mapping rules, the `osc:` section of
//! the engine config.

use serde::{Deserialize, Serialize};

use super::mapping::{OscMapping, OscTarget};
use crate::vm::variables::CONTROL_COUNT;

/// OSC configuration loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscConfig {
    /// UDP port to listen on.
    #[serde(default = "default_port")]
    pub listen_port: u16,
    /// Mapping rules from OSC addresses to control events.
    #[serde(default = "OscConfig::default_mappings")]
    pub mappings: Vec<OscMapping>,
}

fn default_port() -> u16 {
    9000
}

impl OscConfig {
    /// Default mappings: /slider/1-4, /source.
    fn default_mappings() -> Vec<OscMapping> {
        let mut mappings: Vec<OscMapping> = (0..CONTROL_COUNT)
            .map(|i| OscMapping {
                address_pattern: format!("/slider/{}", i + 1),
                target: OscTarget::Control(i),
            })
            .collect();
        mappings.push(OscMapping {
            address_pattern: "/source".to_string(),
            target: OscTarget::Source,
        });
        mappings
    }
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            listen_port: default_port(),
            mappings: Self::default_mappings(),
        }
    }
}
