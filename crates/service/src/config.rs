use po3_brokers_metatrader::MetaTraderConfig;
use po3_core::BrokerPreset;
use serde::{Deserialize, Serialize};

/// Service-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub metatrader: MetaTraderConfig,
    /// Broker presets offered when adding an account.
    pub presets: Vec<BrokerPreset>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            metatrader: MetaTraderConfig::default(),
            presets: BrokerPreset::defaults(),
        }
    }
}
