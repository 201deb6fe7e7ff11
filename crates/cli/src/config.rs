use anyhow::{Context, Result};
use po3_risk::TradingPhase;
use po3_service::ServiceConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything `po3.toml` can set. Missing sections keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub server: ServerConfig,
    pub service: ServiceConfig,
    pub risk: RiskConfig,
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub phase: TradingPhase,
    /// Starting balance of the evaluation account, for progress reports.
    pub initial_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// CSV file backing the trade journal. In-memory only when unset.
    pub path: Option<PathBuf>,
}

impl DeskConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: DeskConfig = toml::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults when no file is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let mt = &self.service.metatrader;
        if mt.connect_timeout_ms == 0 || mt.request_timeout_ms == 0 {
            anyhow::bail!("metatrader timeouts must be > 0");
        }
        if let Some(balance) = self.risk.initial_balance {
            if balance <= Decimal::ZERO {
                anyhow::bail!("initial_balance must be > 0");
            }
        }
        Ok(())
    }
}
