use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::naming::{SuffixConvention, DEFAULT_BACKUP_SUFFIX, DEFAULT_STAGED_SUFFIX};

pub const DEFAULT_APP_NAME: &str = "hotswap";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SwapConfig {
    pub app_name: String,
    pub root: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub agent_dir: Option<PathBuf>,
    pub staged_suffix: String,
    pub backup_suffix: String,
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AgentSettings {
    pub title: String,
    pub grace_period_secs: u64,
    pub retry_interval_secs: u64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            root: None,
            log_dir: None,
            agent_dir: None,
            staged_suffix: DEFAULT_STAGED_SUFFIX.to_string(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            agent: AgentSettings::default(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            title: format!("{DEFAULT_APP_NAME} deferred updater"),
            grace_period_secs: 3,
            retry_interval_secs: 1,
        }
    }
}

impl SwapConfig {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse hotswap config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    pub fn convention(&self) -> anyhow::Result<SuffixConvention> {
        SuffixConvention::new(self.staged_suffix.clone(), self.backup_suffix.clone())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let trimmed = self.app_name.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("app_name must not be empty"));
        }
        if trimmed.contains(['/', '\\']) {
            return Err(anyhow!(
                "app_name must not contain path separators: {}",
                self.app_name
            ));
        }
        if self.agent.title.contains(['\r', '\n']) {
            return Err(anyhow!("agent title must be a single line"));
        }
        if self.agent.retry_interval_secs == 0 {
            return Err(anyhow!("agent retry_interval_secs must be at least 1"));
        }
        self.convention()?;
        Ok(())
    }
}
