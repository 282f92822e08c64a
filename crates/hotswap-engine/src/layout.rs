use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use hotswap_core::SwapConfig;
use uuid::Uuid;

use crate::agent::ScriptFlavor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapLayout {
    root: PathBuf,
    log_dir: Option<PathBuf>,
    agent_dir: PathBuf,
    app_name: String,
}

impl SwapLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        log_dir: Option<PathBuf>,
        agent_dir: impl Into<PathBuf>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            log_dir,
            agent_dir: agent_dir.into(),
            app_name: app_name.into(),
        }
    }

    pub fn resolve(config: &SwapConfig) -> Result<Self> {
        let app_name = config.app_name.trim();
        let root = match &config.root {
            Some(root) => root.clone(),
            None => default_install_root()?,
        };
        let log_dir = config
            .log_dir
            .clone()
            .or_else(|| default_log_dir(app_name).ok());
        let agent_dir = config
            .agent_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Ok(Self::new(root, log_dir, agent_dir, app_name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    pub fn agent_dir(&self) -> &Path {
        &self.agent_dir
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn log_path(&self, date: NaiveDate) -> Option<PathBuf> {
        self.log_dir
            .as_ref()
            .map(|dir| dir.join(daily_log_file_name(&self.app_name, date)))
    }

    pub fn agent_script_path(&self, flavor: ScriptFlavor) -> PathBuf {
        self.agent_dir.join(format!(
            "{}_swap_{}.{}",
            self.app_name,
            Uuid::new_v4().simple(),
            flavor.extension()
        ))
    }
}

pub(crate) fn daily_log_file_name(app_name: &str, date: NaiveDate) -> String {
    format!("{app_name}.{}.log", date.format("%Y-%m-%d"))
}

pub fn default_install_root() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to resolve current executable path")?;
    let dir = exe
        .parent()
        .with_context(|| format!("executable has no parent directory: {}", exe.display()))?;
    Ok(dir.to_path_buf())
}

pub fn default_log_dir(app_name: &str) -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("APPDATA")
            .context("APPDATA is not set; cannot resolve Windows log directory")?;
        return Ok(PathBuf::from(app_data).join(app_name).join("logs"));
    }

    if let Some(state_home) = std::env::var_os("XDG_STATE_HOME").filter(|value| !value.is_empty())
    {
        return Ok(PathBuf::from(state_home).join(app_name).join("logs"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve log directory")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("state")
        .join(app_name)
        .join("logs"))
}
