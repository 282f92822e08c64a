use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use hotswap_core::{AgentSettings, StagedFile};
use uuid::Uuid;

use crate::fs_utils::remove_file_if_exists;

const BANNER_RULE: &str = "==================================================";
const LABEL_PREFIX: &str = "retry_";
const LABEL_TOKEN_LEN: usize = 8;

#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTiming {
    pub grace_period: Duration,
    pub retry_interval: Duration,
}

impl Default for AgentTiming {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(3),
            retry_interval: Duration::from_secs(1),
        }
    }
}

impl AgentTiming {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self {
            grace_period: Duration::from_secs(settings.grace_period_secs),
            retry_interval: Duration::from_secs(settings.retry_interval_secs),
        }
    }

    pub fn grace_secs(&self) -> u64 {
        self.grace_period.as_secs()
    }

    /// Scripts only sleep in whole seconds; never less than one between
    /// attempts.
    pub fn retry_secs(&self) -> u64 {
        self.retry_interval.as_secs().max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    Cmd,
    Posix,
}

impl ScriptFlavor {
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Cmd
        } else {
            Self::Posix
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Cmd => "cmd",
            Self::Posix => "sh",
        }
    }

    fn line_ending(self) -> &'static str {
        match self {
            Self::Cmd => "\r\n",
            Self::Posix => "\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEntry {
    pub staged: StagedFile,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAgentScript {
    entries: Vec<RetryEntry>,
    log_path: Option<PathBuf>,
    script_path: PathBuf,
    timing: AgentTiming,
    title: String,
}

impl RetryAgentScript {
    pub fn build(
        files: &[StagedFile],
        log_path: Option<PathBuf>,
        script_path: impl Into<PathBuf>,
        timing: AgentTiming,
        title: impl Into<String>,
    ) -> Self {
        let mut taken = HashSet::with_capacity(files.len());
        let entries = files
            .iter()
            .map(|file| RetryEntry {
                staged: file.clone(),
                label: unique_label(&mut taken),
            })
            .collect();

        Self {
            entries,
            log_path,
            script_path: script_path.into(),
            timing,
            title: title.into(),
        }
    }

    pub fn entries(&self) -> &[RetryEntry] {
        &self.entries
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn timing(&self) -> AgentTiming {
        self.timing
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn render(&self, flavor: ScriptFlavor) -> String {
        let lines = match flavor {
            ScriptFlavor::Cmd => self.render_cmd(),
            ScriptFlavor::Posix => self.render_posix(),
        };
        let ending = flavor.line_ending();
        let mut script = lines.join(ending);
        script.push_str(ending);
        script
    }

    fn render_cmd(&self) -> Vec<String> {
        let grace = self.timing.grace_secs();
        let retry = self.timing.retry_secs();
        let title = cmd_text(&self.title);
        let log_line = |level: &str, message: &str| -> Option<String> {
            self.log_path.as_ref().map(|log| {
                format!(
                    ">> {} echo %date% %time% [{level:<5}] [Agent] {}",
                    cmd_quote(log),
                    cmd_text(message)
                )
            })
        };

        let mut lines = vec![
            "@echo off".to_string(),
            "chcp 65001 > nul".to_string(),
            format!("title {title}"),
            format!("echo {BANNER_RULE}"),
            format!("echo  {title}"),
            format!("echo {BANNER_RULE}"),
        ];
        lines.extend(log_line("INFO", "Start external update session."));
        lines.push(format!(
            "echo Waiting {grace}s for the host to release its files..."
        ));
        lines.push(format!("timeout /t {grace} /nobreak > nul"));

        for entry in &self.entries {
            let name = entry.staged.display_name();
            let target = cmd_quote(&entry.staged.target_path);
            let staged = cmd_quote(&entry.staged.staged_path);
            lines.push(format!(":{}", entry.label));
            lines.push(format!("echo Updating: {}", cmd_text(&name)));
            lines.push(format!("if exist {target} attrib -r {target} > nul"));
            lines.push(format!("del /f /q {target} > nul 2>&1"));
            lines.push(format!("move /y {staged} {target} > nul 2>&1"));
            lines.push(format!("if exist {staged} ("));
            lines.push(format!("  echo   - Still locked, retrying in {retry}s."));
            lines.extend(
                log_line("WARN", &format!("Retrying {name}...")).map(|line| format!("  {line}")),
            );
            lines.push(format!("  timeout /t {retry} /nobreak > nul"));
            lines.push(format!("  goto :{}", entry.label));
            lines.push(") else (".to_string());
            lines.push(format!("  echo   - Done: {}", cmd_text(&name)));
            lines.extend(
                log_line("INFO", &format!("Successfully replaced {name}."))
                    .map(|line| format!("  {line}")),
            );
            lines.push(")".to_string());
        }

        lines.extend(log_line("INFO", "External update session completed."));
        lines.push("echo All updates completed.".to_string());
        lines.push(format!(
            "(goto) 2>nul & del /f /q {}",
            cmd_quote(&self.script_path)
        ));
        lines
    }

    fn render_posix(&self) -> Vec<String> {
        let grace = self.timing.grace_secs();
        let retry = self.timing.retry_secs();

        let mut lines = vec![
            "#!/bin/sh".to_string(),
            format!("# {}", self.title),
            "say() {".to_string(),
            "  printf '%s\\n' \"$1\"".to_string(),
            "}".to_string(),
        ];
        match &self.log_path {
            Some(log) => {
                lines.push("log() {".to_string());
                lines.push(format!(
                    "  printf '%s [%-5s] [Agent] %s\\n' \"$(date '+%Y-%m-%d %H:%M:%S')\" \"$1\" \"$2\" >> {} 2>/dev/null",
                    sh_quote(&log.to_string_lossy())
                ));
                lines.push("}".to_string());
            }
            None => lines.push("log() { :; }".to_string()),
        }
        lines.push(format!("say {}", sh_quote(BANNER_RULE)));
        lines.push(format!("say {}", sh_quote(&format!(" {}", self.title))));
        lines.push(format!("say {}", sh_quote(BANNER_RULE)));
        lines.push(format!(
            "log INFO {}",
            sh_quote("Start external update session.")
        ));
        lines.push(format!(
            "say {}",
            sh_quote(&format!(
                "Waiting {grace}s for the host to release its files..."
            ))
        ));
        lines.push(format!("sleep {grace}"));

        for entry in &self.entries {
            let name = entry.staged.display_name();
            let target = sh_quote(&entry.staged.target_path.to_string_lossy());
            let staged = sh_quote(&entry.staged.staged_path.to_string_lossy());
            lines.push(String::new());
            lines.push(format!("{}() {{", entry.label));
            lines.push("  while :; do".to_string());
            lines.push(format!(
                "    say {}",
                sh_quote(&format!("Updating: {name}"))
            ));
            lines.push(format!("    if [ -e {target} ] || [ -L {target} ]; then"));
            lines.push(format!("      chmod u+w {target} 2>/dev/null"));
            lines.push(format!("      rm -f {target} 2>/dev/null"));
            lines.push("    fi".to_string());
            lines.push(format!("    if [ ! -d {target} ]; then"));
            lines.push(format!("      mv -f {staged} {target} 2>/dev/null"));
            lines.push("    fi".to_string());
            lines.push(format!("    if [ -e {staged} ]; then"));
            lines.push(format!(
                "      say {}",
                sh_quote(&format!("  - Still locked, retrying in {retry}s."))
            ));
            lines.push(format!(
                "      log WARN {}",
                sh_quote(&format!("Retrying {name}..."))
            ));
            lines.push(format!("      sleep {retry}"));
            lines.push("    else".to_string());
            lines.push(format!("      say {}", sh_quote(&format!("  - Done: {name}"))));
            lines.push(format!(
                "      log INFO {}",
                sh_quote(&format!("Successfully replaced {name}."))
            ));
            lines.push("      return 0".to_string());
            lines.push("    fi".to_string());
            lines.push("  done".to_string());
            lines.push("}".to_string());
            lines.push(entry.label.clone());
        }

        lines.push(String::new());
        lines.push(format!(
            "log INFO {}",
            sh_quote("External update session completed.")
        ));
        lines.push(format!("say {}", sh_quote("All updates completed.")));
        lines.push(format!(
            "rm -f -- {}",
            sh_quote(&self.script_path.to_string_lossy())
        ));
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    pub script_path: PathBuf,
    pub pid: Option<u32>,
    pub entries: usize,
}

pub trait AgentLauncher: Send + Sync {
    fn launch(&self, script: &RetryAgentScript) -> Result<AgentHandle>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLauncher {
    flavor: ScriptFlavor,
}

impl Default for ScriptLauncher {
    fn default() -> Self {
        Self::new(ScriptFlavor::native())
    }
}

impl ScriptLauncher {
    pub fn new(flavor: ScriptFlavor) -> Self {
        Self { flavor }
    }

    pub fn flavor(&self) -> ScriptFlavor {
        self.flavor
    }

    pub fn write_script(&self, script: &RetryAgentScript) -> Result<PathBuf> {
        let path = script.script_path().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, script.render(self.flavor))
            .with_context(|| format!("failed to write agent script: {}", path.display()))?;
        Ok(path)
    }
}

impl AgentLauncher for ScriptLauncher {
    fn launch(&self, script: &RetryAgentScript) -> Result<AgentHandle> {
        let path = self.write_script(script)?;
        let child = match spawn_detached(self.flavor, &path) {
            Ok(child) => child,
            Err(err) => {
                let _ = remove_file_if_exists(&path);
                return Err(err)
                    .with_context(|| format!("failed to start agent script: {}", path.display()));
            }
        };

        let pid = child.id();
        reap_in_background(child);
        Ok(AgentHandle {
            script_path: path,
            pid: Some(pid),
            entries: script.entries().len(),
        })
    }
}

/// The agent outlives any caller interest in it, but an exited child that
/// is never waited on stays a zombie for the rest of the host's life.
fn reap_in_background(mut child: Child) {
    let spawned = std::thread::Builder::new()
        .name("hotswap-agent-reaper".to_string())
        .spawn(move || {
            if let Err(err) = child.wait() {
                tracing::debug!("failed to reap agent process: {err}");
            }
        });
    if let Err(err) = spawned {
        tracing::debug!("agent process will not be reaped: {err}");
    }
}

fn spawn_detached(flavor: ScriptFlavor, path: &Path) -> std::io::Result<Child> {
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut command = match flavor {
        ScriptFlavor::Cmd => cmd_command(path),
        ScriptFlavor::Posix => {
            let mut command = Command::new("sh");
            command
                .arg(path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            command
        }
    };

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    command.spawn()
}

#[cfg(windows)]
fn cmd_command(path: &Path) -> Command {
    use std::os::windows::process::CommandExt;

    let mut command = Command::new("cmd");
    command
        .raw_arg(format!("/c \"{}\"", path.display()))
        .creation_flags(CREATE_NEW_CONSOLE);
    command
}

#[cfg(not(windows))]
fn cmd_command(path: &Path) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/c").arg(path);
    command
}

fn unique_label(taken: &mut HashSet<String>) -> String {
    loop {
        let token = Uuid::new_v4().simple().to_string();
        let label = format!("{LABEL_PREFIX}{}", &token[..LABEL_TOKEN_LEN]);
        if taken.insert(label.clone()) {
            return label;
        }
    }
}

fn cmd_quote(path: &Path) -> String {
    format!("\"{}\"", path.display().to_string().replace('%', "%%"))
}

fn cmd_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '%' => out.push_str("%%"),
            '^' | '&' | '|' | '<' | '>' | '(' | ')' => {
                out.push('^');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
