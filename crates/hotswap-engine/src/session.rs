use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use hotswap_core::{StagedFile, SuffixConvention, SwapConfig};

use crate::agent::{
    AgentHandle, AgentLauncher, AgentTiming, RetryAgentScript, ScriptFlavor, ScriptLauncher,
};
use crate::janitor::sweep_backups;
use crate::layout::SwapLayout;
use crate::log::UpdateLog;
use crate::probe::{ExclusiveAccessProbe, LockProbe, LockState};
use crate::scan::scan_staged;
use crate::swap::swap_now;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub installed: Vec<StagedFile>,
    pub deferred: Vec<StagedFile>,
    pub agent: Option<AgentHandle>,
    pub backups_removed: usize,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty() && self.deferred.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    AlreadyExecuted,
    Completed(ApplyReport),
    Aborted,
}

impl SessionOutcome {
    pub fn report(&self) -> Option<&ApplyReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyExecuted | Self::Aborted => None,
        }
    }
}

type Scanner = dyn Fn(&Path, &SuffixConvention) -> Result<Vec<StagedFile>> + Send + Sync;

pub struct UpdateSession {
    layout: SwapLayout,
    convention: SuffixConvention,
    timing: AgentTiming,
    agent_title: String,
    flavor: ScriptFlavor,
    probe: Box<dyn LockProbe>,
    launcher: Box<dyn AgentLauncher>,
    scanner: Box<Scanner>,
    log: UpdateLog,
    executed: AtomicBool,
}

impl UpdateSession {
    pub fn new(layout: SwapLayout, config: &SwapConfig) -> Result<Self> {
        let convention = config.convention()?;
        let log = UpdateLog::for_layout(&layout);
        Ok(Self {
            layout,
            convention,
            timing: AgentTiming::from_settings(&config.agent),
            agent_title: config.agent.title.clone(),
            flavor: ScriptFlavor::native(),
            probe: Box::new(ExclusiveAccessProbe),
            launcher: Box::new(ScriptLauncher::default()),
            scanner: Box::new(scan_staged),
            log,
            executed: AtomicBool::new(false),
        })
    }

    pub fn with_probe(mut self, probe: impl LockProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_launcher(
        mut self,
        launcher: impl AgentLauncher + 'static,
        flavor: ScriptFlavor,
    ) -> Self {
        self.launcher = Box::new(launcher);
        self.flavor = flavor;
        self
    }

    pub fn with_scanner<Scan>(mut self, scanner: Scan) -> Self
    where
        Scan: Fn(&Path, &SuffixConvention) -> Result<Vec<StagedFile>> + Send + Sync + 'static,
    {
        self.scanner = Box::new(scanner);
        self
    }

    pub fn with_log(mut self, log: UpdateLog) -> Self {
        self.log = log;
        self
    }

    pub fn layout(&self) -> &SwapLayout {
        &self.layout
    }

    pub fn convention(&self) -> &SuffixConvention {
        &self.convention
    }

    pub fn log(&self) -> &UpdateLog {
        &self.log
    }

    pub fn has_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    /// Runs once per session; the latch is set even when the run aborts.
    pub fn apply(&self) -> SessionOutcome {
        if self.executed.swap(true, Ordering::SeqCst) {
            return SessionOutcome::AlreadyExecuted;
        }

        match self.run_apply() {
            Ok(report) => SessionOutcome::Completed(report),
            Err(err) => {
                self.log.error("critical error during apply", &err);
                SessionOutcome::Aborted
            }
        }
    }

    pub fn request_external_update(&self) -> SessionOutcome {
        match self.run_external() {
            Ok(report) => SessionOutcome::Completed(report),
            Err(err) => {
                self.log
                    .error("critical error during external update request", &err);
                SessionOutcome::Aborted
            }
        }
    }

    fn run_apply(&self) -> Result<ApplyReport> {
        let root = self.layout.root();
        let mut report = ApplyReport {
            backups_removed: sweep_backups(root, &self.convention, &self.log),
            ..ApplyReport::default()
        };

        let staged = (self.scanner)(root, &self.convention)?;
        if staged.is_empty() {
            return Ok(report);
        }
        self.log.info(format!(
            "{} staged file(s) detected, starting replacement in {}",
            staged.len(),
            root.display()
        ));

        for file in staged {
            let name = file.display_name();
            if self.probe.probe(&file.target_path) == LockState::Locked {
                self.log
                    .info(format!("file is locked, scheduled for deferred update: {name}"));
                report.deferred.push(file);
                continue;
            }

            match swap_now(&file) {
                Ok(()) => {
                    self.log.info(format!("successfully replaced: {name}"));
                    report.installed.push(file);
                }
                Err(err) => {
                    self.log.warn(format!(
                        "immediate replace failed, adding to deferred batch: {name} ({err:#})"
                    ));
                    report.deferred.push(file);
                }
            }
        }

        if !report.deferred.is_empty() {
            report.agent = self.schedule(&report.deferred);
        }
        Ok(report)
    }

    fn run_external(&self) -> Result<ApplyReport> {
        let root = self.layout.root();
        let staged = (self.scanner)(root, &self.convention)?;
        if staged.is_empty() {
            return Ok(ApplyReport::default());
        }

        self.log.info(format!(
            "external update requested, {} file(s) scheduled",
            staged.len()
        ));
        let agent = self.schedule(&staged);
        Ok(ApplyReport {
            deferred: staged,
            agent,
            ..ApplyReport::default()
        })
    }

    fn schedule(&self, files: &[StagedFile]) -> Option<AgentHandle> {
        let script = RetryAgentScript::build(
            files,
            self.log.current_path(),
            self.layout.agent_script_path(self.flavor),
            self.timing,
            self.agent_title.clone(),
        );

        match self.launcher.launch(&script) {
            Ok(handle) => {
                self.log.info(format!(
                    "deferred update agent started for {} file(s): {}",
                    handle.entries,
                    handle.script_path.display()
                ));
                Some(handle)
            }
            Err(err) => {
                self.log.error("failed to schedule deferred update", &err);
                None
            }
        }
    }
}
