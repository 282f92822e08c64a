mod agent;
mod fs_utils;
mod janitor;
mod layout;
mod log;
mod probe;
mod scan;
mod session;
mod stage;
mod swap;

pub use agent::{
    AgentHandle, AgentLauncher, AgentTiming, RetryAgentScript, RetryEntry, ScriptFlavor,
    ScriptLauncher,
};
pub use janitor::{sweep_backups, sweep_backups_with};
pub use layout::{default_install_root, default_log_dir, SwapLayout};
pub use log::{LogEntry, LogLevel, UpdateLog};
pub use probe::{ExclusiveAccessProbe, LockProbe, LockState};
pub use scan::{scan_backups, scan_staged};
pub use session::{ApplyReport, SessionOutcome, UpdateSession};
pub use stage::{stage_file, stage_file_with};
pub use swap::swap_now;

pub use hotswap_core::{StagedFile, SuffixConvention, SwapConfig};
