mod config;
mod naming;
mod staged;

pub use config::{AgentSettings, SwapConfig, DEFAULT_APP_NAME};
pub use naming::{SuffixConvention, DEFAULT_BACKUP_SUFFIX, DEFAULT_STAGED_SUFFIX};
pub use staged::StagedFile;
