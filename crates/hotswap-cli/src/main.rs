use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod render;

use completion::CliCompletionShell;

const LOG_ENV_VAR: &str = "HOTSWAP_LOG";

#[derive(Parser, Debug)]
#[command(name = "hotswap")]
#[command(about = "Install staged file updates, deferring locked files to a retry agent", long_about = None)]
struct Cli {
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    plain: bool,
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Apply,
    Defer,
    Status {
        #[arg(long)]
        json: bool,
    },
    Clean,
    Stage { source: PathBuf, target: PathBuf },
    Paths,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    dispatch::run_cli(cli)
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
