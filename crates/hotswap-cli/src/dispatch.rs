use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use hotswap_core::SwapConfig;
use hotswap_engine::{
    scan_staged, stage_file, sweep_backups, ExclusiveAccessProbe, LockProbe, SessionOutcome,
    SwapLayout, UpdateLog, UpdateSession,
};

use crate::completion::write_completions_script;
use crate::render::{
    current_output_style, format_outcome_lines, format_status_lines, print_lines,
    render_status_line, OutputStyle, StatusEntry,
};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style(cli.plain);
    if let Commands::Completions { shell } = cli.command {
        return write_completions_script(shell, &mut io::stdout().lock());
    }

    let config = resolve_config(cli.config.as_deref(), cli.root, cli.log_dir)?;
    let layout = SwapLayout::resolve(&config)?;

    match cli.command {
        Commands::Apply => {
            let session = UpdateSession::new(layout.clone(), &config)?;
            let outcome = session.apply();
            print_lines(&format_outcome_lines(&outcome, layout.root(), style));
            ensure_not_aborted(&outcome)?;
        }
        Commands::Defer => {
            let session = UpdateSession::new(layout.clone(), &config)?;
            let outcome = session.request_external_update();
            print_lines(&format_outcome_lines(&outcome, layout.root(), style));
            ensure_not_aborted(&outcome)?;
        }
        Commands::Status { json } => {
            let entries = collect_status(&layout, &config, &ExclusiveAccessProbe)?;
            if json {
                let rendered = serde_json::to_string_pretty(&entries)
                    .context("failed to encode status as JSON")?;
                println!("{rendered}");
            } else {
                print_lines(&format_status_lines(&entries, style));
            }
        }
        Commands::Clean => {
            let log = UpdateLog::for_layout(&layout);
            let removed = sweep_backups(layout.root(), &config.convention()?, &log);
            println!(
                "{}",
                render_status_line(
                    style,
                    "ok",
                    &format!(
                        "removed {removed} backup file(s) under {}",
                        layout.root().display()
                    ),
                )
            );
        }
        Commands::Stage { source, target } => {
            let staged = stage_file(&source, &target, &config.convention()?)?;
            println!(
                "{}",
                render_status_line(style, "ok", &format!("staged {}", staged.display()))
            );
        }
        Commands::Paths => print_lines(&format_path_lines(&layout, style)),
        Commands::Completions { .. } => {}
    }

    Ok(())
}

pub(crate) fn resolve_config(
    config_path: Option<&Path>,
    root: Option<PathBuf>,
    log_dir: Option<PathBuf>,
) -> Result<SwapConfig> {
    let mut config = match config_path {
        Some(path) => SwapConfig::load(path)?,
        None => SwapConfig::default(),
    };
    if root.is_some() {
        config.root = root;
    }
    if log_dir.is_some() {
        config.log_dir = log_dir;
    }
    Ok(config)
}

pub(crate) fn collect_status(
    layout: &SwapLayout,
    config: &SwapConfig,
    probe: &dyn LockProbe,
) -> Result<Vec<StatusEntry>> {
    let staged = scan_staged(layout.root(), &config.convention()?)?;
    Ok(staged
        .iter()
        .map(|file| StatusEntry::new(file, probe.probe(&file.target_path).is_locked()))
        .collect())
}

pub(crate) fn format_path_lines(layout: &SwapLayout, style: OutputStyle) -> Vec<String> {
    let log_file = UpdateLog::for_layout(layout)
        .current_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(disabled)".to_string());
    let rows = [
        ("root", layout.root().display().to_string()),
        ("log", log_file),
        ("agent", layout.agent_dir().display().to_string()),
    ];
    rows.into_iter()
        .map(|(label, value)| match style {
            OutputStyle::Plain => format!("{label}: {value}"),
            OutputStyle::Rich => render_status_line(style, label, &value),
        })
        .collect()
}

fn ensure_not_aborted(outcome: &SessionOutcome) -> Result<()> {
    match outcome {
        SessionOutcome::Aborted => Err(anyhow!("update session aborted")),
        SessionOutcome::AlreadyExecuted | SessionOutcome::Completed(_) => Ok(()),
    }
}
