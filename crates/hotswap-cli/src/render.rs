use std::io::IsTerminal;
use std::path::Path;

use anstyle::{AnsiColor, Effects, Style};
use hotswap_engine::{ApplyReport, SessionOutcome, StagedFile};
use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style(plain: bool) -> OutputStyle {
    if plain || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

pub(crate) fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = format!("[{}]", status_badge(status));
            format!("{} {message}", colorize(status_style(status), &badge))
        }
    }
}

fn status_badge(status: &str) -> String {
    match status {
        "ok" => "OK".to_string(),
        "defer" => "DEFER".to_string(),
        "warn" => "WARN".to_string(),
        "error" => "ERR".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "defer" | "warn" => AnsiColor::BrightYellow,
        "error" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightCyan,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub(crate) fn format_outcome_lines(
    outcome: &SessionOutcome,
    root: &Path,
    style: OutputStyle,
) -> Vec<String> {
    match outcome {
        SessionOutcome::AlreadyExecuted => vec![render_status_line(
            style,
            "warn",
            "update session already ran",
        )],
        SessionOutcome::Aborted => vec![render_status_line(
            style,
            "error",
            "update session aborted; details are in the update log",
        )],
        SessionOutcome::Completed(report) => format_report_lines(report, root, style),
    }
}

fn format_report_lines(report: &ApplyReport, root: &Path, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    if report.backups_removed > 0 {
        lines.push(render_status_line(
            style,
            "info",
            &format!("removed {} backup file(s)", report.backups_removed),
        ));
    }
    if report.is_empty() {
        lines.push(render_status_line(
            style,
            "info",
            &format!("no staged files under {}", root.display()),
        ));
        return lines;
    }

    for file in &report.installed {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("installed {}", file.target_path.display()),
        ));
    }
    for file in &report.deferred {
        lines.push(render_status_line(
            style,
            "defer",
            &format!("deferred {}", file.target_path.display()),
        ));
    }

    match &report.agent {
        Some(agent) => {
            let pid = agent
                .pid
                .map(|pid| format!(" (pid {pid})"))
                .unwrap_or_default();
            lines.push(render_status_line(
                style,
                "info",
                &format!(
                    "retry agent started for {} file(s): {}{pid}",
                    agent.entries,
                    agent.script_path.display()
                ),
            ));
        }
        None if !report.deferred.is_empty() => lines.push(render_status_line(
            style,
            "warn",
            "retry agent could not be started; deferred files stay staged",
        )),
        None => {}
    }
    lines
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StatusEntry {
    pub(crate) staged: String,
    pub(crate) target: String,
    pub(crate) target_exists: bool,
    pub(crate) locked: bool,
}

impl StatusEntry {
    pub(crate) fn new(file: &StagedFile, locked: bool) -> Self {
        Self {
            staged: file.staged_path.display().to_string(),
            target: file.target_path.display().to_string(),
            target_exists: file.target_exists(),
            locked,
        }
    }
}

pub(crate) fn format_status_lines(entries: &[StatusEntry], style: OutputStyle) -> Vec<String> {
    if entries.is_empty() {
        return vec![render_status_line(style, "info", "no staged files")];
    }

    entries
        .iter()
        .map(|entry| {
            let (state, status) = if entry.locked {
                ("locked", "defer")
            } else {
                ("ready", "ok")
            };
            match style {
                OutputStyle::Plain => format!("{state}\t{}", entry.target),
                OutputStyle::Rich => {
                    let badge = format!("[{}]", state.to_ascii_uppercase());
                    format!("{} {}", colorize(status_style(status), &badge), entry.target)
                }
            }
        })
        .collect()
}
