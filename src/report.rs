//! Human-readable and JSON renderings of a [`RunSummary`].

use std::fs;
use std::path::Path;

use colored::*;

use crate::error::Result;
use crate::models::metrics::{CheckTally, RunSummary};

fn check_line(tally: &CheckTally) -> String {
    let total = tally.passes + tally.fails;
    let percent = if total == 0 {
        0.0
    } else {
        tally.passes as f64 * 100.0 / total as f64
    };

    if tally.fails == 0 {
        format!("  {} {}", "✓".green().bold(), tally.name.green())
    } else {
        format!(
            "  {} {}\n     {} {:.0}% | {} {} / {} {}",
            "✗".red().bold(),
            tally.name.red(),
            "↳".dimmed(),
            percent,
            "✓".green(),
            tally.passes,
            "✗".red(),
            tally.fails
        )
    }
}

fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("{} {}", format!("{:<21}:", label).blue().bold(), value)
}

fn banner(title: &str) -> String {
    format!(" ======== {} ======== ", title).bold().white().on_blue().to_string()
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut lines = vec![
        String::new(),
        banner("TEST RESULTS"),
        field("Name", summary.name.bold()),
        field("Target", summary.target_url.bold()),
        field("Timestamp", summary.timestamp.bold()),
        field(
            "Virtual users",
            format!(
                "{} for {:.1}s (ran {:.1}s)",
                summary.virtual_users, summary.duration_secs, summary.elapsed_secs
            ),
        ),
        field("Total requests", summary.total_requests),
        field("Successful requests", summary.successful_requests),
        field("Failed requests", summary.failed_requests),
        String::new(),
        banner("CHECKS"),
    ];

    lines.extend(summary.checks.iter().map(check_line));
    lines.push(format!(
        "  checks: {} of {} passed",
        summary.passed_checks(),
        summary.total_checks()
    ));

    lines.push(String::new());
    lines.push(banner("STATUS BREAKDOWN"));
    lines.extend(
        summary
            .status_counts
            .iter()
            .map(|(status, count)| format!("• {}: {}", status.bold(), count)),
    );

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn print_summary(summary: &RunSummary) {
    print!("{}", render_summary(summary));
}

/// Writes the summary as pretty JSON.
pub fn export_json(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}
