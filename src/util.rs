use std::io::IsTerminal;

use anyhow::Result;
use cli_table::{Cell, CellStruct, Style, Table, format::Justify, print_stdout};
use owo_colors::OwoColorize;

use crate::planner::CoveringDirectory;
use crate::transfer::RunReport;
use crate::validate::ValidationSummary;

/// Try to enable ANSI escape sequence support on Windows consoles.
#[cfg(windows)]
pub fn try_enable_ansi_on_windows() -> bool {
    enable_ansi_support::enable_ansi_support().is_ok()
}

#[cfg(not(windows))]
pub fn try_enable_ansi_on_windows() -> bool {
    true
}

/// Colour only when stdout is a terminal that understands ANSI.
pub fn colors_enabled() -> bool {
    std::io::stdout().is_terminal() && try_enable_ansi_on_windows()
}

/// Print the covering directories that are about to be re-synced.
pub fn print_plan(pairs: &[CoveringDirectory]) -> Result<()> {
    if pairs.is_empty() {
        return Ok(());
    }
    let title = vec!["#".cell().bold(true), "Source".cell().bold(true), "Destination".cell().bold(true)];
    let rows: Vec<Vec<CellStruct>> = pairs
        .iter()
        .enumerate()
        .map(|(i, p)| {
            vec![(i + 1).cell().justify(Justify::Right), p.source.as_str().cell(), p.destination.as_str().cell()]
        })
        .collect();
    print_stdout(rows.table().title(title))?;
    Ok(())
}

/// One-line summary after the orchestrator finished.
pub fn print_run_summary(report: &RunReport) {
    let line = format!(
        "同步完成: {} 个目录, 失败 {} 个, 总耗时 {:.3} 分钟",
        report.timings.len(),
        report.failed.len(),
        report.total_minutes()
    );
    if !colors_enabled() {
        println!("{}", line);
    } else if report.failed.is_empty() {
        println!("{}", line.green());
    } else {
        println!("{}", line.yellow());
    }
    for (pair, code) in &report.failed {
        let code = code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string());
        println!("   ⚠️  {} -> {} (exit {})", pair.source, pair.destination, code);
    }
}

pub fn print_validation_summary(summary: &ValidationSummary) {
    let ok = format!("成功 {}", summary.success);
    let bad = format!("失败 {}", summary.failed);
    if colors_enabled() {
        println!("📋 校验完成: 共 {} 个文件 | {} | {}", summary.total, ok.green(), bad.red());
    } else {
        println!("📋 校验完成: 共 {} 个文件 | {} | {}", summary.total, ok, bad);
    }
}
