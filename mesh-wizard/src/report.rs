use colored::Colorize;
use uci_core::{format_summary, format_text, ChangeEntry};

use crate::bridge::BridgeConflict;
use crate::planner::PlanSummary;

/// Render staged changes for terminal output.
pub fn render_changes(entries: &[ChangeEntry]) -> String {
    if entries.is_empty() {
        return "no changes".dimmed().to_string();
    }
    let raw = format_text(entries);
    let mut out = Vec::new();

    for line in raw.lines() {
        let colored = if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with('~') {
            line.yellow().to_string()
        } else {
            line.to_string()
        };
        out.push(colored);
    }

    out.join("\n")
}

/// Render change counts for terminal output.
pub fn render_summary(entries: &[ChangeEntry]) -> String {
    format_summary(entries).cyan().to_string()
}

/// Render what the planner decided.
pub fn render_plan(summary: &PlanSummary) -> String {
    let mut out = vec![format!("role={}", summary.role)];
    if let Some(uplink) = &summary.uplink {
        out.push(format!("uplink={uplink}"));
    }
    if let Some(mode) = summary.traffic_mode {
        out.push(format!("traffic_mode={mode}"));
    }
    out.push(format!("bridge_mac={}", summary.bridge_mac));
    if summary.forwardings.is_empty() {
        out.push("forwarding=none".to_string());
    } else {
        out.push(format!("forwarding={}", summary.forwardings.join(",")));
    }
    out.join(" ").bold().to_string()
}

/// Operator-facing explanation of a bridge conflict, with the ways out.
pub fn render_bridge_conflict(conflict: &BridgeConflict) -> String {
    let clients: String = conflict
        .non_wds_clients
        .iter()
        .map(|c| format!("\n - {c}"))
        .collect();
    let others: String = conflict
        .other_devices
        .iter()
        .map(|d| format!("\n - {d}"))
        .collect();

    format!(
        "The configuration for the \"{}\" network is not supported.\n\n\
         If a network has a non-WDS Wi-Fi client, it must be the only device.\n\n\
         This network currently has non-WDS Wi-Fi clients: {clients}\n\n\
         This network currently has other devices: {others}\n\n\
         Please do one of:\n \
         - remove the non-WDS Wi-Fi clients;\n \
         - enable WDS for the Wi-Fi clients (if possible); or\n \
         - remove all other devices from this network to leave a single non-WDS Wi-Fi client.\n",
        conflict.network.red()
    )
}
