//! HTML renderings of alert groups and recovery edits

use chrono::{DateTime, Utc};
use std::fmt::Write;

use super::consolidator::{PendingDownAlert, PendingDownGroup};
use crate::monitoring::types::AlertEvent;
use crate::util::{html_escape, rfc3339};

/// Compact downtime: `45s`, `2m5s`, `1h2m5s`. Negative spans read as zero.
pub fn format_duration_short(duration: chrono::Duration) -> String {
    let total = duration.num_seconds().max(0);
    if total < 60 {
        return format!("{total}s");
    }
    let (minutes, seconds) = (total / 60, total % 60);
    if minutes < 60 {
        return format!("{minutes}m{seconds}s");
    }
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!("{hours}h{minutes}m{seconds}s")
}

fn target_line(event: &AlertEvent) -> String {
    format!(
        "- <code>{}</code> (<code>{}:{}</code>)",
        html_escape(&event.target),
        html_escape(&event.address),
        event.port
    )
}

/// New-message rendering of one (kind, reason) group.
///
/// `events` must be non-empty and already sorted by target name.
pub fn format_alert_group(events: &[AlertEvent]) -> String {
    let Some(first) = events.first() else {
        return String::new();
    };

    let mut out = String::new();
    if events.len() == 1 {
        let _ = writeln!(out, "<b>{}</b>", first.kind);
    } else {
        let _ = writeln!(out, "<b>{} x{}</b>", first.kind, events.len());
    }
    let _ = writeln!(out, "reason: <code>{}</code>", first.reason);
    let _ = writeln!(out, "time_utc: <code>{}</code>", rfc3339(first.occurred));
    out.push_str("targets:");
    for event in events {
        out.push('\n');
        out.push_str(&target_line(event));
    }
    out
}

/// Edit text for a single target that came back within the window
pub fn format_recovered_edit(recovered: &AlertEvent, pending: &PendingDownAlert) -> String {
    let downtime = recovered.occurred - pending.down_at;

    let mut out = String::from("<b>DOWN -> RECOVERED</b>\n");
    let _ = writeln!(out, "reason: <code>{}</code>", recovered.reason);
    let _ = writeln!(out, "down_at_utc: <code>{}</code>", rfc3339(pending.down_at));
    let _ = writeln!(out, "recovered_at_utc: <code>{}</code>", rfc3339(recovered.occurred));
    let _ = writeln!(out, "downtime: <code>{}</code>", format_duration_short(downtime));
    out.push_str("target:\n");
    out.push_str(&target_line(recovered));
    out
}

/// Edit text for a whole group that came back within the window.
///
/// Each member's downtime is measured from its own down event.
pub fn format_grouped_recovery_edit(pending: &PendingDownGroup, recoveries: &[AlertEvent]) -> String {
    let Some(first) = recoveries.first() else {
        return String::new();
    };
    let latest: DateTime<Utc> =
        recoveries.iter().map(|ev| ev.occurred).max().unwrap_or(first.occurred);

    let mut sorted: Vec<&AlertEvent> = recoveries.iter().collect();
    sorted.sort_by(|a, b| a.target.cmp(&b.target));

    let mut out = String::new();
    let _ = writeln!(out, "<b>DOWN -> RECOVERED x{}</b>", recoveries.len());
    let _ = writeln!(out, "reason: <code>{}</code>", first.reason);
    let _ = writeln!(out, "time_utc: <code>{}</code>", rfc3339(latest));
    out.push_str("targets:");
    for event in sorted {
        let down_at = pending
            .targets
            .get(&event.target)
            .map(|down| down.occurred)
            .unwrap_or(pending.down_at);
        out.push('\n');
        out.push_str(&target_line(event));
        let _ = write!(
            out,
            "\nrecovered_at_utc: <code>{}</code>\ndowntime: <code>{}</code>",
            rfc3339(event.occurred),
            format_duration_short(event.occurred - down_at)
        );
    }
    out
}
