//! Chat commands: `/help`, `/list`, `/status` and `/logs <target>`.

use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::database::LogRow;
use crate::monitoring::MonitorEngine;
use crate::monitoring::types::{MonitorStatus, Snapshot, TargetSnapshot};
use crate::notify::Transport;
use crate::util::{format_time, html_escape};

const LOGS_DAYS: u32 = 7;
const LOGS_LIMIT: usize = 120;
const LOG_MESSAGE_BUDGET: usize = 3800;
const MIN_LOG_BODY: usize = 256;

/// Read side of the engine as seen by commands
#[async_trait::async_trait]
pub trait QueryProvider: Send + Sync {
    async fn snapshot(&self) -> Snapshot;
    async fn logs(&self, target: &str, days: u32, limit: usize) -> (Vec<LogRow>, bool);
}

#[async_trait::async_trait]
impl QueryProvider for MonitorEngine {
    async fn snapshot(&self) -> Snapshot {
        MonitorEngine::snapshot(self).await
    }

    async fn logs(&self, target: &str, days: u32, limit: usize) -> (Vec<LogRow>, bool) {
        MonitorEngine::logs(self, target, days, limit).await
    }
}

/// Answers commands in the configured chat
pub struct CommandHandler {
    source: Arc<dyn QueryProvider>,
    transport: Arc<dyn Transport>,
    allowed_chat: i64,
}

impl CommandHandler {
    pub fn new(source: Arc<dyn QueryProvider>, transport: Arc<dyn Transport>, allowed_chat: i64) -> Self {
        Self { source, transport, allowed_chat }
    }

    /// Handle one incoming text message. Anything that is not a known
    /// command, or comes from another chat, is ignored.
    pub async fn handle(&self, chat_id: i64, text: &str) {
        if chat_id != self.allowed_chat {
            debug!(chat_id, "ignoring message from foreign chat");
            return;
        }
        let Some((command, arg)) = parse_command(text) else {
            return;
        };

        let responses = match command.as_str() {
            "start" | "help" => vec![help_text().to_string()],
            "list" => vec![list_text(&self.source.snapshot().await)],
            "status" => vec![status_text(&self.source.snapshot().await)],
            "logs" => match arg {
                None => vec!["Usage: /logs &lt;track_name&gt;".to_string()],
                Some(target) => self.logs_messages(&target).await,
            },
            _ => return,
        };

        for response in responses {
            if let Err(e) = self.transport.send_to(chat_id, &response).await {
                warn!(command = %command, chat_id, error = %e, "failed to send command response");
            }
        }
    }

    async fn logs_messages(&self, target: &str) -> Vec<String> {
        let (rows, found) = self.source.logs(target, LOGS_DAYS, LOGS_LIMIT).await;
        if !found {
            return vec!["Track not found. Use /list.".to_string()];
        }
        if rows.is_empty() {
            return vec!["No log rows for last 7 days.".to_string()];
        }

        let up = rows.iter().filter(|r| r.status == MonitorStatus::Up).count();
        let down = rows.iter().filter(|r| r.status == MonitorStatus::Down).count();
        let header = format!(
            "Track: <b>{}</b> | rows: {} | up: {} | down: {}",
            html_escape(target),
            rows.len(),
            up,
            down
        );
        render_log_chunks(&header, &rows)
    }
}

/// Split a command message into lowercased command and first argument.
///
/// Handles the `/command@botname` form used in group chats.
pub fn parse_command(text: &str) -> Option<(String, Option<String>)> {
    let raw = text.trim();
    if !raw.starts_with('/') {
        return None;
    }

    let mut parts = raw.split_whitespace();
    let first = parts.next()?.trim_start_matches('/');
    let command = match first.find('@') {
        Some(idx) if idx > 0 => &first[..idx],
        _ => first,
    };
    if command.is_empty() {
        return None;
    }

    Some((command.to_lowercase(), parts.next().map(str::to_string)))
}

pub fn help_text() -> &'static str {
    "<b>Port Tracker Bot</b>\n/list - tracks\n/status - current states\n/logs &lt;track&gt; - last 7 days"
}

fn sorted_targets(snapshot: &Snapshot) -> Vec<&TargetSnapshot> {
    let mut targets: Vec<_> = snapshot.targets.iter().collect();
    targets.sort_by(|a, b| a.name.cmp(&b.name));
    targets
}

pub fn list_text(snapshot: &Snapshot) -> String {
    if snapshot.targets.is_empty() {
        return "No tracks configured.".to_string();
    }

    let mut out = String::from("<b>Configured tracks</b>\n");
    for (idx, target) in sorted_targets(snapshot).into_iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. <b>{}</b> - <code>{}:{}</code>",
            idx + 1,
            html_escape(&target.name),
            html_escape(&target.address),
            target.port
        );
    }
    out
}

pub fn status_text(snapshot: &Snapshot) -> String {
    if snapshot.targets.is_empty() {
        return "No tracks configured.".to_string();
    }

    let mut out = format!(
        "<b>Status snapshot (UTC)</b>\ntracks: {} | up: {} | down: {} | unknown: {}\n\n",
        snapshot.total, snapshot.up, snapshot.down, snapshot.unknown
    );
    for (idx, target) in sorted_targets(snapshot).into_iter().enumerate() {
        let _ = write!(
            out,
            "{}. <b>{}</b>\nendpoint: <code>{}:{}</code>\nstate: <b>{}</b>\nchanged: <code>{}</code>\nchecked: <code>{}</code>\n\n",
            idx + 1,
            html_escape(&target.name),
            html_escape(&target.address),
            target.port,
            target.status,
            format_time(target.last_changed),
            format_time(target.last_checked)
        );
    }
    out
}

/// Render rows as `<pre>` blocks that each fit one message
pub fn render_log_chunks(header: &str, rows: &[LogRow]) -> Vec<String> {
    if rows.is_empty() {
        return vec![format!("{header}\n<pre>(empty)</pre>")];
    }

    let base_len = header.len() + "\n<pre>".len();
    let suffix = "</pre>";
    let max_body = LOG_MESSAGE_BUDGET.saturating_sub(base_len + suffix.len()).max(MIN_LOG_BODY);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for row in rows {
        let line = format!(
            "{}  {:<4}  {:<21}  {}\n",
            format_time(Some(row.checked_at)),
            row.status.to_string(),
            row.endpoint(),
            row.reason
        );
        if !current.is_empty() && current.len() + line.len() > max_body {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(idx, chunk)| {
            let body = html_escape(chunk.trim_end_matches('\n'));
            if total == 1 {
                format!("{header}\n<pre>{body}{suffix}")
            } else {
                format!("{header} ({}/{total})\n<pre>{body}{suffix}", idx + 1)
            }
        })
        .collect()
}
