//! Terminal renderings of the four dashboard pages

use crate::api::{ApiClient, BackupInfo, ValidationReport};
use crate::error::Result;
use crate::routes::{Router, View};
use crate::status::{ServerStatus, StatusTone};
use crate::store::{ActionResult, StoreState};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt::Write;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Navigation bar with the current page marked
pub fn render_nav(current: View) -> String {
    Router
        .routes()
        .iter()
        .map(|route| {
            if route.view == current {
                format!("[{}]", route.meta.title)
            } else {
                format!(" {} ", route.meta.title)
            }
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn tone_marker(tone: StatusTone) -> &'static str {
    match tone {
        StatusTone::Success => "●",
        StatusTone::Error => "○",
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}

/// Dashboard page
pub fn render_dashboard(state: &StoreState) -> String {
    let status = &state.status;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "nginx: {} {} ({})",
        tone_marker(state.tone()),
        state.status_text(),
        state.tone().as_str()
    );
    if status.is_running {
        let _ = writeln!(out, "  PID:          {}", status.pid);
        let _ = writeln!(out, "  Uptime:       {}", or_unknown(&status.uptime));
    }
    let _ = writeln!(out, "  Version:      {}", or_unknown(&status.version));
    let _ = writeln!(out, "  Config valid: {}", yes_no(status.config_valid));
    if let Some(err) = status.last_error.as_deref() {
        let _ = writeln!(out, "  Last error:   {}", err);
    }
    let updated = status
        .updated_at
        .map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(out, "  Updated:      {}", updated);
    let _ = writeln!(
        out,
        "  Live updates: {}",
        if state.connected { "connected" } else { "disconnected" }
    );
    if state.busy() {
        let _ = writeln!(out, "  (working...)");
    }
    if let Some(err) = state.error.as_deref() {
        let _ = writeln!(out, "  Error: {}", err);
    }

    out
}

/// One-line summary of a lifecycle action outcome
pub fn render_action(result: &ActionResult) -> String {
    if result.success {
        format!("✓ {}", result.message)
    } else {
        format!("✗ {}", result.message)
    }
}

/// Editing session for the nginx config file
pub struct ConfigEditor {
    api: ApiClient,
    content: String,
    dirty: bool,
    last_report: Option<ValidationReport>,
}

impl ConfigEditor {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            content: String::new(),
            dirty: false,
            last_report: None,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// True when the content differs from what was last loaded or saved
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_report(&self) -> Option<&ValidationReport> {
        self.last_report.as_ref()
    }

    pub async fn load(&mut self) -> Result<()> {
        self.content = self.api.get_config().await?;
        self.dirty = false;
        self.last_report = None;
        Ok(())
    }

    /// Replace the buffer with the backend's template; the file is not saved
    pub async fn load_template(&mut self) -> Result<()> {
        let template = self.api.get_template().await?;
        self.set_content(template);
        Ok(())
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        if content != self.content {
            self.content = content;
            self.dirty = true;
            self.last_report = None;
        }
    }

    pub async fn validate(&mut self) -> Result<&ValidationReport> {
        let report = self.api.validate_config(&self.content).await?;
        Ok(self.last_report.insert(report))
    }

    pub async fn save(&mut self) -> Result<String> {
        let message = self.api.save_config(&self.content).await?;
        self.dirty = false;
        Ok(message)
    }
}

/// Config editor page: line-numbered content plus validation state
pub fn render_config(editor: &ConfigEditor) -> String {
    let mut out = String::new();
    let lines: Vec<&str> = editor.content().lines().collect();
    let width = lines.len().max(1).to_string().len();

    for (i, line) in lines.iter().enumerate() {
        let _ = writeln!(out, "{:>width$} | {}", i + 1, line, width = width);
    }
    if lines.is_empty() {
        let _ = writeln!(out, "(empty)");
    }

    let _ = writeln!(out);
    if editor.is_dirty() {
        let _ = writeln!(out, "Unsaved changes");
    }
    if let Some(report) = editor.last_report() {
        let mark = if report.valid { "✓" } else { "✗" };
        let _ = writeln!(out, "{} {}", mark, report.message);
    }

    out
}

/// Live status log, one line per observed change
#[derive(Debug)]
pub struct StatusLog {
    last_status: Option<ServerStatus>,
    last_connected: Option<bool>,
    lines: VecDeque<String>,
    capacity: usize,
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            last_status: None,
            last_connected: None,
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn push_line(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Record whatever changed since the previous observation.
    ///
    /// Returns the number of lines appended.
    pub fn observe(&mut self, state: &StoreState, at: DateTime<Utc>) -> usize {
        let stamp = at.format("%H:%M:%S");
        let mut added = 0;

        if self.last_connected != Some(state.connected) {
            let text = if state.connected {
                "live updates connected"
            } else {
                "live updates disconnected"
            };
            // the initial disconnected state is not news
            if self.last_connected.is_some() || state.connected {
                self.push_line(format!("[{}] {}", stamp, text));
                added += 1;
            }
            self.last_connected = Some(state.connected);
        }

        let changed = match &self.last_status {
            Some(last) => last.differs_from(&state.status),
            None => state.status.updated_at.is_some(),
        };
        if changed {
            let status = &state.status;
            let line = if status.is_running {
                format!(
                    "[{}] {} (pid {}, config {})",
                    stamp,
                    status.status_text(),
                    status.pid,
                    if status.config_valid { "valid" } else { "invalid" }
                )
            } else {
                format!(
                    "[{}] {} (config {})",
                    stamp,
                    status.status_text(),
                    if status.config_valid { "valid" } else { "invalid" }
                )
            };
            self.push_line(line);
            added += 1;
        }
        if changed || self.last_status.is_none() {
            self.last_status = Some(state.status.clone());
        }

        added
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

/// Log viewer page
pub fn render_log(log: &StatusLog) -> String {
    let mut out = String::new();
    let mut empty = true;
    for line in log.lines() {
        let _ = writeln!(out, "{}", line);
        empty = false;
    }
    if empty {
        let _ = writeln!(out, "Waiting for status updates...");
    }
    out
}

/// Human readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Backup manager page, newest first
pub fn render_backups(backups: &[BackupInfo]) -> String {
    if backups.is_empty() {
        return "No backups yet. One is created every time the config is saved.\n".to_string();
    }

    let mut sorted: Vec<&BackupInfo> = backups.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let id_width = sorted.iter().map(|b| b.id.len()).max().unwrap_or(2).max(2);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_width$}  {:<23}  {:>9}",
        "ID",
        "CREATED",
        "SIZE",
        id_width = id_width
    );
    for backup in sorted {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<23}  {:>9}",
            backup.id,
            backup.created_at.format(TIME_FORMAT).to_string(),
            format_size(backup.size),
            id_width = id_width
        );
    }
    out
}
