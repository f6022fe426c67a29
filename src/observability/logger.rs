//! Markdown transcript of agent runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::orchestration::{ControlSignal, Event, EventContent, EventKind, NodeStatus, RunObserver};
use crate::session::SessionKey;

/// Transcript logger for agent runs.
///
/// Writes one markdown file with a section per run start, completed event
/// and run end. Partial events are skipped; their aggregate follows as the
/// final event of the same stage.
#[derive(Debug)]
pub struct Logger {
    log_file: PathBuf,
    log_level: String,
    // Serializes appends from concurrent runs
    write_lock: Mutex<()>,
}

impl Logger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to transcript file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level (defaults to "INFO"). At "DEBUG" events carry their JSON payload.
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => {
                let dir = std::env::temp_dir().join("ark-logs");
                let filename = format!(
                    "run_{}_{}.md",
                    Utc::now().timestamp_millis(),
                    std::process::id()
                );
                dir.join(filename)
            }
        };

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self {
            log_file,
            log_level: log_level.unwrap_or("INFO").to_uppercase(),
            write_lock: Mutex::new(()),
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();
        writeln!(file, "# Run Transcript\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;
        Ok(())
    }

    fn append_to_log(&self, content: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Transcript lock poisoned"))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;
        Ok(())
    }

    /// Log the start of a run.
    pub fn log_run_start(&self, key: &SessionKey, invocation_id: &str) -> Result<()> {
        let content = format!(
            "## Run Started - {}\n\n**Session:** {}\n**Invocation:** {}\n\n",
            Utc::now().to_rfc3339(),
            key,
            invocation_id
        );
        self.append_to_log(&content)?;
        info!(session = %key, invocation_id, "Run started");
        Ok(())
    }

    /// Log a completed event. Partial events are ignored.
    pub fn log_event(&self, event: &Event) -> Result<()> {
        if event.partial {
            return Ok(());
        }

        let mut content = format!(
            "### {} - {}\n\n**Author:** {}\n\n",
            Self::event_title(event),
            event.timestamp.to_rfc3339(),
            event.author
        );

        match &event.kind {
            EventKind::Content(EventContent::Text { text }) => {
                content.push_str(&format!("```\n{}\n```\n\n", text));
            }
            EventKind::Content(EventContent::FunctionCall(call)) => {
                content.push_str(&format!("**Tool:** `{}`\n**Args:** `{}`\n\n", call.name, call.args));
            }
            EventKind::Content(EventContent::FunctionResponse(response)) => {
                content.push_str(&format!(
                    "**Tool:** `{}`\n**Result:** `{}`\n\n",
                    response.name, response.response
                ));
            }
            EventKind::Control(signal) => {
                content.push_str(&format!("**Signal:** {}\n\n", Self::describe_signal(signal)));
            }
            EventKind::Error { message } => {
                content.push_str(&format!("**Error:** {}\n\n", message));
            }
        }

        if !event.state_delta.is_empty() {
            let mut keys: Vec<&String> = event.state_delta.keys().collect();
            keys.sort();
            for key in keys {
                content.push_str(&format!("- `{}` = `{}`\n", key, event.state_delta[key]));
            }
            content.push('\n');
        }

        if self.log_level == "DEBUG" {
            let payload = serde_json::to_string_pretty(&event.kind).unwrap_or_default();
            content.push_str(&format!("```json\n{}\n```\n\n", payload));
        }

        self.append_to_log(&content)
    }

    /// Log the end of a run with its root status.
    pub fn log_run_end(
        &self,
        key: &SessionKey,
        invocation_id: &str,
        status: &NodeStatus,
    ) -> Result<()> {
        let content = format!(
            "## Run Finished - {}\n\n**Session:** {}\n**Invocation:** {}\n**Status:** {}\n\n---\n\n",
            Utc::now().to_rfc3339(),
            key,
            invocation_id,
            status
        );
        self.append_to_log(&content)?;
        info!(session = %key, invocation_id, status = status.name(), "Run finished");
        Ok(())
    }

    fn event_title(event: &Event) -> &'static str {
        match &event.kind {
            EventKind::Content(EventContent::Text { .. }) => "Message",
            EventKind::Content(EventContent::FunctionCall(_)) => "Tool Call",
            EventKind::Content(EventContent::FunctionResponse(_)) => "Tool Response",
            EventKind::Control(_) => "Control",
            EventKind::Error { .. } => "Error",
        }
    }

    fn describe_signal(signal: &ControlSignal) -> String {
        match signal {
            ControlSignal::Escalate => "escalate".to_string(),
            ControlSignal::Transfer { to } => format!("transfer to `{}`", to),
            ControlSignal::StageFailed { stage, message } => {
                format!("stage `{}` failed: {}", stage, message)
            }
            ControlSignal::LoopFinished {
                name,
                iterations,
                escalated,
            } => format!(
                "loop `{}` finished after {} iteration(s){}",
                name,
                iterations,
                if *escalated { ", escalated" } else { "" }
            ),
        }
    }
}

impl RunObserver for Logger {
    fn on_run_start(&self, key: &SessionKey, invocation_id: &str) {
        if let Err(e) = self.log_run_start(key, invocation_id) {
            warn!("Failed to write run transcript: {:#}", e);
        }
    }

    fn on_event(&self, _key: &SessionKey, event: &Event) {
        if let Err(e) = self.log_event(event) {
            warn!("Failed to write run transcript: {:#}", e);
        }
    }

    fn on_run_end(&self, key: &SessionKey, invocation_id: &str, status: &NodeStatus) {
        if let Err(e) = self.log_run_end(key, invocation_id, status) {
            warn!("Failed to write run transcript: {:#}", e);
        }
    }
}
