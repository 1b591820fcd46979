//! Incremental plain-text rendering of conversation views

use std::collections::HashMap;
use std::fmt::Write;

use parley_client::{ChatView, ConnectionStatus};
use parley_proto::{Message, Part, Role};

/// Longest tool argument/result preview, in characters
const PREVIEW_CHARS: usize = 200;

/// How much of one message has been written out
#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    /// Parts whose rendering has started
    parts: usize,
    /// Bytes of the last part's text already written (text parts only)
    text_len: usize,
}

/// Turns successive [`ChatView`]s into the text that is new since the last one
#[derive(Debug, Default)]
pub struct Printer {
    progress: HashMap<i64, Progress>,
    status: Option<ConnectionStatus>,
    error: Option<String>,
    at_line_start: bool,
    show_status: bool,
}

impl Printer {
    pub fn new() -> Self {
        Self {
            at_line_start: true,
            show_status: true,
            ..Default::default()
        }
    }

    /// Printer that stays quiet about connection status
    pub fn without_status() -> Self {
        Self {
            show_status: false,
            ..Self::new()
        }
    }

    /// Render everything in `view` not yet written
    pub fn render(&mut self, view: &ChatView) -> String {
        let mut out = String::new();

        if self.status != Some(view.connection_status) {
            if self.show_status && self.status.is_some() {
                self.line(&mut out, &format!("[{}]", status_label(view.connection_status)));
            }
            self.status = Some(view.connection_status);
        }

        for message in &view.messages {
            self.render_message(&mut out, message);
        }

        if view.error != self.error {
            if let Some(error) = &view.error {
                self.line(&mut out, &format!("Error: {}", error));
            }
            self.error = view.error.clone();
        }

        out
    }

    /// Whether the cursor sits at the start of a line
    pub fn at_line_start(&self) -> bool {
        self.at_line_start
    }

    fn render_message(&mut self, out: &mut String, message: &Message) {
        let mut progress = self.progress.get(&message.id).copied().unwrap_or_default();

        // Appended deltas on the part we were last writing
        if progress.parts > 0 {
            if let Some(Part::Text {
                content: Some(text),
            }) = message.parts.get(progress.parts - 1)
            {
                if let Some(delta) = text.get(progress.text_len..) {
                    self.push(out, delta);
                    progress.text_len = text.len();
                }
            }
        }

        for part in message.parts.iter().skip(progress.parts) {
            progress.text_len = 0;
            match part {
                Part::Text { content } => {
                    if !self.at_line_start && progress.parts == 0 {
                        self.push(out, "\n");
                    }
                    let text = content.as_deref().unwrap_or_default();
                    self.push(out, text);
                    progress.text_len = text.len();
                }
                other => {
                    if let Some(line) = part_line(message.role, other) {
                        self.line(out, &line);
                    }
                }
            }
            progress.parts += 1;
        }

        self.progress.insert(message.id, progress);
    }

    /// Write a whole line, breaking off any partial line first
    fn line(&mut self, out: &mut String, line: &str) {
        if !self.at_line_start {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", line);
        self.at_line_start = true;
    }

    fn push(&mut self, out: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        out.push_str(text);
        self.at_line_start = text.ends_with('\n');
    }
}

fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Connecting => "connecting...",
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Disconnected => "disconnected, reconnecting",
        ConnectionStatus::Error => "connection error, reconnecting",
    }
}

/// One-line rendering of a non-text part
fn part_line(role: Role, part: &Part) -> Option<String> {
    match part {
        Part::Text { .. } => None,
        Part::UserPrompt { content } => {
            let content = content.as_deref()?;
            Some(format!("you> {}", content))
        }
        Part::SystemPrompt { .. } => None,
        Part::Thinking { content, .. } => {
            let content = content.as_deref().filter(|c| !c.is_empty())?;
            Some(format!("[thinking] {}", truncate_chars(content, PREVIEW_CHARS)))
        }
        Part::ToolCall {
            tool_name, args, ..
        } => {
            let args = args
                .as_ref()
                .filter(|a| !a.is_null())
                .map(|a| a.to_string())
                .unwrap_or_default();
            Some(format!(
                "[{} {}({})]",
                if role == Role::Agent { "running" } else { "call" },
                tool_name,
                truncate_chars(&args, PREVIEW_CHARS)
            ))
        }
        Part::ToolReturn {
            tool_name,
            content,
            status,
            error_message,
            ..
        } => {
            let failed = status.is_some_and(|s| !s.is_success());
            let detail = if failed {
                error_message.as_deref().or(content.as_deref())
            } else {
                content.as_deref()
            }
            .unwrap_or_default();
            let verb = if failed { " failed" } else { "" };
            Some(format!(
                "[{}{}: {}]",
                tool_name,
                verb,
                truncate_chars(detail, PREVIEW_CHARS)
            ))
        }
    }
}

/// Truncate to at most `max` characters, marking the cut with `...`
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}
