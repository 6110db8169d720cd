// todo-plus/src/item.rs

use crate::language::LanguageInfo;
use crate::reminder::ReminderInfo;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One discovered or persisted TODO occurrence.
///
/// Scans are stateless snapshots: every scan builds fresh items from file
/// text. The embedded `id` is the sole join key between the text and the
/// sidecar record that carries the item's metadata across edits.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    /// Absolute path of the owning file. Immutable after creation.
    pub file_uri: String,
    /// Inclusive line range of the comment construct (equal for single-line).
    pub line_start: usize,
    pub line_end: usize,
    /// Lines from `line_start` down to the line holding the literal `TODO`
    /// token; non-zero only for block comments whose marker is not on the
    /// opening line.
    pub line_offset: usize,
    /// Column of the construct on the `line_start` line.
    pub start: usize,
    /// Column one past the construct on the `line_end` line.
    pub end: usize,
    /// Free-form description; may span lines for block-comment annotations.
    pub text: String,
    /// Stable short identifier embedded as `TODO(<id>):`. Absent means the
    /// annotation is not yet tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    /// Order-significant user attributes; duplicates allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<Vec<(String, String)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<ReminderInfo>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Short URL-safe token: the leading 10 hex chars of a v4 UUID.
pub fn generate_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..10].to_string()
}

/// Well-formedness check for embedded id tokens. Malformed tokens are treated
/// as absent, never as errors.
pub fn is_valid_id(id: &str) -> bool {
    (6..=14).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl TodoItem {
    /// Synced items have been persisted at least once; a fresh scan of a
    /// known id starts unsynced and pulls the sidecar record.
    pub fn is_synced(&self) -> bool {
        self.updated.is_some()
    }

    /// Only items carrying both timestamps are eligible for a new sidecar
    /// record.
    pub fn can_persist(&self) -> bool {
        self.created.is_some() && self.updated.is_some()
    }

    /// The single line holding the literal marker token. All editor-facing
    /// positioning uses this, not `line_start`.
    pub fn todo_line_index(&self) -> usize {
        self.line_start + self.line_offset
    }

    /// Assign a stable id and creation/update timestamps. No-op when an id is
    /// already present, unless `override_existing`.
    pub fn make_persistable(&mut self, override_existing: bool) {
        if override_existing || self.id.is_none() {
            self.id = Some(generate_id());
            let now = now_ms();
            self.created = Some(now);
            self.updated = Some(now);
        }
    }

    pub fn add_custom_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom_metadata
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self.updated = Some(now_ms());
    }

    pub fn remove_custom_metadata(&mut self, index: usize) -> bool {
        let Some(meta) = self.custom_metadata.as_mut() else {
            return false;
        };
        if index >= meta.len() {
            return false;
        }
        meta.remove(index);
        self.updated = Some(now_ms());
        true
    }

    pub fn add_reminder(&mut self, info: ReminderInfo) {
        self.reminder = Some(info);
        self.updated = Some(now_ms());
    }

    pub fn remove_reminder(&mut self) {
        self.reminder = None;
        self.updated = Some(now_ms());
    }

    /// Extract the id from the parenthesized token captured after `TODO`.
    /// Accepts both `(id)` and the legacy `({id})` brace form.
    pub fn parse_props(raw: &str) -> Option<String> {
        let id: String = raw
            .chars()
            .filter(|c| !matches!(c, '(' | ')' | '{' | '}'))
            .collect();
        is_valid_id(&id).then_some(id)
    }

    /// Parse one candidate buffer (one or more joined lines) into an item.
    ///
    /// `line_index` is the 0-based index, within the whole file, of the
    /// buffer's *last* line. `None` is the normal outcome for buffers that
    /// are not genuine TODO constructs.
    pub fn from_text(
        file_uri: &str,
        buffer: &str,
        single_line: Option<&Regex>,
        multi_line: Option<&Regex>,
        line_index: usize,
    ) -> Option<Self> {
        if buffer.is_empty() {
            return None;
        }
        let mut caps = single_line.and_then(|re| re.captures(buffer));
        let mut is_multi = false;
        if caps.is_none() {
            if let Some(re) = multi_line {
                caps = re.captures(buffer);
                is_multi = caps.is_some();
            }
        }
        let caps = caps?;
        let whole = caps.get(0)?;

        let mut line_start = line_index;
        let mut line_end = line_index;
        let mut line_offset = 0;
        if is_multi {
            let matched = whole.as_str();
            let newline_count = matched.matches('\n').count();
            if newline_count > 0 {
                line_start = line_index - newline_count;
                line_end = line_start + newline_count;
                // Offset of the marker line within the construct: newlines up
                // to the first case-insensitive "todo" in the matched text.
                let marker_at = matched.to_ascii_lowercase().find("todo").unwrap_or(0);
                line_offset = matched[..marker_at].matches('\n').count();
            }
        }

        // Rebase the match offset onto the match's own line when the buffer
        // holds earlier lines.
        let mut start = whole.start();
        if let Some(last_newline) = buffer[..whole.start()].rfind('\n') {
            start = whole.start() - (last_newline + 1);
        }
        let last_segment = whole.as_str().rsplit('\n').next().unwrap_or("");
        let end = start + last_segment.len();

        let id = caps
            .get(1)
            .and_then(|g| Self::parse_props(g.as_str()));
        let text = caps.get(2).map(|g| g.as_str().to_string()).unwrap_or_default();

        Some(Self {
            file_uri: file_uri.to_string(),
            line_start,
            line_end,
            line_offset,
            start,
            end,
            text,
            id,
            ..Self::default()
        })
    }

    /// Render this item back into source text. Multi-line descriptions render
    /// as a block comment, single-line ones as a line comment. Inverse of
    /// `from_text` for descriptions that contain no block-close delimiter.
    pub fn render(&self, language: &LanguageInfo) -> Result<String> {
        let props = self
            .id
            .as_deref()
            .map(|id| format!("({id})"))
            .unwrap_or_default();
        if self.text.contains('\n') {
            let (open, close) = language
                .block_comment
                .as_ref()
                .context("multi-line annotation needs a block comment syntax")?;
            Ok(format!(
                "{open}\n    TODO{props}: {}\n{close}",
                self.text.trim_start()
            ))
        } else {
            let line = language
                .line_comment
                .as_deref()
                .context("single-line annotation needs a line comment syntax")?;
            Ok(format!("{line} TODO{props}: {}", self.text.trim_start()))
        }
    }

    /// Replace this item's construct inside `text` with its rendering.
    pub fn apply_to(&self, text: &str, language: &LanguageInfo) -> Result<String> {
        let rendered = self.render(language)?;
        let (span_start, span_end) = self.span(text)?;
        let mut out = String::with_capacity(text.len() + rendered.len());
        out.push_str(&text[..span_start]);
        out.push_str(&rendered);
        out.push_str(&text[span_end..]);
        Ok(out)
    }

    /// Delete this item's construct from `text`.
    pub fn remove_from(&self, text: &str) -> Result<String> {
        let (span_start, span_end) = self.span(text)?;
        let mut out = String::with_capacity(text.len());
        out.push_str(&text[..span_start]);
        out.push_str(&text[span_end..]);
        Ok(out)
    }

    /// Absolute byte span of the construct: (`line_start`, `start`) up to
    /// (`line_end`, `end`).
    fn span(&self, text: &str) -> Result<(usize, usize)> {
        let start = line_col_to_offset(text, self.line_start, self.start)
            .context("annotation start is outside the text")?;
        let end = line_col_to_offset(text, self.line_end, self.end)
            .context("annotation end is outside the text")?;
        anyhow::ensure!(start <= end, "annotation span is inverted");
        Ok((start, end))
    }
}

fn line_col_to_offset(text: &str, line: usize, col: usize) -> Option<usize> {
    let mut offset = 0;
    for (i, l) in text.split('\n').enumerate() {
        if i == line {
            return (col <= l.len()).then_some(offset + col);
        }
        offset += l.len() + 1;
    }
    None
}
