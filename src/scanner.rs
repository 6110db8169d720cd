// todo-plus/src/scanner.rs

use crate::item::TodoItem;
use crate::language::LanguageInfo;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ScanError {
    /// A language must supply at least one comment form.
    #[error("line_comment or block_comment must be provided")]
    MissingCommentSyntax,
    #[error("bad comment delimiter {delimiter:?}: {source}")]
    BadPattern {
        delimiter: String,
        source: regex::Error,
    },
}

/// Where the line automaton currently is.
#[derive(Debug, PartialEq, Eq)]
enum State {
    Scanning,
    InsideBlockComment,
}

/// Comment-aware TODO detector. Not a general comment parser: it rides on the
/// comment delimiters only to know a construct's extent, and considers only
/// constructs containing the literal `TODO` keyword.
pub struct TodoScanner;

impl TodoScanner {
    /// Scan full file text into an ordered sequence of annotations.
    pub fn scan(
        file_uri: &str,
        text: &str,
        line_comment: Option<&str>,
        block_comment: Option<&(String, String)>,
    ) -> Result<Vec<TodoItem>, ScanError> {
        if line_comment.is_none() && block_comment.is_none() {
            return Err(ScanError::MissingCommentSyntax);
        }
        let mut items = Vec::new();
        // Cheap negative check before any regex work.
        if !text.contains("TODO") {
            return Ok(items);
        }

        let single_line = line_comment
            .map(|lc| {
                Regex::new(&format!(r"{}\s*TODO(\(.*\))?:(.*)", regex::escape(lc))).map_err(
                    |source| ScanError::BadPattern {
                        delimiter: lc.to_string(),
                        source,
                    },
                )
            })
            .transpose()?;
        let multi_line = block_comment
            .map(|(open, close)| {
                Regex::new(&format!(
                    r"{}\s*TODO(\([\s\S]*\))?:([\s\S]*?){}",
                    regex::escape(open),
                    regex::escape(close)
                ))
                .map_err(|source| ScanError::BadPattern {
                    delimiter: open.to_string(),
                    source,
                })
            })
            .transpose()?;

        let mut buffer = String::new();
        let mut state = State::Scanning;
        // Byte offset just past the block-open token, so symmetric delimiters
        // (e.g. Python's ''') don't read their own opener as the closer.
        let mut open_end = 0;
        for (line_index, line) in text.split('\n').enumerate() {
            buffer.push_str(line);
            buffer.push('\n');
            let mut candidate = false;
            match state {
                State::Scanning => {
                    if single_line.as_ref().is_some_and(|re| re.is_match(&buffer)) {
                        candidate = true;
                    } else if let Some((open, close)) = block_comment {
                        if let Some(at) = buffer.find(open.as_str()) {
                            state = State::InsideBlockComment;
                            open_end = at + open.len();
                            // Open and close may sit on the same line.
                            if buffer[open_end..].contains(close.as_str()) {
                                state = State::Scanning;
                                candidate = true;
                            }
                        }
                    }
                }
                State::InsideBlockComment => {
                    let close = &block_comment.expect("state requires a block comment").1;
                    if buffer[open_end..].contains(close.as_str()) {
                        state = State::Scanning;
                        candidate = true;
                    }
                }
            }
            if candidate {
                // Hand the whole buffered construct to the parser and reset,
                // whether or not it turns out to be a genuine TODO.
                if let Some(item) = TodoItem::from_text(
                    file_uri,
                    &buffer,
                    single_line.as_ref(),
                    multi_line.as_ref(),
                    line_index,
                ) {
                    items.push(item);
                }
                buffer.clear();
            } else if state == State::Scanning {
                // Not building toward anything.
                buffer.clear();
            }
        }
        debug!(file = file_uri, count = items.len(), "scan complete");
        Ok(items)
    }

    /// Convenience wrapper taking a registry entry.
    pub fn scan_with_language(
        file_uri: &str,
        text: &str,
        language: &LanguageInfo,
    ) -> Result<Vec<TodoItem>, ScanError> {
        Self::scan(
            file_uri,
            text,
            language.line_comment.as_deref(),
            language.block_comment.as_ref(),
        )
    }
}
