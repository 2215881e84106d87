//! Output formatting for threadline
//!
//! Renders command results as concise text (default) or JSON.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

use threadline_core::store::CommentRecord;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format - machine-readable output
    Json,
    /// Plain text format - one record per line
    #[default]
    Text,
}

/// Formatter that can output data in text or JSON format
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Format data according to the configured output format
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
            OutputFormat::Text => {
                let json_value = serde_json::to_value(data)?;
                Ok(render_text(&json_value))
            }
        }
    }

    /// Format and print data to stdout
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        let output = self.format(data)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{output}")?;
        Ok(())
    }

    /// Format and print a list with a custom empty message
    ///
    /// For JSON format, wraps the array in a named object with a count.
    /// For text, prints one line per item, or `empty_message`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print_list<T: Serialize>(
        &self,
        data: &[T],
        empty_message: &str,
        collection_name: &str,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::to_string_pretty(&list_envelope(data, collection_name)?)?;
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{output}")?;
                Ok(())
            }
            OutputFormat::Text => {
                let mut stdout = io::stdout().lock();
                if data.is_empty() {
                    writeln!(stdout, "{empty_message}")?;
                } else {
                    writeln!(stdout, "{}", self.format(&data)?)?;
                }
                Ok(())
            }
        }
    }

    /// Print comments in thread order, indented by level in text mode.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print_comments(&self, comments: &[CommentRecord], empty_message: &str) -> Result<()> {
        if self.is_json() || comments.is_empty() {
            return self.print_list(comments, empty_message, "comments");
        }
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", comment_tree(comments))?;
        Ok(())
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

fn list_envelope<T: Serialize>(data: &[T], collection_name: &str) -> Result<Value> {
    let mut envelope = serde_json::Map::new();
    envelope.insert(collection_name.to_string(), serde_json::to_value(data)?);
    envelope.insert("count".to_string(), serde_json::json!(data.len()));
    Ok(Value::Object(envelope))
}

/// Keys printed bare, ahead of the other fields.
const LEAD_KEYS: [&str; 3] = ["id", "comment_id", "group_id"];

/// One line per comment, two spaces of indent per level.
fn comment_tree(comments: &[CommentRecord]) -> String {
    comments
        .iter()
        .map(|comment| {
            let indent = usize::try_from(comment.level).unwrap_or(0);
            format!("{}{}", "  ".repeat(indent), comment_line(comment))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `#id author: body`, then the reply count and any moderation flags.
fn comment_line(comment: &CommentRecord) -> String {
    let mut parts = vec![format!(
        "#{} {}: {}",
        comment.id,
        comment.author,
        comment.body.replace('\n', " ")
    )];
    if comment.nested_count > 0 {
        parts.push(format!("({} nested)", comment.nested_count));
    }
    if !comment.is_public {
        parts.push("[unpublished]".to_string());
    }
    if comment.is_removed {
        parts.push("[removed]".to_string());
    }
    parts.join("  ")
}

/// Objects become one line of fields, arrays one line per element.
fn render_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(render_text).collect::<Vec<_>>().join("\n"),
        Value::Object(map) => {
            let lead = LEAD_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .map(field_text);
            let rest = map
                .iter()
                .filter(|(key, val)| !LEAD_KEYS.contains(&key.as_str()) && !is_blank(val))
                .map(|(key, val)| format!("{key}:{}", field_text(val)));
            lead.chain(rest).collect::<Vec<_>>().join("  ")
        }
        other => field_text(other),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) if s.contains([' ', '\n']) => format!("{s:?}"),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(field_text).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .filter(|(_, val)| !val.is_null())
                .map(|(key, val)| format!("{key}:{}", field_text(val)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        other => other.to_string(),
    }
}
