//! Event output on stdout, either as JSON lines or as human readable text.

use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use unicode_truncate::UnicodeTruncateStr;

use crate::record::SessionRecord;

/// Column width for target ids in text mode.
pub const TARGET_WIDTH: usize = 28;

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    ts: String,
    event: &'a str,
    data: &'a T,
}

pub struct Output<W: Write> {
    json: bool,
    writer: W,
}

impl Output<io::Stdout> {
    pub fn stdout(json: bool) -> Self {
        Self::new(json, io::stdout())
    }
}

impl<W: Write> Output<W> {
    pub fn new(json: bool, writer: W) -> Self {
        Self { json, writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes one event line.
    pub fn event<T: Serialize>(&mut self, name: &str, data: &T) -> io::Result<()> {
        let ts = now();
        if self.json {
            let envelope = Envelope {
                ts,
                event: name,
                data,
            };
            serde_json::to_writer(&mut self.writer, &envelope)?;
            writeln!(self.writer)?;
        } else {
            let payload = serde_json::to_value(data)?;
            writeln!(self.writer, "{ts} {name} {}", text_payload(&payload))?;
        }
        self.writer.flush()
    }

    /// Writes a `session` event; text mode uses fixed-width columns.
    pub fn session(&mut self, record: &SessionRecord) -> io::Result<()> {
        if self.json {
            return self.event("session", record);
        }
        let status = if record.ok { "ok" } else { "FAIL" };
        let mut line = format!(
            "{} session {} {:<4} {:<16} {:>6}ms {}",
            now(),
            to_fixed_width(&record.target_id, TARGET_WIDTH),
            status,
            record.error_class.as_str(),
            record.latency_ms,
            record.endpoint
        );
        if !record.error.is_empty() {
            line.push_str(&format!(" ({})", record.error));
        }
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Truncates or pads `input` to exactly `width` columns.
pub fn to_fixed_width(input: &str, width: usize) -> String {
    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

/// Renders objects as `key=value` pairs and anything else as plain JSON.
fn text_payload(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}={s}"),
                other => format!("{key}={other}"),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
