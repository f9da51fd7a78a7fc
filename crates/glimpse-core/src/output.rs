//! JSON and JSONL output writers.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// A single JSON array
    Json,
    /// One JSON object per line
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonLines => "jsonl",
        }
    }
}

/// Serializes records as a JSON array or as JSON Lines.
///
/// In JSON mode the array is opened on the first record and closed by
/// [`OutputWriter::finish`], so records can be streamed in both formats.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            items_written: 0,
        }
    }

    /// Write a single record.
    pub fn write<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let sep = if self.items_written == 0 { "[\n" } else { ",\n" };
                self.writer.write_all(sep.as_bytes())?;
                serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
            }
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
        }
        self.items_written += 1;
        Ok(())
    }

    /// Write several records.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> io::Result<()> {
        for item in items {
            self.write(item)?;
        }
        Ok(())
    }

    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Close the JSON array (if any) and flush.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            let close = if self.items_written == 0 { "[]\n" } else { "\n]\n" };
            self.writer.write_all(close.as_bytes())?;
        }
        self.writer.flush()
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// `YYYYMMDDHHMMSS` in UTC, used to name output files.
pub fn timestamp() -> String {
    format_timestamp(Utc::now())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// `{dir}/{prefix}_{timestamp}.{ext}`.
pub fn timestamped_path(dir: &Path, prefix: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!("{prefix}_{}.{}", timestamp(), format.extension()))
}

/// Serialize an item to a pretty JSON string.
pub fn to_json<T: Serialize>(item: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(item)
}
