//! Prediction record output.
//!
//! JSON Lines records are written as soon as they arrive; JSON output is
//! collected and written as one array when the writer is finished.

use crate::types::PredictionRecord;
use std::io::{self, Write};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON array of records
    Json,
    /// One record per line
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
}

/// Writes [`PredictionRecord`]s to any `Write` sink.
pub struct RecordWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    pending: Vec<PredictionRecord>,
    records_written: usize,
}

impl<W: Write> RecordWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            pending: Vec::new(),
            records_written: 0,
        }
    }

    pub fn push(&mut self, record: PredictionRecord) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.pending.push(record),
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, &record).map_err(io::Error::other)?;
                writeln!(self.writer)?;
                self.writer.flush()?;
                self.records_written += 1;
            }
        }
        Ok(())
    }

    /// Write anything still buffered and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.format == OutputFormat::Json {
            if self.pretty {
                serde_json::to_writer_pretty(&mut self.writer, &self.pending)
                    .map_err(io::Error::other)?;
            } else {
                serde_json::to_writer(&mut self.writer, &self.pending)
                    .map_err(io::Error::other)?;
            }
            writeln!(self.writer)?;
            self.records_written += self.pending.len();
            self.pending.clear();
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Records accepted so far, written or buffered.
    pub fn len(&self) -> usize {
        self.records_written + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Probability, RecognitionResult};

    fn record(text: &str) -> PredictionRecord {
        let result = RecognitionResult {
            text: text.to_string(),
            confidence: 0.9,
            language: "en".to_string(),
            probabilities: vec![Probability::new(text, 0.9)],
        };
        PredictionRecord::from_result("note.png", "abc123", &result)
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("JSONL"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("ndjson"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("csv"), None);
    }

    #[test]
    fn test_json_array() {
        let mut writer = RecordWriter::new(Vec::new(), OutputFormat::Json, false);
        writer.push(record("Hello")).unwrap();
        writer.push(record("World")).unwrap();
        assert_eq!(writer.len(), 2);

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        let parsed: Vec<PredictionRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].predicted_text, "Hello");
        assert_eq!(parsed[1].predicted_text, "World");
    }

    #[test]
    fn test_empty_json_is_empty_array() {
        let writer = RecordWriter::new(Vec::new(), OutputFormat::Json, true);
        assert!(writer.is_empty());
        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(out.trim(), "[]");
    }

    #[test]
    fn test_jsonl_streams_each_record() {
        let mut writer = RecordWriter::new(Vec::new(), OutputFormat::JsonLines, true);
        writer.push(record("Hello")).unwrap();
        writer.push(record("World")).unwrap();

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: PredictionRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.predicted_text, "Hello");
        assert_eq!(first.source, "note.png");
    }
}
