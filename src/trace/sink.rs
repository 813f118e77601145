//! Trace records and sinks.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The value of one signal at one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub cycle: u64,
    pub signal: String,
    pub value: i64,
}

/// Destination for trace records.
pub trait TraceSink {
    /// Append the record set for one cycle.
    fn record(&mut self, records: &[TraceRecord]) -> Result<(), TraceError>;

    /// Push buffered records to their destination.
    fn flush(&mut self) -> Result<(), TraceError> {
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrace {
    records: Vec<TraceRecord>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Values of one signal, in cycle order.
    pub fn values_of(&self, signal: &str) -> Vec<i64> {
        self.records
            .iter()
            .filter(|r| r.signal == signal)
            .map(|r| r.value)
            .collect()
    }

    pub fn into_records(self) -> Vec<TraceRecord> {
        self.records
    }
}

impl TraceSink for MemoryTrace {
    fn record(&mut self, records: &[TraceRecord]) -> Result<(), TraceError> {
        self.records.extend_from_slice(records);
        Ok(())
    }
}

/// Writes one JSON object per record, one per line.
pub struct JsonLinesTrace<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> JsonLinesTrace<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLinesTrace<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to<P: AsRef<Path>>(path: P) -> Result<Self, TraceError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|e| TraceError::IoError(e.to_string()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TraceSink for JsonLinesTrace<W> {
    fn record(&mut self, records: &[TraceRecord]) -> Result<(), TraceError> {
        for record in records {
            serde_json::to_writer(&mut self.out, record)
                .map_err(|e| TraceError::Encode(e.to_string()))?;
            writeln!(self.out).map_err(|e| TraceError::IoError(e.to_string()))?;
            self.written += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TraceError> {
        self.out.flush().map_err(|e| TraceError::IoError(e.to_string()))
    }
}

/// Read back a JSON-lines trace. Blank lines are skipped.
pub fn load_json_lines<P: AsRef<Path>>(path: P) -> Result<Vec<TraceRecord>, TraceError> {
    let file = File::open(path.as_ref()).map_err(|e| TraceError::IoError(e.to_string()))?;
    let mut records = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| TraceError::IoError(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| TraceError::ParseError {
            line: line_num + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Errors that can occur while writing or reading a trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(cycle: u64, signal: &str, value: i64) -> TraceRecord {
        TraceRecord { cycle, signal: signal.to_string(), value }
    }

    #[test]
    fn test_json_lines_format() {
        let mut sink = JsonLinesTrace::new(Vec::new());
        sink.record(&[rec(0, "top.counter", 0), rec(0, "top.blinker", 1)]).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.written(), 2);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"cycle":0,"signal":"top.counter","value":0}"#);
    }

    #[test]
    fn test_file_append_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");

        let mut sink = JsonLinesTrace::append_to(&path).unwrap();
        sink.record(&[rec(0, "a", 1)]).unwrap();
        sink.flush().unwrap();
        drop(sink);

        // a second writer appends rather than truncating
        let mut sink = JsonLinesTrace::append_to(&path).unwrap();
        sink.record(&[rec(1, "a", -2)]).unwrap();
        sink.flush().unwrap();
        drop(sink);

        let records = load_json_lines(&path).unwrap();
        assert_eq!(records, vec![rec(0, "a", 1), rec(1, "a", -2)]);
    }

    #[test]
    fn test_memory_trace_values_of() {
        let mut trace = MemoryTrace::new();
        trace.record(&[rec(0, "a", 1), rec(0, "b", 5)]).unwrap();
        trace.record(&[rec(1, "a", 2), rec(1, "b", 6)]).unwrap();
        assert_eq!(trace.values_of("a"), vec![1, 2]);
    }
}
