//! Trace output.
//!
//! A trace is an ordered sequence of `(cycle, signal, value)` records, one
//! record set per simulated cycle. Sinks only ever append, so a trace can be
//! streamed straight to a file.

mod sink;

pub use sink::{JsonLinesTrace, MemoryTrace, TraceError, TraceRecord, TraceSink, load_json_lines};
