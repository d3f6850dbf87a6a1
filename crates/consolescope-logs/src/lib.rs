//! Pipeline log aggregation for consolescope
//!
//! This crate decodes pipeline log records, counts warnings and errors per
//! pipeline and scope, and keeps those counts in step with a live stream.

mod aggregate;
mod counts;
mod decode;
mod filter;

pub use aggregate::{ScopePrefixes, aggregate, aggregate_with};
pub use counts::{CountsSettings, StreamingCountsFacade};
pub use decode::{LogRecord, decode_key, decode_value};
pub use filter::filter_code;

// Re-export types used in our public API
pub use consolescope_types::{LogCounts, LogLevel, LogScope, PipelineCounts, ScopeCounts};
