//! Shared types for consolescope
//!
//! This crate contains the data structures exchanged between the streaming
//! layer and the log aggregation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Topic that Redpanda Connect pipelines write their logs to
pub const LOGS_TOPIC: &str = "__redpanda.connect.logs";

/// Log path prefix for lines emitted by a pipeline's input
pub const INPUT_PATH_PREFIX: &str = "root.input";

/// Log path prefix for lines emitted by a pipeline's output
pub const OUTPUT_PATH_PREFIX: &str = "root.output";

// ============================================================================
// Stream Frames
// ============================================================================

/// One decoded record from the listed topic
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DataFrame {
    #[serde(default)]
    pub partition_id: i32,

    #[serde(default)]
    pub offset: i64,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Raw key bytes (identifies the owning entity)
    #[serde(default, deserialize_with = "text_bytes")]
    pub key: Vec<u8>,

    /// Raw value bytes
    #[serde(default, deserialize_with = "text_bytes")]
    pub value: Vec<u8>,
}

impl DataFrame {
    /// Create a frame with only key and value set
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Consumption progress reported by the server
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressFrame {
    #[serde(default)]
    pub messages_consumed: u64,
    #[serde(default)]
    pub bytes_consumed: u64,
}

/// Final summary sent when the server finishes a listing
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CompletionFrame {
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub messages_consumed: u64,
    #[serde(default)]
    pub bytes_consumed: u64,
}

/// Error reported in-band by the server, or synthesized from a failed call
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorFrame {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}

/// A single frame of a server-streaming message listing
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Data(DataFrame),
    Phase { phase: String },
    Progress(ProgressFrame),
    Done(CompletionFrame),
    Error(ErrorFrame),
    /// Any frame kind this client does not understand
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    /// Returns true if no frame may follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error(_))
    }

    pub fn phase(phase: impl Into<String>) -> Self {
        Self::Phase {
            phase: phase.into(),
        }
    }
}

/// Key/value bytes are carried as UTF-8 text in the NDJSON representation
fn text_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    String::deserialize(deserializer).map(String::into_bytes)
}

// ============================================================================
// Listing Request
// ============================================================================

/// Where a listing starts reading each partition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StartOffset {
    /// Newest messages minus the result cap
    #[default]
    Recent,
    Oldest,
    /// Only messages produced after the call starts
    Newest,
    /// First offset at or after `start_timestamp`
    Timestamp,
    Exact(i64),
}

impl StartOffset {
    /// Wire value, using the console's negative sentinels
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Recent => -1,
            Self::Oldest => -2,
            Self::Newest => -3,
            Self::Timestamp => -4,
            Self::Exact(offset) => *offset,
        }
    }
}

/// Decoding hint for a key or value payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PayloadEncoding {
    #[default]
    Text,
    Json,
    Binary,
}

/// Parameters of a server-streaming message listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListMessagesRequest {
    pub topic: String,
    pub start_offset: StartOffset,
    pub start_timestamp: Option<DateTime<Utc>>,
    /// -1 lists all partitions
    pub partition_id: i32,
    pub max_results: u32,
    /// Server-side filter code, evaluated per record
    pub filter_code: Option<String>,
    pub troubleshoot: bool,
    pub include_raw_payload: bool,
    pub key_encoding: Option<PayloadEncoding>,
    pub value_encoding: Option<PayloadEncoding>,
}

impl ListMessagesRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            start_offset: StartOffset::Recent,
            start_timestamp: None,
            partition_id: -1,
            max_results: 50,
            filter_code: None,
            troubleshoot: false,
            include_raw_payload: false,
            key_encoding: None,
            value_encoding: None,
        }
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level as written by Redpanda Connect
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    Unknown,
}

impl LogLevel {
    /// Parse a level name, ignoring case. Aliases such as "warning" are not accepted.
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "TRACE" => Self::Trace,
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            "FATAL" => Self::Fatal,
            _ => Self::Unknown,
        }
    }
}

/// Part of a pipeline a log line came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogScope {
    Input,
    Output,
    Root,
}

impl LogScope {
    pub const ALL: [LogScope; 3] = [Self::Input, Self::Output, Self::Root];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Root => "root",
        }
    }
}

/// Warning and error counts for one scope
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScopeCounts {
    pub warnings: u64,
    pub errors: u64,
}

impl ScopeCounts {
    pub fn new(warnings: u64, errors: u64) -> Self {
        Self { warnings, errors }
    }

    pub fn is_empty(&self) -> bool {
        self.warnings == 0 && self.errors == 0
    }
}

/// Counts per scope for one pipeline
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LogCounts {
    pub input: ScopeCounts,
    pub output: ScopeCounts,
    pub root: ScopeCounts,
}

impl LogCounts {
    pub fn get(&self, scope: LogScope) -> &ScopeCounts {
        match scope {
            LogScope::Input => &self.input,
            LogScope::Output => &self.output,
            LogScope::Root => &self.root,
        }
    }

    pub fn get_mut(&mut self, scope: LogScope) -> &mut ScopeCounts {
        match scope {
            LogScope::Input => &mut self.input,
            LogScope::Output => &mut self.output,
            LogScope::Root => &mut self.root,
        }
    }

    pub fn is_empty(&self) -> bool {
        LogScope::ALL.iter().all(|scope| self.get(*scope).is_empty())
    }
}

/// Counts keyed by pipeline id
pub type PipelineCounts = BTreeMap<String, LogCounts>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_tags() {
        let line = r#"{"type":"data","key":"\"a\"","value":"{\"level\":\"WARN\"}","offset":7}"#;
        let frame: ServerFrame = serde_json::from_str(line).unwrap();
        match frame {
            ServerFrame::Data(data) => {
                assert_eq!(data.key, b"\"a\"".to_vec());
                assert_eq!(data.offset, 7);
                assert_eq!(data.partition_id, 0);
            }
            other => panic!("unexpected frame {other:?}"),
        }

        let line = r#"{"type":"phase","phase":"Consuming"}"#;
        let frame: ServerFrame = serde_json::from_str(line).unwrap();
        assert_eq!(frame, ServerFrame::phase("Consuming"));

        let frame: ServerFrame = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert!(frame.is_terminal());
    }

    #[test]
    fn test_unknown_frame_kind() {
        let frame: ServerFrame = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Unknown);
        assert!(!frame.is_terminal());
    }

    #[test]
    fn test_start_offset_sentinels() {
        assert_eq!(StartOffset::Timestamp.as_i64(), -4);
        assert_eq!(StartOffset::Oldest.as_i64(), -2);
        assert_eq!(StartOffset::Exact(12).as_i64(), 12);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogLevel::from_str("warn"), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("Error"), LogLevel::Error);
        assert_eq!(LogLevel::from_str("warning"), LogLevel::Unknown);
    }

    #[test]
    fn test_log_counts_by_scope() {
        let mut counts = LogCounts::default();
        assert!(counts.is_empty());

        counts.get_mut(LogScope::Input).warnings += 2;
        counts.get_mut(LogScope::Root).errors += 1;
        assert_eq!(counts.get(LogScope::Input), &ScopeCounts::new(2, 0));
        assert_eq!(counts.get(LogScope::Root), &ScopeCounts::new(0, 1));
        assert!(!counts.is_empty());
    }
}
