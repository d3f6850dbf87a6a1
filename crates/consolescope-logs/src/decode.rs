use serde_json::Value;

use consolescope_types::LogLevel;

/// Decode a record key into an entity id.
///
/// Keys are written as JSON string literals, so one pair of surrounding
/// quotes is removed. A lone `"` is not a pair and is kept as is.
pub fn decode_key(key: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(key).ok()?;
    let quoted = text.len() >= 2 && text.starts_with('"') && text.ends_with('"');
    let unquoted = if quoted { &text[1..text.len() - 1] } else { text };
    Some(unquoted.to_string())
}

/// Decode a record value as UTF-8 JSON
pub fn decode_value(value: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(value).ok()?;
    serde_json::from_str(text).ok()
}

/// The parts of a pipeline log line needed for counting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    /// Component path, e.g. `root.input.kafka`
    pub path: Option<String>,
}

impl LogRecord {
    /// Extract a record from a value payload, or None if it is malformed
    pub fn decode(value: &[u8]) -> Option<Self> {
        let value = decode_value(value)?;
        let fields = value.as_object()?;

        let level = fields
            .get("level")
            .and_then(Value::as_str)
            .map(LogLevel::from_str)
            .unwrap_or(LogLevel::Unknown);
        let path = fields
            .get("path")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self { level, path })
    }
}
