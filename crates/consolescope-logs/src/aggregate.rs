use std::collections::BTreeSet;

use tracing::trace;

use consolescope_types::{
    DataFrame, INPUT_PATH_PREFIX, LogCounts, LogLevel, LogScope, OUTPUT_PATH_PREFIX,
    PipelineCounts,
};

use crate::decode::{LogRecord, decode_key};

/// Path prefixes used to classify a log line's scope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopePrefixes {
    pub input: String,
    pub output: String,
}

impl ScopePrefixes {
    /// Scope of a log line with the given component path
    pub fn classify(&self, path: Option<&str>) -> LogScope {
        match path {
            Some(path) if path.starts_with(&self.input) => LogScope::Input,
            Some(path) if path.starts_with(&self.output) => LogScope::Output,
            _ => LogScope::Root,
        }
    }
}

impl Default for ScopePrefixes {
    fn default() -> Self {
        Self {
            input: INPUT_PATH_PREFIX.to_string(),
            output: OUTPUT_PATH_PREFIX.to_string(),
        }
    }
}

/// Count warnings and errors per pipeline and scope
pub fn aggregate(messages: &[DataFrame], pipeline_ids: &BTreeSet<String>) -> PipelineCounts {
    aggregate_with(messages, pipeline_ids, &ScopePrefixes::default())
}

/// Count warnings and errors per pipeline and scope with custom path prefixes.
///
/// Every requested pipeline gets an entry, even without log activity. Frames
/// for other pipelines and malformed frames are skipped.
pub fn aggregate_with(
    messages: &[DataFrame],
    pipeline_ids: &BTreeSet<String>,
    prefixes: &ScopePrefixes,
) -> PipelineCounts {
    let mut counts: PipelineCounts = pipeline_ids
        .iter()
        .map(|id| (id.clone(), LogCounts::default()))
        .collect();

    for frame in messages {
        let Some(pipeline_id) = decode_key(&frame.key) else {
            trace!(offset = frame.offset, "skipping frame with undecodable key");
            continue;
        };

        let Some(entry) = counts.get_mut(&pipeline_id) else {
            continue;
        };

        let Some(record) = LogRecord::decode(&frame.value) else {
            trace!(offset = frame.offset, %pipeline_id, "skipping malformed log record");
            continue;
        };

        let scope = entry.get_mut(prefixes.classify(record.path.as_deref()));
        match record.level {
            LogLevel::Warn => scope.warnings += 1,
            LogLevel::Error => scope.errors += 1,
            _ => {}
        }
    }

    counts
}
