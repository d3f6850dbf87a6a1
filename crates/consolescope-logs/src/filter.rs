use std::collections::BTreeSet;

use serde_json::Value;

/// Build server-side filter code that keeps only records keyed by one of the
/// given pipelines.
///
/// Returns None when there is nothing to filter for. Ids are embedded as JSON
/// string literals so quotes and backslashes cannot break out of the array.
pub fn filter_code(pipeline_ids: &BTreeSet<String>) -> Option<String> {
    if pipeline_ids.is_empty() {
        return None;
    }

    let ids = Value::Array(
        pipeline_ids
            .iter()
            .map(|id| Value::String(id.clone()))
            .collect(),
    );

    Some(format!("return {ids}.includes(key);"))
}
