use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;

use consolescope_logs::{CountsSettings, StreamingCountsFacade, aggregate};
use consolescope_stream::{MessageSource, ReplaySource, StreamState};
use consolescope_types::{CompletionFrame, DataFrame, LogCounts, ScopeCounts, ServerFrame};

fn log(key: &str, value: &str) -> ServerFrame {
    ServerFrame::Data(DataFrame::new(format!("\"{key}\""), value))
}

fn ids(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[test]
fn test_reduced_stream_aggregates_per_scope() {
    let frames = vec![
        log("a", r#"{"level":"ERROR","path":"root.output.http"}"#),
        log("a", r#"{"level":"WARN","path":"root.input.kafka"}"#),
        log("b", r#"{"level":"INFO","path":"root"}"#),
        ServerFrame::Done(CompletionFrame::default()),
    ];

    let state = frames
        .into_iter()
        .fold(StreamState::streaming(1), StreamState::apply);
    assert!(state.is_complete);
    assert!(!state.is_streaming);
    assert_eq!(state.messages.len(), 3);

    let counts = aggregate(&state.messages, &ids(&["a", "b"]));
    assert_eq!(
        counts["a"],
        LogCounts {
            input: ScopeCounts::new(1, 0),
            output: ScopeCounts::new(0, 1),
            root: ScopeCounts::default(),
        }
    );
    assert_eq!(counts["b"], LogCounts::default());
}

#[tokio::test]
async fn test_counts_from_replayed_listing() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in [
        r#"{"type":"phase","phase":"Get Partitions"}"#,
        r#"{"type":"data","key":"\"ingest\"","value":"{\"level\":\"WARN\",\"path\":\"root.input.kafka\"}"}"#,
        r#"{"type":"data","key":"\"ingest\"","value":"{\"level\":\"ERROR\",\"path\":\"root.output.s3\"}"}"#,
        r#"{"type":"data","key":"\"ingest\"","value":"not json"}"#,
        r#"{"type":"data","key":"\"other\"","value":"{\"level\":\"ERROR\",\"path\":\"root\"}"}"#,
        r#"{"type":"progress","messages_consumed":4,"bytes_consumed":400}"#,
        r#"{"type":"done","elapsed_ms":30,"messages_consumed":4}"#,
    ] {
        writeln!(file, "{line}").unwrap();
    }

    let source: Arc<dyn MessageSource> = Arc::new(ReplaySource::new(file.path()));
    let mut facade = StreamingCountsFacade::new(Some(source), CountsSettings::default());
    facade.set_pipeline_ids(["ingest", "idle"]);
    facade.set_enabled(true);
    facade.wait().await;

    assert!(!facade.is_streaming());
    assert_eq!(facade.error(), None);

    let snapshot = facade.snapshot();
    assert_eq!(snapshot.phase.as_deref(), Some("Get Partitions"));
    assert_eq!(snapshot.messages.len(), 4);
    assert!(snapshot.done.is_some());

    let counts = facade.counts();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["ingest"].input, ScopeCounts::new(1, 0));
    assert_eq!(counts["ingest"].output, ScopeCounts::new(0, 1));
    assert!(counts["idle"].is_empty());
}

#[tokio::test]
async fn test_cancel_twice_leaves_no_error() {
    let mut facade = StreamingCountsFacade::new(
        Some(Arc::new(ReplaySource::new("/nonexistent/frames.ndjson"))),
        CountsSettings::default(),
    );
    facade.set_pipeline_ids(["a"]);
    facade.set_enabled(true);
    facade.cancel();
    facade.cancel();
    facade.wait().await;

    let snapshot = facade.snapshot();
    assert!(!snapshot.is_streaming);
    assert!(snapshot.is_complete);
    assert!(snapshot.error.is_none());
}
