use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;

use consolescope_logs::{LogScope, PipelineCounts, StreamingCountsFacade};
use consolescope_stream::{MessageSource, ReplaySource};

mod config;

use config::{Config, Overrides};

/// Consolescope - warning and error counts per pipeline from the pipeline log topic
#[derive(Parser, Debug)]
#[command(name = "consolescope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline ids to count logs for
    #[arg(short, long = "pipeline", value_name = "ID", required = true)]
    pipelines: Vec<String>,

    /// Recorded listing to read frames from (newline-delimited JSON)
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Topic the pipelines log to
    #[arg(long)]
    topic: Option<String>,

    /// How far back to read logs, in minutes
    #[arg(long)]
    lookback_minutes: Option<i64>,

    /// Result cap per requested pipeline
    #[arg(long)]
    results_per_pipeline: Option<u32>,

    /// Config file (defaults to ~/.consolescope/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print counts as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let settings = config.settings(&Overrides {
        topic: args.topic.clone(),
        lookback_minutes: args.lookback_minutes,
        results_per_pipeline: args.results_per_pipeline,
    })?;

    // Without a recording there is no listing capability to stream from
    let source = args
        .replay
        .clone()
        .or(config.replay.clone())
        .map(|path| Arc::new(ReplaySource::new(path)) as Arc<dyn MessageSource>);

    let mut facade = StreamingCountsFacade::new(source, settings);
    facade.set_pipeline_ids(args.pipelines.iter().cloned());
    facade.set_enabled(true);

    let interrupted = tokio::select! {
        _ = facade.wait() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        tracing::info!("interrupted, cancelling stream");
        facade.cancel();
    }

    let counts = facade.counts();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&*counts)?);
    } else {
        print!("{}", render_table(&counts));
    }

    if let Some(error) = facade.error() {
        bail!("{}", error);
    }

    Ok(())
}

/// Render counts as a plain text table, one row per pipeline
fn render_table(counts: &PipelineCounts) -> String {
    let width = counts
        .keys()
        .map(|id| id.len())
        .max()
        .unwrap_or(0)
        .max("PIPELINE".len());

    let mut out = format!("{:<width$}", "PIPELINE");
    for scope in LogScope::ALL {
        out.push_str(&format!("  {:>13}", format!("{} W/E", scope.as_str().to_uppercase())));
    }
    out.push('\n');

    for (id, pipeline) in counts {
        out.push_str(&format!("{:<width$}", id));
        for scope in LogScope::ALL {
            let scope_counts = pipeline.get(scope);
            out.push_str(&format!(
                "  {:>13}",
                format!("{}/{}", scope_counts.warnings, scope_counts.errors)
            ));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use consolescope_logs::{LogCounts, ScopeCounts};

    #[test]
    fn test_render_table() {
        let mut counts = PipelineCounts::new();
        counts.insert(
            "ingest-orders".to_string(),
            LogCounts {
                input: ScopeCounts::new(2, 0),
                output: ScopeCounts::new(0, 1),
                root: ScopeCounts::default(),
            },
        );
        counts.insert("idle".to_string(), LogCounts::default());

        let table = render_table(&counts);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("PIPELINE"));
        assert!(lines[0].contains("INPUT W/E"));
        assert!(lines[1].starts_with("idle"));
        assert!(lines[2].starts_with("ingest-orders"));
        assert!(lines[2].contains("2/0"));
        assert!(lines[2].contains("0/1"));
    }

    #[test]
    fn test_args_require_pipeline() {
        assert!(Args::try_parse_from(["consolescope"]).is_err());

        let args = Args::try_parse_from([
            "consolescope",
            "-p",
            "a",
            "--pipeline",
            "b",
            "--replay",
            "frames.ndjson",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.pipelines, vec!["a", "b"]);
        assert!(args.json);
    }
}
