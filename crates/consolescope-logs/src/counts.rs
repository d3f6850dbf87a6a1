use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use consolescope_stream::{MessageSource, StreamController, StreamState};
use consolescope_types::{LOGS_TOPIC, ListMessagesRequest, PipelineCounts, StartOffset};

use crate::aggregate::{ScopePrefixes, aggregate_with};
use crate::filter::filter_code;

/// Tunables for the streamed counts
#[derive(Clone, Debug)]
pub struct CountsSettings {
    /// Topic the pipelines log to
    pub topic: String,

    /// How far back the listing starts
    pub lookback: Duration,

    /// Result cap per requested pipeline
    pub results_per_pipeline: u32,

    pub prefixes: ScopePrefixes,
}

impl Default for CountsSettings {
    fn default() -> Self {
        Self {
            topic: LOGS_TOPIC.to_string(),
            lookback: Duration::hours(5),
            results_per_pipeline: 100,
            prefixes: ScopePrefixes::default(),
        }
    }
}

/// Last aggregation and the inputs it was computed from
#[derive(Default)]
struct CountsCache {
    generation: u64,
    message_count: usize,
    pipeline_ids: BTreeSet<String>,
    counts: Arc<PipelineCounts>,
    is_valid: bool,
}

impl CountsCache {
    fn needs_refresh(&self, state: &StreamState, pipeline_ids: &BTreeSet<String>) -> bool {
        // Messages are append-only within a lifetime, so generation and
        // length identify the list
        !self.is_valid
            || self.generation != state.generation
            || self.message_count != state.messages.len()
            || self.pipeline_ids != *pipeline_ids
    }

    fn update(
        &mut self,
        state: &StreamState,
        pipeline_ids: &BTreeSet<String>,
        counts: PipelineCounts,
    ) {
        self.generation = state.generation;
        self.message_count = state.messages.len();
        self.pipeline_ids = pipeline_ids.clone();
        self.counts = Arc::new(counts);
        self.is_valid = true;
    }
}

/// Live warning/error counts for a set of pipelines
///
/// The stream is opened once, on first activation (enabled with a non-empty
/// pipeline set). Later changes to the pipeline set only affect aggregation
/// until `reset` is called.
pub struct StreamingCountsFacade {
    controller: StreamController,
    settings: CountsSettings,
    pipeline_ids: BTreeSet<String>,
    enabled: bool,
    activated: bool,
    cache: CountsCache,
}

impl StreamingCountsFacade {
    pub fn new(source: Option<Arc<dyn MessageSource>>, settings: CountsSettings) -> Self {
        Self {
            controller: StreamController::new(source),
            settings,
            pipeline_ids: BTreeSet::new(),
            enabled: false,
            activated: false,
            cache: CountsCache::default(),
        }
    }

    pub fn set_pipeline_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pipeline_ids = ids.into_iter().map(Into::into).collect();
        self.activate_if_ready();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.activate_if_ready();
    }

    pub fn pipeline_ids(&self) -> &BTreeSet<String> {
        &self.pipeline_ids
    }

    /// Listing request for the current pipeline set
    pub fn build_request(&self, now: DateTime<Utc>) -> ListMessagesRequest {
        let pipelines = u32::try_from(self.pipeline_ids.len()).unwrap_or(u32::MAX);

        let mut request = ListMessagesRequest::new(self.settings.topic.clone());
        request.start_offset = StartOffset::Timestamp;
        // A look-back past the earliest representable time reads from the start
        let start = now
            .checked_sub_signed(self.settings.lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        request.start_timestamp = Some(start);
        request.partition_id = -1;
        request.max_results = pipelines.saturating_mul(self.settings.results_per_pipeline);
        request.filter_code = filter_code(&self.pipeline_ids);
        request
    }

    /// Counts for the current pipeline set, recomputed only when the
    /// accumulated messages or the pipeline set changed
    pub fn counts(&mut self) -> Arc<PipelineCounts> {
        let state = self.controller.snapshot();
        if self.cache.needs_refresh(&state, &self.pipeline_ids) {
            let counts =
                aggregate_with(&state.messages, &self.pipeline_ids, &self.settings.prefixes);
            self.cache.update(&state, &self.pipeline_ids, counts);
        }
        Arc::clone(&self.cache.counts)
    }

    pub fn is_streaming(&self) -> bool {
        self.controller.is_streaming()
    }

    /// Message of the terminal error, if the stream failed
    pub fn error(&self) -> Option<String> {
        self.controller
            .snapshot()
            .error
            .as_ref()
            .map(|error| error.message.clone())
    }

    /// Clear and refetch for the current pipeline set
    pub fn reset(&mut self) {
        self.activated = true;
        self.start();
    }

    pub fn cancel(&mut self) {
        self.controller.cancel();
    }

    pub fn snapshot(&self) -> Arc<StreamState> {
        self.controller.snapshot()
    }

    /// Wait for the current stream to finish
    pub async fn wait(&mut self) {
        self.controller.wait().await;
    }

    fn activate_if_ready(&mut self) {
        if self.activated || !self.enabled || self.pipeline_ids.is_empty() {
            return;
        }
        self.activated = true;
        self.start();
    }

    fn start(&mut self) {
        let request = self.build_request(Utc::now());
        debug!(
            pipelines = self.pipeline_ids.len(),
            max_results = request.max_results,
            "streaming pipeline log counts"
        );
        self.controller.start(request);
    }
}
