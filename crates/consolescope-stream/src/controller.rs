use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use consolescope_types::{ErrorFrame, ListMessagesRequest};

use crate::{MessageSource, SourceError, StreamState};

/// Error shown when a failed call carries no message of its own
const STREAM_FAILED: &str = "Failed to stream messages";

/// Slot holding the latest published snapshot
type StateSlot = Arc<RwLock<Arc<StreamState>>>;

/// Drives one server-streaming listing at a time
pub struct StreamController {
    /// Listing capability (None = not configured)
    source: Option<Arc<dyn MessageSource>>,

    /// Latest snapshot, replaced wholesale on every transition
    state: StateSlot,

    /// Cancellation token of the current lifetime
    cancel: CancellationToken,

    /// Pull loop of the current lifetime
    task: Option<JoinHandle<()>>,

    /// Request of the current lifetime, reused by `reset`
    request: Option<ListMessagesRequest>,

    generation: u64,
}

impl StreamController {
    /// Create a controller over an optional listing capability
    pub fn new(source: Option<Arc<dyn MessageSource>>) -> Self {
        Self {
            source,
            state: Arc::new(RwLock::new(Arc::new(StreamState::default()))),
            cancel: CancellationToken::new(),
            task: None,
            request: None,
            generation: 0,
        }
    }

    /// Start a new stream lifetime, cancelling the previous one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, request: ListMessagesRequest) {
        // The old loop sees its token cancelled before it can publish again
        self.cancel.cancel();
        self.task = None;

        self.generation += 1;
        let generation = self.generation;
        self.request = Some(request.clone());

        let Some(source) = self.source.clone() else {
            warn!("message source not configured, not starting stream");
            let error = error_frame(&SourceError::Unavailable);
            self.publish(StreamState::streaming(generation).failed(error));
            return;
        };

        let cancel = CancellationToken::new();
        self.cancel = cancel.clone();
        self.publish(StreamState::streaming(generation));

        debug!(
            topic = %request.topic,
            start_offset = request.start_offset.as_i64(),
            max_results = request.max_results,
            generation,
            "starting message stream"
        );

        let state = Arc::clone(&self.state);
        self.task = Some(tokio::spawn(pull_frames(source, request, state, cancel)));
    }

    /// Stop the current stream without recording an error
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        let mut slot = self.state.write();
        let previous = Arc::unwrap_or_clone(std::mem::take(&mut *slot));
        *slot = Arc::new(previous.cancelled());
    }

    /// Clear and refetch with the last request
    pub fn reset(&mut self) {
        if let Some(request) = self.request.clone() {
            self.start(request);
        }
    }

    /// Current immutable snapshot
    pub fn snapshot(&self) -> Arc<StreamState> {
        Arc::clone(&self.state.read())
    }

    pub fn is_streaming(&self) -> bool {
        self.state.read().is_streaming
    }

    /// Number of lifetimes started so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn request(&self) -> Option<&ListMessagesRequest> {
        self.request.as_ref()
    }

    /// Wait for the current pull loop to exit
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("message stream task failed: {}", err);
            }
        }
    }

    fn publish(&self, state: StreamState) {
        *self.state.write() = Arc::new(state);
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn pull_frames(
    source: Arc<dyn MessageSource>,
    request: ListMessagesRequest,
    state: StateSlot,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = source.list_messages(request) => opened,
    };

    let mut frames = match opened {
        Ok(frames) => frames,
        Err(err) => {
            fail(&state, &cancel, err);
            return;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(frame)) => {
                let terminal = frame.is_terminal();
                if !transition(&state, &cancel, |s| s.apply(frame)) || terminal {
                    break;
                }
            }
            Some(Err(err)) => {
                fail(&state, &cancel, err);
                break;
            }
            None => {
                transition(&state, &cancel, StreamState::finished);
                break;
            }
        }
    }

    debug!("message stream closed");
}

/// Publish the next snapshot unless the lifetime was cancelled.
///
/// The token is checked under the write lock so a frame raced past
/// cancellation cannot overwrite the cancelled snapshot.
fn transition(
    state: &StateSlot,
    cancel: &CancellationToken,
    next: impl FnOnce(StreamState) -> StreamState,
) -> bool {
    let mut slot = state.write();
    if cancel.is_cancelled() {
        trace!("discarding frame received after cancellation");
        return false;
    }
    let previous = Arc::unwrap_or_clone(std::mem::take(&mut *slot));
    *slot = Arc::new(next(previous));
    true
}

fn fail(state: &StateSlot, cancel: &CancellationToken, err: SourceError) {
    if err.is_cancellation() {
        debug!("message stream cancelled by source");
        transition(state, cancel, StreamState::cancelled);
        return;
    }

    warn!("message stream failed: {}", err);
    let frame = error_frame(&err);
    transition(state, cancel, |s| s.failed(frame));
}

fn error_frame(err: &SourceError) -> ErrorFrame {
    let message = match err {
        SourceError::Status { message, .. } => message.clone(),
        other => other.to_string(),
    };
    let message = if message.trim().is_empty() {
        STREAM_FAILED.to_string()
    } else {
        message
    };

    ErrorFrame {
        message,
        code: err.code().map(str::to_string),
    }
}
