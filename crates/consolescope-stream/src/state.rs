use consolescope_types::{CompletionFrame, DataFrame, ErrorFrame, ProgressFrame, ServerFrame};

/// Accumulated state of one message stream
///
/// A snapshot is never changed once published; every transition consumes the
/// previous state and yields the next one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamState {
    /// Data frames in arrival order
    pub messages: Vec<DataFrame>,

    /// Last stage reported by the server
    pub phase: Option<String>,

    pub progress: Option<ProgressFrame>,

    /// Set once, when the server completes the listing
    pub done: Option<CompletionFrame>,

    /// Set once, when the listing fails
    pub error: Option<ErrorFrame>,

    pub is_streaming: bool,

    pub is_complete: bool,

    /// Stream lifetime this state belongs to
    pub generation: u64,
}

impl StreamState {
    /// Initial state of a freshly started stream
    pub fn streaming(generation: u64) -> Self {
        Self {
            is_streaming: true,
            generation,
            ..Default::default()
        }
    }

    /// Whether a `done` or `error` has ended this lifetime
    pub fn is_terminal(&self) -> bool {
        self.done.is_some() || self.error.is_some()
    }

    /// Fold one server frame into the state.
    ///
    /// Frames arriving after a terminal transition leave the state unchanged.
    pub fn apply(mut self, frame: ServerFrame) -> Self {
        if self.is_terminal() {
            return self;
        }

        match frame {
            ServerFrame::Data(data) => self.messages.push(data),
            ServerFrame::Phase { phase } => self.phase = Some(phase),
            ServerFrame::Progress(progress) => self.progress = Some(progress),
            ServerFrame::Done(done) => {
                self.done = Some(done);
                self.stop();
            }
            ServerFrame::Error(error) => {
                self.error = Some(error);
                self.stop();
            }
            ServerFrame::Unknown => {}
        }

        self
    }

    /// Terminal transition for a caller-initiated stop. Never sets `error`.
    pub fn cancelled(mut self) -> Self {
        self.stop();
        self
    }

    /// Terminal transition for a failed call
    pub fn failed(self, error: ErrorFrame) -> Self {
        self.apply(ServerFrame::Error(error))
    }

    /// Terminal transition for a stream that ended without a `done` frame
    pub fn finished(mut self) -> Self {
        self.stop();
        self
    }

    fn stop(&mut self) {
        self.is_streaming = false;
        self.is_complete = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(key: &str) -> ServerFrame {
        ServerFrame::Data(DataFrame::new(key, "{}"))
    }

    #[test]
    fn test_data_appends_in_order() {
        let state = StreamState::streaming(1).apply(data("a")).apply(data("b"));
        let keys: Vec<_> = state.messages.iter().map(|m| m.key.clone()).collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(state.is_streaming);
        assert!(!state.is_complete);
    }

    #[test]
    fn test_phase_and_progress_last_write_wins() {
        let state = StreamState::streaming(1)
            .apply(ServerFrame::phase("Connecting"))
            .apply(ServerFrame::Progress(ProgressFrame {
                messages_consumed: 1,
                bytes_consumed: 10,
            }))
            .apply(ServerFrame::phase("Consuming"))
            .apply(ServerFrame::Progress(ProgressFrame {
                messages_consumed: 5,
                bytes_consumed: 80,
            }));

        assert_eq!(state.phase.as_deref(), Some("Consuming"));
        assert_eq!(state.progress.map(|p| p.messages_consumed), Some(5));
    }

    #[test]
    fn test_done_is_terminal() {
        let state = StreamState::streaming(1)
            .apply(ServerFrame::Done(CompletionFrame::default()))
            .apply(data("late"));

        assert!(state.done.is_some());
        assert!(state.messages.is_empty());
        assert!(!state.is_streaming);
        assert!(state.is_complete);
    }

    #[test]
    fn test_unknown_frame_is_noop() {
        let before = StreamState::streaming(3).apply(data("a"));
        let after = before.clone().apply(ServerFrame::Unknown);
        assert_eq!(before, after);
    }

    #[test]
    fn test_done_and_error_exclusive() {
        let sequences = vec![
            vec![
                ServerFrame::Done(CompletionFrame::default()),
                ServerFrame::Error(ErrorFrame::new("boom")),
            ],
            vec![
                ServerFrame::Error(ErrorFrame::new("boom")),
                ServerFrame::Done(CompletionFrame::default()),
            ],
            vec![
                data("a"),
                ServerFrame::Error(ErrorFrame::new("first")),
                ServerFrame::Error(ErrorFrame::new("second")),
                ServerFrame::Done(CompletionFrame::default()),
            ],
        ];

        for frames in sequences {
            let state = frames
                .into_iter()
                .fold(StreamState::streaming(1), StreamState::apply);
            assert!(!(state.done.is_some() && state.error.is_some()));
            assert!(!(state.is_streaming && state.is_complete));
        }
    }

    #[test]
    fn test_first_error_wins() {
        let state = StreamState::streaming(1)
            .apply(ServerFrame::Error(ErrorFrame::new("first")))
            .failed(ErrorFrame::new("second"));
        assert_eq!(state.error.map(|e| e.message), Some("first".to_string()));
    }

    #[test]
    fn test_cancelled_keeps_error_empty() {
        let state = StreamState::streaming(1).apply(data("a")).cancelled();
        assert!(state.error.is_none());
        assert!(state.is_complete);
        assert!(!state.is_streaming);
        assert_eq!(state.messages.len(), 1);
    }
}
