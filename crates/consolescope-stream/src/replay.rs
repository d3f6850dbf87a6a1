use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

use consolescope_types::{CompletionFrame, ListMessagesRequest, ServerFrame};

use crate::{FrameStream, MessageSource, SourceError};

/// Serves a recorded listing from a newline-delimited JSON file of frames
///
/// Each line is one frame, e.g. `{"type":"data","key":"\"p1\"","value":"{...}"}`.
/// Data frames older than the request's start timestamp are skipped and the
/// listing completes after `max_results` data frames.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    path: PathBuf,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MessageSource for ReplaySource {
    async fn list_messages(
        &self,
        request: ListMessagesRequest,
    ) -> Result<FrameStream, SourceError> {
        let file = File::open(&self.path).await?;
        debug!(path = %self.path.display(), topic = %request.topic, "replaying recorded listing");

        let replay = Replay {
            lines: BufReader::new(file).lines(),
            request,
            delivered: 0,
            finished: false,
        };

        Ok(stream::unfold(replay, |mut replay| async move {
            let frame = replay.next_frame().await?;
            Some((frame, replay))
        })
        .boxed())
    }
}

struct Replay {
    lines: Lines<BufReader<File>>,
    request: ListMessagesRequest,
    /// Data frames handed out so far
    delivered: u32,
    finished: bool,
}

impl Replay {
    async fn next_frame(&mut self) -> Option<Result<ServerFrame, SourceError>> {
        if self.finished {
            return None;
        }

        if self.delivered >= self.request.max_results {
            self.finished = true;
            return Some(Ok(ServerFrame::Done(CompletionFrame {
                messages_consumed: u64::from(self.delivered),
                ..Default::default()
            })));
        }

        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err.into()));
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let frame: ServerFrame = match serde_json::from_str(trimmed) {
                Ok(frame) => frame,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err.into()));
                }
            };

            match &frame {
                ServerFrame::Data(data) => {
                    let too_old = match (self.request.start_timestamp, data.timestamp) {
                        (Some(start), Some(ts)) => ts < start,
                        _ => false,
                    };
                    if too_old {
                        continue;
                    }
                    self.delivered += 1;
                }
                other if other.is_terminal() => self.finished = true,
                _ => {}
            }

            return Some(Ok(frame));
        }
    }
}
