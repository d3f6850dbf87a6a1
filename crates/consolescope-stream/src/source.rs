use async_trait::async_trait;
use futures::stream::BoxStream;

use consolescope_types::{ListMessagesRequest, ServerFrame};

use crate::SourceError;

/// Frames of one listing call, in delivery order
pub type FrameStream = BoxStream<'static, Result<ServerFrame, SourceError>>;

/// A server-streaming message listing capability
///
/// Implementations own the wire protocol. Dropping the returned stream must
/// abort any in-flight I/O for the call.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn list_messages(&self, request: ListMessagesRequest) -> Result<FrameStream, SourceError>;
}
