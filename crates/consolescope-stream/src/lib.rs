//! Message streaming for consolescope
//!
//! This crate owns the server-streaming side: the injected listing capability,
//! the immutable stream state, and the controller that drives a cancellable
//! pull loop over it.

mod controller;
mod error;
mod replay;
mod source;
mod state;

pub use controller::StreamController;
pub use error::{SERVICE_UNAVAILABLE, SourceError};
pub use replay::ReplaySource;
pub use source::{FrameStream, MessageSource};
pub use state::StreamState;

// Re-export types used in our public API
pub use consolescope_types::{
    CompletionFrame, DataFrame, ErrorFrame, ListMessagesRequest, ProgressFrame, ServerFrame,
};
