// ABOUTME: Streaming bridge from a session's pull-based output source to push events
// ABOUTME: Exclusive read lease with drop-based release tied to client disconnect

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use tracing::debug;

use crate::runtime::ProcessOutput;

/// One event pushed to a streaming client
#[derive(Debug, Clone)]
pub enum TerminalEvent {
    /// A chunk of process output
    Output(Bytes),
    /// The source signalled end-of-output
    Exit,
    /// Read failure; the stream closes after this event
    Error(String),
}

/// Exclusive read access to a session's output source.
///
/// A process output source supports only one active reader, so the lease is
/// the only way to read it. Dropping the lease mid-stream (client disconnect)
/// returns the source to the session, making a subsequent subscribe succeed;
/// `finish` consumes the source for good once it has ended or errored.
pub struct OutputLease {
    session_id: String,
    slot: Arc<std::sync::Mutex<Option<ProcessOutput>>>,
    stream: Option<ProcessOutput>,
}

impl OutputLease {
    pub(crate) fn new(
        session_id: String,
        slot: Arc<std::sync::Mutex<Option<ProcessOutput>>>,
        stream: ProcessOutput,
    ) -> Self {
        Self {
            session_id,
            slot,
            stream: Some(stream),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next chunk from the source; `None` once the source is finished or gone
    pub async fn next_chunk(&mut self) -> Option<crate::error::Result<Bytes>> {
        self.stream.as_mut()?.next().await
    }

    /// Drop the source without returning it: the stream ended or broke and
    /// has nothing left to hand to a later subscriber
    pub fn finish(&mut self) {
        self.stream = None;
    }
}

impl Drop for OutputLease {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Returning output lease for session {}", self.session_id);
            let mut slot = self
                .slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = Some(stream);
        }
    }
}

/// Relay a leased output source as a push-style event stream.
///
/// Runs until end-of-output, a read error (one `Error` event, then close), or
/// the consumer drops the stream — which drops the lease and releases the
/// read lock promptly, leaving no orphaned reads.
pub fn forward_output(mut lease: OutputLease) -> Pin<Box<dyn Stream<Item = TerminalEvent> + Send>> {
    Box::pin(stream! {
        loop {
            match lease.next_chunk().await {
                Some(Ok(chunk)) => yield TerminalEvent::Output(chunk),
                Some(Err(e)) => {
                    lease.finish();
                    yield TerminalEvent::Error(e.to_string());
                    break;
                }
                None => {
                    lease.finish();
                    yield TerminalEvent::Exit;
                    break;
                }
            }
        }
    })
}
