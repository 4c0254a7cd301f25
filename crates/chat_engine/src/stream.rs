use std::collections::VecDeque;

use bytes::Bytes;
use chat_core::StreamEvent;
use futures_util::{Stream, StreamExt};

use crate::frame::FrameReader;
use crate::TransportError;

/// Single-pass event source over a chunked NDJSON byte stream.
///
/// The next chunk is read only once every event of the previous one has been
/// handed out. `None` means the transport ended; that is distinct from an
/// in-band `Complete` line.
pub struct EventStream<S> {
    source: S,
    reader: Option<FrameReader>,
    queued: VecDeque<StreamEvent>,
    done: bool,
    failed: bool,
}

impl<S> EventStream<S>
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            reader: Some(FrameReader::new()),
            queued: VecDeque::new(),
            done: false,
            failed: false,
        }
    }

    /// True once the transport itself failed; the `Error` it produced was the last event.
    pub fn transport_failed(&self) -> bool {
        self.failed
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }
            match self.source.next().await {
                Some(Ok(chunk)) => {
                    if let Some(reader) = self.reader.as_mut() {
                        self.queued.extend(reader.push(&chunk));
                    }
                }
                Some(Err(err)) => {
                    // Lines buffered before the failure are incomplete; drop them.
                    self.reader = None;
                    self.done = true;
                    self.failed = true;
                    return Some(StreamEvent::Error(err.to_string()));
                }
                None => {
                    self.done = true;
                    if let Some(reader) = self.reader.take() {
                        self.queued.extend(reader.finish());
                    }
                }
            }
        }
    }
}
