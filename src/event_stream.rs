//! Bridges a single event source into a pull driven, line delimited byte stream.
//!
//! The bridge holds at most one pending event. Publishing while nobody is pulling overwrites it, so a slow reader only ever sees the latest event.

use std::{
    convert::Infallible,
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{stream::BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{Body, StreamEvent};

enum Slot {
    Empty,
    Buffered(StreamEvent),
    Waiting(oneshot::Sender<StreamEvent>),
}

type Shared = Arc<Mutex<Slot>>;

/// The write half of an [`EventBridge`].
#[derive(Clone)]
pub struct Publisher(Shared);

impl Publisher {
    /// Hand `event` to a waiting reader, or buffer it, replacing whatever was buffered.
    pub fn publish(&self, event: StreamEvent) {
        let mut slot = self.0.lock();
        let event = match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Waiting(tx) => match tx.send(event) {
                Ok(()) => return,
                // The pull was abandoned, keep the event for the next one.
                Err(event) => event,
            },
            Slot::Empty | Slot::Buffered(_) => event,
        };
        *slot = Slot::Buffered(event);
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.0.lock() {
            Slot::Empty => "empty",
            Slot::Buffered(_) => "buffered",
            Slot::Waiting(_) => "waiting",
        };
        f.debug_tuple("Publisher").field(&state).finish()
    }
}

/// A single slot mailbox between one publisher and one reader.
pub struct EventBridge(Shared);

impl Default for EventBridge {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(Slot::Empty)))
    }
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publisher(&self) -> Publisher {
        Publisher(self.0.clone())
    }

    /// Turn the bridge into its read half.
    ///
    /// `teardown` runs exactly once, when the stream is dropped or after it yielded its last event.
    pub fn into_stream(self, teardown: impl FnOnce() + Send + 'static) -> EventStream {
        let state = (self.0, Teardown(Some(Box::new(teardown))));
        EventStream(
            futures::stream::unfold(state, |(shared, teardown)| async move {
                let event = match pull(&shared).await? {
                    StreamEvent::Close => return None,
                    event => event,
                };
                Some((event, (shared, teardown)))
            })
            .boxed(),
        )
    }
}

/// Build a bridge in one go, returning its read and write halves.
pub fn event_stream(teardown: impl FnOnce() + Send + 'static) -> (EventStream, Publisher) {
    let bridge = EventBridge::new();
    let publisher = bridge.publisher();
    (bridge.into_stream(teardown), publisher)
}

async fn pull(shared: &Shared) -> Option<StreamEvent> {
    let rx = {
        let mut slot = shared.lock();
        match std::mem::replace(&mut *slot, Slot::Empty) {
            Slot::Buffered(event) => return Some(event),
            Slot::Empty | Slot::Waiting(_) => {
                let (tx, rx) = oneshot::channel();
                *slot = Slot::Waiting(tx);
                rx
            }
        }
    };

    // Every `Publisher` has been dropped while we were waiting.
    rx.await.ok()
}

struct Teardown(Option<Box<dyn FnOnce() + Send>>);

impl Drop for Teardown {
    fn drop(&mut self) {
        if let Some(teardown) = self.0.take() {
            teardown();
        }
    }
}

/// The read half of an [`EventBridge`]. Ends on [`StreamEvent::Close`].
pub struct EventStream(BoxStream<'static, StreamEvent>);

impl EventStream {
    /// Encode the events into the line delimited wire format.
    pub fn into_frames(self) -> impl Stream<Item = Bytes> + Send + 'static {
        self.0.filter_map(|event| async move { encode_frame(&event) })
    }

    pub fn into_body(self) -> Body {
        Body::from_stream(self.into_frames().map(Ok::<_, Infallible>))
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_next_unpin(cx)
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

/// A data event becomes its JSON followed by `\n` and a ping becomes a bare `\n`. Close has no frame.
pub fn encode_frame(event: &StreamEvent) -> Option<Bytes> {
    match event {
        StreamEvent::Data(data) => {
            let mut buf = match serde_json::to_vec(data) {
                Ok(buf) => buf,
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("error serializing stream event: {}", _err);
                    return None;
                }
            };
            buf.push(b'\n');
            Some(buf.into())
        }
        StreamEvent::Ping => Some(Bytes::from_static(b"\n")),
        StreamEvent::Close => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let teardown = {
            let count = count.clone();
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        (count, teardown)
    }

    #[tokio::test]
    async fn slow_reader_sees_only_the_latest_event() {
        let (mut stream, publisher) = event_stream(|| {});

        publisher.publish(StreamEvent::Data(json!("A")));
        publisher.publish(StreamEvent::Data(json!("B")));
        publisher.publish(StreamEvent::Data(json!("C")));
        assert_eq!(stream.next().await, Some(StreamEvent::Data(json!("C"))));

        publisher.publish(StreamEvent::Ping);
        assert_eq!(stream.next().await, Some(StreamEvent::Ping));
    }

    #[tokio::test]
    async fn waiting_reader_is_handed_the_event() {
        let (mut stream, publisher) = event_stream(|| {});

        let reader = tokio::spawn(async move { stream.next().await });
        tokio::task::yield_now().await;
        publisher.publish(StreamEvent::Data(json!(1)));

        assert_eq!(reader.await.unwrap(), Some(StreamEvent::Data(json!(1))));
    }

    #[tokio::test]
    async fn close_ends_the_stream_and_tears_down_once() {
        let (count, teardown) = counter();
        let (stream, publisher) = event_stream(teardown);

        publisher.publish(StreamEvent::Ping);
        let mut frames = stream.into_frames().boxed();
        assert_eq!(frames.next().await, Some(Bytes::from_static(b"\n")));

        publisher.publish(StreamEvent::Close);
        assert_eq!(frames.next().await, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        drop(frames);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_the_reader_tears_down() {
        let (count, teardown) = counter();
        let (stream, publisher) = event_stream(teardown);

        drop(stream);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        publisher.publish(StreamEvent::Ping);
    }

    #[test]
    fn frames() {
        assert_eq!(
            encode_frame(&StreamEvent::Data(json!({"a": 1}))),
            Some(Bytes::from_static(b"{\"a\":1}\n"))
        );
        assert_eq!(
            encode_frame(&StreamEvent::Ping),
            Some(Bytes::from_static(b"\n"))
        );
        assert_eq!(encode_frame(&StreamEvent::Close), None);
    }
}
