use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use typeknit::Request;

use crate::{client::rpc_error, Error, Frame, FrameDecoder, Transport};

/// The lifecycle of a stream as seen through [`StreamReader::start`].
#[derive(Debug)]
#[non_exhaustive]
pub enum ClientStreamEvent {
    Connecting,
    Connected,
    /// Reserved for automatic reconnects, which are not implemented. It is never emitted.
    Reconnecting {
        last_error: Option<Error>,
        last_data: Option<Value>,
    },
    Data(Value),
    /// The server ended the stream. Carries the last payload received, if any.
    Done(Option<Value>),
    /// The stream failed and no further events will follow.
    Error {
        error: Error,
        last_data: Option<Value>,
    },
}

#[derive(Default)]
struct Cancel {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Reads a line delimited stream response and reports it through a callback.
pub struct StreamReader {
    transport: Arc<dyn Transport>,
    request: Mutex<Option<Request>>,
    cancel: Arc<Cancel>,
}

impl StreamReader {
    pub(crate) fn new(transport: Arc<dyn Transport>, request: Request) -> Self {
        Self {
            transport,
            request: Mutex::new(Some(request)),
            cancel: Default::default(),
        }
    }

    /// A handle which can cancel this reader from anywhere.
    pub fn canceller(&self) -> Canceller {
        Canceller(self.cancel.clone())
    }

    pub fn cancel(&self) {
        self.canceller().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.cancelled.load(Ordering::Acquire)
    }

    /// Send the request and drive the stream to its end, invoking `callback` for every event.
    ///
    /// Resolves once the stream is done, has failed or has been cancelled. A reader can only be started once.
    pub async fn start<F>(&self, mut callback: F) -> Result<(), Error>
    where
        F: FnMut(ClientStreamEvent) + Send,
    {
        let req = self.request.lock().take().ok_or(Error::AlreadyStarted)?;

        callback(ClientStreamEvent::Connecting);

        let resp = tokio::select! {
            biased;
            _ = self.cancel.notify.notified() => return Ok(()),
            resp = self.transport.fetch(req) => resp,
        };
        let resp = match resp {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                let error = rpc_error(resp).await;
                self.fail(&mut callback, error, None);
                return Ok(());
            }
            Err(error) => {
                self.fail(&mut callback, error, None);
                return Ok(());
            }
        };
        if self.is_cancelled() {
            return Ok(());
        }

        callback(ClientStreamEvent::Connected);

        let mut body = resp.into_body().into_stream();
        let mut decoder = FrameDecoder::new();
        let mut last_data = None;
        loop {
            if self.is_cancelled() {
                return Ok(());
            }

            let chunk = tokio::select! {
                biased;
                _ = self.cancel.notify.notified() => return Ok(()),
                chunk = body.next() => chunk,
            };
            let chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    self.fail(&mut callback, err.into(), last_data);
                    return Ok(());
                }
                None => break,
            };

            decoder.push(&chunk);
            while let Some(frame) = decoder.next_frame() {
                match frame {
                    Ok(Frame::Data(data)) => {
                        last_data = Some(data.clone());
                        callback(ClientStreamEvent::Data(data));
                    }
                    Ok(Frame::Ping) => {}
                    Err(err) => {
                        self.fail(&mut callback, Error::Decode(err), last_data);
                        return Ok(());
                    }
                }
            }
        }

        #[cfg(feature = "tracing")]
        if !decoder.remaining().is_empty() {
            tracing::debug!(
                "discarding {} bytes of incomplete frame at end of stream",
                decoder.remaining().len()
            );
        }

        callback(ClientStreamEvent::Done(last_data));
        Ok(())
    }

    fn fail<F: FnMut(ClientStreamEvent)>(
        &self,
        callback: &mut F,
        error: Error,
        last_data: Option<Value>,
    ) {
        #[cfg(feature = "tracing")]
        tracing::warn!("stream request failed: {}", error);

        if !self.is_cancelled() {
            callback(ClientStreamEvent::Error { error, last_data });
        }
    }
}

impl fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("started", &self.request.lock().is_none())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Cancels the [`StreamReader`] it was taken from.
#[derive(Clone)]
pub struct Canceller(Arc<Cancel>);

impl Canceller {
    /// Stop reading. The callback may still see the result of a read which was already in flight, nothing after that.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
        // `notify_one` stores a permit when the reader is not waiting yet.
        self.0.notify.notify_one();
    }
}

impl fmt::Debug for Canceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Canceller")
            .field(&self.0.cancelled.load(Ordering::Relaxed))
            .finish()
    }
}
