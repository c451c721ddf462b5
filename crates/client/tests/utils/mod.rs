#![allow(dead_code)]

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use typeknit::{Request, Response, Service};
use typeknit_client::{Client, ClientStreamEvent, Error, InProcess, Transport};

/// An in-process transport which records the path and envelope of every request it forwards.
#[derive(Clone)]
pub struct Recorder<S> {
    inner: InProcess<S>,
    pub seen: Arc<Mutex<Vec<(String, Value)>>>,
}

impl<S: Service + Clone> Recorder<S> {
    pub fn new(service: S) -> Self {
        Self {
            inner: InProcess::new(service),
            seen: Default::default(),
        }
    }
}

impl<S: Service + Clone> Transport for Recorder<S> {
    fn fetch(&self, req: Request) -> BoxFuture<'static, Result<Response, Error>> {
        let inner = self.inner.clone();
        let seen = self.seen.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect(usize::MAX).await.unwrap();
            seen.lock().push((
                parts.uri.path().to_string(),
                serde_json::from_slice(&body).unwrap(),
            ));
            inner.fetch(Request::from_parts(parts, body.into())).await
        })
    }
}

pub fn client<S: Service + Clone>(service: S) -> (Client, Arc<Mutex<Vec<(String, Value)>>>) {
    let recorder = Recorder::new(service);
    let seen = recorder.seen.clone();
    (Client::with_transport("http://localhost/rpc", recorder), seen)
}

pub type Events = tokio::sync::mpsc::UnboundedReceiver<ClientStreamEvent>;

pub fn collector() -> (impl FnMut(ClientStreamEvent) + Send + 'static, Events) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (
        move |event| {
            let _ = tx.send(event);
        },
        rx,
    )
}
